//! Clipboard access for the chat input.
//!
//! A small wrapper over the `arboard` crate. The input reads through the
//! [`ClipboardSource`] trait so it can be driven without a system clipboard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard backend error: {0}")]
    Backend(#[from] arboard::Error),
}

/// Read the clipboard as a `String`.
pub fn get() -> Result<String, ClipboardError> {
    let mut cb = arboard::Clipboard::new()?;
    cb.get_text().map_err(ClipboardError::from)
}

pub trait ClipboardSource {
    fn read_text(&mut self) -> Result<String, ClipboardError>;
}

/// The platform clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        get()
    }
}

/// Normalize pasted text for the single-model input: CRLF and lone CR become
/// LF, other control characters are dropped.
pub fn sanitize_paste(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_normalizes_line_endings() {
        assert_eq!(sanitize_paste("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn sanitize_drops_escape_sequences_controls() {
        assert_eq!(sanitize_paste("x\u{1b}[0my\u{7}"), "x[0my");
    }
}
