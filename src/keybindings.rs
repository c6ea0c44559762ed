//! Key combos for every action the notebook host, the context menu and the
//! chat input respond to.
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    TogglePanel,
    // Chat input editing
    Submit,
    InsertNewline,
    Cancel,
    Paste,
    ClearInput,
    CursorLeft,
    CursorRight,
    LineStart,
    LineEnd,
    DeleteBack,
    DeleteForward,
    // Menus (context menu, options popover)
    MenuUp,
    MenuDown,
    MenuSelect,
    // Notebook navigation
    SelectPrevCell,
    SelectNextCell,
    OpenContextMenu,
}

impl Action {
    pub fn describe(self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::TogglePanel => "Toggle floating chat",
            Action::Submit => "Send message",
            Action::InsertNewline => "Insert newline",
            Action::Cancel => "Close / cancel",
            Action::Paste => "Paste",
            Action::ClearInput => "Clear input",
            Action::CursorLeft => "Cursor left",
            Action::CursorRight => "Cursor right",
            Action::LineStart => "Start of input",
            Action::LineEnd => "End of input",
            Action::DeleteBack => "Delete backward",
            Action::DeleteForward => "Delete forward",
            Action::MenuUp => "Menu up",
            Action::MenuDown => "Menu down",
            Action::MenuSelect => "Menu select",
            Action::SelectPrevCell => "Previous cell",
            Action::SelectNextCell => "Next cell",
            Action::OpenContextMenu => "Context menu for selected cell",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A key plus the exact modifier set it must be pressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub const fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.mods
    }
}

impl fmt::Display for KeyCombo {
    /// `Ctrl+Shift+K` style, modifiers first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (KeyModifiers::CONTROL, "Ctrl"),
            (KeyModifiers::SHIFT, "Shift"),
            (KeyModifiers::ALT, "Alt"),
        ] {
            if self.mods.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            KeyCode::F(n) => write!(f, "F{n}"),
            // Enter, Esc, Up, Home, ... already print as their own names.
            other => write!(f, "{other:?}"),
        }
    }
}

/// Bindings in the order they were declared. An action may have several
/// combos, and one combo may serve actions of different contexts.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    entries: Vec<(Action, KeyCombo)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::standard()
    }
}

impl KeyBindings {
    /// No bindings at all.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The stock bindings used by the demo host.
    pub fn standard() -> Self {
        use Action::*;
        use KeyCode::*;
        let mut kb = Self::new();
        kb.bind(Quit, KeyCombo::ctrl('q'));
        kb.bind(TogglePanel, KeyCombo::ctrl(' '));
        kb.bind(TogglePanel, KeyCombo::ctrl('k'));

        kb.bind(Submit, KeyCombo::plain(Enter));
        kb.bind(InsertNewline, KeyCombo::new(Enter, KeyModifiers::ALT));
        kb.bind(InsertNewline, KeyCombo::new(Enter, KeyModifiers::SHIFT));
        kb.bind(Cancel, KeyCombo::plain(Esc));
        kb.bind(Paste, KeyCombo::ctrl('v'));
        kb.bind(ClearInput, KeyCombo::ctrl('u'));
        kb.bind(CursorLeft, KeyCombo::plain(Left));
        kb.bind(CursorRight, KeyCombo::plain(Right));
        kb.bind(LineStart, KeyCombo::plain(Home));
        kb.bind(LineStart, KeyCombo::ctrl('a'));
        kb.bind(LineEnd, KeyCombo::plain(End));
        kb.bind(LineEnd, KeyCombo::ctrl('e'));
        kb.bind(DeleteBack, KeyCombo::plain(Backspace));
        kb.bind(DeleteForward, KeyCombo::plain(Delete));

        kb.bind(MenuUp, KeyCombo::plain(Up));
        kb.bind(MenuDown, KeyCombo::plain(Down));
        kb.bind(MenuSelect, KeyCombo::plain(Enter));

        kb.bind(SelectPrevCell, KeyCombo::plain(Up));
        kb.bind(SelectPrevCell, KeyCombo::plain(Char('k')));
        kb.bind(SelectNextCell, KeyCombo::plain(Down));
        kb.bind(SelectNextCell, KeyCombo::plain(Char('j')));
        kb.bind(OpenContextMenu, KeyCombo::plain(Char('m')));
        kb
    }

    pub fn bind(&mut self, action: Action, combo: KeyCombo) {
        if !self.entries.contains(&(action, combo)) {
            self.entries.push((action, combo));
        }
    }

    /// Drop every combo bound to `action`.
    pub fn unbind(&mut self, action: Action) {
        self.entries.retain(|(bound, _)| *bound != action);
    }

    pub fn matches(&self, action: Action, key: &KeyEvent) -> bool {
        self.entries
            .iter()
            .any(|(bound, combo)| *bound == action && combo.matches(key))
    }

    /// First action in `candidates` bound to `key`. Several contexts share
    /// keys (Enter submits in the input and selects in a menu), so callers
    /// say which actions apply where they are.
    pub fn first_match(&self, candidates: &[Action], key: &KeyEvent) -> Option<Action> {
        candidates
            .iter()
            .copied()
            .find(|action| self.matches(*action, key))
    }

    /// Printable combos for `action`, in binding order.
    pub fn combos_for(&self, action: Action) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(bound, _)| *bound == action)
            .map(|(_, combo)| combo.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_covers_quit_and_toggle() {
        let kb = KeyBindings::standard();
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(kb.matches(Action::Quit, &quit));
        let toggle = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL);
        assert!(kb.matches(Action::TogglePanel, &toggle));
        assert_eq!(kb.combos_for(Action::TogglePanel), vec!["Ctrl+Space", "Ctrl+K"]);
        // modifiers must match exactly
        let plain_q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!kb.matches(Action::Quit, &plain_q));
    }

    #[test]
    fn combos_print_modifiers_before_the_key() {
        let combo = KeyCombo::new(KeyCode::Enter, KeyModifiers::SHIFT | KeyModifiers::ALT);
        assert_eq!(combo.to_string(), "Shift+Alt+Enter");
        assert_eq!(KeyCombo::plain(KeyCode::F(5)).to_string(), "F5");
        assert_eq!(KeyCombo::plain(KeyCode::Esc).to_string(), "Esc");
    }

    #[test]
    fn first_match_respects_candidate_order() {
        let kb = KeyBindings::standard();
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            kb.first_match(&[Action::MenuSelect, Action::Submit], &enter),
            Some(Action::MenuSelect)
        );
        assert_eq!(
            kb.first_match(&[Action::Submit, Action::MenuSelect], &enter),
            Some(Action::Submit)
        );
        let alt_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT);
        assert_eq!(
            kb.first_match(&[Action::Submit, Action::InsertNewline], &alt_enter),
            Some(Action::InsertNewline)
        );
    }

    #[test]
    fn rebinding_replaces_defaults() {
        let mut kb = KeyBindings::standard();
        kb.unbind(Action::OpenContextMenu);
        kb.bind(Action::OpenContextMenu, KeyCombo::plain(KeyCode::Char('c')));
        kb.bind(Action::OpenContextMenu, KeyCombo::plain(KeyCode::Char('c')));
        assert_eq!(kb.combos_for(Action::OpenContextMenu), vec!["C"]);
        let m = KeyEvent::new(KeyCode::Char('m'), KeyModifiers::NONE);
        assert!(!kb.matches(Action::OpenContextMenu, &m));
    }
}
