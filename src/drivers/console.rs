//! Crossterm-backed drivers for a real terminal.
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{
    self as term_event, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::debug;

use super::{InputDriver, OutputDriver};
use crate::ui::UiFrame;

/// Terminal input with key releases filtered out. Everything else,
/// including every pointer move of a drag, is delivered in arrival order.
#[derive(Debug, Default)]
pub struct ConsoleInputDriver {
    pending: VecDeque<Event>,
}

impl ConsoleInputDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_relevant() -> io::Result<Event> {
        loop {
            if let Some(event) = relevant(term_event::read()?) {
                return Ok(event);
            }
        }
    }

    fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }
}

/// Key releases and repeats are dropped; the chat input acts on presses.
fn relevant(event: Event) -> Option<Event> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Press => None,
        other => Some(other),
    }
}

impl InputDriver for ConsoleInputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        Ok(!self.pending.is_empty() || term_event::poll(timeout)?)
    }

    fn read(&mut self) -> io::Result<Event> {
        while term_event::poll(Duration::ZERO)? {
            let event = Self::next_relevant()?;
            self.push(event);
        }
        match self.pending.pop_front() {
            Some(event) => Ok(event),
            None => Self::next_relevant(),
        }
    }

    fn set_mouse_capture(&mut self, enabled: bool) -> io::Result<()> {
        let mut out = io::stdout();
        if enabled {
            execute!(out, EnableMouseCapture)
        } else {
            execute!(out, DisableMouseCapture)
        }
    }
}

/// Alternate-screen ratatui terminal. Leaving the screen is idempotent and
/// also happens on drop, so a panic unwinding through `main` restores the
/// user's shell.
pub struct ConsoleOutputDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl ConsoleOutputDriver {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(io::stdout()))?,
            active: false,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl OutputDriver for ConsoleOutputDriver {
    type Backend = CrosstermBackend<Stdout>;

    fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        execute!(
            self.terminal.backend_mut(),
            EnterAlternateScreen,
            EnableMouseCapture
        )?;
        enable_raw_mode()?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        self.active = true;
        debug!("terminal entered");
        Ok(())
    }

    fn exit(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        debug!("terminal restored");
        Ok(())
    }

    fn draw<F>(&mut self, paint: F) -> io::Result<()>
    where
        F: FnOnce(UiFrame<'_>),
    {
        self.terminal
            .draw(|frame| paint(UiFrame::new(frame)))
            .map(drop)
            .map_err(|err| io::Error::other(err.to_string()))
    }
}

impl Drop for ConsoleOutputDriver {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };

    fn mouse(kind: MouseEventKind, column: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn columns(driver: &ConsoleInputDriver) -> Vec<u16> {
        driver
            .pending
            .iter()
            .filter_map(|e| match e {
                Event::Mouse(m) => Some(m.column),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn only_key_presses_are_relevant() {
        let mut key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert!(relevant(Event::Key(key)).is_some());
        key.kind = KeyEventKind::Release;
        assert!(relevant(Event::Key(key)).is_none());
        key.kind = KeyEventKind::Repeat;
        assert!(relevant(Event::Key(key)).is_none());
        assert!(relevant(Event::Resize(10, 20)).is_some());
    }

    #[test]
    fn every_drag_move_is_delivered_in_order() {
        let mut d = ConsoleInputDriver::new();
        let drag = MouseEventKind::Drag(MouseButton::Left);
        d.push(mouse(MouseEventKind::Down(MouseButton::Left), 1));
        for column in [10, 11, 12] {
            d.push(mouse(drag, column));
        }
        d.push(mouse(MouseEventKind::Moved, 13));
        d.push(mouse(MouseEventKind::Moved, 14));
        d.push(mouse(MouseEventKind::Up(MouseButton::Left), 14));
        assert_eq!(columns(&d), vec![1, 10, 11, 12, 13, 14, 14]);
    }

    #[test]
    fn queued_events_are_reported_without_touching_the_terminal() {
        let mut d = ConsoleInputDriver::new();
        d.push(Event::Key(KeyEvent::new(KeyCode::Char('z'), KeyModifiers::NONE)));
        assert!(d.poll(Duration::ZERO).unwrap());
    }
}
