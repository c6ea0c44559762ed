use crossterm::event::Event;
use ratatui::layout::Rect;

use crate::ui::UiFrame;

pub mod chat_input;
pub mod context_menu;
pub mod notebook_view;
pub mod status_bar;

pub use chat_input::{ChatInputComponent, InputResponse, MenuAction};
pub use context_menu::{ContextMenuComponent, MenuEntry};
pub use notebook_view::NotebookViewComponent;
pub use status_bar::StatusBarComponent;

/// UI state handed to components while rendering and handling events.
///
/// - `focused`: the component receives keyboard input.
/// - `overlay`: the component draws above the notebook (menus, the panel).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentContext {
    focused: bool,
    overlay: bool,
}

impl ComponentContext {
    pub const fn new(focused: bool) -> Self {
        Self {
            focused,
            overlay: false,
        }
    }

    pub const fn focused(&self) -> bool {
        self.focused
    }

    pub const fn overlay(&self) -> bool {
        self.overlay
    }

    pub const fn with_focus(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub const fn with_overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }
}

pub trait Component {
    fn resize(&mut self, _area: Rect, _ctx: &ComponentContext) {}

    fn render(&mut self, frame: &mut UiFrame<'_>, area: Rect, ctx: &ComponentContext);

    fn handle_event(&mut self, _event: &Event, _ctx: &ComponentContext) -> bool {
        false
    }
}
