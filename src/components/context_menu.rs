use crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear};
use tracing::debug;

use crate::error::SurfaceError;
use crate::geometry::{FloatRect, Position, Size, clamp_position};
use crate::keybindings::{Action, KeyBindings};
use crate::notebook::TargetKind;
use crate::surface::{DisplaySurface, Marker, NodeId};
use crate::theme;
use crate::ui::UiFrame;

use super::{Component, ComponentContext};

/// Above the panel and its pop-ups.
pub const CONTEXT_MENU_LAYER: u16 = 1200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub kind: TargetKind,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }
}

/// Result of feeding a key to an open menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Ignored,
    Handled,
    Invoke(TargetKind),
    Dismiss,
}

/// The host's right-click menu, mounted at the surface root while open.
#[derive(Debug, Default)]
pub struct ContextMenuComponent {
    entries: Vec<MenuEntry>,
    root: Option<NodeId>,
    items: Vec<NodeId>,
    rect: Option<FloatRect>,
    selected: usize,
    bindings: KeyBindings,
}

impl ContextMenuComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.root.is_some()
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn item_node(&self, index: usize) -> Option<NodeId> {
        self.items.get(index).copied()
    }

    /// Open at `at`, replacing any menu already open. An empty entry list
    /// leaves the menu closed.
    pub fn open(
        &mut self,
        surface: &mut dyn DisplaySurface,
        at: Position,
        entries: Vec<MenuEntry>,
    ) -> Result<(), SurfaceError> {
        self.close(surface)?;
        if entries.is_empty() {
            return Ok(());
        }
        let inner = entries
            .iter()
            .map(|e| e.label.chars().count() as u16 + 2)
            .max()
            .unwrap_or(0);
        let size = Size::new(inner + 2, entries.len() as u16 + 2);
        let origin = clamp_position(at, size, surface.viewport());
        let rect = FloatRect::new(origin, size);

        let surface_root = surface.root();
        let root = surface.insert_node(surface_root, &[Marker::Presentation])?;
        self.root = Some(root);
        surface.set_layer(root, CONTEXT_MENU_LAYER)?;
        surface.set_local_rect(root, rect)?;
        for row in 0..entries.len() {
            let item = surface.insert_node(root, &[Marker::MenuItem])?;
            surface.set_local_rect(
                item,
                FloatRect::new(Position::new(1, row as i32 + 1), Size::new(inner, 1)),
            )?;
            self.items.push(item);
        }
        debug!(x = origin.x, y = origin.y, entries = entries.len(), "context menu opened");
        self.entries = entries;
        self.rect = Some(rect);
        self.selected = 0;
        Ok(())
    }

    pub fn close(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        self.items.clear();
        self.entries.clear();
        self.rect = None;
        match self.root.take() {
            Some(root) => match surface.remove(root) {
                Err(SurfaceError::UnknownNode(_)) | Ok(()) => Ok(()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        }
    }

    /// Whether `node` is part of the open menu.
    pub fn contains(&self, surface: &dyn DisplaySurface, node: NodeId) -> bool {
        self.root
            .is_some_and(|root| surface.is_descendant_of(node, root))
    }

    /// Entry under `node`, if it is one of the menu's items.
    pub fn entry_at(&self, surface: &dyn DisplaySurface, node: NodeId) -> Option<TargetKind> {
        let index = self
            .items
            .iter()
            .position(|item| surface.is_descendant_of(node, *item))?;
        self.entries.get(index).map(|e| e.kind)
    }

    pub fn on_key(&mut self, key: &KeyEvent) -> MenuOutcome {
        if !self.is_open() {
            return MenuOutcome::Ignored;
        }
        let action = self.bindings.first_match(
            &[
                Action::MenuUp,
                Action::MenuDown,
                Action::MenuSelect,
                Action::Cancel,
            ],
            key,
        );
        match action {
            Some(Action::MenuUp) => {
                self.selected = self.selected.saturating_sub(1);
                MenuOutcome::Handled
            }
            Some(Action::MenuDown) => {
                self.selected = (self.selected + 1).min(self.entries.len().saturating_sub(1));
                MenuOutcome::Handled
            }
            Some(Action::MenuSelect) => self
                .entries
                .get(self.selected)
                .map_or(MenuOutcome::Dismiss, |e| MenuOutcome::Invoke(e.kind)),
            Some(Action::Cancel) => MenuOutcome::Dismiss,
            // Any other key is swallowed while the menu is up.
            _ => MenuOutcome::Handled,
        }
    }
}

impl Component for ContextMenuComponent {
    fn render(&mut self, frame: &mut UiFrame<'_>, _area: Rect, _ctx: &ComponentContext) {
        let Some(area) = self.rect.and_then(|r| frame.visible(r)) else {
            return;
        };
        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default()
                .borders(Borders::ALL)
                .style(Style::default().bg(theme::menu_bg()).fg(theme::menu_fg())),
            area,
        );
        let Some(rect) = self.rect else {
            return;
        };
        let width = rect.width.saturating_sub(2) as usize;
        for (row, entry) in self.entries.iter().enumerate() {
            let style = if row == self.selected {
                Style::default()
                    .bg(theme::menu_selected_bg())
                    .fg(theme::menu_selected_fg())
            } else {
                Style::default().bg(theme::menu_bg()).fg(theme::menu_fg())
            };
            let text = format!(" {:<w$}", entry.label, w = width.saturating_sub(1));
            frame.set_string_within(rect.x + 1, rect.y + 1 + row as i32, &text, width, style);
        }
    }
}
