//! Chat input mounted in the floating panel body.
//!
//! The component edits the shared [`InputModel`](crate::model::InputModel)
//! text in place and submits through the model's submit slot, so whatever
//! wrapper the panel installed there sees the submission. Its pop-ups (the
//! send tooltip and the options popover) are mounted at the surface root and
//! carry auxiliary markers; they are not descendants of the panel.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear};
use tracing::{debug, warn};

use super::ComponentContext;
use crate::clipboard::{ClipboardSource, SystemClipboard, sanitize_paste};
use crate::error::SurfaceError;
use crate::geometry::{FloatRect, Position, Size, clamp_position};
use crate::keybindings::{Action, KeyBindings};
use crate::model::{self, SharedModel};
use crate::pointer::{PointerEvent, PointerKind};
use crate::surface::{DisplaySurface, Marker, NodeId, SurfaceQuery};
use crate::theme;
use crate::ui::UiFrame;

pub const SEND_LABEL: &str = " Send ";
pub const OPTIONS_LABEL: &str = " ... ";
pub const SEND_TOOLTIP: &str = "Send message (Enter)";
pub const PLACEHOLDER: &str = "Ask about this notebook";
/// Layer for pop-ups so they stack above the panel.
pub const POPUP_LAYER: u16 = 1100;
const MAX_EDITOR_ROWS: u16 = 5;
const MENU_WIDTH: u16 = 16;

/// Outcome of an input event, for the panel to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    Ignored,
    Handled,
    /// Non-blank text went through the model's submit slot.
    Submitted,
    /// The user asked to close the panel.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ClearText,
    Paste,
}

impl MenuAction {
    pub const ALL: [MenuAction; 2] = [MenuAction::ClearText, MenuAction::Paste];

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::ClearText => "Clear text",
            MenuAction::Paste => "Paste",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InputNodes {
    container: NodeId,
    editor: NodeId,
    chips: NodeId,
    toolbar: NodeId,
    options: NodeId,
    send: NodeId,
}

#[derive(Debug, Clone)]
struct Popover {
    root: NodeId,
    items: Vec<(NodeId, MenuAction)>,
    selected: usize,
}

pub struct ChatInputComponent {
    model: SharedModel,
    bindings: KeyBindings,
    clipboard: Box<dyn ClipboardSource>,
    /// Character index into the model text.
    cursor: usize,
    nodes: Option<InputNodes>,
    tooltip: Option<NodeId>,
    menu: Option<Popover>,
    focused: bool,
}

impl std::fmt::Debug for ChatInputComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatInputComponent")
            .field("cursor", &self.cursor)
            .field("mounted", &self.nodes.is_some())
            .field("tooltip", &self.tooltip)
            .field("menu", &self.menu)
            .field("focused", &self.focused)
            .finish_non_exhaustive()
    }
}

impl ChatInputComponent {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            bindings: KeyBindings::default(),
            clipboard: Box::new(SystemClipboard),
            cursor: 0,
            nodes: None,
            tooltip: None,
            menu: None,
            focused: false,
        }
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardSource>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.nodes.is_some()
    }

    pub fn focus(&mut self) {
        self.focused = true;
        self.cursor = self.text_len();
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn cursor(&self) -> usize {
        self.cursor.min(self.text_len())
    }

    pub fn container(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.container)
    }

    pub fn send_button(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.send)
    }

    pub fn options_button(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.options)
    }

    pub fn tooltip(&self) -> Option<NodeId> {
        self.tooltip
    }

    pub fn menu(&self) -> Option<NodeId> {
        self.menu.as_ref().map(|m| m.root)
    }

    pub fn menu_item(&self, action: MenuAction) -> Option<NodeId> {
        self.menu
            .as_ref()?
            .items
            .iter()
            .find(|(_, a)| *a == action)
            .map(|(node, _)| *node)
    }

    pub fn mount(
        &mut self,
        surface: &mut dyn DisplaySurface,
        parent: NodeId,
    ) -> Result<(), SurfaceError> {
        let container = surface.insert_node(parent, &[Marker::ChatInput])?;
        let editor = surface.insert_node(container, &[])?;
        let chips = surface.insert_node(container, &[])?;
        let toolbar = surface.insert_node(container, &[Marker::Toolbar])?;
        let options = surface.insert_node(toolbar, &[Marker::Button])?;
        surface.set_attr(options, "aria-label", "More options".into())?;
        let send = surface.insert_node(toolbar, &[Marker::Button])?;
        surface.set_attr(send, "aria-label", "Send".into())?;
        self.nodes = Some(InputNodes {
            container,
            editor,
            chips,
            toolbar,
            options,
            send,
        });
        self.cursor = self.text_len();
        Ok(())
    }

    /// Remove the pop-ups this input mounted at the surface root. The
    /// container itself goes away with whatever subtree it was mounted in.
    pub fn unmount(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        let result = self.dismiss_popups(surface);
        self.nodes = None;
        self.focused = false;
        result
    }

    /// Close the tooltip and the options menu, attempting both.
    pub fn dismiss_popups(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        let tooltip = self.close_tooltip(surface);
        let menu = self.close_menu(surface);
        tooltip.and(menu)
    }

    /// Whether `node` belongs to one of this input's root-level pop-ups.
    pub fn owns_node(&self, surface: &dyn DisplaySurface, node: NodeId) -> bool {
        let popups = self.tooltip.into_iter().chain(self.menu.as_ref().map(|m| m.root));
        popups
            .into_iter()
            .any(|popup| surface.is_descendant_of(node, popup))
    }

    /// Height needed to show the current text at `width`.
    pub fn desired_height(&self, width: u16) -> u16 {
        self.editor_rows(width) + self.chip_rows() + 1
    }

    pub fn layout(&mut self, surface: &mut dyn DisplaySurface, size: Size) -> Result<(), SurfaceError> {
        let Some(nodes) = self.nodes else {
            return Ok(());
        };
        let width = size.width;
        let editor_rows = self.editor_rows(width).min(size.height.saturating_sub(1));
        let chip_rows = self.chip_rows();
        let send_width = label_width(SEND_LABEL).min(width);
        let options_width = label_width(OPTIONS_LABEL).min(width.saturating_sub(send_width));
        let send_x = width.saturating_sub(send_width);
        let options_x = send_x.saturating_sub(options_width + 1);

        surface.set_local_rect(nodes.container, local(0, 0, width, size.height))?;
        surface.set_local_rect(nodes.editor, local(0, 0, width, editor_rows))?;
        surface.set_local_rect(nodes.chips, local(0, editor_rows, width, chip_rows))?;
        surface.set_local_rect(
            nodes.toolbar,
            local(0, size.height.saturating_sub(1), width, 1),
        )?;
        surface.set_local_rect(nodes.options, local(options_x, 0, options_width, 1))?;
        surface.set_local_rect(nodes.send, local(send_x, 0, send_width, 1))?;
        Ok(())
    }

    pub fn on_pointer(
        &mut self,
        surface: &mut dyn DisplaySurface,
        event: &PointerEvent,
    ) -> InputResponse {
        let Some(nodes) = self.nodes else {
            return InputResponse::Ignored;
        };
        let target = event.target;
        let over = |surface: &dyn DisplaySurface, node: NodeId| hits(surface, target, node);
        match event.kind {
            PointerKind::Move => {
                if over(&*surface, nodes.send) {
                    if self.tooltip.is_none()
                        && let Err(err) = self.open_tooltip(surface, nodes.send)
                    {
                        warn!(%err, "failed to open send tooltip");
                    }
                    return InputResponse::Handled;
                }
                if let Some(tooltip) = self.tooltip
                    && !over(&*surface, tooltip)
                {
                    log_popup(self.close_tooltip(surface));
                }
                InputResponse::Ignored
            }
            PointerKind::Down(_) => {
                if over(&*surface, nodes.container) {
                    self.focused = true;
                    InputResponse::Handled
                } else {
                    InputResponse::Ignored
                }
            }
            PointerKind::Up(_) => InputResponse::Ignored,
            PointerKind::Click => {
                let picked = self.menu.as_ref().and_then(|menu| {
                    menu.items
                        .iter()
                        .find(|(node, _)| over(&*surface, *node))
                        .map(|(_, action)| *action)
                });
                if let Some(action) = picked {
                    log_popup(self.close_menu(surface));
                    return self.run_menu_action(action);
                }
                if let Some(menu) = self.menu.as_ref().map(|m| m.root)
                    && over(&*surface, menu)
                {
                    return InputResponse::Handled;
                }
                if over(&*surface, nodes.options) {
                    let result = if self.menu.is_some() {
                        self.close_menu(surface)
                    } else {
                        self.open_menu(surface, nodes.options)
                    };
                    log_popup(result);
                    return InputResponse::Handled;
                }
                // Anything else closes an open menu.
                log_popup(self.close_menu(surface));
                if over(&*surface, nodes.send) {
                    return self.submit();
                }
                if let Some(tooltip) = self.tooltip
                    && over(&*surface, tooltip)
                {
                    return InputResponse::Handled;
                }
                if over(&*surface, nodes.container) {
                    self.focused = true;
                    return InputResponse::Handled;
                }
                InputResponse::Ignored
            }
        }
    }

    pub fn on_key(&mut self, surface: &mut dyn DisplaySurface, key: &KeyEvent) -> InputResponse {
        if self.menu.is_some()
            && let Some(response) = self.menu_key(surface, key)
        {
            return response;
        }
        use Action::*;
        let editing = [
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
        ];
        match self.bindings.first_match(&editing, key) {
            Some(Submit) => self.submit(),
            Some(InsertNewline) => {
                self.insert_str("\n");
                InputResponse::Handled
            }
            Some(Cancel) => InputResponse::Cancel,
            Some(Paste) => self.paste(),
            Some(ClearInput) => self.clear_text(),
            Some(CursorLeft) => {
                self.cursor = self.cursor().saturating_sub(1);
                InputResponse::Handled
            }
            Some(CursorRight) => {
                self.cursor = (self.cursor() + 1).min(self.text_len());
                InputResponse::Handled
            }
            Some(LineStart) => {
                self.cursor = 0;
                InputResponse::Handled
            }
            Some(LineEnd) => {
                self.cursor = self.text_len();
                InputResponse::Handled
            }
            Some(DeleteBack) => self.delete(true),
            Some(DeleteForward) => self.delete(false),
            _ => match key.code {
                KeyCode::Char(c)
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    let mut buf = [0u8; 4];
                    self.insert_str(c.encode_utf8(&mut buf));
                    InputResponse::Handled
                }
                _ => InputResponse::Ignored,
            },
        }
    }

    fn menu_key(&mut self, surface: &mut dyn DisplaySurface, key: &KeyEvent) -> Option<InputResponse> {
        let action = self.bindings.first_match(
            &[Action::MenuUp, Action::MenuDown, Action::MenuSelect, Action::Cancel],
            key,
        )?;
        let menu = self.menu.as_mut()?;
        let count = menu.items.len().max(1);
        match action {
            Action::MenuUp => menu.selected = (menu.selected + count - 1) % count,
            Action::MenuDown => menu.selected = (menu.selected + 1) % count,
            Action::MenuSelect => {
                let picked = menu.items.get(menu.selected).map(|(_, a)| *a);
                log_popup(self.close_menu(surface));
                return Some(match picked {
                    Some(action) => self.run_menu_action(action),
                    None => InputResponse::Handled,
                });
            }
            _ => log_popup(self.close_menu(surface)),
        }
        Some(InputResponse::Handled)
    }

    fn run_menu_action(&mut self, action: MenuAction) -> InputResponse {
        debug!(action = action.label(), "input menu action");
        match action {
            MenuAction::ClearText => self.clear_text(),
            MenuAction::Paste => self.paste(),
        }
    }

    fn submit(&mut self) -> InputResponse {
        match model::send(&self.model) {
            Ok(Some(text)) => {
                self.cursor = 0;
                debug!(chars = text.chars().count(), "message submitted");
                InputResponse::Submitted
            }
            Ok(None) => InputResponse::Handled,
            Err(err) => {
                warn!(%err, "submit skipped");
                InputResponse::Handled
            }
        }
    }

    fn paste(&mut self) -> InputResponse {
        match self.clipboard.read_text() {
            Ok(text) => self.insert_str(&sanitize_paste(&text)),
            Err(err) => warn!(%err, "paste failed"),
        }
        InputResponse::Handled
    }

    fn clear_text(&mut self) -> InputResponse {
        match self.model.try_borrow_mut() {
            Ok(mut inner) => inner.value_mut().clear(),
            Err(_) => warn!("input model busy; clear skipped"),
        }
        self.cursor = 0;
        InputResponse::Handled
    }

    fn insert_str(&mut self, text: &str) {
        let Ok(mut inner) = self.model.try_borrow_mut() else {
            warn!("input model busy; edit dropped");
            return;
        };
        let value = inner.value_mut();
        let cursor = self.cursor.min(value.chars().count());
        value.insert_str(byte_index(value, cursor), text);
        self.cursor = cursor + text.chars().count();
    }

    fn delete(&mut self, backward: bool) -> InputResponse {
        let Ok(mut inner) = self.model.try_borrow_mut() else {
            warn!("input model busy; edit dropped");
            return InputResponse::Handled;
        };
        let value = inner.value_mut();
        let len = value.chars().count();
        let cursor = self.cursor.min(len);
        let index = if backward {
            let Some(prev) = cursor.checked_sub(1) else {
                return InputResponse::Handled;
            };
            prev
        } else if cursor < len {
            cursor
        } else {
            return InputResponse::Handled;
        };
        value.remove(byte_index(value, index));
        self.cursor = index;
        InputResponse::Handled
    }

    fn open_tooltip(
        &mut self,
        surface: &mut dyn DisplaySurface,
        anchor: NodeId,
    ) -> Result<(), SurfaceError> {
        let Some(anchor_rect) = surface.bounding_rect(anchor) else {
            return Ok(());
        };
        let width = label_width(SEND_TOOLTIP) + 2;
        let size = Size::new(width, 1);
        let proposed = Position::new(
            anchor_rect.x + anchor_rect.width as i32 - width as i32,
            anchor_rect.y - 1,
        );
        let origin = clamp_position(proposed, size, surface.viewport());
        let root = surface.root();
        let node = surface.insert_node(root, &[Marker::Tooltip])?;
        surface.set_local_rect(node, FloatRect::new(origin, size))?;
        surface.set_layer(node, POPUP_LAYER)?;
        let label = surface.insert_node(node, &[])?;
        surface.set_local_rect(label, local(1, 0, width - 2, 1))?;
        self.tooltip = Some(node);
        Ok(())
    }

    fn close_tooltip(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        match self.tooltip.take() {
            Some(node) => remove_popup(surface, node),
            None => Ok(()),
        }
    }

    fn open_menu(&mut self, surface: &mut dyn DisplaySurface, anchor: NodeId) -> Result<(), SurfaceError> {
        let Some(anchor_rect) = surface.bounding_rect(anchor) else {
            return Ok(());
        };
        let size = Size::new(MENU_WIDTH, MenuAction::ALL.len() as u16 + 2);
        let proposed = Position::new(anchor_rect.x, anchor_rect.y - size.height as i32);
        let origin = clamp_position(proposed, size, surface.viewport());
        let root = surface.root();
        let menu_root = surface.insert_node(root, &[Marker::Popover])?;
        surface.set_local_rect(menu_root, FloatRect::new(origin, size))?;
        surface.set_layer(menu_root, POPUP_LAYER)?;
        let mut items = Vec::with_capacity(MenuAction::ALL.len());
        for (row, action) in MenuAction::ALL.into_iter().enumerate() {
            let item = surface.insert_node(menu_root, &[Marker::MenuItem])?;
            surface.set_local_rect(item, local(1, row as u16 + 1, MENU_WIDTH - 2, 1))?;
            items.push((item, action));
        }
        self.menu = Some(Popover {
            root: menu_root,
            items,
            selected: 0,
        });
        Ok(())
    }

    fn close_menu(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        match self.menu.take() {
            Some(menu) => remove_popup(surface, menu.root),
            None => Ok(()),
        }
    }

    fn text_len(&self) -> usize {
        self.model
            .try_borrow()
            .map(|m| m.value().chars().count())
            .unwrap_or(self.cursor)
    }

    fn chip_rows(&self) -> u16 {
        let has_attachments = self
            .model
            .try_borrow()
            .map(|m| !m.attachments().is_empty())
            .unwrap_or(false);
        u16::from(has_attachments)
    }

    fn editor_rows(&self, width: u16) -> u16 {
        let Ok(inner) = self.model.try_borrow() else {
            return 1;
        };
        let text = inner.value();
        let lines = wrap_lines(text, width as usize).len();
        let (cursor_row, _) = cursor_location(text, self.cursor, width as usize);
        let rows = lines.max(cursor_row + 1);
        (rows.min(MAX_EDITOR_ROWS as usize) as u16).max(1)
    }

    pub fn render(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface, ctx: &ComponentContext) {
        let Some(nodes) = self.nodes else {
            return;
        };
        let Ok(inner) = self.model.try_borrow() else {
            return;
        };
        if let Some(editor) = surface.bounding_rect(nodes.editor) {
            let width = editor.width as usize;
            let text = inner.value();
            if text.is_empty() {
                frame.set_string_signed(
                    editor.x,
                    editor.y,
                    PLACEHOLDER,
                    Style::default().fg(theme::placeholder_fg()),
                );
            }
            let lines = wrap_lines(text, width);
            let (row, col) = cursor_location(text, self.cursor.min(text.chars().count()), width);
            let height = editor.height as usize;
            let first = (row + 1).saturating_sub(height);
            for (offset, line) in lines.iter().skip(first).take(height).enumerate() {
                frame.set_string_signed(editor.x, editor.y + offset as i32, line, Style::default());
            }
            if ctx.focused() && height > 0 {
                let under = lines
                    .get(row)
                    .and_then(|line| line.chars().nth(col))
                    .unwrap_or(' ');
                frame.set_string_signed(
                    editor.x + col as i32,
                    editor.y + (row - first) as i32,
                    &under.to_string(),
                    theme::cursor_style(),
                );
            }
        }
        if let Some(chips) = surface.bounding_rect(nodes.chips)
            && chips.height > 0
        {
            let line: Vec<String> = inner
                .attachments()
                .iter()
                .map(|a| format!("@{a}"))
                .collect();
            frame.set_string_signed(
                chips.x,
                chips.y,
                &line.join("  "),
                Style::default().fg(theme::chip_fg()),
            );
        }
        if let Some(options) = surface.bounding_rect(nodes.options) {
            frame.set_string_signed(options.x, options.y, OPTIONS_LABEL, Style::default());
        }
        if let Some(send) = surface.bounding_rect(nodes.send) {
            frame.set_string_signed(send.x, send.y, SEND_LABEL, theme::button_style());
        }
    }

    /// Draw the root-level pop-ups. Called after everything else so they
    /// stack on top.
    pub fn render_overlays(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface) {
        if let Some(tooltip) = self.tooltip
            && let Some(rect) = surface.bounding_rect(tooltip)
            && let Some(area) = frame.visible(rect)
        {
            frame.render_widget(Clear, area);
            frame.set_style(area, theme::tooltip_style());
            frame.set_string_signed(rect.x + 1, rect.y, SEND_TOOLTIP, theme::tooltip_style());
        }
        if let Some(menu) = &self.menu
            && let Some(rect) = surface.bounding_rect(menu.root)
            && let Some(area) = frame.visible(rect)
        {
            let base = Style::default().bg(theme::menu_bg()).fg(theme::menu_fg());
            frame.render_widget(Clear, area);
            frame.render_widget(Block::default().borders(Borders::ALL).style(base), area);
            for (idx, (node, action)) in menu.items.iter().enumerate() {
                let Some(item) = surface.bounding_rect(*node) else {
                    continue;
                };
                let style = if idx == menu.selected {
                    Style::default()
                        .bg(theme::menu_selected_bg())
                        .fg(theme::menu_selected_fg())
                } else {
                    base
                };
                let label = format!("{:<width$}", action.label(), width = item.width as usize);
                frame.set_string_signed(item.x, item.y, &label, style);
            }
        }
    }
}

fn hits(surface: &dyn DisplaySurface, target: Option<NodeId>, node: NodeId) -> bool {
    target.is_some_and(|t| surface.is_descendant_of(t, node))
}

fn log_popup(result: Result<(), SurfaceError>) {
    if let Err(err) = result {
        warn!(%err, "input pop-up update failed");
    }
}

fn remove_popup(surface: &mut dyn DisplaySurface, node: NodeId) -> Result<(), SurfaceError> {
    match surface.remove(node) {
        // Already gone with some other subtree.
        Ok(()) | Err(SurfaceError::UnknownNode(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

fn local(x: u16, y: u16, width: u16, height: u16) -> FloatRect {
    FloatRect {
        x: x as i32,
        y: y as i32,
        width,
        height,
    }
}

fn label_width(label: &str) -> u16 {
    label.chars().count() as u16
}

fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Split `text` into display rows of at most `width` characters, honoring
/// embedded newlines.
pub(crate) fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            rows.push(chunk.iter().collect());
        }
    }
    rows
}

/// Row and column of character index `cursor` under [`wrap_lines`].
pub(crate) fn cursor_location(text: &str, cursor: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let (mut row, mut col) = (0, 0);
    for ch in text.chars().take(cursor) {
        if ch == '\n' {
            row += 1;
            col = 0;
            continue;
        }
        if col == width {
            row += 1;
            col = 0;
        }
        col += 1;
    }
    if col == width {
        row += 1;
        col = 0;
    }
    (row, col)
}
