//! The floating chat panel.
//!
//! `Uninitialized -> Attached -> Disposed`. Attaching installs the submit
//! guard, mounts the panel subtree at an elevated layer, registers the
//! outside-click listener and places the panel. Every way of closing the
//! panel (host toggle, submission, outside click, close control, Escape)
//! goes through [`FloatingPanel::dispose`], which undoes all of it.
//!
//! Callbacks that want the panel gone (the guarded submit, the outside-click
//! listener) raise the panel's [`CloseSignal`]; each event entry point settles
//! the signal before returning, so disposal is complete by the time the host
//! regains control.

use crossterm::event::KeyEvent;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear};
use tracing::{debug, info, warn};

use crate::components::{ChatInputComponent, ComponentContext, InputResponse};
use crate::drag::{CursorStyle, DragController, DragSignal};
use crate::error::{ModelError, PanelError};
use crate::geometry::{CornerInset, FloatRect, Placement, Position, Size};
use crate::guard::{CloseReason, CloseSignal, SubmitGuard};
use crate::listeners::{EventStream, ListenerId, ListenerRegistry, ListenerSet, OwnerId};
use crate::model::{Attachment, SharedModel};
use crate::outside::OutsideClickDetector;
use crate::pointer::{PointerEvent, PointerKind};
use crate::surface::{DisplaySurface, Marker, NodeId, NodeTree, SurfaceQuery};
use crate::theme;
use crate::ui::UiFrame;

pub const PANEL_LAYER: u16 = 1000;
pub const CLOSE_LABEL: &str = " x ";
const CLOSE_WIDTH: u16 = 3;
/// Header row plus bottom border.
const CHROME_ROWS: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    pub width: u16,
    pub min_height: u16,
    /// Corner offset used while no absolute position exists.
    pub inset: CornerInset,
    pub title: String,
    /// Markers whose subtrees count as part of the panel for outside clicks.
    pub auxiliary: Vec<Marker>,
    pub layer: u16,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 48,
            min_height: 6,
            inset: CornerInset::new(2, 1),
            title: "Chat".to_string(),
            auxiliary: Marker::AUXILIARY.to_vec(),
            layer: PANEL_LAYER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Uninitialized,
    Attached,
    Disposed,
}

/// Report of a dispose call. Cleanup failures are absorbed and listed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposal {
    AlreadyDisposed,
    Completed {
        reason: CloseReason,
        failures: Vec<PanelError>,
    },
}

impl Disposal {
    pub fn is_clean(&self) -> bool {
        match self {
            Disposal::AlreadyDisposed => true,
            Disposal::Completed { failures, .. } => failures.is_empty(),
        }
    }

    pub fn reason(&self) -> Option<CloseReason> {
        match self {
            Disposal::AlreadyDisposed => None,
            Disposal::Completed { reason, .. } => Some(*reason),
        }
    }
}

/// The display surface plus the global event streams panels listen on.
#[derive(Debug)]
pub struct Host<S = NodeTree> {
    pub surface: S,
    pub listeners: ListenerRegistry,
}

impl<S: DisplaySurface> Host<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            listeners: ListenerRegistry::new(),
        }
    }
}

/// Everything a panel is constructed with.
#[derive(Debug)]
pub struct PanelOptions {
    pub model: SharedModel,
    /// Trigger point. `None` anchors the panel to the viewport corner.
    pub position: Option<Position>,
    pub attachment: Option<Attachment>,
    pub config: PanelConfig,
}

impl PanelOptions {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            position: None,
            attachment: None,
            config: PanelConfig::default(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_config(mut self, config: PanelConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct PanelParts {
    header: NodeId,
    close: NodeId,
    body: NodeId,
}

#[derive(Debug)]
pub struct FloatingPanel {
    id: OwnerId,
    state: PanelState,
    config: PanelConfig,
    model: SharedModel,
    placement: Placement,
    attachment: Option<Attachment>,
    root: Option<NodeId>,
    parts: Option<PanelParts>,
    size: Size,
    click_listeners: ListenerSet,
    drag: DragController,
    detector: OutsideClickDetector,
    guard: Option<SubmitGuard>,
    close: CloseSignal,
    relayout_pending: bool,
    closed_by: Option<CloseReason>,
    input: ChatInputComponent,
}

impl FloatingPanel {
    pub fn new(id: OwnerId, options: PanelOptions) -> Self {
        let PanelOptions {
            model,
            position,
            attachment,
            config,
        } = options;
        let placement = match position {
            Some(point) => Placement::Absolute(point),
            None => Placement::Anchored(config.inset),
        };
        let detector = OutsideClickDetector::new(config.auxiliary.clone());
        let input = ChatInputComponent::new(SharedModel::clone(&model));
        Self {
            id,
            state: PanelState::Uninitialized,
            config,
            model,
            placement,
            attachment,
            root: None,
            parts: None,
            size: Size::default(),
            click_listeners: ListenerSet::new(),
            drag: DragController::new(id),
            detector,
            guard: None,
            close: CloseSignal::new(),
            relayout_pending: false,
            closed_by: None,
            input,
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.state == PanelState::Attached
    }

    pub fn is_disposed(&self) -> bool {
        self.state == PanelState::Disposed
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn header(&self) -> Option<NodeId> {
        self.parts.map(|p| p.header)
    }

    pub fn close_control(&self) -> Option<NodeId> {
        self.parts.map(|p| p.close)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.parts.map(|p| p.body)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Top-left of the panel on the surface.
    pub fn position<Q: DisplaySurface + ?Sized>(&self, surface: &Q) -> Option<Position> {
        surface.bounding_rect(self.root?).map(|r| r.origin())
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn cursor(&self) -> CursorStyle {
        self.drag.cursor()
    }

    pub fn relayout_pending(&self) -> bool {
        self.relayout_pending
    }

    pub fn closed_by(&self) -> Option<CloseReason> {
        self.closed_by
    }

    pub fn input(&self) -> &ChatInputComponent {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ChatInputComponent {
        &mut self.input
    }

    pub fn attach(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
    ) -> Result<(), PanelError> {
        match self.state {
            PanelState::Attached => return Err(PanelError::AlreadyAttached),
            PanelState::Disposed => return Err(PanelError::Disposed),
            PanelState::Uninitialized => {}
        }
        let signal = self.close.clone();
        match SubmitGuard::install(&self.model, move || signal.request(CloseReason::Submitted)) {
            Ok(guard) => self.guard = Some(guard),
            Err(err) => {
                // Nothing was touched yet; the model belongs to someone else.
                warn!(panel = self.id.raw(), %err, "floating chat not attached");
                self.state = PanelState::Disposed;
                self.closed_by = Some(CloseReason::Failed);
                return Err(err.into());
            }
        }
        if let Err(err) = self.mount(surface, registry) {
            warn!(panel = self.id.raw(), %err, "attach failed; cleaning up");
            self.dispose(surface, registry, CloseReason::Failed);
            return Err(err);
        }
        self.input.focus();
        info!(
            panel = self.id.raw(),
            placement = ?self.placement,
            attachment = self.attachment.as_ref().map(|a| a.to_string()),
            "floating chat opened"
        );
        Ok(())
    }

    fn mount(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
    ) -> Result<(), PanelError> {
        let surface_root = surface.root();
        let root = surface.insert_node(surface_root, &[Marker::Panel])?;
        self.root = Some(root);
        surface.set_layer(root, self.config.layer)?;
        let header = surface.insert_node(root, &[Marker::PanelHeader])?;
        let close = surface.insert_node(header, &[Marker::CloseControl])?;
        surface.set_attr(close, "aria-label", "Close".into())?;
        let body = surface.insert_node(root, &[Marker::PanelBody])?;
        self.parts = Some(PanelParts {
            header,
            close,
            body,
        });
        self.input.mount(surface, body)?;
        self.click_listeners
            .listen(registry, EventStream::Click, self.id);
        if let Some(attachment) = &self.attachment {
            self.model
                .try_borrow_mut()
                .map_err(|_| ModelError::Busy)?
                .add_attachment(attachment.clone());
        }
        self.state = PanelState::Attached;
        self.relayout(surface)?;
        debug!(panel = self.id.raw(), root = root.raw(), "panel mounted");
        Ok(())
    }

    /// Tear everything down. Every step runs even when an earlier one fails.
    pub fn dispose(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
        reason: CloseReason,
    ) -> Disposal {
        if self.state == PanelState::Disposed {
            debug!(panel = self.id.raw(), "dispose on disposed panel ignored");
            return Disposal::AlreadyDisposed;
        }
        let mut failures: Vec<PanelError> = Vec::new();

        let released = self.click_listeners.release_all(registry);
        self.drag.end(registry);

        match self.model.try_borrow_mut() {
            Ok(mut inner) => {
                inner.value_mut().clear();
                inner.clear_attachments();
            }
            Err(_) => failures.push(ModelError::Busy.into()),
        }

        if let Some(mut guard) = self.guard.take()
            && let Err(err) = guard.restore()
        {
            failures.push(err.into());
            // Dropping the panel retries the restore.
            self.guard = Some(guard);
        }

        if let Err(err) = self.input.unmount(surface) {
            failures.push(err.into());
        }
        if let Some(root) = self.root.take()
            && let Err(err) = surface.remove(root)
        {
            failures.push(err.into());
        }
        self.parts = None;
        self.relayout_pending = false;
        self.close.take();
        self.state = PanelState::Disposed;
        self.closed_by = Some(reason);

        for failure in &failures {
            warn!(panel = self.id.raw(), error = %failure, "panel cleanup step failed");
        }
        info!(
            panel = self.id.raw(),
            reason = reason.as_str(),
            released,
            "floating chat closed"
        );
        Disposal::Completed { reason, failures }
    }

    /// Dispose if a callback asked for it.
    fn settle(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
    ) -> Option<Disposal> {
        let reason = self.close.take()?;
        Some(self.dispose(surface, registry, reason))
    }

    /// Re-run placement for the current content size. Deferred while a drag
    /// is in progress; the pointer owns the position until it is released.
    pub fn relayout(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), PanelError> {
        if self.state != PanelState::Attached {
            return Ok(());
        }
        if self.drag.is_dragging() {
            self.relayout_pending = true;
            debug!(panel = self.id.raw(), "relayout deferred during drag");
            return Ok(());
        }
        self.relayout_pending = false;
        let (Some(root), Some(parts)) = (self.root, self.parts) else {
            return Ok(());
        };
        let viewport = surface.viewport();
        let width = self.config.width.min(viewport.width).max(CLOSE_WIDTH + 2);
        let inner_width = width.saturating_sub(2);
        let wanted = self.input.desired_height(inner_width) + CHROME_ROWS;
        let height = wanted.max(self.config.min_height).min(viewport.height.max(CHROME_ROWS + 1));
        let size = Size::new(width, height);
        let origin = self.placement.resolve(size, viewport);

        surface.set_local_rect(root, FloatRect::new(origin, size))?;
        surface.set_local_rect(parts.header, local(0, 0, width, 1))?;
        surface.set_local_rect(
            parts.close,
            local(width.saturating_sub(CLOSE_WIDTH + 1), 0, CLOSE_WIDTH, 1),
        )?;
        let body = Size::new(inner_width, height.saturating_sub(CHROME_ROWS));
        surface.set_local_rect(parts.body, local(1, 1, body.width, body.height))?;
        self.input.layout(surface, body)?;
        self.size = size;
        debug!(
            panel = self.id.raw(),
            x = origin.x,
            y = origin.y,
            width,
            height,
            "panel placed"
        );
        Ok(())
    }

    pub fn on_viewport_resized(&mut self, surface: &mut dyn DisplaySurface) {
        if let Err(err) = self.relayout(surface) {
            warn!(panel = self.id.raw(), %err, "relayout after resize failed");
        }
    }

    /// Direct delivery of a pointer event whose target is inside the panel
    /// or one of its input's pop-ups. Returns whether the panel consumed it.
    pub fn handle_pointer(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
        event: &PointerEvent,
    ) -> bool {
        if self.state != PanelState::Attached {
            return false;
        }
        let (Some(root), Some(parts), Some(target)) = (self.root, self.parts, event.target) else {
            return false;
        };
        let inside = surface.is_descendant_of(target, root);
        if !inside && !self.input.owns_node(surface, target) {
            return false;
        }

        if event.is_primary_down() && surface.is_descendant_of(target, parts.header) {
            let origin = surface
                .bounding_rect(root)
                .map(|r| r.origin())
                .unwrap_or_default();
            let signal = self.drag.pointer_down(
                &*surface,
                target,
                &[parts.close],
                event.position,
                origin,
                registry,
            );
            if signal == Some(DragSignal::Start) {
                if let Err(err) = self.input.dismiss_popups(surface) {
                    warn!(%err, "failed to dismiss input pop-ups");
                }
                return true;
            }
        }

        if event.kind == PointerKind::Click && surface.is_descendant_of(target, parts.close) {
            self.close.request(CloseReason::Closed);
        } else {
            let before = self.input.desired_height(self.inner_width());
            let response = self.input.on_pointer(surface, event);
            self.after_input(surface, response, before);
        }
        self.settle(surface, registry);
        true
    }

    pub fn handle_key(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
        key: &KeyEvent,
    ) -> bool {
        if self.state != PanelState::Attached || !self.input.is_focused() {
            return false;
        }
        let before = self.input.desired_height(self.inner_width());
        let response = self.input.on_key(surface, key);
        self.after_input(surface, response, before);
        self.settle(surface, registry);
        response != InputResponse::Ignored
    }

    fn after_input(
        &mut self,
        surface: &mut dyn DisplaySurface,
        response: InputResponse,
        height_before: u16,
    ) {
        if response == InputResponse::Cancel {
            self.close.request(CloseReason::Cancelled);
            return;
        }
        if self.close.is_pending() {
            return;
        }
        if self.input.desired_height(self.inner_width()) != height_before
            && let Err(err) = self.relayout(surface)
        {
            warn!(panel = self.id.raw(), %err, "relayout after content change failed");
        }
    }

    fn inner_width(&self) -> u16 {
        self.size.width.saturating_sub(2)
    }

    /// A global stream delivered to one of this panel's registrations.
    pub fn on_global_event(
        &mut self,
        surface: &mut dyn DisplaySurface,
        registry: &mut ListenerRegistry,
        listener: ListenerId,
        event: &PointerEvent,
    ) {
        if self.state != PanelState::Attached {
            return;
        }
        let Some(root) = self.root else {
            return;
        };
        if self.drag.owns(listener) {
            match event.kind {
                PointerKind::Move => {
                    if let Some(next) =
                        self.drag
                            .pointer_move(event.position, self.size, surface.viewport())
                    {
                        self.placement = Placement::Absolute(next);
                        if let Err(err) =
                            surface.set_local_rect(root, FloatRect::new(next, self.size))
                        {
                            warn!(panel = self.id.raw(), %err, "failed to move panel");
                        }
                    }
                }
                PointerKind::Up(_) => {
                    self.drag.pointer_up(registry);
                    if self.relayout_pending
                        && let Err(err) = self.relayout(surface)
                    {
                        warn!(panel = self.id.raw(), %err, "deferred relayout failed");
                    }
                }
                PointerKind::Down(_) | PointerKind::Click => {}
            }
            return;
        }
        if self.click_listeners.owns(listener) && event.kind == PointerKind::Click {
            let class = self
                .detector
                .classify(&*surface, root, event.target, self.is_disposed());
            debug!(panel = self.id.raw(), ?class, "document click");
            if class.is_outside() {
                self.close.request(CloseReason::OutsideClick);
            }
        }
        self.settle(surface, registry);
    }

    /// Deliver a pointer event to this panel: direct delivery first, then
    /// the global streams the event belongs to.
    pub fn dispatch_pointer<S: DisplaySurface>(
        &mut self,
        host: &mut Host<S>,
        event: &PointerEvent,
    ) -> bool {
        let consumed = self.handle_pointer(&mut host.surface, &mut host.listeners, event);
        let stream = match event.kind {
            PointerKind::Move => EventStream::PointerMove,
            PointerKind::Up(_) => EventStream::PointerUp,
            PointerKind::Click => EventStream::Click,
            PointerKind::Down(_) => return consumed,
        };
        let Host { surface, listeners } = host;
        let id = self.id;
        listeners.dispatch(stream, |registry, listener, owner| {
            if owner == id {
                self.on_global_event(&mut *surface, registry, listener, event);
            }
        });
        consumed
    }

    pub fn render(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface) {
        let (Some(root), Some(parts)) = (self.root, self.parts) else {
            return;
        };
        let Some(rect) = surface.bounding_rect(root) else {
            return;
        };
        let Some(area) = frame.visible(rect) else {
            return;
        };
        let base = Style::default().bg(theme::panel_bg()).fg(theme::panel_fg());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::panel_border()))
                .style(base),
            area,
        );
        if let Some(header) = surface.bounding_rect(parts.header) {
            let style = theme::header_style(self.drag.is_dragging());
            let title = format!(" {:<width$}", self.config.title, width = header.width as usize);
            frame.set_string_signed(header.x, header.y, &title, style);
        }
        if let Some(close) = surface.bounding_rect(parts.close) {
            frame.set_string_signed(
                close.x,
                close.y,
                CLOSE_LABEL,
                theme::header_style(self.drag.is_dragging()),
            );
        }
        let ctx = ComponentContext::new(self.input.is_focused()).with_overlay(true);
        self.input.render(frame, surface, &ctx);
    }

    /// Pop-ups drawn after every other layer.
    pub fn render_overlays(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface) {
        if self.is_attached() {
            self.input.render_overlays(frame, surface);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GuardError, SurfaceError};
    use crate::model::{CellKind, CellRef, InputModel};
    use crossterm::event::{KeyCode, KeyModifiers, MouseButton};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        host: Host,
        model: SharedModel,
        sent: Rc<RefCell<Vec<String>>>,
    }

    fn fixture(width: u16, height: u16) -> Fixture {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&sent);
        let model =
            InputModel::new(move |text| sink.borrow_mut().push(text.to_string())).into_shared();
        Fixture {
            host: Host::new(NodeTree::new(Size::new(width, height))),
            model,
            sent,
        }
    }

    fn attached(host: &mut Host, id: u64, options: PanelOptions) -> FloatingPanel {
        let mut panel = FloatingPanel::new(OwnerId::new(id), options);
        panel.attach(&mut host.surface, &mut host.listeners).unwrap();
        panel
    }

    fn pointer(host: &Host, kind: PointerKind, x: i32, y: i32) -> PointerEvent {
        let target = host.surface.hit_test(x as u16, y as u16);
        PointerEvent::new(kind, Position::new(x, y), target)
    }

    fn click(host: &mut Host, panel: &mut FloatingPanel, x: i32, y: i32) {
        for kind in [PointerKind::Up(MouseButton::Left), PointerKind::Click] {
            let event = pointer(host, kind, x, y);
            panel.dispatch_pointer(host, &event);
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_keys(host: &mut Host, panel: &mut FloatingPanel, text: &str) {
        for c in text.chars() {
            panel.handle_key(&mut host.surface, &mut host.listeners, &key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn anchored_attach_builds_subtree_and_listens_for_clicks() {
        let mut f = fixture(80, 24);
        let panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        let root = panel.root().unwrap();
        assert!(f.host.surface.has_marker(root, Marker::Panel));
        assert_eq!(f.host.surface.layer(root), PANEL_LAYER);
        assert_eq!(panel.size(), Size::new(48, 6));
        // 80 - 2 - 48, 24 - 1 - 6
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(30, 17)));
        assert_eq!(f.host.listeners.count_for(panel.id()), 1);
        assert_eq!(f.host.listeners.count_on(EventStream::Click), 1);
        assert!(f.model.borrow().is_leased());
        assert!(panel.input().is_focused());
    }

    #[test]
    fn attach_twice_is_rejected() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        assert_eq!(
            panel.attach(&mut f.host.surface, &mut f.host.listeners),
            Err(PanelError::AlreadyAttached)
        );
    }

    #[test]
    fn leased_model_refuses_second_panel_without_touching_it() {
        let mut f = fixture(80, 24);
        let mut first = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        f.model.borrow_mut().set_value("draft");
        let mut second =
            FloatingPanel::new(OwnerId::new(2), PanelOptions::new(Rc::clone(&f.model)));
        let err = second
            .attach(&mut f.host.surface, &mut f.host.listeners)
            .unwrap_err();
        assert!(matches!(err, PanelError::Guard(GuardError::AlreadyInstalled)));
        assert!(second.is_disposed());
        assert_eq!(f.model.borrow().value(), "draft");
        assert!(f.model.borrow().is_leased());
        first.dispose(&mut f.host.surface, &mut f.host.listeners, CloseReason::Toggled);
        assert!(!f.model.borrow().is_leased());
    }

    #[test]
    fn dispose_restores_model_and_is_idempotent() {
        let mut f = fixture(80, 24);
        let before = f.model.borrow().submit_fn();
        let attachment = Attachment::Notebook {
            path: "nb.py".into(),
            cells: vec![CellRef {
                input_type: CellKind::Markdown,
                id: "cell-2".into(),
            }],
        };
        let options = PanelOptions::new(Rc::clone(&f.model)).with_attachment(attachment.clone());
        let mut panel = attached(&mut f.host, 1, options);
        assert_eq!(f.model.borrow().attachments(), &[attachment]);
        f.model.borrow_mut().set_value("unsent");

        let report = panel.dispose(&mut f.host.surface, &mut f.host.listeners, CloseReason::Toggled);
        assert!(report.is_clean());
        assert_eq!(report.reason(), Some(CloseReason::Toggled));
        assert!(panel.is_disposed());
        assert!(f.host.listeners.is_empty());
        assert_eq!(f.host.surface.len(), 1);
        assert_eq!(f.model.borrow().value(), "");
        assert!(f.model.borrow().attachments().is_empty());
        assert!(Rc::ptr_eq(&f.model.borrow().submit_fn(), &before));

        let again = panel.dispose(&mut f.host.surface, &mut f.host.listeners, CloseReason::Toggled);
        assert_eq!(again, Disposal::AlreadyDisposed);
        assert_eq!(
            panel.attach(&mut f.host.surface, &mut f.host.listeners),
            Err(PanelError::Disposed)
        );
    }

    #[test]
    fn dispose_keeps_going_when_root_was_removed_elsewhere() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        let root = panel.root().unwrap();
        f.host.surface.remove(root).unwrap();
        let report = panel.dispose(&mut f.host.surface, &mut f.host.listeners, CloseReason::Closed);
        let Disposal::Completed { failures, .. } = report else {
            panic!("expected a completed disposal");
        };
        assert_eq!(failures, vec![PanelError::Surface(SurfaceError::UnknownNode(root))]);
        assert!(f.host.listeners.is_empty());
        assert!(!f.model.borrow().is_leased());
    }

    #[test]
    fn submission_closes_exactly_once_after_original_ran() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        type_keys(&mut f.host, &mut panel, "hi");
        assert!(panel.handle_key(&mut f.host.surface, &mut f.host.listeners, &key(KeyCode::Enter)));
        assert_eq!(*f.sent.borrow(), vec!["hi".to_string()]);
        assert!(panel.is_disposed());
        assert_eq!(panel.closed_by(), Some(CloseReason::Submitted));
        assert!(!f.model.borrow().is_leased());
        assert!(f.host.listeners.is_empty());
    }

    #[test]
    fn escape_cancels_and_close_control_closes() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        panel.handle_key(&mut f.host.surface, &mut f.host.listeners, &key(KeyCode::Esc));
        assert_eq!(panel.closed_by(), Some(CloseReason::Cancelled));

        let mut panel = attached(&mut f.host, 2, PanelOptions::new(Rc::clone(&f.model)));
        let close = f
            .host
            .surface
            .bounding_rect(panel.close_control().unwrap())
            .unwrap();
        click(&mut f.host, &mut panel, close.x + 1, close.y);
        assert_eq!(panel.closed_by(), Some(CloseReason::Closed));
        assert!(f.host.listeners.is_empty());
    }

    #[test]
    fn outside_click_disposes_inside_click_does_not() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        let body = f.host.surface.bounding_rect(panel.body().unwrap()).unwrap();
        click(&mut f.host, &mut panel, body.x, body.y);
        assert!(panel.is_attached());
        click(&mut f.host, &mut panel, 0, 0);
        assert_eq!(panel.closed_by(), Some(CloseReason::OutsideClick));
    }

    #[test]
    fn header_drag_moves_and_clamps() {
        let mut f = fixture(80, 24);
        let options = PanelOptions::new(Rc::clone(&f.model)).with_position(Position::new(10, 5));
        let mut panel = attached(&mut f.host, 1, options);
        let down = pointer(&f.host, PointerKind::Down(MouseButton::Left), 12, 5);
        assert!(panel.dispatch_pointer(&mut f.host, &down));
        assert!(panel.is_dragging());
        assert_eq!(panel.cursor(), CursorStyle::Grabbing);
        assert_eq!(f.host.listeners.count_for(panel.id()), 3);

        let moved = pointer(&f.host, PointerKind::Move, 15, 7);
        panel.dispatch_pointer(&mut f.host, &moved);
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(13, 7)));

        let far = pointer(&f.host, PointerKind::Move, 300, 7);
        panel.dispatch_pointer(&mut f.host, &far);
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(32, 7)));

        let up = pointer(&f.host, PointerKind::Up(MouseButton::Left), 300, 7);
        panel.dispatch_pointer(&mut f.host, &up);
        assert!(!panel.is_dragging());
        assert_eq!(panel.cursor(), CursorStyle::Grab);
        assert_eq!(f.host.listeners.count_for(panel.id()), 1);
        assert!(panel.placement().is_absolute());
    }

    #[test]
    fn press_on_close_control_does_not_start_a_drag() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        let close = f
            .host
            .surface
            .bounding_rect(panel.close_control().unwrap())
            .unwrap();
        let down = pointer(&f.host, PointerKind::Down(MouseButton::Left), close.x, close.y);
        panel.dispatch_pointer(&mut f.host, &down);
        assert!(!panel.is_dragging());
    }

    #[test]
    fn content_growth_relayout_waits_for_drag_end() {
        let mut f = fixture(80, 24);
        let options = PanelOptions::new(Rc::clone(&f.model)).with_position(Position::new(20, 18));
        let mut panel = attached(&mut f.host, 1, options);
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(20, 18)));
        let down = pointer(&f.host, PointerKind::Down(MouseButton::Left), 21, 18);
        panel.dispatch_pointer(&mut f.host, &down);

        f.model.borrow_mut().set_value("x".repeat(46 * 5));
        panel.relayout(&mut f.host.surface).unwrap();
        assert!(panel.relayout_pending());
        assert_eq!(panel.size().height, 6);

        let up = pointer(&f.host, PointerKind::Up(MouseButton::Left), 21, 18);
        panel.dispatch_pointer(&mut f.host, &up);
        assert!(!panel.relayout_pending());
        assert_eq!(panel.size().height, 8);
        // re-clamped for the taller box
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(20, 16)));
    }

    #[test]
    fn typing_past_the_line_grows_the_panel() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        let start = panel.size().height;
        type_keys(&mut f.host, &mut panel, &"a".repeat(46 * 4));
        assert!(panel.size().height > start);
        // anchored: the bottom edge stays at the inset
        let position = panel.position(&f.host.surface).unwrap();
        assert_eq!(position.y + panel.size().height as i32, 23);
    }

    #[test]
    fn viewport_resize_keeps_anchor() {
        let mut f = fixture(80, 24);
        let mut panel = attached(&mut f.host, 1, PanelOptions::new(Rc::clone(&f.model)));
        f.host.surface.set_viewport(Size::new(100, 30));
        panel.on_viewport_resized(&mut f.host.surface);
        assert_eq!(panel.position(&f.host.surface), Some(Position::new(50, 23)));
    }
}
