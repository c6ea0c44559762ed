//! The "Floating Chat" toggle command.
//!
//! The host registers one command, offered in the notebook's context menu
//! as "Floating Chat (Notebook)" and on cells as "Floating Chat (Cell)".
//! Invoking it while a panel is open closes that panel; otherwise it opens a
//! new one at the last right-click position, attached to what was clicked.

use std::rc::Rc;

use crossterm::event::KeyEvent;
use tracing::{debug, info, warn};

use crate::components::MenuEntry;
use crate::error::PanelError;
use crate::geometry::Position;
use crate::guard::CloseReason;
use crate::listeners::OwnerId;
use crate::model::SharedModel;
use crate::notebook::{NotebookTracker, TargetKind, derive_attachment};
use crate::panel::{Disposal, FloatingPanel, Host, PanelConfig, PanelOptions};
use crate::pointer::PointerEvent;
use crate::surface::{DisplaySurface, Marker, NodeId, SurfaceQuery};
use crate::ui::UiFrame;

pub const COMMAND_ID: &str = "floating-chat:toggle";

pub fn command_label(kind: TargetKind) -> String {
    format!("Floating Chat ({kind})")
}

/// Where the last context menu was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextCapture {
    pub position: Position,
    pub target: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToggleRequest {
    pub kind: Option<TargetKind>,
    /// Absolute placement; `None` anchors the panel to the viewport corner.
    pub position: Option<Position>,
    pub target: Option<NodeId>,
}

impl ToggleRequest {
    pub fn anchored() -> Self {
        Self::default()
    }

    pub fn at(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, kind: TargetKind, target: NodeId) -> Self {
        self.kind = Some(kind);
        self.target = Some(target);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Opened(OwnerId),
    Closed(Disposal),
    /// No input model is configured yet; nothing happened.
    Unavailable,
    Failed(PanelError),
}

#[derive(Debug)]
pub struct FloatingChat {
    model: Option<SharedModel>,
    config: PanelConfig,
    panel: Option<FloatingPanel>,
    next_id: u64,
    last_context: ContextCapture,
    last_closed: Option<CloseReason>,
}

impl FloatingChat {
    pub fn new(model: Option<SharedModel>) -> Self {
        Self {
            model,
            config: PanelConfig::default(),
            panel: None,
            next_id: 0,
            last_context: ContextCapture::default(),
            last_closed: None,
        }
    }

    pub fn with_config(mut self, config: PanelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_model(&mut self, model: Option<SharedModel>) {
        self.model = model;
    }

    pub fn model(&self) -> Option<&SharedModel> {
        self.model.as_ref()
    }

    pub fn panel(&self) -> Option<&FloatingPanel> {
        self.panel.as_ref()
    }

    pub fn panel_mut(&mut self) -> Option<&mut FloatingPanel> {
        self.panel.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.panel.as_ref().is_some_and(FloatingPanel::is_attached)
    }

    /// Why the most recent panel closed.
    pub fn last_closed(&self) -> Option<CloseReason> {
        self.last_closed
    }

    pub fn last_context(&self) -> ContextCapture {
        self.last_context
    }

    /// Remember where a context menu was requested. Called for every
    /// secondary press, whatever it lands on.
    pub fn record_context_menu(&mut self, event: &PointerEvent) {
        self.last_context = ContextCapture {
            position: event.position,
            target: event.target,
        };
    }

    /// Entries the context menu offers for `target`.
    pub fn context_entries<S: SurfaceQuery + ?Sized>(
        &self,
        surface: &S,
        target: Option<NodeId>,
    ) -> Vec<MenuEntry> {
        let Some(target) = target else {
            return Vec::new();
        };
        [TargetKind::Notebook, TargetKind::Cell]
            .into_iter()
            .filter(|kind| {
                let marker = match kind {
                    TargetKind::Notebook => Marker::Notebook,
                    TargetKind::Cell => Marker::Cell,
                };
                surface.closest(target, marker).is_some()
            })
            .map(|kind| MenuEntry::new(command_label(kind), kind))
            .collect()
    }

    /// Toggle from a context-menu entry, using the recorded position and target.
    pub fn invoke_context_entry<S: DisplaySurface>(
        &mut self,
        host: &mut Host<S>,
        tracker: &NotebookTracker,
        kind: TargetKind,
    ) -> ToggleOutcome {
        let capture = self.last_context;
        let mut request = ToggleRequest::at(capture.position);
        if let Some(target) = capture.target {
            request = request.with_target(kind, target);
        }
        self.toggle(host, tracker, request)
    }

    pub fn toggle<S: DisplaySurface>(
        &mut self,
        host: &mut Host<S>,
        tracker: &NotebookTracker,
        request: ToggleRequest,
    ) -> ToggleOutcome {
        if let Some(mut panel) = self.panel.take()
            && !panel.is_disposed()
        {
            let disposal = panel.dispose(&mut host.surface, &mut host.listeners, CloseReason::Toggled);
            self.last_closed = disposal.reason();
            return ToggleOutcome::Closed(disposal);
        }
        let Some(model) = &self.model else {
            debug!("floating chat toggled without an input model");
            return ToggleOutcome::Unavailable;
        };

        let attachment = match (request.kind, request.target) {
            (Some(kind), Some(target)) => derive_attachment(tracker, kind, target, &host.surface),
            _ => None,
        };
        let mut options = PanelOptions::new(Rc::clone(model)).with_config(self.config.clone());
        if let Some(position) = request.position {
            options = options.with_position(position);
        }
        if let Some(attachment) = attachment {
            options = options.with_attachment(attachment);
        }

        self.next_id += 1;
        let mut panel = FloatingPanel::new(OwnerId::new(self.next_id), options);
        match panel.attach(&mut host.surface, &mut host.listeners) {
            Ok(()) => {
                let id = panel.id();
                self.panel = Some(panel);
                ToggleOutcome::Opened(id)
            }
            Err(err) => {
                warn!(%err, "floating chat could not be opened");
                self.last_closed = panel.closed_by();
                ToggleOutcome::Failed(err)
            }
        }
    }

    /// Close the open panel, if any.
    pub fn close<S: DisplaySurface>(
        &mut self,
        host: &mut Host<S>,
        reason: CloseReason,
    ) -> Option<Disposal> {
        let mut panel = self.panel.take()?;
        let disposal = panel.dispose(&mut host.surface, &mut host.listeners, reason);
        self.last_closed = panel.closed_by();
        Some(disposal)
    }

    /// Route a pointer event. Returns whether the panel consumed it.
    pub fn handle_pointer<S: DisplaySurface>(
        &mut self,
        host: &mut Host<S>,
        event: &PointerEvent,
    ) -> bool {
        if event.is_context_menu() {
            self.record_context_menu(event);
        }
        let Some(panel) = self.panel.as_mut() else {
            return false;
        };
        let consumed = panel.dispatch_pointer(host, event);
        self.reap();
        consumed
    }

    pub fn handle_key<S: DisplaySurface>(&mut self, host: &mut Host<S>, key: &KeyEvent) -> bool {
        let Some(panel) = self.panel.as_mut() else {
            return false;
        };
        let consumed = panel.handle_key(&mut host.surface, &mut host.listeners, key);
        self.reap();
        consumed
    }

    pub fn on_viewport_resized<S: DisplaySurface>(&mut self, host: &mut Host<S>) {
        if let Some(panel) = self.panel.as_mut() {
            panel.on_viewport_resized(&mut host.surface);
        }
    }

    /// Forget a panel that closed itself.
    fn reap(&mut self) {
        if let Some(panel) = self.panel.as_ref()
            && panel.is_disposed()
        {
            self.last_closed = panel.closed_by();
            info!(
                panel = panel.id().raw(),
                reason = self.last_closed.map(CloseReason::as_str),
                "floating chat released"
            );
            self.panel = None;
        }
    }

    pub fn render(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface) {
        if let Some(panel) = &self.panel {
            panel.render(frame, surface);
        }
    }

    pub fn render_overlays(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface) {
        if let Some(panel) = &self.panel {
            panel.render_overlays(frame, surface);
        }
    }
}
