//! Header drag state machine for the floating panel.
//!
//! `Idle -> Dragging -> Idle`. A drag starts on a primary press over the
//! drag handle, registers pointer-move and pointer-up listeners for its own
//! lifetime, and releases both when the pointer comes back up. While a
//! session exists the pointer is the only authority over the panel origin.

use tracing::debug;

use crate::geometry::{Position, Size, clamp_position};
use crate::listeners::{EventStream, ListenerId, ListenerRegistry, ListenerSet, OwnerId};
use crate::surface::{NodeId, SurfaceQuery};

/// Notifications for drag observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSignal {
    /// Zero delta; the panel has not moved yet.
    Start,
    Moved(Position),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    Grab,
    Grabbing,
}

/// Exists only between drag start and drag end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    /// Panel top-left when the drag started.
    pub anchor: Position,
    pub start_pointer: Position,
}

#[derive(Debug)]
pub struct DragController {
    owner: OwnerId,
    session: Option<DragSession>,
    listeners: ListenerSet,
}

impl DragController {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            session: None,
            listeners: ListenerSet::new(),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<DragSession> {
        self.session
    }

    pub fn cursor(&self) -> CursorStyle {
        if self.is_dragging() {
            CursorStyle::Grabbing
        } else {
            CursorStyle::Grab
        }
    }

    /// Whether `listener` is one of the move/up registrations of the active
    /// session.
    pub fn owns(&self, listener: ListenerId) -> bool {
        self.listeners.owns(listener)
    }

    /// Primary press on the drag handle.
    ///
    /// Returns `None` when the press landed inside one of `excluded` (for
    /// example the close control), in which case the event is left for
    /// others. `Some(DragSignal::Start)` means the event is consumed.
    pub fn pointer_down<Q: SurfaceQuery + ?Sized>(
        &mut self,
        surface: &Q,
        target: NodeId,
        excluded: &[NodeId],
        pointer: Position,
        origin: Position,
        registry: &mut ListenerRegistry,
    ) -> Option<DragSignal> {
        if excluded
            .iter()
            .any(|region| surface.is_descendant_of(target, *region))
        {
            return None;
        }
        if self.is_dragging() {
            // Missed release; drop the stale session before starting over.
            self.end(registry);
        }
        self.listeners
            .listen(registry, EventStream::PointerMove, self.owner);
        self.listeners
            .listen(registry, EventStream::PointerUp, self.owner);
        self.session = Some(DragSession {
            anchor: origin,
            start_pointer: pointer,
        });
        debug!(x = origin.x, y = origin.y, "drag start");
        Some(DragSignal::Start)
    }

    /// Constrained origin for the current pointer, or `None` when idle.
    pub fn pointer_move(
        &self,
        pointer: Position,
        element: Size,
        viewport: Size,
    ) -> Option<Position> {
        let session = self.session?;
        let (dx, dy) = pointer.delta_from(session.start_pointer);
        let proposed = session.anchor.offset(dx, dy);
        Some(clamp_position(proposed, element, viewport))
    }

    pub fn pointer_up(&mut self, registry: &mut ListenerRegistry) -> Option<DragSignal> {
        self.end(registry)
    }

    /// End the session (if any) and release its listeners.
    pub fn end(&mut self, registry: &mut ListenerRegistry) -> Option<DragSignal> {
        self.listeners.release_all(registry);
        self.session.take().map(|_| {
            debug!("drag end");
            DragSignal::End
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FloatRect;
    use crate::surface::{DisplaySurface, Marker, NodeTree};

    struct Fixture {
        tree: NodeTree,
        header: NodeId,
        close: NodeId,
        icon: NodeId,
    }

    fn fixture() -> Fixture {
        let mut tree = NodeTree::new(Size::new(100, 40));
        let root = tree.root();
        let panel = tree.insert_node(root, &[Marker::Panel]).unwrap();
        tree.set_local_rect(
            panel,
            FloatRect {
                x: 10,
                y: 10,
                width: 30,
                height: 8,
            },
        )
        .unwrap();
        let header = tree.insert_node(panel, &[Marker::PanelHeader]).unwrap();
        let close = tree.insert_node(header, &[Marker::CloseControl]).unwrap();
        let icon = tree.insert_node(close, &[]).unwrap();
        Fixture {
            tree,
            header,
            close,
            icon,
        }
    }

    #[test]
    fn press_inside_close_control_is_ignored() {
        let f = fixture();
        let mut registry = ListenerRegistry::new();
        let mut drag = DragController::new(OwnerId::new(1));
        // icon nested inside the close control
        let signal = drag.pointer_down(
            &f.tree,
            f.icon,
            &[f.close],
            Position::new(38, 11),
            Position::new(10, 10),
            &mut registry,
        );
        assert_eq!(signal, None);
        assert!(!drag.is_dragging());
        assert!(registry.is_empty());
    }

    #[test]
    fn drag_registers_and_releases_listeners() {
        let f = fixture();
        let mut registry = ListenerRegistry::new();
        let owner = OwnerId::new(7);
        let mut drag = DragController::new(owner);
        assert_eq!(drag.cursor(), CursorStyle::Grab);

        let signal = drag.pointer_down(
            &f.tree,
            f.header,
            &[f.close],
            Position::new(15, 11),
            Position::new(10, 10),
            &mut registry,
        );
        assert_eq!(signal, Some(DragSignal::Start));
        assert_eq!(drag.cursor(), CursorStyle::Grabbing);
        assert_eq!(registry.count_for(owner), 2);

        let moved = drag.pointer_move(Position::new(20, 14), Size::new(30, 8), Size::new(100, 40));
        assert_eq!(moved, Some(Position::new(15, 13)));

        assert_eq!(drag.pointer_up(&mut registry), Some(DragSignal::End));
        assert_eq!(registry.count_for(owner), 0);
        assert!(drag.session().is_none());
        assert_eq!(drag.pointer_up(&mut registry), None);
    }

    #[test]
    fn repeated_drags_do_not_leak_listeners() {
        let f = fixture();
        let mut registry = ListenerRegistry::new();
        let mut drag = DragController::new(OwnerId::new(1));
        for _ in 0..5 {
            drag.pointer_down(
                &f.tree,
                f.header,
                &[],
                Position::new(15, 11),
                Position::new(10, 10),
                &mut registry,
            );
            drag.pointer_up(&mut registry);
        }
        assert!(registry.is_empty());

        // a press without release followed by another press
        drag.pointer_down(
            &f.tree,
            f.header,
            &[],
            Position::new(15, 11),
            Position::new(10, 10),
            &mut registry,
        );
        drag.pointer_down(
            &f.tree,
            f.header,
            &[],
            Position::new(16, 11),
            Position::new(10, 10),
            &mut registry,
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn move_is_clamped_to_viewport() {
        let f = fixture();
        let mut registry = ListenerRegistry::new();
        let mut drag = DragController::new(OwnerId::new(1));
        drag.pointer_down(
            &f.tree,
            f.header,
            &[],
            Position::new(15, 11),
            Position::new(10, 10),
            &mut registry,
        );
        let element = Size::new(30, 8);
        let viewport = Size::new(100, 40);
        assert_eq!(
            drag.pointer_move(Position::new(-50, -50), element, viewport),
            Some(Position::new(0, 0))
        );
        assert_eq!(
            drag.pointer_move(Position::new(500, 500), element, viewport),
            Some(Position::new(70, 32))
        );
    }

    #[test]
    fn idle_move_produces_nothing() {
        let drag = DragController::new(OwnerId::new(1));
        assert_eq!(
            drag.pointer_move(Position::new(1, 1), Size::new(1, 1), Size::new(5, 5)),
            None
        );
    }
}
