use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use crate::geometry::Position;
use crate::surface::{NodeId, NodeTree, SurfaceQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down(MouseButton),
    Move,
    Up(MouseButton),
    /// Primary press and release; emitted after the matching `Up`.
    Click,
}

/// A mouse event resolved against the node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: Position,
    /// Node under the pointer when the event was produced. It may have been
    /// removed from the surface by the time a listener sees the event.
    pub target: Option<NodeId>,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, position: Position, target: Option<NodeId>) -> Self {
        Self {
            kind,
            position,
            target,
        }
    }

    pub fn is_primary_down(&self) -> bool {
        matches!(self.kind, PointerKind::Down(MouseButton::Left))
    }

    pub fn is_context_menu(&self) -> bool {
        matches!(self.kind, PointerKind::Down(MouseButton::Right))
    }
}

/// Turns raw press/release pairs into clicks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClickTracker {
    /// Hit-test result of the outstanding primary press.
    pressed_on: Option<Option<NodeId>>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a terminal mouse event. A primary release that follows a
    /// primary press yields an `Up` followed by a `Click`. The click targets
    /// the deepest node containing both the press and the release targets,
    /// and has no target when either of them fell outside the surface.
    pub fn translate(&mut self, mouse: &MouseEvent, tree: &NodeTree) -> Vec<PointerEvent> {
        let position = Position::from((mouse.column, mouse.row));
        let target = tree.hit_test(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(button) => {
                if button == MouseButton::Left {
                    self.pressed_on = Some(target);
                }
                vec![PointerEvent::new(PointerKind::Down(button), position, target)]
            }
            MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                vec![PointerEvent::new(PointerKind::Move, position, target)]
            }
            MouseEventKind::Up(button) => {
                let mut events = vec![PointerEvent::new(PointerKind::Up(button), position, target)];
                if button == MouseButton::Left
                    && let Some(pressed_on) = self.pressed_on.take()
                {
                    let click_target = pressed_on
                        .zip(target)
                        .and_then(|(press, release)| tree.common_ancestor(press, release));
                    events.push(PointerEvent::new(PointerKind::Click, position, click_target));
                }
                events
            }
            _ => Vec::new(),
        }
    }
}
