//! Decides whether a document click lands outside the panel.
//!
//! Pop-ups opened by the panel's own input (menus, tooltips, dialogs) are
//! mounted at the surface root so they can stack above everything, which
//! means they are not descendants of the panel. Clicks on them are still
//! logically inside, so the detector also looks for an auxiliary-surface
//! marker on any ancestor of the target.

use crate::surface::{Marker, NodeId, SurfaceQuery};

/// Why a click was or was not considered outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickClass {
    PanelDisposed,
    /// Target missing or no longer mounted on the surface.
    StaleTarget,
    InsidePanel,
    AuxiliarySurface,
    Outside,
}

impl ClickClass {
    pub fn is_outside(self) -> bool {
        matches!(self, ClickClass::Outside)
    }
}

#[derive(Debug, Clone)]
pub struct OutsideClickDetector {
    auxiliary: Vec<Marker>,
}

impl Default for OutsideClickDetector {
    fn default() -> Self {
        Self::new(Marker::AUXILIARY.to_vec())
    }
}

impl OutsideClickDetector {
    pub fn new(auxiliary: Vec<Marker>) -> Self {
        Self { auxiliary }
    }

    pub fn auxiliary(&self) -> &[Marker] {
        &self.auxiliary
    }

    pub fn classify<Q: SurfaceQuery + ?Sized>(
        &self,
        surface: &Q,
        panel_root: NodeId,
        target: Option<NodeId>,
        disposed: bool,
    ) -> ClickClass {
        if disposed {
            return ClickClass::PanelDisposed;
        }
        let Some(target) = target else {
            return ClickClass::StaleTarget;
        };
        if !surface.is_attached(target) {
            return ClickClass::StaleTarget;
        }
        if surface.is_descendant_of(target, panel_root) {
            return ClickClass::InsidePanel;
        }
        if surface.closest_any(target, &self.auxiliary).is_some() {
            return ClickClass::AuxiliarySurface;
        }
        ClickClass::Outside
    }

    pub fn is_outside<Q: SurfaceQuery + ?Sized>(
        &self,
        surface: &Q,
        panel_root: NodeId,
        target: Option<NodeId>,
        disposed: bool,
    ) -> bool {
        self.classify(surface, panel_root, target, disposed)
            .is_outside()
    }
}
