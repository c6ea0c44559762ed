//! Retained node tree laid over the terminal viewport.
//!
//! Every element that can be the target of a pointer event is a node. Node
//! rectangles are stored relative to their parent, so moving a node moves
//! its whole subtree. Top-level nodes carry a stacking layer; within a
//! parent, later children paint (and hit test) above earlier ones.
//!
//! The floating panel only talks to the tree through [`SurfaceQuery`] and
//! [`DisplaySurface`], which keeps its outside-click and ownership logic
//! independent of how the surface is actually stored.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SurfaceError;
use crate::geometry::{FloatRect, Position, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Class-like tags attached to nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    Notebook,
    Cell,
    Panel,
    PanelHeader,
    CloseControl,
    PanelBody,
    ChatInput,
    Toolbar,
    Button,
    MenuItem,
    // Transient pop-ups rendered outside the subtree that owns them.
    Portal,
    Popper,
    Popover,
    Tooltip,
    Dialog,
    Presentation,
}

impl Marker {
    /// Markers used by this crate's pop-up affordances.
    pub const AUXILIARY: &'static [Marker] = &[
        Marker::Portal,
        Marker::Popper,
        Marker::Popover,
        Marker::Tooltip,
        Marker::Dialog,
        Marker::Presentation,
    ];

    pub fn is_auxiliary(self) -> bool {
        Self::AUXILIARY.contains(&self)
    }
}

/// Read-only structural queries over a display surface.
pub trait SurfaceQuery {
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is still reachable from the surface root.
    fn is_attached(&self, node: NodeId) -> bool;

    fn has_marker(&self, node: NodeId, marker: Marker) -> bool;

    /// Inclusive: a node is a descendant of itself.
    fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Deepest node that is an inclusive ancestor of both `a` and `b`.
    fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut current = Some(a);
        while let Some(id) = current {
            if self.is_descendant_of(b, id) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Nearest inclusive ancestor carrying `marker`.
    fn closest(&self, node: NodeId, marker: Marker) -> Option<NodeId> {
        self.closest_any(node, &[marker])
    }

    fn closest_any(&self, node: NodeId, markers: &[Marker]) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if markers.iter().any(|m| self.has_marker(id, *m)) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }
}

/// Mutable surface operations the panel needs to mount itself.
pub trait DisplaySurface: SurfaceQuery {
    fn root(&self) -> NodeId;

    fn viewport(&self) -> Size;

    fn create_node(&mut self, markers: &[Marker]) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError>;

    /// Detach `node` and drop its subtree.
    fn remove(&mut self, node: NodeId) -> Result<(), SurfaceError>;

    /// Rectangle relative to the parent.
    fn local_rect(&self, node: NodeId) -> Option<FloatRect>;

    fn set_local_rect(&mut self, node: NodeId, rect: FloatRect) -> Result<(), SurfaceError>;

    /// Rectangle in viewport coordinates.
    fn bounding_rect(&self, node: NodeId) -> Option<FloatRect>;

    fn set_layer(&mut self, node: NodeId, layer: u16) -> Result<(), SurfaceError>;

    fn attr(&self, node: NodeId, key: &str) -> Option<&str>;

    fn set_attr(&mut self, node: NodeId, key: &str, value: String) -> Result<(), SurfaceError>;

    fn insert_node(&mut self, parent: NodeId, markers: &[Marker]) -> Result<NodeId, SurfaceError> {
        let node = self.create_node(markers);
        self.append_child(parent, node)?;
        Ok(node)
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: FloatRect,
    markers: BTreeSet<Marker>,
    attrs: BTreeMap<String, String>,
    layer: u16,
}

impl Node {
    fn new(markers: &[Marker]) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            rect: FloatRect::default(),
            markers: markers.iter().copied().collect(),
            attrs: BTreeMap::new(),
            layer: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: BTreeMap<NodeId, Node>,
    root: NodeId,
    next_id: u32,
}

impl NodeTree {
    pub fn new(viewport: Size) -> Self {
        let root = NodeId(0);
        let mut node = Node::new(&[]);
        node.rect = FloatRect::new(Position::default(), viewport);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, node);
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    /// Resize the root to match the terminal.
    pub fn set_viewport(&mut self, viewport: Size) {
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.rect = FloatRect::new(Position::default(), viewport);
        }
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn layer(&self, node: NodeId) -> u16 {
        self.nodes.get(&node).map(|n| n.layer).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level children in paint order (lowest layer first).
    pub fn paint_order(&self) -> Vec<NodeId> {
        let mut top: Vec<(u16, usize, NodeId)> = self
            .children(self.root)
            .iter()
            .enumerate()
            .map(|(idx, id)| (self.layer(*id), idx, *id))
            .collect();
        top.sort();
        top.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Deepest, topmost attached node under the given cell.
    pub fn hit_test(&self, column: u16, row: u16) -> Option<NodeId> {
        for id in self.paint_order().into_iter().rev() {
            if let Some(hit) = self.hit_in(id, column, row) {
                return Some(hit);
            }
        }
        let root_rect = self.bounding_rect(self.root)?;
        root_rect.contains(column, row).then_some(self.root)
    }

    fn hit_in(&self, node: NodeId, column: u16, row: u16) -> Option<NodeId> {
        let entry = self.nodes.get(&node)?;
        for child in entry.children.iter().rev() {
            if let Some(hit) = self.hit_in(*child, column, row) {
                return Some(hit);
            }
        }
        let rect = self.bounding_rect(node)?;
        rect.contains(column, row).then_some(node)
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, SurfaceError> {
        self.nodes
            .get_mut(&node)
            .ok_or(SurfaceError::UnknownNode(node))
    }

    fn drop_subtree(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.remove(&node) else {
            return;
        };
        for child in entry.children {
            self.drop_subtree(child);
        }
    }
}

impl SurfaceQuery for NodeTree {
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        if !self.nodes.contains_key(&node) {
            return false;
        }
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn has_marker(&self, node: NodeId, marker: Marker) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.markers.contains(&marker))
    }
}

impl DisplaySurface for NodeTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn viewport(&self) -> Size {
        self.nodes
            .get(&self.root)
            .map(|n| n.rect.size())
            .unwrap_or_default()
    }

    fn create_node(&mut self, markers: &[Marker]) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.nodes.insert(id, Node::new(markers));
        id
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SurfaceError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SurfaceError::UnknownNode(parent));
        }
        if self.is_descendant_of(parent, child) {
            return Err(SurfaceError::Cycle(child));
        }
        let previous = self.node_mut(child)?.parent.replace(parent);
        if let Some(previous) = previous
            && let Some(old) = self.nodes.get_mut(&previous)
        {
            old.children.retain(|c| *c != child);
        }
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> Result<(), SurfaceError> {
        if node == self.root {
            return Err(SurfaceError::Root);
        }
        let parent = self
            .nodes
            .get(&node)
            .ok_or(SurfaceError::UnknownNode(node))?
            .parent;
        if let Some(parent) = parent
            && let Some(entry) = self.nodes.get_mut(&parent)
        {
            entry.children.retain(|c| *c != node);
        }
        self.drop_subtree(node);
        Ok(())
    }

    fn local_rect(&self, node: NodeId) -> Option<FloatRect> {
        self.nodes.get(&node).map(|n| n.rect)
    }

    fn set_local_rect(&mut self, node: NodeId, rect: FloatRect) -> Result<(), SurfaceError> {
        self.node_mut(node)?.rect = rect;
        Ok(())
    }

    fn bounding_rect(&self, node: NodeId) -> Option<FloatRect> {
        let mut rect = self.local_rect(node)?;
        let mut current = self.parent(node);
        while let Some(parent) = current {
            let origin = self.local_rect(parent)?.origin();
            rect.x = rect.x.saturating_add(origin.x);
            rect.y = rect.y.saturating_add(origin.y);
            current = self.parent(parent);
        }
        Some(rect)
    }

    fn set_layer(&mut self, node: NodeId, layer: u16) -> Result<(), SurfaceError> {
        self.node_mut(node)?.layer = layer;
        Ok(())
    }

    fn attr(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attrs.get(key))
            .map(String::as_str)
    }

    fn set_attr(&mut self, node: NodeId, key: &str, value: String) -> Result<(), SurfaceError> {
        self.node_mut(node)?.attrs.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, width: u16, height: u16) -> FloatRect {
        FloatRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn descendant_and_closest_walk_ancestors() {
        let mut tree = NodeTree::new(Size::new(80, 24));
        let root = tree.root();
        let panel = tree.insert_node(root, &[Marker::Panel]).unwrap();
        let header = tree.insert_node(panel, &[Marker::PanelHeader]).unwrap();
        let close = tree.insert_node(header, &[Marker::CloseControl]).unwrap();

        assert!(tree.is_descendant_of(close, panel));
        assert!(tree.is_descendant_of(panel, panel));
        assert!(!tree.is_descendant_of(panel, close));
        assert_eq!(tree.closest(close, Marker::Panel), Some(panel));
        assert_eq!(tree.closest(root, Marker::Panel), None);
    }

    #[test]
    fn removing_a_node_detaches_its_subtree() {
        let mut tree = NodeTree::new(Size::new(80, 24));
        let root = tree.root();
        let menu = tree.insert_node(root, &[Marker::Popover]).unwrap();
        let item = tree.insert_node(menu, &[Marker::MenuItem]).unwrap();
        assert!(tree.is_attached(item));

        tree.remove(menu).unwrap();
        assert!(!tree.is_attached(menu));
        assert!(!tree.is_attached(item));
        assert!(tree.children(root).is_empty());
        assert!(matches!(tree.remove(menu), Err(SurfaceError::UnknownNode(_))));
    }

    #[test]
    fn created_but_unmounted_node_is_not_attached() {
        let mut tree = NodeTree::new(Size::new(10, 10));
        let loose = tree.create_node(&[Marker::Tooltip]);
        assert!(!tree.is_attached(loose));
    }

    #[test]
    fn child_rects_follow_parent_origin() {
        let mut tree = NodeTree::new(Size::new(80, 24));
        let root = tree.root();
        let panel = tree.insert_node(root, &[Marker::Panel]).unwrap();
        tree.set_local_rect(panel, rect(10, 5, 20, 6)).unwrap();
        let header = tree.insert_node(panel, &[Marker::PanelHeader]).unwrap();
        tree.set_local_rect(header, rect(1, 1, 18, 1)).unwrap();

        assert_eq!(tree.bounding_rect(header), Some(rect(11, 6, 18, 1)));
        tree.set_local_rect(panel, rect(30, 2, 20, 6)).unwrap();
        assert_eq!(tree.bounding_rect(header), Some(rect(31, 3, 18, 1)));
    }

    #[test]
    fn hit_test_prefers_higher_layer_and_deeper_nodes() {
        let mut tree = NodeTree::new(Size::new(80, 24));
        let root = tree.root();
        let notebook = tree.insert_node(root, &[Marker::Notebook]).unwrap();
        tree.set_local_rect(notebook, rect(0, 0, 80, 24)).unwrap();
        let panel = tree.insert_node(root, &[Marker::Panel]).unwrap();
        tree.set_local_rect(panel, rect(10, 5, 20, 6)).unwrap();
        tree.set_layer(panel, 1000).unwrap();
        let header = tree.insert_node(panel, &[Marker::PanelHeader]).unwrap();
        tree.set_local_rect(header, rect(0, 0, 20, 1)).unwrap();

        // A later, lower-layer sibling must not cover the panel.
        let late = tree.insert_node(root, &[Marker::Cell]).unwrap();
        tree.set_local_rect(late, rect(0, 0, 80, 24)).unwrap();

        assert_eq!(tree.hit_test(12, 5), Some(header));
        assert_eq!(tree.hit_test(12, 7), Some(panel));
        assert_eq!(tree.hit_test(0, 0), Some(late));
        assert_eq!(tree.hit_test(200, 200), None);
    }

    #[test]
    fn common_ancestor_is_the_deepest_shared_node() {
        let mut tree = NodeTree::new(Size::new(80, 24));
        let root = tree.root();
        let panel = tree.insert_node(root, &[Marker::Panel]).unwrap();
        let header = tree.insert_node(panel, &[Marker::PanelHeader]).unwrap();
        let body = tree.insert_node(panel, &[]).unwrap();
        let notebook = tree.insert_node(root, &[Marker::Notebook]).unwrap();

        assert_eq!(tree.common_ancestor(header, body), Some(panel));
        assert_eq!(tree.common_ancestor(header, panel), Some(panel));
        assert_eq!(tree.common_ancestor(body, body), Some(body));
        assert_eq!(tree.common_ancestor(notebook, header), Some(root));

        tree.remove(body).unwrap();
        assert_eq!(tree.common_ancestor(body, header), None);
    }

    #[test]
    fn append_rejects_cycles() {
        let mut tree = NodeTree::new(Size::new(10, 10));
        let root = tree.root();
        let a = tree.insert_node(root, &[]).unwrap();
        let b = tree.insert_node(a, &[]).unwrap();
        assert!(matches!(tree.append_child(b, a), Err(SurfaceError::Cycle(_))));
    }
}
