use crossterm::event::{Event, KeyEvent};
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Text;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::error::SurfaceError;
use crate::geometry::{FloatRect, Position, Size};
use crate::keybindings::{Action, KeyBindings};
use crate::notebook::{CELL_INDEX_ATTR, Notebook};
use crate::surface::{DisplaySurface, Marker, NodeId};
use crate::theme;
use crate::ui::UiFrame;

use super::{Component, ComponentContext};

/// Rows of source shown per cell before it is cut off.
const MAX_SOURCE_ROWS: u16 = 8;
const EMPTY_LABEL: &str = "(no cells)";

/// The notebook drawn as a column of bordered cells.
///
/// Each cell is a node tagged [`Marker::Cell`] carrying its index in
/// [`CELL_INDEX_ATTR`], under a single [`Marker::Notebook`] node.
#[derive(Debug, Default)]
pub struct NotebookViewComponent {
    root: Option<NodeId>,
    cells: Vec<NodeId>,
    /// Unscrolled top of each cell, relative to the notebook area.
    tops: Vec<u16>,
    heights: Vec<u16>,
    selected: usize,
    scroll: u16,
    area: Rect,
    bindings: KeyBindings,
}

impl NotebookViewComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notebook_node(&self) -> Option<NodeId> {
        self.root
    }

    pub fn cell_node(&self, index: usize) -> Option<NodeId> {
        self.cells.get(index).copied()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn mount(
        &mut self,
        surface: &mut dyn DisplaySurface,
        notebook: &Notebook,
    ) -> Result<(), SurfaceError> {
        self.unmount(surface)?;
        let surface_root = surface.root();
        let root = surface.insert_node(surface_root, &[Marker::Notebook])?;
        surface.set_attr(root, "data-path", notebook.path().display().to_string())?;
        self.root = Some(root);
        for (index, cell) in notebook.cells().iter().enumerate() {
            let node = surface.insert_node(root, &[Marker::Cell])?;
            surface.set_attr(node, CELL_INDEX_ATTR, index.to_string())?;
            surface.set_attr(node, "data-cell-id", cell.id.clone())?;
            self.cells.push(node);
        }
        self.heights = notebook.cells().iter().map(cell_height).collect();
        self.selected = 0;
        self.scroll = 0;
        Ok(())
    }

    pub fn unmount(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SurfaceError> {
        self.cells.clear();
        self.tops.clear();
        self.heights.clear();
        match self.root.take() {
            Some(root) => surface.remove(root),
            None => Ok(()),
        }
    }

    /// Lay the cells out inside `area`, scrolled so the selection is visible.
    pub fn layout(&mut self, surface: &mut dyn DisplaySurface, area: Rect) -> Result<(), SurfaceError> {
        let Some(root) = self.root else {
            return Ok(());
        };
        self.area = area;
        surface.set_local_rect(root, FloatRect::from(area))?;

        let mut top = 0u16;
        self.tops = self
            .heights
            .iter()
            .map(|h| {
                let this = top;
                top = top.saturating_add(*h);
                this
            })
            .collect();
        self.scroll_to_selected();

        for (index, node) in self.cells.iter().enumerate() {
            surface.set_local_rect(*node, self.visible_rect(index))?;
        }
        Ok(())
    }

    fn scroll_to_selected(&mut self) {
        let (Some(top), Some(height)) = (
            self.tops.get(self.selected).copied(),
            self.heights.get(self.selected).copied(),
        ) else {
            self.scroll = 0;
            return;
        };
        if top < self.scroll {
            self.scroll = top;
        } else if top + height > self.scroll + self.area.height {
            self.scroll = (top + height).saturating_sub(self.area.height);
        }
    }

    /// Cell rect relative to the notebook node, clipped to the visible rows.
    /// Cells scrolled out of view get an empty rect so they are never hit.
    fn visible_rect(&self, index: usize) -> FloatRect {
        let top = i32::from(self.tops[index]) - i32::from(self.scroll);
        let bottom = top + i32::from(self.heights[index]);
        let clipped_top = top.max(0);
        let clipped_bottom = bottom.min(i32::from(self.area.height));
        let height = (clipped_bottom - clipped_top).max(0) as u16;
        FloatRect::new(
            Position::new(0, clipped_top),
            Size::new(self.area.width, height),
        )
    }

    pub fn select(&mut self, index: usize) {
        if index < self.cells.len() {
            self.selected = index;
        }
    }

    pub fn select_next(&mut self) {
        self.select(self.selected + 1);
    }

    pub fn select_prev(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    /// Index of the cell containing `target`, if any.
    pub fn cell_index_of(&self, surface: &dyn DisplaySurface, target: NodeId) -> Option<usize> {
        let node = surface.closest(target, Marker::Cell)?;
        self.cells.iter().position(|c| *c == node)
    }

    /// Keyboard selection. Returns whether the key was used.
    pub fn on_key(&mut self, key: &KeyEvent) -> bool {
        match self
            .bindings
            .first_match(&[Action::SelectPrevCell, Action::SelectNextCell], key)
        {
            Some(Action::SelectPrevCell) => self.select_prev(),
            Some(Action::SelectNextCell) => self.select_next(),
            _ => return false,
        }
        true
    }

    pub fn render(&self, frame: &mut UiFrame<'_>, surface: &dyn DisplaySurface, notebook: &Notebook) {
        for (index, cell) in notebook.cells().iter().enumerate() {
            let Some(rect) = self.cell_node(index).and_then(|n| surface.bounding_rect(n)) else {
                continue;
            };
            let Some(area) = frame.visible(rect) else {
                continue;
            };
            let selected = index == self.selected;
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::cell_border(selected)))
                .title(format!(" [{}] {} ", cell.kind, cell.id))
                .title_style(Style::default().fg(theme::cell_label_fg()));
            frame.render_widget(Paragraph::new(Text::raw(cell.source.as_str())).block(block), area);
        }
    }
}

impl Component for NotebookViewComponent {
    fn resize(&mut self, area: Rect, _ctx: &ComponentContext) {
        self.area = area;
    }

    /// Placeholder for a notebook without cells. Cells themselves need the
    /// surface and are drawn by [`NotebookViewComponent::render`].
    fn render(&mut self, frame: &mut UiFrame<'_>, area: Rect, _ctx: &ComponentContext) {
        if self.cells.is_empty() && area.height > 0 {
            let style = Style::default().fg(theme::placeholder_fg());
            frame.set_string_signed(i32::from(area.x) + 1, i32::from(area.y), EMPTY_LABEL, style);
        }
    }

    fn handle_event(&mut self, event: &Event, ctx: &ComponentContext) -> bool {
        match event {
            Event::Key(key) if ctx.focused() => self.on_key(key),
            _ => false,
        }
    }
}

fn cell_height(cell: &crate::notebook::NotebookCell) -> u16 {
    let rows = cell.source.lines().count().max(1) as u16;
    rows.min(MAX_SOURCE_ROWS) + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Notebook;
    use crate::surface::{NodeTree, SurfaceQuery};
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::buffer::Buffer;

    fn mounted(height: u16) -> (NodeTree, NotebookViewComponent, Notebook) {
        let notebook = Notebook::sample();
        let mut tree = NodeTree::new(Size::new(60, height));
        let mut view = NotebookViewComponent::new();
        view.mount(&mut tree, &notebook).unwrap();
        view.layout(&mut tree, Rect::new(0, 0, 60, height)).unwrap();
        (tree, view, notebook)
    }

    #[test]
    fn cells_carry_their_index() {
        let (tree, view, notebook) = mounted(40);
        assert_eq!(view.cells.len(), notebook.len());
        let second = view.cell_node(1).unwrap();
        assert_eq!(tree.attr(second, CELL_INDEX_ATTR), Some("1"));
        assert!(tree.has_marker(second, Marker::Cell));
        assert_eq!(tree.parent(second), view.notebook_node());
    }

    #[test]
    fn cells_stack_vertically_and_hit_test() {
        let (tree, view, _) = mounted(40);
        // Markdown cell: two rows of text plus borders.
        let first = tree.bounding_rect(view.cell_node(0).unwrap()).unwrap();
        assert_eq!((first.y, first.height), (0, 4));
        let second = tree.bounding_rect(view.cell_node(1).unwrap()).unwrap();
        assert_eq!(second.y, 4);
        let hit = tree.hit_test(3, 5).unwrap();
        assert_eq!(view.cell_index_of(&tree, hit), Some(1));
    }

    #[test]
    fn selection_scrolls_into_view() {
        let (mut tree, mut view, _) = mounted(8);
        for _ in 0..4 {
            let down = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
            assert!(view.on_key(&down));
        }
        assert_eq!(view.selected(), 4);
        view.layout(&mut tree, Rect::new(0, 0, 60, 8)).unwrap();
        assert!(view.scroll() > 0);
        let last = tree.bounding_rect(view.cell_node(4).unwrap()).unwrap();
        assert!(last.y >= 0 && last.y + last.height as i32 <= 8);
        // The first cell is out of view and cannot be hit.
        let first = tree.bounding_rect(view.cell_node(0).unwrap()).unwrap();
        assert_eq!(first.height, 0);
    }

    #[test]
    fn selection_is_clamped() {
        let (_, mut view, _) = mounted(40);
        view.select_prev();
        assert_eq!(view.selected(), 0);
        view.select(99);
        assert_eq!(view.selected(), 0);
    }

    #[test]
    fn unmount_removes_nodes() {
        let (mut tree, mut view, _) = mounted(40);
        let root = view.notebook_node().unwrap();
        view.unmount(&mut tree).unwrap();
        assert!(!tree.is_attached(root));
        assert!(view.cell_node(0).is_none());
    }

    #[test]
    fn empty_view_renders_placeholder() {
        let mut view = NotebookViewComponent::new();
        let area = Rect::new(0, 0, 20, 2);
        let mut buffer = Buffer::empty(area);
        let mut frame = UiFrame::from_parts(area, &mut buffer);
        Component::render(&mut view, &mut frame, area, &ComponentContext::default());
        assert_eq!(buffer[(1, 0)].symbol(), "(");
    }

    #[test]
    fn render_draws_titles_and_source() {
        let (tree, view, notebook) = mounted(20);
        let area = Rect::new(0, 0, 60, 20);
        let mut buffer = Buffer::empty(area);
        let mut frame = UiFrame::from_parts(area, &mut buffer);
        view.render(&mut frame, &tree, &notebook);
        let row = |y: u16| {
            (0..60)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect::<String>()
        };
        assert!(row(0).contains("[markdown] cell-1"));
        assert!(row(1).contains("# Exploring sales data"));
    }
}
