//! Drawing target for floating surfaces.
//!
//! Panels, tooltips and menus carry signed origins and can hang past any
//! edge of the terminal. `ratatui::Buffer` panics on out-of-range writes, so
//! everything here is clipped to the frame area before it touches the buffer.
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::geometry::FloatRect;

pub struct UiFrame<'a> {
    area: Rect,
    buffer: &'a mut Buffer,
}

impl<'a> UiFrame<'a> {
    pub fn new(frame: &'a mut Frame<'_>) -> Self {
        let area = frame.area();
        Self {
            area,
            buffer: frame.buffer_mut(),
        }
    }

    /// Draw into a bare buffer, as tests do.
    pub fn from_parts(area: Rect, buffer: &'a mut Buffer) -> Self {
        // Never trust `area` beyond what the buffer really holds.
        let area = area.intersection(buffer.area);
        Self { area, buffer }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        self.buffer
    }

    fn clip(&self, rect: Rect) -> Option<Rect> {
        let clipped = rect.intersection(self.area);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Visible part of a signed rectangle, if any.
    pub fn visible(&self, rect: FloatRect) -> Option<Rect> {
        self.clip(rect.visible_in(self.area))
    }

    pub fn render_widget<W: Widget>(&mut self, widget: W, area: Rect) {
        if let Some(clipped) = self.clip(area) {
            widget.render(clipped, self.buffer);
        }
    }

    /// Write one row of `text` at a signed position. Characters left of the
    /// frame are skipped, characters right of it are dropped.
    pub fn set_string_signed(&mut self, x: i32, y: i32, text: &str, style: Style) {
        self.set_string_within(x, y, text, usize::MAX, style);
    }

    /// Like [`UiFrame::set_string_signed`], but never writes more than
    /// `max_width` characters counted from `x`.
    pub fn set_string_within(&mut self, x: i32, y: i32, text: &str, max_width: usize, style: Style) {
        let top = i32::from(self.area.y);
        let left = i32::from(self.area.x);
        let right = i32::from(self.area.right());
        if y < top || y >= i32::from(self.area.bottom()) || x >= right {
            return;
        }
        let skip = usize::try_from(left - x).unwrap_or(0);
        let start = x.max(left);
        let room = usize::try_from(right - start).unwrap_or(0);
        let visible: String = text
            .chars()
            .take(max_width)
            .skip(skip)
            .take(room)
            .collect();
        if visible.is_empty() {
            return;
        }
        // Both coordinates were range-checked against the u16 frame area.
        self.buffer
            .set_string(start as u16, y as u16, visible, style);
    }

    pub fn set_style(&mut self, area: Rect, style: Style) {
        if let Some(clipped) = self.clip(area) {
            self.buffer.set_style(clipped, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Color;
    use ratatui::widgets::Block;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.cell((x, y)).map_or(" ", |c| c.symbol()).to_string())
            .collect()
    }

    #[test]
    fn text_hanging_off_both_edges_is_clipped() {
        let area = Rect::new(0, 0, 6, 2);
        let mut buf = Buffer::empty(area);
        let mut ui = UiFrame::from_parts(area, &mut buf);
        ui.set_string_signed(-2, 1, "abcdefghij", Style::default());
        ui.set_string_signed(4, 0, "xyz", Style::default());
        // rows outside the frame and columns past the right edge are no-ops
        ui.set_string_signed(0, 5, "zzz", Style::default());
        ui.set_string_signed(9, 0, "zzz", Style::default());
        assert_eq!(row(&buf, 0), "    xy");
        assert_eq!(row(&buf, 1), "cdefgh");
    }

    #[test]
    fn width_limit_counts_from_the_requested_origin() {
        let area = Rect::new(0, 0, 8, 1);
        let mut buf = Buffer::empty(area);
        let mut ui = UiFrame::from_parts(area, &mut buf);
        ui.set_string_within(-1, 0, "abcdef", 4, Style::default());
        assert_eq!(row(&buf, 0), "bcd     ");
    }

    #[test]
    fn widgets_are_clipped_to_the_frame() {
        let area = Rect::new(0, 0, 5, 3);
        let mut buf = Buffer::empty(area);
        let mut ui = UiFrame::from_parts(area, &mut buf);
        ui.render_widget(
            Block::default().style(Style::default().bg(Color::Blue)),
            Rect::new(3, 1, 5, 2),
        );
        ui.render_widget(Block::default(), Rect::new(40, 40, 2, 2));
        assert_eq!(buf.cell((3, 1)).unwrap().bg, Color::Blue);
        assert_eq!(buf.cell((2, 1)).unwrap().bg, Color::Reset);
    }

    #[test]
    fn oversized_area_is_limited_to_the_buffer() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 4, 1));
        let mut ui = UiFrame::from_parts(Rect::new(0, 0, 50, 50), &mut buf);
        assert_eq!(ui.area(), Rect::new(0, 0, 4, 1));
        ui.set_string_signed(0, 30, "x", Style::default());
        ui.set_style(Rect::new(2, 0, 10, 10), Style::default().fg(Color::Red));
        assert_eq!(buf.cell((3, 0)).unwrap().fg, Color::Red);
    }

    #[test]
    fn visible_clips_signed_rects() {
        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        let ui = UiFrame::from_parts(area, &mut buf);
        let rect = FloatRect {
            x: -4,
            y: 3,
            width: 6,
            height: 4,
        };
        assert_eq!(ui.visible(rect), Some(Rect::new(0, 3, 2, 2)));
        let gone = FloatRect {
            x: -10,
            y: 0,
            width: 3,
            height: 3,
        };
        assert_eq!(ui.visible(gone), None);
    }
}
