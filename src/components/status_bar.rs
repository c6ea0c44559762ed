use ratatui::layout::Rect;
use ratatui::style::Style;

use crate::theme;
use crate::ui::UiFrame;

use super::{Component, ComponentContext};

/// One-row bar: a message on the left, key hints on the right. The hints
/// give way when both do not fit.
#[derive(Debug, Clone)]
pub struct StatusBarComponent {
    left: String,
    right: String,
    style: Style,
}

impl StatusBarComponent {
    pub fn new() -> Self {
        Self {
            left: String::new(),
            right: String::new(),
            style: theme::status_style(),
        }
    }

    pub fn set_left<T: Into<String>>(&mut self, value: T) {
        self.left = value.into();
    }

    pub fn set_right<T: Into<String>>(&mut self, value: T) {
        self.right = value.into();
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn left(&self) -> &str {
        &self.left
    }
}

impl Default for StatusBarComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for StatusBarComponent {
    fn render(&mut self, frame: &mut UiFrame<'_>, area: Rect, _ctx: &ComponentContext) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        frame.set_style(Rect { height: 1, ..area }, self.style);
        let width = usize::from(area.width);
        let (x, y) = (i32::from(area.x), i32::from(area.y));
        frame.set_string_within(x, y, &self.left, width, self.style);

        let left_width = self.left.chars().count().min(width);
        let right_width = self.right.chars().count();
        if right_width > 0 && left_width + 1 + right_width <= width {
            let start = x + (width - right_width) as i32;
            frame.set_string_within(start, y, &self.right, right_width, self.style);
        }
    }
}
