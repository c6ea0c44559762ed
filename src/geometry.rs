//! Viewport geometry for floating surfaces.
//!
//! Positions are signed so a proposed origin may sit left of or above the
//! viewport before it is constrained; sizes are unsigned terminal cells.

use ratatui::layout::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Difference `self - origin`, used as a pointer delta.
    pub fn delta_from(self, origin: Position) -> (i32, i32) {
        (
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
        )
    }
}

impl From<(u16, u16)> for Position {
    fn from((column, row): (u16, u16)) -> Self {
        Self::new(column as i32, row as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<Rect> for Size {
    fn from(rect: Rect) -> Self {
        Self::new(rect.width, rect.height)
    }
}

/// Signed floating rectangle origin with unsigned size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatRect {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl FloatRect {
    pub fn new(origin: Position, size: Size) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn origin(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let column = column as i32;
        let row = row as i32;
        column >= self.x
            && column < self.x + self.width as i32
            && row >= self.y
            && row < self.y + self.height as i32
    }

    /// The portion of this rectangle that lies inside `bounds`.
    pub fn visible_in(&self, bounds: Rect) -> Rect {
        let bounds_x0 = bounds.x as i32;
        let bounds_y0 = bounds.y as i32;
        let bounds_x1 = bounds_x0 + bounds.width as i32;
        let bounds_y1 = bounds_y0 + bounds.height as i32;
        let x0 = self.x.max(bounds_x0);
        let y0 = self.y.max(bounds_y0);
        let x1 = (self.x + self.width as i32).min(bounds_x1);
        let y1 = (self.y + self.height as i32).min(bounds_y1);
        if x1 <= x0 || y1 <= y0 {
            return Rect::default();
        }
        Rect {
            x: x0 as u16,
            y: y0 as u16,
            width: (x1 - x0) as u16,
            height: (y1 - y0) as u16,
        }
    }
}

impl From<Rect> for FloatRect {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x as i32,
            y: rect.y as i32,
            width: rect.width,
            height: rect.height,
        }
    }
}

pub fn rect_contains(rect: Rect, column: u16, row: u16) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    let max_x = rect.x.saturating_add(rect.width);
    let max_y = rect.y.saturating_add(rect.height);
    column >= rect.x && column < max_x && row >= rect.y && row < max_y
}

/// Clamp `proposed` so an element of size `element` stays inside `viewport`.
///
/// When the element is larger than the viewport along an axis the origin is
/// pinned to zero on that axis.
pub fn clamp_position(proposed: Position, element: Size, viewport: Size) -> Position {
    let max_x = (viewport.width as i32 - element.width as i32).max(0);
    let max_y = (viewport.height as i32 - element.height as i32).max(0);
    Position {
        x: proposed.x.clamp(0, max_x),
        y: proposed.y.clamp(0, max_y),
    }
}

/// Fixed distance from the bottom-right viewport corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerInset {
    pub right: u16,
    pub bottom: u16,
}

impl CornerInset {
    pub const fn new(right: u16, bottom: u16) -> Self {
        Self { right, bottom }
    }
}

/// How a floating element is placed in the viewport.
///
/// `Anchored` follows the bottom-right corner and is never clamped;
/// `Absolute` carries an origin that is clamped on every resolve. Once an
/// element is absolutely positioned it never goes back to anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Anchored(CornerInset),
    Absolute(Position),
}

impl Placement {
    pub fn resolve(&self, element: Size, viewport: Size) -> Position {
        match *self {
            Placement::Anchored(inset) => Position {
                x: viewport.width as i32 - inset.right as i32 - element.width as i32,
                y: viewport.height as i32 - inset.bottom as i32 - element.height as i32,
            },
            Placement::Absolute(origin) => clamp_position(origin, element, viewport),
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, Placement::Absolute(_))
    }
}
