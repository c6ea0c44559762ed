use ratatui::style::{Color, Modifier, Style};

// Centralized theme colors for the notebook surface and the floating panel.

pub const ACCENT_RGB: (u8, u8, u8) = (200, 100, 0);

pub fn accent() -> Color {
    Color::Rgb(ACCENT_RGB.0, ACCENT_RGB.1, ACCENT_RGB.2)
}

// Panel
pub fn panel_bg() -> Color {
    Color::Black
}
pub fn panel_fg() -> Color {
    Color::White
}
pub fn panel_border() -> Color {
    Color::Gray
}
pub fn header_bg() -> Color {
    Color::Blue
}
pub fn header_fg() -> Color {
    Color::White
}
pub fn header_grabbing_bg() -> Color {
    Color::LightBlue
}

pub fn header_style(grabbing: bool) -> Style {
    let bg = if grabbing {
        header_grabbing_bg()
    } else {
        header_bg()
    };
    Style::default()
        .bg(bg)
        .fg(header_fg())
        .add_modifier(Modifier::BOLD)
}

// Input
pub fn placeholder_fg() -> Color {
    Color::DarkGray
}
pub fn chip_fg() -> Color {
    Color::Cyan
}
pub fn button_style() -> Style {
    Style::default().fg(Color::Black).bg(accent())
}
pub fn cursor_style() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

// Menus and tooltips
pub fn menu_bg() -> Color {
    Color::DarkGray
}
pub fn menu_fg() -> Color {
    Color::White
}
pub fn menu_selected_bg() -> Color {
    Color::Gray
}
pub fn menu_selected_fg() -> Color {
    Color::Black
}
pub fn tooltip_style() -> Style {
    Style::default().bg(Color::Yellow).fg(Color::Black)
}

// Notebook
pub fn cell_border(selected: bool) -> Color {
    if selected { accent() } else { Color::DarkGray }
}
pub fn cell_label_fg() -> Color {
    Color::Gray
}
pub fn status_style() -> Style {
    Style::default().bg(Color::DarkGray).fg(Color::White)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grabbing_header_differs_from_idle() {
        assert_ne!(header_style(true), header_style(false));
    }

    #[test]
    fn accent_is_rgb() {
        assert!(matches!(accent(), Color::Rgb(200, 100, 0)));
    }
}
