//! Palette-to-terminal mapping shared by the studio view and the
//! slide preview.

use edugen_common::Palette;
use edugen_core::markup::bold_runs;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Parse a palette hex color ("1E40AF") into a terminal color.
pub fn hex_color(hex: &str) -> Color {
    if hex.len() != 6 || !hex.is_ascii() {
        return Color::White;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).unwrap_or(0xFF)
    };
    Color::Rgb(channel(0..2), channel(2..4), channel(4..6))
}

/// Render one body line: bold spans take the highlight color.
pub fn body_line(text: &str, palette: &Palette) -> Line<'static> {
    let text_color = hex_color(palette.text);
    let highlight = hex_color(palette.highlight);
    let spans: Vec<Span<'static>> = bold_runs(text)
        .into_iter()
        .map(|run| {
            if run.bold {
                Span::styled(
                    run.text,
                    Style::default()
                        .fg(highlight)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled(run.text, Style::default().fg(text_color))
            }
        })
        .collect();
    Line::from(spans)
}

pub fn title_line(text: &str, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default()
            .fg(hex_color(palette.title))
            .add_modifier(Modifier::BOLD),
    ))
    .centered()
}
