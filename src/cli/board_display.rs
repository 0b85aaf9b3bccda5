//! Terminal rendering of the hex board. Pointy-top axial layout: a tile at
//! (q, r) lands in text column `2q + r + 2R`, so neighbors sit one blank
//! column apart and each row shifts half a cell.

use std::collections::HashSet;

use itertools::Itertools;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::board::Grid;
use crate::coords::HexCoord;
use crate::game::players::Participant;
use crate::types::TileKind;

pub fn tile_glyph(kind: TileKind) -> char {
    match kind {
        TileKind::Plain => '.',
        TileKind::Bank => 'B',
        TileKind::Warp => 'W',
        TileKind::Wall => '#',
        TileKind::Turret => 'T',
        TileKind::Mine => 'M',
        TileKind::Citadel => 'C',
    }
}

/// `"#rrggbb"` roster colors to terminal RGB; anything else renders white.
pub fn team_color(hex: &str) -> Color {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return Color::White;
    }
    match (
        u8::from_str_radix(&digits[0..2], 16),
        u8::from_str_radix(&digits[2..4], 16),
        u8::from_str_radix(&digits[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

pub fn render_board(
    grid: &Grid,
    roster: &[Participant],
    radius: i32,
    legal_moves: &HashSet<HexCoord>,
    cursor: HexCoord,
) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity((2 * radius + 1) as usize);
    for r in -radius..=radius {
        let q_lo = (-radius).max(-r - radius);
        let q_hi = radius.min(-r + radius);

        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut col = 0i32;
        for q in (q_lo..=q_hi).sorted() {
            let coord = HexCoord::new(q, r);
            let Some(tile) = grid.get(coord) else { continue };

            let target = 2 * q + r + 2 * radius;
            if target > col {
                spans.push(Span::raw(" ".repeat((target - col) as usize)));
            }
            col = target + 1;

            let mut style = match tile.owner {
                Some(team) => Style::default()
                    .fg(roster
                        .get(team)
                        .map_or(Color::White, |p| team_color(&p.color)))
                    .add_modifier(Modifier::BOLD),
                None => Style::default().fg(Color::DarkGray),
            };
            if legal_moves.contains(&coord) {
                style = style.bg(Color::Rgb(20, 80, 20));
            }
            if coord == cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(tile_glyph(tile.kind).to_string(), style));
        }
        lines.push(Line::from(spans));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roster_colors() {
        assert_eq!(team_color("#3b82f6"), Color::Rgb(0x3b, 0x82, 0xf6));
        assert_eq!(team_color("not-a-color"), Color::White);
    }

    #[test]
    fn renders_one_line_per_row() {
        let grid = Grid::generate(3);
        let lines = render_board(&grid, &[], 3, &HashSet::new(), HexCoord::new(0, 0));
        assert_eq!(lines.len(), 7);
    }
}
