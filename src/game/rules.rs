//! Static economy table. Consulted everywhere, never mutated at runtime.

use crate::board::{Grid, Tile};
use crate::types::{BuildKind, TileKind};

/// AP cost of capturing an unowned tile.
pub const MOVE_COST_NEUTRAL: u32 = 5;
/// AP cost of capturing a tile held by another participant.
pub const MOVE_COST_ENEMY: u32 = 10;
/// Added on top of the base move cost when the target is a wall.
pub const WALL_SURCHARGE: u32 = 15;
/// Added to every roll outcome per owned bank tile. Banks stack.
pub const BANK_ROLL_BONUS: u32 = 5;
/// Flat cost per hit on an enemy citadel, wall surcharge does not apply.
pub const CITADEL_HIT_COST: u32 = 12;
pub const CITADEL_REPAIR_COST: u32 = 5;
pub const CITADEL_TURRET_COST: u32 = 30;

pub const CITADEL_MAX_HEALTH: u8 = 5;
pub const CITADEL_MAX_TURRETS: u8 = 3;

/// External currency charged before each roll.
pub const ROLL_COIN_COST: u32 = 1000;

/// Building converts an owned plain tile; fixed AP price per structure.
pub fn build_cost(kind: BuildKind) -> u32 {
    match kind {
        BuildKind::Wall => 20,
        BuildKind::Turret => 50,
        BuildKind::Mine => 15,
    }
}

/// AP cost for `team` to capture (or hit) `tile`. Citadel targets are a flat
/// hit cost regardless of wall surcharge.
pub fn capture_cost(tile: &Tile, team: usize) -> u32 {
    let enemy_held = tile.owner.is_some() && tile.owner != Some(team);
    if tile.kind == TileKind::Citadel && enemy_held {
        return CITADEL_HIT_COST;
    }
    let base = if tile.owner.is_none() {
        MOVE_COST_NEUTRAL
    } else {
        MOVE_COST_ENEMY
    };
    if tile.kind == TileKind::Wall {
        base + WALL_SURCHARGE
    } else {
        base
    }
}

/// Total roll bonus from every bank tile `team` owns.
pub fn bank_bonus(grid: &Grid, team: usize) -> u32 {
    grid.owned_by(team)
        .filter(|t| t.kind == TileKind::Bank)
        .count() as u32
        * BANK_ROLL_BONUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::HexCoord;

    fn tile(kind: TileKind, owner: Option<usize>) -> Tile {
        let mut t = Tile::plain(HexCoord::new(0, 0));
        t.kind = kind;
        t.owner = owner;
        t
    }

    #[test]
    fn neutral_is_cheaper_than_enemy() {
        assert!(
            capture_cost(&tile(TileKind::Plain, None), 0)
                < capture_cost(&tile(TileKind::Plain, Some(1)), 0)
        );
    }

    #[test]
    fn wall_surcharge_applies_to_both_neutral_and_enemy() {
        assert_eq!(
            capture_cost(&tile(TileKind::Wall, None), 0),
            MOVE_COST_NEUTRAL + WALL_SURCHARGE
        );
        assert_eq!(
            capture_cost(&tile(TileKind::Wall, Some(1)), 0),
            MOVE_COST_ENEMY + WALL_SURCHARGE
        );
    }

    #[test]
    fn citadel_hit_is_flat() {
        assert_eq!(
            capture_cost(&tile(TileKind::Citadel, Some(1)), 0),
            CITADEL_HIT_COST
        );
    }

    #[test]
    fn bank_bonuses_stack() {
        let mut grid = Grid::generate(2);
        grid.get_mut(HexCoord::new(0, 0)).unwrap().owner = Some(0);
        let second = grid.get_mut(HexCoord::new(1, 1)).unwrap();
        second.kind = TileKind::Bank;
        second.owner = Some(0);
        assert_eq!(bank_bonus(&grid, 0), 2 * BANK_ROLL_BONUS);
        assert_eq!(bank_bonus(&grid, 1), 0);
    }
}
