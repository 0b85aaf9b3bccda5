use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::coords::{HexCoord, hex_region};
use crate::game::rules::CITADEL_MAX_HEALTH;
use crate::types::TileKind;

/// One cell of the board. Field names follow the shared document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    #[serde(flatten)]
    pub coord: HexCoord,
    pub owner: Option<usize>,
    #[serde(rename = "type")]
    pub kind: TileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warp_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turret_count: Option<u8>,
}

impl Tile {
    pub fn plain(coord: HexCoord) -> Self {
        Self {
            coord,
            owner: None,
            kind: TileKind::Plain,
            warp_id: None,
            health: None,
            turret_count: None,
        }
    }

    /// Seeded home tile: full health, no turrets.
    pub fn citadel(coord: HexCoord, owner: usize) -> Self {
        Self {
            coord,
            owner: Some(owner),
            kind: TileKind::Citadel,
            warp_id: None,
            health: Some(CITADEL_MAX_HEALTH),
            turret_count: Some(0),
        }
    }

    /// Health and turret count are meaningful only on citadels; clear them
    /// whenever the kind changes away from citadel.
    pub fn set_kind(&mut self, kind: TileKind) {
        self.kind = kind;
        if kind != TileKind::Citadel {
            self.health = None;
            self.turret_count = None;
        }
    }
}

/// Special tiles overlaid on a freshly generated grid: the central bank and
/// three linked warp pairs at ring 8. Coordinates outside the generated
/// region are skipped silently.
static INITIAL_SPECIALS: Lazy<Vec<(HexCoord, TileKind, Option<u8>)>> = Lazy::new(|| {
    vec![
        (HexCoord::new(0, 0), TileKind::Bank, None),
        (HexCoord::new(0, -8), TileKind::Warp, Some(1)),
        (HexCoord::new(0, 8), TileKind::Warp, Some(1)),
        (HexCoord::new(8, -8), TileKind::Warp, Some(2)),
        (HexCoord::new(-8, 8), TileKind::Warp, Some(2)),
        (HexCoord::new(8, 0), TileKind::Warp, Some(3)),
        (HexCoord::new(-8, 0), TileKind::Warp, Some(3)),
    ]
});

/// Home-citadel coordinates for participant index 0..=5: the corners of the
/// outermost ring.
pub fn starting_positions(radius: i32) -> [HexCoord; 6] {
    [
        HexCoord::new(0, -radius),
        HexCoord::new(radius, -radius),
        HexCoord::new(radius, 0),
        HexCoord::new(0, radius),
        HexCoord::new(-radius, radius),
        HexCoord::new(-radius, 0),
    ]
}

/// The full board, keyed by coordinate. Fixed size after generation; tiles
/// are mutated in place, never added or removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    tiles: HashMap<HexCoord, Tile>,
}

impl Grid {
    /// Deterministic: every coordinate within `radius` as an unowned plain
    /// tile, then the fixed special overlay.
    pub fn generate(radius: i32) -> Self {
        let mut tiles: HashMap<HexCoord, Tile> = hex_region(radius)
            .into_iter()
            .map(|coord| (coord, Tile::plain(coord)))
            .collect();

        for &(coord, kind, warp_id) in INITIAL_SPECIALS.iter() {
            if let Some(tile) = tiles.get_mut(&coord) {
                tile.kind = kind;
                tile.warp_id = warp_id;
            }
        }

        Self { tiles }
    }

    pub fn from_tiles(tiles: HashMap<HexCoord, Tile>) -> Self {
        Self { tiles }
    }

    pub fn get(&self, coord: HexCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn get_mut(&mut self, coord: HexCoord) -> Option<&mut Tile> {
        self.tiles.get_mut(&coord)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HexCoord, &Tile)> {
        self.tiles.iter()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.values_mut()
    }

    pub fn owned_by(&self, team: usize) -> impl Iterator<Item = &Tile> {
        self.tiles.values().filter(move |t| t.owner == Some(team))
    }
}

/// Capture reachability for one participant: every neighbor of a source tile
/// that the participant does not own. Sources are the owned tiles plus every
/// warp tile sharing a warp id with an owned warp. Recomputed fresh on each
/// state change; O(owned x 6) on a bounded grid.
pub fn reachable_capture_targets(team: usize, grid: &Grid) -> HashSet<HexCoord> {
    let owned: Vec<&Tile> = grid.owned_by(team).collect();

    let mut sources: Vec<HexCoord> = owned.iter().map(|t| t.coord).collect();
    for tile in &owned {
        if tile.kind != TileKind::Warp {
            continue;
        }
        let Some(warp_id) = tile.warp_id else { continue };
        for other in grid.tiles() {
            if other.kind == TileKind::Warp
                && other.warp_id == Some(warp_id)
                && other.coord != tile.coord
            {
                sources.push(other.coord);
            }
        }
    }

    let mut targets = HashSet::new();
    for source in sources {
        for neighbor in source.neighbors() {
            if let Some(tile) = grid.get(neighbor) {
                if tile.owner != Some(team) {
                    targets.insert(neighbor);
                }
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_places_bank_at_center() {
        let grid = Grid::generate(2);
        assert_eq!(grid.len(), 19);
        assert_eq!(grid.get(HexCoord::new(0, 0)).unwrap().kind, TileKind::Bank);
    }

    #[test]
    fn out_of_range_specials_are_skipped() {
        // Warp ring sits at radius 8; a radius-2 board has only the bank.
        let grid = Grid::generate(2);
        assert!(grid.tiles().all(|t| t.kind != TileKind::Warp));
    }

    #[test]
    fn full_board_has_three_warp_pairs() {
        let grid = Grid::generate(13);
        let warps: Vec<_> = grid.tiles().filter(|t| t.kind == TileKind::Warp).collect();
        assert_eq!(warps.len(), 6);
        for id in 1..=3u8 {
            assert_eq!(warps.iter().filter(|t| t.warp_id == Some(id)).count(), 2);
        }
    }

    #[test]
    fn reachable_targets_exclude_own_tiles() {
        let mut grid = Grid::generate(2);
        let center = HexCoord::new(0, 0);
        grid.get_mut(center).unwrap().owner = Some(0);
        grid.get_mut(HexCoord::new(1, 0)).unwrap().owner = Some(0);

        let targets = reachable_capture_targets(0, &grid);
        assert!(!targets.contains(&center));
        assert!(!targets.contains(&HexCoord::new(1, 0)));
        assert!(targets.contains(&HexCoord::new(0, 1)));
        assert!(targets.contains(&HexCoord::new(2, -1)));
    }

    #[test]
    fn owned_warp_extends_reach_to_its_pair() {
        let mut grid = Grid::generate(2);
        let near = HexCoord::new(2, -2);
        let far = HexCoord::new(-2, 2);
        for (coord, id) in [(near, 9u8), (far, 9u8)] {
            let tile = grid.get_mut(coord).unwrap();
            tile.kind = TileKind::Warp;
            tile.warp_id = Some(id);
        }
        grid.get_mut(near).unwrap().owner = Some(1);

        let targets = reachable_capture_targets(1, &grid);
        // Unowned pair itself is adjacent to nothing owned, yet its
        // neighbors are reachable through the link.
        assert!(targets.contains(&HexCoord::new(-1, 2)));
        assert!(targets.contains(&HexCoord::new(-2, 1)));
    }

    #[test]
    fn set_kind_clears_citadel_fields() {
        let mut tile = Tile::citadel(HexCoord::new(0, -2), 3);
        assert_eq!(tile.health, Some(CITADEL_MAX_HEALTH));
        tile.set_kind(TileKind::Plain);
        assert_eq!(tile.health, None);
        assert_eq!(tile.turret_count, None);
    }
}
