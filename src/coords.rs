use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Axial hex coordinate. The (q, r) pair is the identity; the cube `s`
/// component is derived (q + r + s = 0) and never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

/// The six axial direction vectors, in the order the original board walks them.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

impl HexCoord {
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Derived cube component.
    pub fn s(self) -> i32 {
        -self.q - self.r
    }

    pub fn add(self, dq: i32, dr: i32) -> Self {
        Self::new(self.q + dq, self.r + dr)
    }

    /// The 6 adjacent coordinates. No bounds filtering; callers check grid
    /// membership themselves.
    pub fn neighbors(self) -> SmallVec<[HexCoord; 6]> {
        DIRECTIONS
            .iter()
            .map(|&(dq, dr)| self.add(dq, dr))
            .collect()
    }

    /// Document key, `"q,r"`.
    pub fn key(self) -> String {
        format!("{},{}", self.q, self.r)
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

impl FromStr for HexCoord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s
            .split_once(',')
            .ok_or_else(|| format!("malformed hex key: {s}"))?;
        let q = q
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad q in hex key {s}: {e}"))?;
        let r = r
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad r in hex key {s}: {e}"))?;
        Ok(HexCoord::new(q, r))
    }
}

/// Every coordinate of the hexagonal region with |q|, |r|, |q+r| <= radius.
pub fn hex_region(radius: i32) -> Vec<HexCoord> {
    let mut coords = Vec::new();
    for q in -radius..=radius {
        let r1 = (-radius).max(-q - radius);
        let r2 = radius.min(-q + radius);
        for r in r1..=r2 {
            coords.push(HexCoord::new(q, r));
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_components_sum_to_zero() {
        for coord in hex_region(4) {
            assert_eq!(coord.q + coord.r + coord.s(), 0);
        }
    }

    #[test]
    fn region_size_is_centered_hexagonal_number() {
        // 3r(r+1) + 1 tiles for radius r
        assert_eq!(hex_region(0).len(), 1);
        assert_eq!(hex_region(1).len(), 7);
        assert_eq!(hex_region(2).len(), 19);
        assert_eq!(hex_region(13).len(), 547);
    }

    #[test]
    fn key_round_trips() {
        let coord = HexCoord::new(-8, 13);
        assert_eq!(coord.key(), "-8,13");
        assert_eq!("-8,13".parse::<HexCoord>().unwrap(), coord);
    }

    #[test]
    fn neighbors_are_distinct_and_adjacent() {
        let center = HexCoord::new(2, -1);
        let neighbors = center.neighbors();
        assert_eq!(neighbors.len(), 6);
        for n in &neighbors {
            let dist = (n.q - center.q)
                .abs()
                .max((n.r - center.r).abs())
                .max((n.s() - center.s()).abs());
            assert_eq!(dist, 1);
        }
    }
}
