use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Tile taxonomy. Serialized names match the shared document format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileKind {
    Plain,
    Bank,
    Warp,
    Wall,
    Turret,
    Mine,
    Citadel,
}

/// Structures a participant can place on an owned plain tile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildKind {
    Wall,
    Turret,
    Mine,
}

impl BuildKind {
    pub fn tile_kind(self) -> TileKind {
        match self {
            BuildKind::Wall => TileKind::Wall,
            BuildKind::Turret => TileKind::Turret,
            BuildKind::Mine => TileKind::Mine,
        }
    }
}

/// Per-client turn phase. Never persisted; every client cycles
/// Rolling -> Expanding -> Rolling independently of the shared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalPhase {
    Rolling,
    Expanding,
}
