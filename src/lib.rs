#![warn(clippy::all)]
#![deny(rust_2018_idioms)]

pub mod board;
pub mod cli;
pub mod coords;
pub mod game;
pub mod store;
pub mod types;

pub use board::{Grid, Tile, reachable_capture_targets};
pub use coords::HexCoord;
pub use game::{GameConfig, Participant, SelectOutcome, TurnEngine};
pub use store::{DocumentStore, MemoryStore, Snapshot, StoreAdapter};
pub use types::{BuildKind, LocalPhase, TileKind};
