use std::sync::Arc;

use tracing::{debug, info};

use crate::board::{Grid, Tile, starting_positions};
use crate::game::GameConfig;
use crate::game::players::{Participant, team_roster};

use super::{
    DocumentStore, GameDoc, StoreError, Subscription, VersionedDoc, deserialize_grid,
    serialize_grid,
};

/// The adapter's in-memory view of one committed document state. Mutation
/// paths clone it, apply their changes, and hand it back to [`StoreAdapter::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub players: Vec<Participant>,
    pub grid: Grid,
    pub turn_count: u32,
    pub logs: Vec<String>,
    pub version: u64,
}

impl Snapshot {
    pub fn from_versioned(versioned: VersionedDoc) -> Result<Self, StoreError> {
        let grid = deserialize_grid(&versioned.doc.grid)?;
        Ok(Self {
            players: versioned.doc.players,
            grid,
            turn_count: versioned.doc.turn_count,
            logs: versioned.doc.logs,
            version: versioned.version,
        })
    }

    fn to_doc(&self) -> GameDoc {
        GameDoc {
            players: self.players.clone(),
            grid: serialize_grid(&self.grid),
            turn_count: self.turn_count,
            logs: self.logs.clone(),
        }
    }
}

/// Translates between the grid/participant representation and the persisted
/// document under `games/{cohort}`, and hands out change subscriptions.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn DocumentStore>,
    key: String,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn DocumentStore>, cohort_id: &str) -> Self {
        Self {
            store,
            key: format!("games/{cohort_id}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// On first contact: synthesize a fresh board, seed one citadel per
    /// participant at the ring corners, and create the document. Conditional
    /// create makes the two-clients-initialize-at-once race harmless; the
    /// losing client simply adopts the stored document.
    pub fn initialize_if_absent(&self, config: &GameConfig) -> Result<Snapshot, StoreError> {
        let players = team_roster(config.num_teams);
        let mut grid = Grid::generate(config.radius);
        for (idx, coord) in starting_positions(config.radius)
            .into_iter()
            .take(players.len())
            .enumerate()
        {
            if let Some(tile) = grid.get_mut(coord) {
                *tile = Tile::citadel(coord, idx);
            }
        }

        let doc = GameDoc {
            players,
            grid: serialize_grid(&grid),
            turn_count: 1,
            logs: Vec::new(),
        };
        let created = self.store.create_if_absent(&self.key, &doc)?;
        if created {
            info!(key = %self.key, tiles = doc.grid.len(), "initialized game document");
        } else {
            debug!(key = %self.key, "game document already present");
        }
        self.load()
    }

    /// Current committed state, rebuilt wholesale.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        let versioned = self
            .store
            .read(&self.key)?
            .ok_or_else(|| StoreError::Missing(self.key.clone()))?;
        Snapshot::from_versioned(versioned)
    }

    /// Compare-and-swap commit of a mutated snapshot against the version it
    /// was derived from.
    pub fn save(&self, snapshot: &Snapshot) -> Result<u64, StoreError> {
        self.store
            .write(&self.key, &snapshot.to_doc(), snapshot.version)
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.subscribe(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::HexCoord;
    use crate::store::MemoryStore;
    use crate::types::TileKind;

    fn adapter() -> StoreAdapter {
        StoreAdapter::new(Arc::new(MemoryStore::new()), "grade-2")
    }

    #[test]
    fn initialize_seeds_one_citadel_per_team() {
        let config = GameConfig {
            radius: 2,
            num_teams: 6,
            seed: 7,
        };
        let snap = adapter().initialize_if_absent(&config).unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.players.len(), 6);
        let citadels: Vec<_> = snap
            .grid
            .tiles()
            .filter(|t| t.kind == TileKind::Citadel)
            .collect();
        assert_eq!(citadels.len(), 6);
        for tile in citadels {
            assert_eq!(tile.health, Some(crate::game::rules::CITADEL_MAX_HEALTH));
            assert_eq!(tile.turret_count, Some(0));
            assert!(tile.owner.is_some());
        }
        assert_eq!(
            snap.grid.get(HexCoord::new(0, -2)).unwrap().owner,
            Some(0)
        );
    }

    #[test]
    fn double_initialize_keeps_first_document() {
        let adapter = adapter();
        let config = GameConfig {
            radius: 2,
            num_teams: 6,
            seed: 7,
        };
        let first = adapter.initialize_if_absent(&config).unwrap();
        let second = adapter.initialize_if_absent(&config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn save_bumps_version_and_load_round_trips() {
        let adapter = adapter();
        let config = GameConfig {
            radius: 2,
            num_teams: 6,
            seed: 7,
        };
        let mut snap = adapter.initialize_if_absent(&config).unwrap();
        snap.players[0].action_points = 9;
        snap.grid.get_mut(HexCoord::new(0, 0)).unwrap().owner = Some(0);
        let v = adapter.save(&snap).unwrap();
        assert_eq!(v, 2);

        let reloaded = adapter.load().unwrap();
        assert_eq!(reloaded.players[0].action_points, 9);
        assert_eq!(reloaded.grid.get(HexCoord::new(0, 0)).unwrap().owner, Some(0));
        assert_eq!(reloaded.version, 2);
    }
}
