use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc;

use tracing::debug;

use super::{DocumentStore, GameDoc, StoreError, Subscription, VersionedDoc};

/// In-process document store with per-key versioning and change feeds. Used
/// by tests and the single-process demo binary; production deployments plug a
/// real backend into the `DocumentStore` trait instead.
///
/// Documents are held as JSON values, so every read hands back a deep copy
/// stripped of anything serde cannot represent.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, (u64, serde_json::Value)>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<VersionedDoc>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, key: &str, snapshot: &VersionedDoc) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(senders) = subs.get_mut(key) {
            senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }
}

impl DocumentStore for MemoryStore {
    fn create_if_absent(&self, key: &str, doc: &GameDoc) -> Result<bool, StoreError> {
        let value = serde_json::to_value(doc)?;
        let snapshot = {
            let mut docs = self
                .docs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if docs.contains_key(key) {
                return Ok(false);
            }
            docs.insert(key.to_string(), (1, value));
            VersionedDoc {
                version: 1,
                doc: doc.clone(),
            }
        };
        debug!(key, "created game document");
        self.notify(key, &snapshot);
        Ok(true)
    }

    fn read(&self, key: &str) -> Result<Option<VersionedDoc>, StoreError> {
        let entry = {
            let docs = self
                .docs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            docs.get(key).cloned()
        };
        match entry {
            Some((version, value)) => {
                let doc: GameDoc = serde_json::from_value(value)?;
                Ok(Some(VersionedDoc { version, doc }))
            }
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, doc: &GameDoc, base_version: u64) -> Result<u64, StoreError> {
        let value = serde_json::to_value(doc)?;
        let snapshot = {
            let mut docs = self
                .docs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let (current, stored) = docs
                .get_mut(key)
                .ok_or_else(|| StoreError::Missing(key.to_string()))?;
            if *current != base_version {
                debug!(key, base_version, current = *current, "stale write rejected");
                return Err(StoreError::StaleWrite {
                    base: base_version,
                    current: *current,
                });
            }
            *current += 1;
            *stored = value;
            VersionedDoc {
                version: *current,
                doc: doc.clone(),
            }
        };
        debug!(key, version = snapshot.version, "committed game document");
        self.notify(key, &snapshot);
        Ok(snapshot.version)
    }

    fn subscribe(&self, key: &str) -> Subscription {
        let (tx, rx) = mpsc::channel();
        // Deliver the current snapshot immediately, like a real-time
        // listener's initial callback. Replay and registration share one
        // critical section on the subscriber list: a concurrent write cannot
        // commit-and-notify between them, so no version falls in the gap (at
        // worst the initial snapshot is delivered twice).
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Ok(Some(snapshot)) = self.read(key) {
            let _ = tx.send(snapshot);
        }
        subs.entry(key.to_string()).or_default().push(tx);
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Grid;
    use crate::game::players::team_roster;
    use crate::store::serialize_grid;

    fn doc() -> GameDoc {
        GameDoc {
            players: team_roster(6),
            grid: serialize_grid(&Grid::generate(2)),
            turn_count: 1,
            logs: Vec::new(),
        }
    }

    #[test]
    fn second_create_loses_the_race() {
        let store = MemoryStore::new();
        assert!(store.create_if_absent("games/g1", &doc()).unwrap());
        assert!(!store.create_if_absent("games/g1", &doc()).unwrap());
        assert_eq!(store.read("games/g1").unwrap().unwrap().version, 1);
    }

    #[test]
    fn stale_write_is_rejected() {
        let store = MemoryStore::new();
        store.create_if_absent("games/g1", &doc()).unwrap();
        let v2 = store.write("games/g1", &doc(), 1).unwrap();
        assert_eq!(v2, 2);
        let err = store.write("games/g1", &doc(), 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleWrite {
                base: 1,
                current: 2
            }
        ));
    }

    #[test]
    fn subscription_sees_own_write_echo() {
        let store = MemoryStore::new();
        store.create_if_absent("games/g1", &doc()).unwrap();
        let sub = store.subscribe("games/g1");
        // Initial snapshot on subscribe.
        assert_eq!(sub.next().unwrap().version, 1);
        store.write("games/g1", &doc(), 1).unwrap();
        assert_eq!(sub.next().unwrap().version, 2);
    }

    #[test]
    fn late_subscriber_sees_a_gapless_version_sequence() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        store.create_if_absent("games/g1", &doc()).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let doc = doc();
                let mut version = 1;
                for _ in 0..200 {
                    version = store.write("games/g1", &doc, version).unwrap();
                }
            })
        };

        // Subscribe while the writer is committing.
        let sub = store.subscribe("games/g1");
        writer.join().unwrap();

        let mut versions = Vec::new();
        while let Some(snapshot) = sub.try_next() {
            versions.push(snapshot.version);
        }
        // From the initial snapshot onward every committed version arrives;
        // a duplicate of the initial one is fine, a hole is not.
        assert!(!versions.is_empty());
        for pair in versions.windows(2) {
            assert!(
                pair[1] == pair[0] || pair[1] == pair[0] + 1,
                "version hole between {} and {}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(*versions.last().unwrap(), 201);
    }

    #[test]
    fn write_to_missing_key_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.write("games/none", &doc(), 1),
            Err(StoreError::Missing(_))
        ));
    }
}
