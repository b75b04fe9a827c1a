//! Node-local lease map.
//!
//! Holds the entries of every partition this node is primary or backup for. Used on
//! its own as the store of a single-process deployment.

use super::types::{LeaseEntry, LeaseOp, LeaseOpOutcome, LeaseStore, now_ms};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct MemoryLeaseStore {
    entries: DashMap<String, LeaseEntry>,
}

impl MemoryLeaseStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Applies one operation atomically with respect to other operations on the same key.
    pub fn apply(&self, op: &LeaseOp) -> LeaseOpOutcome {
        let now = now_ms();

        match op {
            LeaseOp::TryInsert {
                key,
                value_json,
                ttl_ms,
            } => {
                let fresh = LeaseEntry::new(value_json.clone(), Duration::from_millis(*ttl_ms), now);
                match self.entries.entry(key.clone()) {
                    Entry::Occupied(mut occupied) => {
                        if occupied.get().is_expired(now) {
                            tracing::debug!("Lease '{}' expired, taking it over", key);
                            occupied.insert(fresh);
                            applied()
                        } else {
                            LeaseOpOutcome {
                                applied: false,
                                value_json: Some(occupied.get().value_json.clone()),
                            }
                        }
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(fresh);
                        applied()
                    }
                }
            }

            LeaseOp::Get { key } => LeaseOpOutcome {
                applied: true,
                value_json: self.live(key, now).map(|entry| entry.value_json),
            },

            LeaseOp::Put {
                key,
                value_json,
                ttl_ms,
            } => {
                self.entries.insert(
                    key.clone(),
                    LeaseEntry::new(value_json.clone(), Duration::from_millis(*ttl_ms), now),
                );
                applied()
            }

            LeaseOp::Remove { key } => {
                let removed = self
                    .entries
                    .remove(key)
                    .map(|(_, entry)| entry)
                    .filter(|entry| !entry.is_expired(now));
                LeaseOpOutcome {
                    applied: removed.is_some(),
                    value_json: removed.map(|entry| entry.value_json),
                }
            }

            LeaseOp::CompareAndRemove { key, expected_json } => {
                let removed = self.entries.remove_if(key, |_, entry| {
                    !entry.is_expired(now) && &entry.value_json == expected_json
                });
                LeaseOpOutcome {
                    applied: removed.is_some(),
                    value_json: None,
                }
            }
        }
    }

    /// Raw entry for replication, expired or not.
    pub fn snapshot(&self, key: &str) -> Option<LeaseEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Overwrites the local state of `key` with the primary's state.
    pub fn restore(&self, key: &str, entry: Option<LeaseEntry>) {
        match entry {
            Some(entry) => {
                self.entries.insert(key.to_string(), entry);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub async fn purge_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired lease entries", purged);
            }
        }
    }

    fn live(&self, key: &str, now: u64) -> Option<LeaseEntry> {
        let entry = self.entries.get(key)?.value().clone();
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, current| current.is_expired(now));
            return None;
        }
        Some(entry)
    }
}

fn applied() -> LeaseOpOutcome {
    LeaseOpOutcome {
        applied: true,
        value_json: None,
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn execute(&self, op: LeaseOp) -> Result<LeaseOpOutcome> {
        Ok(self.apply(&op))
    }
}
