use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A value held in the lease store together with its absolute expiry.
///
/// Expiry is wall-clock based (milliseconds since the epoch) so an entry replicated
/// to a backup node expires there at the same moment as on the primary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaseEntry {
    pub value_json: String,
    pub expires_at_ms: u64,
}

impl LeaseEntry {
    pub fn new(value_json: String, ttl: Duration, now: u64) -> Self {
        Self {
            value_json,
            expires_at_ms: now.saturating_add(ttl.as_millis() as u64),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at_ms
    }
}

/// One operation against a single key.
///
/// Operations are the unit that travels between nodes: a non-owner forwards the
/// operation itself, never a read-modify-write sequence, so the owning node applies
/// `TryInsert` and `CompareAndRemove` atomically against its local map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LeaseOp {
    TryInsert {
        key: String,
        value_json: String,
        ttl_ms: u64,
    },
    Get {
        key: String,
    },
    Put {
        key: String,
        value_json: String,
        ttl_ms: u64,
    },
    Remove {
        key: String,
    },
    CompareAndRemove {
        key: String,
        expected_json: String,
    },
}

impl LeaseOp {
    pub fn key(&self) -> &str {
        match self {
            LeaseOp::TryInsert { key, .. }
            | LeaseOp::Get { key }
            | LeaseOp::Put { key, .. }
            | LeaseOp::Remove { key }
            | LeaseOp::CompareAndRemove { key, .. } => key,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, LeaseOp::Get { .. })
    }
}

/// Result of applying a [`LeaseOp`].
///
/// - `TryInsert`: `applied` when inserted, otherwise `value_json` is the live holder.
/// - `Get` / `Remove`: `value_json` is the live value read or removed.
/// - `Put`: always `applied`.
/// - `CompareAndRemove`: `applied` when the live value matched and was removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeaseOpOutcome {
    pub applied: bool,
    pub value_json: Option<String>,
}

/// A shared key-value slot with per-entry expiry.
///
/// Implementors only provide [`LeaseStore::execute`]; the typed helpers build the
/// matching [`LeaseOp`]. Expired entries are invisible to every operation.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    async fn execute(&self, op: LeaseOp) -> Result<LeaseOpOutcome>;

    /// Inserts only if the key is absent (or expired).
    /// Returns `None` on success, or the current holder's value.
    async fn try_insert(&self, key: &str, value_json: String, ttl: Duration) -> Result<Option<String>> {
        let outcome = self
            .execute(LeaseOp::TryInsert {
                key: key.to_string(),
                value_json,
                ttl_ms: ttl.as_millis() as u64,
            })
            .await?;

        if outcome.applied {
            Ok(None)
        } else {
            Ok(outcome.value_json)
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let outcome = self
            .execute(LeaseOp::Get {
                key: key.to_string(),
            })
            .await?;
        Ok(outcome.value_json)
    }

    async fn put(&self, key: &str, value_json: String, ttl: Duration) -> Result<()> {
        self.execute(LeaseOp::Put {
            key: key.to_string(),
            value_json,
            ttl_ms: ttl.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<String>> {
        let outcome = self
            .execute(LeaseOp::Remove {
                key: key.to_string(),
            })
            .await?;
        Ok(outcome.value_json)
    }

    /// Removes the key only while it still holds `expected_json`.
    async fn compare_and_remove(&self, key: &str, expected_json: &str) -> Result<bool> {
        let outcome = self
            .execute(LeaseOp::CompareAndRemove {
                key: key.to_string(),
                expected_json: expected_json.to_string(),
            })
            .await?;
        Ok(outcome.applied)
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
