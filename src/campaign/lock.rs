use super::types::CampaignRecord;
use crate::error::{DatasetError, DatasetResult};
use crate::storage::types::LeaseStore;

use std::sync::Arc;
use std::time::Duration;

/// Key holding the record of the campaign in progress.
pub const RUNNING_KEY: &str = "dataset_task_running";
/// Key holding the outcome of the last finished campaign.
pub const COMPLETED_KEY: &str = "dataset_task_completed";
pub const COMPLETED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cluster-wide "one campaign at a time" lock on top of a [`LeaseStore`].
///
/// Acquisition is a single insert-if-absent on [`RUNNING_KEY`]. The TTL only bounds how
/// long a crashed owner can block new campaigns; it does not stop the owner's workers.
#[derive(Clone)]
pub struct CampaignLock {
    store: Arc<dyn LeaseStore>,
}

impl CampaignLock {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// Returns `None` when the lock was taken, or the record of the campaign holding it.
    pub async fn try_acquire(
        &self,
        record: &CampaignRecord,
        ttl: Duration,
    ) -> DatasetResult<Option<CampaignRecord>> {
        let value_json = serde_json::to_string(record)?;
        let existing = self
            .store
            .try_insert(RUNNING_KEY, value_json, ttl)
            .await
            .map_err(DatasetError::Store)?;

        match existing {
            None => {
                tracing::info!("Campaign lock acquired: {}", record.message);
                Ok(None)
            }
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }

    pub async fn current(&self) -> DatasetResult<Option<CampaignRecord>> {
        self.read(RUNNING_KEY).await
    }

    pub async fn completed(&self) -> DatasetResult<Option<CampaignRecord>> {
        self.read(COMPLETED_KEY).await
    }

    /// Removes `held` from the running key and publishes `finished` as the last outcome.
    ///
    /// Only the exact record this caller inserted is removed. If it already expired and
    /// another campaign took the key, nothing is touched and `false` is returned.
    pub async fn release(
        &self,
        held: &CampaignRecord,
        finished: Option<&CampaignRecord>,
    ) -> DatasetResult<bool> {
        let held_json = serde_json::to_string(held)?;
        let removed = self
            .store
            .compare_and_remove(RUNNING_KEY, &held_json)
            .await
            .map_err(DatasetError::Store)?;

        if !removed {
            tracing::warn!(
                "Campaign '{}' no longer holds the lock (expired or replaced), leaving it untouched",
                held.message
            );
            return Ok(false);
        }

        if let Some(finished) = finished {
            let finished_json = serde_json::to_string(finished)?;
            self.store
                .put(COMPLETED_KEY, finished_json, COMPLETED_TTL)
                .await
                .map_err(DatasetError::Store)?;
        }

        tracing::info!("Campaign lock released: {}", held.message);
        Ok(true)
    }

    /// Forgets the last finished campaign. Returns whether there was one.
    pub async fn clear_completed(&self) -> DatasetResult<bool> {
        let removed = self
            .store
            .remove(COMPLETED_KEY)
            .await
            .map_err(DatasetError::Store)?;
        Ok(removed.is_some())
    }

    async fn read(&self, key: &str) -> DatasetResult<Option<CampaignRecord>> {
        let value = self.store.get(key).await.map_err(DatasetError::Store)?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
