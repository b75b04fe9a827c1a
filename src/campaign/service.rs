//! Campaign trigger and status interface.
//!
//! ## Responsibilities
//! - **Admission**: validate the request, resume from the first free index, and take the
//!   cluster-wide lock with one insert-if-absent. Realm removals share the same lock.
//! - **Hand-off**: run the campaign on a background task so the trigger returns as soon as
//!   the lock is held.
//! - **Completion**: aggregate node replies, publish the outcome and release the lock.
//! - **Queries**: running/completed status and the last created entity.

use super::finder::try_find_free_index;
use super::lock::CampaignLock;
use super::progress::{ProgressTracker, status_of};
use super::types::{CampaignDescriptor, CampaignRecord, CampaignStatus, EntityKind, RealmSpan};
use crate::cluster::broadcast::{CampaignBroadcast, aggregate};
use crate::cluster::types::CampaignSummary;
use crate::config::{CampaignConfig, RemovalConfig};
use crate::error::{DatasetError, DatasetResult};
use crate::executor::backend::EntityBackend;
use crate::membership::view::ClusterView;
use crate::storage::types::now_ms;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct CampaignService {
    lock: CampaignLock,
    backend: Arc<dyn EntityBackend>,
    broadcast: Arc<dyn CampaignBroadcast>,
    view: Arc<dyn ClusterView>,
}

/// Accepted campaign. Dropping the handle does not stop the campaign.
pub struct CampaignHandle {
    pub descriptor: CampaignDescriptor,
    pub record: CampaignRecord,
    completion: JoinHandle<DatasetResult<CampaignSummary>>,
}

impl CampaignHandle {
    /// Waits for the background run. Status pollers never need this.
    pub async fn wait(self) -> DatasetResult<CampaignSummary> {
        self.completion.await.map_err(|e| DatasetError::NodeFailure {
            node: "initiator".to_string(),
            cause: format!("Campaign task aborted: {}", e),
        })?
    }
}

impl CampaignService {
    pub fn new(
        lock: CampaignLock,
        backend: Arc<dyn EntityBackend>,
        broadcast: Arc<dyn CampaignBroadcast>,
        view: Arc<dyn ClusterView>,
    ) -> Arc<Self> {
        Arc::new(Self {
            lock,
            backend,
            broadcast,
            view,
        })
    }

    /// Admits a campaign and starts it in the background.
    ///
    /// Configuration and conflict errors are returned before anything is started.
    pub async fn start_campaign(&self, config: CampaignConfig) -> DatasetResult<CampaignHandle> {
        config.validate()?;

        let realm = config.realm_name.clone().filter(|_| config.kind.requires_realm());
        if let Some(realm) = &realm {
            if !self.probe(EntityKind::Realms, None, realm.clone()).await? {
                return Err(DatasetError::Configuration(format!(
                    "Realm '{}' does not exist",
                    realm
                )));
            }
        }

        let prefix = config.prefix();
        let start = self
            .free_index(config.kind, realm.clone(), prefix.clone())
            .await?
            .ok_or_else(|| {
                DatasetError::Configuration(format!("No free index left for prefix '{}'", prefix))
            })?;

        let cluster_size = self.live_cluster_size()?;
        let mut descriptor = config.into_descriptor(start, cluster_size)?;

        if config.kind == EntityKind::Events {
            let realm_prefix = config.realm_prefix();
            let realms = self
                .free_index(EntityKind::Realms, None, realm_prefix.clone())
                .await?
                .unwrap_or(u32::MAX);
            if realms == 0 {
                return Err(DatasetError::Configuration(format!(
                    "Not found any realm with prefix '{}'",
                    realm_prefix
                )));
            }
            descriptor.event_realms = Some(RealmSpan {
                prefix: realm_prefix,
                count: realms,
            });
        }

        self.admit(descriptor, config.task_timeout()).await
    }

    /// Admits a realm removal and starts it in the background.
    ///
    /// `remove-all` removes every realm below the first free index of the prefix.
    pub async fn start_removal(&self, config: RemovalConfig) -> DatasetResult<CampaignHandle> {
        config.validate()?;

        let end_if_all = if config.remove_all {
            self.free_index(EntityKind::Realms, None, config.realm_prefix())
                .await?
                .unwrap_or(u32::MAX)
        } else {
            0
        };

        let cluster_size = self.live_cluster_size()?;
        let descriptor = config.into_descriptor(end_if_all, cluster_size)?;
        self.admit(descriptor, config.task_timeout()).await
    }

    fn live_cluster_size(&self) -> DatasetResult<usize> {
        match self.view.cluster_size() {
            0 => Err(DatasetError::Configuration(
                "No alive cluster members to run the campaign".to_string(),
            )),
            size => Ok(size),
        }
    }

    /// Takes the cluster-wide lock for `descriptor` and hands the run to a background task.
    async fn admit(&self, descriptor: CampaignDescriptor, task_timeout: Duration) -> DatasetResult<CampaignHandle> {
        let tracker = ProgressTracker::start(descriptor.describe());

        if let Some(existing) = self.lock.try_acquire(tracker.record(), task_timeout).await? {
            tracing::warn!("Campaign rejected, another one is in progress: {}", existing);
            return Err(DatasetError::Conflict { existing });
        }

        // Membership may have shrunk to nothing while the lock was being taken.
        if self.view.cluster_size() == 0 {
            let failed = tracker.complete(false);
            self.lock.release(tracker.record(), Some(&failed)).await?;
            return Err(DatasetError::NodeFailure {
                node: self.view.local_id().to_string(),
                cause: "Cluster membership became empty before dispatch".to_string(),
            });
        }

        tracker.note(format!(
            "Campaign admitted: {} {} from index {} on {} nodes",
            descriptor.count, descriptor.kind, descriptor.start, descriptor.cluster_size
        ));

        let record = tracker.record().clone();
        let completion = tokio::spawn(run_campaign(
            self.broadcast.clone(),
            self.lock.clone(),
            tracker,
            descriptor.clone(),
        ));

        Ok(CampaignHandle {
            descriptor,
            record,
            completion,
        })
    }

    pub async fn query_status(&self) -> DatasetResult<CampaignStatus> {
        let running = self.lock.current().await?;
        let completed = if running.is_none() {
            self.lock.completed().await?
        } else {
            None
        };
        Ok(status_of(running, completed, now_ms()))
    }

    pub async fn completed_status(&self) -> DatasetResult<Option<CampaignRecord>> {
        self.lock.completed().await
    }

    pub async fn clear_completed(&self) -> DatasetResult<bool> {
        self.lock.clear_completed().await
    }

    /// Name of the highest-index entity created so far, or `None` if there is none.
    pub async fn last_entity(
        &self,
        kind: EntityKind,
        realm: Option<String>,
        prefix: Option<String>,
    ) -> DatasetResult<Option<String>> {
        let realm = realm.filter(|_| kind.requires_realm());
        if kind.requires_realm() {
            let Some(name) = &realm else {
                return Err(DatasetError::Configuration(format!(
                    "Parameter 'realm-name' is required to look up {}",
                    kind
                )));
            };
            if !self.probe(EntityKind::Realms, None, name.clone()).await? {
                return Err(DatasetError::Configuration(format!("Realm '{}' does not exist", name)));
            }
        }

        let prefix = prefix.unwrap_or_else(|| kind.default_prefix().to_string());
        let free = self.free_index(kind, realm, prefix.clone()).await?;

        Ok(match free {
            Some(0) => None,
            Some(next) => Some(format!("{}{}", prefix, next - 1)),
            None => Some(format!("{}{}", prefix, u32::MAX)),
        })
    }

    /// Free-index search against the backend on a blocking thread.
    async fn free_index(
        &self,
        kind: EntityKind,
        realm: Option<String>,
        prefix: String,
    ) -> DatasetResult<Option<u32>> {
        let backend = self.backend.clone();
        let found = tokio::task::spawn_blocking(move || {
            try_find_free_index(|index| {
                backend.exists(kind, realm.as_deref(), &format!("{}{}", prefix, index))
            })
        })
        .await
        .map_err(|e| DatasetError::Store(anyhow::anyhow!("Free index search aborted: {}", e)))?
        .map_err(DatasetError::Store)?;
        Ok(found)
    }

    async fn probe(&self, kind: EntityKind, realm: Option<String>, name: String) -> DatasetResult<bool> {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.exists(kind, realm.as_deref(), &name))
            .await
            .map_err(|e| DatasetError::Store(anyhow::anyhow!("Existence check aborted: {}", e)))?
            .map_err(DatasetError::Store)
    }
}

async fn run_campaign(
    broadcast: Arc<dyn CampaignBroadcast>,
    lock: CampaignLock,
    tracker: ProgressTracker,
    descriptor: CampaignDescriptor,
) -> DatasetResult<CampaignSummary> {
    let replies = broadcast.broadcast(&descriptor).await;
    let result = aggregate(replies);

    match &result {
        Ok(summary) => tracker.note(format!(
            "{} {} {} on {} nodes",
            descriptor.operation.verb(),
            summary.created,
            descriptor.kind,
            summary.nodes
        )),
        Err(e) => tracing::error!("Campaign '{}' failed: {}", tracker.record().message, e),
    }

    let finished = tracker.complete(result.is_ok());
    if let Err(e) = lock.release(tracker.record(), Some(&finished)).await {
        tracing::error!("Failed to release campaign lock: {}", e);
    }

    result
}
