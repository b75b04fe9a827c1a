use super::memory::MemoryLeaseStore;
use super::placement::LeasePlacement;
use super::protocol::*;
use super::types::{LeaseEntry, LeaseOp, LeaseOpOutcome, LeaseStore, now_ms};
use crate::membership::types::Node;
use crate::membership::view::ClusterView;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const FORWARD_TIMEOUT: Duration = Duration::from_millis(500);
const FORWARD_ATTEMPTS: usize = 3;
/// Above this many cached outcomes, entries older than [`PROCESSED_OPS_TTL`] are swept.
const PROCESSED_OPS_LIMIT: usize = 10_000;
/// Far longer than a forwarding caller keeps retrying one op.
const PROCESSED_OPS_TTL: Duration = Duration::from_secs(60);

/// Lease store shared by the whole cluster.
///
/// Each key lives on the primary of its partition. The primary applies operations on
/// its local [`MemoryLeaseStore`], which makes insert-if-absent a single atomic step
/// no matter how many nodes race for the same key, then pushes the resulting state to
/// the backup. Every other node forwards.
pub struct ClusterLeaseStore {
    local: Arc<MemoryLeaseStore>,
    placement: LeasePlacement,
    processed_ops: DashMap<String, (LeaseOpOutcome, u64)>,
    http_client: reqwest::Client,
}

impl ClusterLeaseStore {
    pub fn new(view: Arc<dyn ClusterView>, local: Arc<MemoryLeaseStore>) -> Arc<Self> {
        Arc::new(Self {
            local,
            placement: LeasePlacement::new(view),
            processed_ops: DashMap::new(),
            http_client: reqwest::Client::new(),
        })
    }

    /// Applies an operation this node owns, or replays the cached outcome of a retry.
    pub async fn apply_as_primary(&self, partition: u32, op_id: String, op: LeaseOp) -> LeaseOpOutcome {
        if let Some(cached) = self.processed_ops.get(&op_id) {
            tracing::debug!("Lease op {} already applied, replaying outcome", op_id);
            return cached.value().0.clone();
        }

        let outcome = self.local.apply(&op);
        self.remember(op_id.clone(), outcome.clone());

        if op.is_mutation() {
            let key = op.key().to_string();
            for backup in self.placement.owners(partition).iter().skip(1) {
                if self.placement.is_local(backup) {
                    continue;
                }
                if let Err(e) = self.replicate_to_backup(backup, partition, &op_id, &key).await {
                    tracing::warn!("Failed to replicate lease '{}' to {}: {}", key, backup.id, e);
                }
            }
        }

        outcome
    }

    pub fn store_replica(&self, key: &str, entry: Option<LeaseEntry>) {
        self.local.restore(key, entry);
    }

    fn remember(&self, op_id: String, outcome: LeaseOpOutcome) {
        let now = now_ms();
        if self.processed_ops.len() > PROCESSED_OPS_LIMIT {
            let cutoff = now.saturating_sub(PROCESSED_OPS_TTL.as_millis() as u64);
            self.processed_ops.retain(|_, (_, applied_at)| *applied_at >= cutoff);
        }
        self.processed_ops.insert(op_id, (outcome, now));
    }

    async fn replicate_to_backup(&self, backup: &Node, partition: u32, op_id: &str, key: &str) -> Result<()> {
        let payload = LeaseReplicateRequest {
            partition,
            op_id: op_id.to_string(),
            key: key.to_string(),
            entry: self.local.snapshot(key),
        };
        let response = self
            .post_with_retry(
                format!("http://{}{}", backup.http_addr, ENDPOINT_LEASE_REPLICATE),
                &payload,
                FORWARD_TIMEOUT,
                FORWARD_ATTEMPTS,
            )
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Replication failed: {}", response.status()));
        }
        Ok(())
    }

    async fn forward(&self, primary: &Node, partition: u32, op_id: String, op: LeaseOp) -> Result<LeaseOpOutcome> {
        tracing::trace!("Forwarding lease op on '{}' to {}", op.key(), primary.id);

        let payload = LeaseOpRequest {
            partition,
            op_id,
            op,
        };
        let response = self
            .post_with_retry(
                format!("http://{}{}", primary.http_addr, ENDPOINT_LEASE_OP),
                &payload,
                FORWARD_TIMEOUT,
                FORWARD_ATTEMPTS,
            )
            .await?;

        let status = response.status();
        let body: LeaseOpResponse = response.json().await?;
        match body.outcome {
            Some(outcome) if status.is_success() && body.success => Ok(outcome),
            _ => Err(anyhow::anyhow!(
                "Lease op rejected by {} ({}): {}",
                primary.id,
                status,
                body.error.unwrap_or_default()
            )),
        }
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
        timeout: Duration,
        attempts: usize,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}

#[async_trait]
impl LeaseStore for ClusterLeaseStore {
    async fn execute(&self, op: LeaseOp) -> Result<LeaseOpOutcome> {
        let partition = self.placement.partition_of(op.key());
        let owners = self.placement.owners(partition);
        let op_id = Uuid::new_v4().to_string();

        let Some(primary) = owners.first() else {
            tracing::warn!("No alive nodes, applying lease op locally");
            return Ok(self.local.apply(&op));
        };

        if self.placement.is_local(primary) {
            Ok(self.apply_as_primary(partition, op_id, op).await)
        } else {
            self.forward(primary, partition, op_id, op).await
        }
    }
}
