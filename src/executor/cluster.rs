//! Entity backend shared by the whole cluster.
//!
//! Every member keeps a [`MemoryBackend`], but only one of them holds the dataset: the
//! primary owner of [`ENTITY_STORE_KEY`] in the ordered view. Free-index probes, realm
//! checks and batch commits from every other member are forwarded there, so each of
//! them sees what all members created.

use super::backend::{EntityBackend, MemoryBackend};
use super::protocol::{ENDPOINT_ENTITY_OP, EntityOp, EntityOpResponse};
use super::types::Entity;
use crate::campaign::types::EntityKind;
use crate::membership::types::Node;
use crate::membership::view::ClusterView;
use crate::storage::placement::LeasePlacement;

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Placement key of the entity store.
pub const ENTITY_STORE_KEY: &str = "dataset_entities";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Added to a batch's remaining transaction time to cover the round trip.
const COMMIT_SLACK: Duration = Duration::from_secs(5);

/// Routes every backend call to the node hosting the entity store.
///
/// The trait is synchronous and called from blocking threads, so forwarded calls are
/// driven on the runtime captured at construction. Forwarding is a single attempt: a
/// repeated commit would fail on its own entities.
pub struct ClusterEntityBackend {
    local: Arc<MemoryBackend>,
    placement: LeasePlacement,
    http_client: reqwest::Client,
    runtime: Handle,
}

impl ClusterEntityBackend {
    /// Must be called from inside a tokio runtime.
    pub fn new(view: Arc<dyn ClusterView>, local: Arc<MemoryBackend>) -> Result<Arc<Self>> {
        let runtime = Handle::try_current()?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Arc::new(Self {
            local,
            placement: LeasePlacement::new(view),
            http_client,
            runtime,
        }))
    }

    /// Node currently hosting the entity store, or `None` if no member is alive.
    pub fn home(&self) -> Option<Node> {
        let partition = self.placement.partition_of(ENTITY_STORE_KEY);
        self.placement.owners(partition).into_iter().next()
    }

    /// Applies a forwarded call on this node's store.
    pub fn apply_local(&self, op: EntityOp) -> Result<EntityOpResponse> {
        match op {
            EntityOp::Exists { kind, realm, name } => {
                let exists = self.local.exists(kind, realm.as_deref(), &name)?;
                Ok(EntityOpResponse {
                    success: true,
                    exists: Some(exists),
                    ..Default::default()
                })
            }
            EntityOp::Commit {
                kind,
                realm,
                entities,
                timeout_ms,
            } => {
                let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                self.local
                    .commit_batch(kind, realm.as_deref(), entities, deadline)?;
                Ok(EntityOpResponse {
                    success: true,
                    ..Default::default()
                })
            }
            EntityOp::Delete {
                kind,
                realm,
                names,
                timeout_ms,
            } => {
                let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                let removed = self
                    .local
                    .delete_batch(kind, realm.as_deref(), names, deadline)?;
                Ok(EntityOpResponse {
                    success: true,
                    removed: Some(removed),
                    ..Default::default()
                })
            }
        }
    }

    /// Creates every realm in `names` that does not exist yet.
    ///
    /// Used for preloaded realms, which only need to exist once cluster-wide.
    pub async fn ensure_realms(self: Arc<Self>, names: Vec<String>) -> Result<usize> {
        tokio::task::spawn_blocking(move || {
            let mut created = 0;
            for name in names {
                if self.exists(EntityKind::Realms, None, &name)? {
                    tracing::debug!("Realm '{}' already present", name);
                    continue;
                }
                let realm = Entity::new(name.as_str(), serde_json::json!({ "enabled": true }));
                self.commit_batch(
                    EntityKind::Realms,
                    None,
                    vec![realm],
                    Instant::now() + PROBE_TIMEOUT,
                )?;
                tracing::info!("Preloaded realm '{}'", name);
                created += 1;
            }
            Ok(created)
        })
        .await?
    }

    /// Local store when this node is the home (or alone), otherwise an HTTP forward.
    fn route(&self, op: EntityOp, timeout: Duration) -> Result<EntityOpResponse> {
        let home = match self.home() {
            Some(home) if !self.placement.is_local(&home) => home,
            _ => return self.apply_local(op),
        };

        tracing::trace!("Forwarding entity op to {}", home.id);
        let url = format!("http://{}{}", home.http_addr, ENDPOINT_ENTITY_OP);
        let request = self.http_client.post(url).json(&op).timeout(timeout);

        let body: EntityOpResponse = self.runtime.block_on(async move {
            let response = request.send().await?;
            let status = response.status();
            let body: EntityOpResponse = response.json().await?;
            if !status.is_success() || !body.success {
                return Err(anyhow::anyhow!(
                    "Entity op rejected by {} ({}): {}",
                    home.id,
                    status,
                    body.error.unwrap_or_default()
                ));
            }
            Ok::<_, anyhow::Error>(body)
        })?;
        Ok(body)
    }
}

impl EntityBackend for ClusterEntityBackend {
    fn exists(&self, kind: EntityKind, realm: Option<&str>, name: &str) -> Result<bool> {
        let op = EntityOp::Exists {
            kind,
            realm: realm.map(str::to_string),
            name: name.to_string(),
        };
        self.route(op, PROBE_TIMEOUT)?
            .exists
            .ok_or_else(|| anyhow::anyhow!("Existence check answered without a result"))
    }

    fn commit_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        entities: Vec<Entity>,
        deadline: Instant,
    ) -> Result<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let op = EntityOp::Commit {
            kind,
            realm: realm.map(str::to_string),
            entities,
            timeout_ms: remaining.as_millis() as u64,
        };
        self.route(op, remaining + COMMIT_SLACK)?;
        Ok(())
    }

    fn delete_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        names: Vec<String>,
        deadline: Instant,
    ) -> Result<u64> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let op = EntityOp::Delete {
            kind,
            realm: realm.map(str::to_string),
            names,
            timeout_ms: remaining.as_millis() as u64,
        };
        self.route(op, remaining + COMMIT_SLACK)?
            .removed
            .ok_or_else(|| anyhow::anyhow!("Removal answered without a count"))
    }
}
