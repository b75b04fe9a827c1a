//! Transactional entity backend.
//!
//! The executor hands every batch to an [`EntityBackend`] as a single unit. The
//! backend either applies all of the batch or none of it.

use super::types::Entity;
use crate::campaign::types::EntityKind;

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

pub trait EntityBackend: Send + Sync {
    /// Free-index probe: is `name` of `kind` already stored (inside `realm` where relevant).
    fn exists(&self, kind: EntityKind, realm: Option<&str>, name: &str) -> Result<bool>;

    /// Commits all `entities` atomically, failing the whole batch if `deadline` passes.
    fn commit_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        entities: Vec<Entity>,
        deadline: Instant,
    ) -> Result<()>;

    /// Deletes the named entities atomically and returns how many existed.
    /// Deleting a realm also deletes everything stored inside it.
    fn delete_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        names: Vec<String>,
        deadline: Instant,
    ) -> Result<u64>;
}

/// In-process backend keyed by `kind/realm/name`.
#[derive(Default)]
pub struct MemoryBackend {
    entities: DashMap<String, Entity>,
    commit_guard: Mutex<()>,
    commits: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already contains `realms` (named verbatim).
    pub fn with_realms<'a>(realms: impl IntoIterator<Item = &'a str>) -> Self {
        let backend = Self::new();
        for realm in realms {
            backend.entities.insert(
                entity_key(EntityKind::Realms, None, realm),
                Entity::new(realm, serde_json::json!({ "enabled": true })),
            );
        }
        backend
    }

    pub fn count(&self, kind: EntityKind, realm: Option<&str>) -> usize {
        let prefix = scope_prefix(kind, realm);
        self.entities
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .count()
    }

    pub fn get(&self, kind: EntityKind, realm: Option<&str>, name: &str) -> Option<Entity> {
        self.entities
            .get(&entity_key(kind, realm, name))
            .map(|entry| entry.value().clone())
    }

    /// Number of successfully committed batches.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl EntityBackend for MemoryBackend {
    fn exists(&self, kind: EntityKind, realm: Option<&str>, name: &str) -> Result<bool> {
        Ok(self.entities.contains_key(&entity_key(kind, realm, name)))
    }

    fn commit_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        entities: Vec<Entity>,
        deadline: Instant,
    ) -> Result<()> {
        let _guard = self
            .commit_guard
            .lock()
            .map_err(|_| anyhow::anyhow!("Backend commit lock poisoned"))?;

        if Instant::now() > deadline {
            return Err(anyhow::anyhow!(
                "Transaction timeout before commit of {} {}",
                entities.len(),
                kind
            ));
        }

        if kind.requires_realm() {
            let realm = realm.ok_or_else(|| anyhow::anyhow!("{} require a realm", kind))?;
            if !self.exists(EntityKind::Realms, None, realm)? {
                return Err(anyhow::anyhow!("Realm '{}' does not exist", realm));
            }
        }

        let mut keys = Vec::with_capacity(entities.len());
        for entity in &entities {
            let key = entity_key(kind, realm, &entity.name);
            if self.entities.contains_key(&key) || keys.contains(&key) {
                return Err(anyhow::anyhow!("{} '{}' already exists", kind, entity.name));
            }
            keys.push(key);
        }

        for (key, entity) in keys.into_iter().zip(entities) {
            self.entities.insert(key, entity);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn delete_batch(
        &self,
        kind: EntityKind,
        realm: Option<&str>,
        names: Vec<String>,
        deadline: Instant,
    ) -> Result<u64> {
        let _guard = self
            .commit_guard
            .lock()
            .map_err(|_| anyhow::anyhow!("Backend commit lock poisoned"))?;

        if Instant::now() > deadline {
            return Err(anyhow::anyhow!(
                "Transaction timeout before removal of {} {}",
                names.len(),
                kind
            ));
        }

        let mut removed = 0u64;
        for name in &names {
            if self.entities.remove(&entity_key(kind, realm, name)).is_none() {
                tracing::warn!("{} '{}' did not exist", kind, name);
                continue;
            }
            removed += 1;

            if kind == EntityKind::Realms {
                let contained: Vec<String> = [EntityKind::Clients, EntityKind::Users, EntityKind::Sessions]
                    .into_iter()
                    .map(|inner| scope_prefix(inner, Some(name)))
                    .collect();
                self.entities
                    .retain(|key, _| !contained.iter().any(|prefix| key.starts_with(prefix)));
            }
            tracing::debug!("Deleted {} '{}'", kind, name);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(removed)
    }
}

fn scope_prefix(kind: EntityKind, realm: Option<&str>) -> String {
    format!("{}/{}/", kind, realm.unwrap_or(""))
}

fn entity_key(kind: EntityKind, realm: Option<&str>, name: &str) -> String {
    format!("{}{}", scope_prefix(kind, realm), name)
}
