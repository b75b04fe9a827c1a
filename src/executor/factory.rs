//! Entity Factory Registry
//!
//! Maps each [`EntityKind`] to the closure that builds the entity for one index.
//! The executor stays generic: it only knows how to slice ranges into batches and
//! commit them, never what a user or a client looks like.

use super::entities;
use super::types::Entity;
use crate::campaign::types::{CampaignDescriptor, EntityKind};

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe factory producing the entity at `index` of a campaign.
/// Runs on blocking worker threads, once per index, inside the batch transaction.
pub type EntityFactoryFn = Arc<dyn Fn(&CampaignDescriptor, u32) -> Result<Entity> + Send + Sync>;

#[derive(Default)]
pub struct FactoryRegistry {
    factories: DashMap<EntityKind, EntityFactoryFn>,
}

impl FactoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry with the synthetic realm, client, user, session and event factories.
    pub fn with_standard_factories() -> Arc<Self> {
        let registry = Self::default();
        registry.register(EntityKind::Realms, entities::realm);
        registry.register(EntityKind::Clients, entities::client);
        registry.register(EntityKind::Users, entities::user);
        registry.register(EntityKind::Sessions, entities::session);
        registry.register(EntityKind::Events, entities::event);
        Arc::new(registry)
    }

    /// Registers (or replaces) the factory for `kind`.
    pub fn register<F>(&self, kind: EntityKind, factory: F)
    where
        F: Fn(&CampaignDescriptor, u32) -> Result<Entity> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
        tracing::info!("Registered entity factory: {}", kind);
    }

    /// Looks up the factory for the descriptor's kind without holding the map lock.
    pub fn factory_for(&self, kind: EntityKind) -> Result<EntityFactoryFn> {
        self.factories
            .get(&kind)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("No entity factory registered for {}", kind))
    }

    pub fn has_factory(&self, kind: EntityKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }
}
