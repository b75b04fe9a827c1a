//! Node and campaign configuration.
//!
//! [`NodeArgs`] is the command line of the node binary. [`CampaignConfig`] is the
//! body of a campaign trigger, using the same kebab-case parameter names and defaults
//! as the dataset provider's query parameters.

use crate::campaign::types::{CampaignDescriptor, CampaignOperation, EntityKind};
use crate::error::{DatasetError, DatasetResult};

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ENTITIES_PER_TRANSACTION: u32 = 10;
pub const DEFAULT_THREADS_COUNT: usize = 5;
pub const DEFAULT_TRANSACTION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_REALM_PREFIX: &str = "realm-";
/// Realms are removed one per transaction unless told otherwise.
pub const DEFAULT_REALMS_PER_REMOVAL: u32 = 1;

/// Command line arguments of a cluster node.
#[derive(Parser, Debug, Clone)]
#[command(name = "dataset-node")]
#[command(about = "Cluster node that provisions synthetic datasets in bulk")]
pub struct NodeArgs {
    /// UDP address for gossip membership
    #[arg(long)]
    pub bind: SocketAddr,

    /// Gossip address of an existing member (repeatable). Omit to found a new cluster.
    #[arg(long = "seed")]
    pub seeds: Vec<SocketAddr>,

    /// The HTTP port is the gossip port plus this offset
    #[arg(long, default_value = "1000")]
    pub http_port_offset: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Realm created in the cluster-wide entity store at startup unless present (repeatable)
    #[arg(long = "preload-realm")]
    pub preload_realms: Vec<String>,
}

impl NodeArgs {
    pub fn http_addr(&self) -> DatasetResult<SocketAddr> {
        let port = self
            .bind
            .port()
            .checked_add(self.http_port_offset)
            .ok_or_else(|| {
                DatasetError::Configuration(format!(
                    "HTTP port {} + {} is out of range",
                    self.bind.port(),
                    self.http_port_offset
                ))
            })?;
        Ok(SocketAddr::new(self.bind.ip(), port))
    }

    pub fn max_log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// Parameters of one campaign trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CampaignConfig {
    pub kind: EntityKind,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub realm_name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Realm family events are spread over. Only used for events.
    #[serde(default)]
    pub realm_prefix: Option<String>,
    #[serde(default = "default_entities_per_transaction")]
    pub entities_per_transaction: u32,
    #[serde(default = "default_threads_count")]
    pub threads_count: usize,
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout: u64,
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,
}

fn default_entities_per_transaction() -> u32 {
    DEFAULT_ENTITIES_PER_TRANSACTION
}

fn default_threads_count() -> usize {
    DEFAULT_THREADS_COUNT
}

fn default_transaction_timeout() -> u64 {
    DEFAULT_TRANSACTION_TIMEOUT_SECS
}

fn default_task_timeout() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

impl CampaignConfig {
    pub fn new(kind: EntityKind, count: u32) -> Self {
        Self {
            kind,
            count: Some(count),
            realm_name: None,
            prefix: None,
            realm_prefix: None,
            entities_per_transaction: DEFAULT_ENTITIES_PER_TRANSACTION,
            threads_count: DEFAULT_THREADS_COUNT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT_SECS,
            task_timeout: DEFAULT_TASK_TIMEOUT_SECS,
        }
    }

    pub fn in_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm_name = Some(realm.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_batch_size(mut self, entities_per_transaction: u32) -> Self {
        self.entities_per_transaction = entities_per_transaction;
        self
    }

    pub fn with_threads(mut self, threads_count: usize) -> Self {
        self.threads_count = threads_count;
        self
    }

    pub fn with_task_timeout(mut self, secs: u64) -> Self {
        self.task_timeout = secs;
        self
    }

    pub fn with_realm_prefix(mut self, realm_prefix: impl Into<String>) -> Self {
        self.realm_prefix = Some(realm_prefix.into());
        self
    }

    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| self.kind.default_prefix().to_string())
    }

    pub fn realm_prefix(&self) -> String {
        self.realm_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_REALM_PREFIX.to_string())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }

    /// Rejects anything that would make the campaign meaningless before any state is touched.
    pub fn validate(&self) -> DatasetResult<()> {
        if self.count.is_none() {
            return Err(config_error("Parameter 'count' is required"));
        }
        if self.entities_per_transaction == 0 {
            return Err(config_error("Parameter 'entities-per-transaction' must be at least 1"));
        }
        if self.threads_count == 0 {
            return Err(config_error("Parameter 'threads-count' must be at least 1"));
        }
        if self.transaction_timeout == 0 {
            return Err(config_error("Parameter 'transaction-timeout' must be at least 1"));
        }
        if self.task_timeout == 0 {
            return Err(config_error("Parameter 'task-timeout' must be at least 1"));
        }
        if self.kind.requires_realm() && self.realm_name.as_deref().is_none_or(str::is_empty) {
            return Err(config_error(&format!(
                "Parameter 'realm-name' is required when creating {}",
                self.kind
            )));
        }
        Ok(())
    }

    /// Fixes the campaign at `start` for a cluster of `cluster_size` members.
    pub fn into_descriptor(&self, start: u32, cluster_size: usize) -> DatasetResult<CampaignDescriptor> {
        self.validate()?;
        let count = self.count.unwrap_or_default();

        if start.checked_add(count).is_none() {
            return Err(config_error(&format!(
                "Creating {} {} from index {} overflows the index space",
                count, self.kind, start
            )));
        }

        Ok(CampaignDescriptor {
            kind: self.kind,
            realm: if self.kind.requires_realm() {
                self.realm_name.clone()
            } else {
                None
            },
            prefix: self.prefix(),
            start,
            count,
            batch_size: self.entities_per_transaction,
            concurrency: self.threads_count,
            transaction_timeout_secs: self.transaction_timeout,
            cluster_size,
            operation: CampaignOperation::Create,
            event_realms: None,
        })
    }
}

/// Parameters of a realm removal trigger.
///
/// Either `remove-all` removes every realm of the prefix, or `first-to-remove` (inclusive)
/// and `last-to-remove` (exclusive) bound the removed indices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RemovalConfig {
    #[serde(default)]
    pub realm_prefix: Option<String>,
    #[serde(default)]
    pub remove_all: bool,
    #[serde(default)]
    pub first_to_remove: Option<u32>,
    #[serde(default)]
    pub last_to_remove: Option<u32>,
    #[serde(default = "default_realms_per_removal")]
    pub entities_per_transaction: u32,
    #[serde(default = "default_threads_count")]
    pub threads_count: usize,
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout: u64,
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,
}

fn default_realms_per_removal() -> u32 {
    DEFAULT_REALMS_PER_REMOVAL
}

impl RemovalConfig {
    pub fn all() -> Self {
        Self {
            realm_prefix: None,
            remove_all: true,
            first_to_remove: None,
            last_to_remove: None,
            entities_per_transaction: DEFAULT_REALMS_PER_REMOVAL,
            threads_count: DEFAULT_THREADS_COUNT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT_SECS,
            task_timeout: DEFAULT_TASK_TIMEOUT_SECS,
        }
    }

    pub fn range(first_to_remove: u32, last_to_remove: u32) -> Self {
        Self {
            remove_all: false,
            first_to_remove: Some(first_to_remove),
            last_to_remove: Some(last_to_remove),
            ..Self::all()
        }
    }

    pub fn with_realm_prefix(mut self, realm_prefix: impl Into<String>) -> Self {
        self.realm_prefix = Some(realm_prefix.into());
        self
    }

    pub fn realm_prefix(&self) -> String {
        self.realm_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_REALM_PREFIX.to_string())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if !self.remove_all && (self.first_to_remove.is_none() || self.last_to_remove.is_none()) {
            return Err(config_error(
                "Either remove-all need to be true OR both first-to-remove and last-to-remove need to be filled",
            ));
        }
        if let (Some(first), Some(last)) = (self.first_to_remove, self.last_to_remove)
            && !self.remove_all
            && first > last
        {
            return Err(config_error(&format!(
                "Parameter 'first-to-remove' ({}) is after 'last-to-remove' ({})",
                first, last
            )));
        }
        if self.entities_per_transaction == 0 {
            return Err(config_error("Parameter 'entities-per-transaction' must be at least 1"));
        }
        if self.threads_count == 0 {
            return Err(config_error("Parameter 'threads-count' must be at least 1"));
        }
        if self.transaction_timeout == 0 || self.task_timeout == 0 {
            return Err(config_error("Timeouts must be at least 1 second"));
        }
        Ok(())
    }

    /// Removal of realms `[start, end)`. `end` is the first free index for `remove-all`.
    pub fn into_descriptor(&self, end_if_all: u32, cluster_size: usize) -> DatasetResult<CampaignDescriptor> {
        self.validate()?;
        let (start, end) = if self.remove_all {
            (0, end_if_all)
        } else {
            (
                self.first_to_remove.unwrap_or_default(),
                self.last_to_remove.unwrap_or_default(),
            )
        };

        Ok(CampaignDescriptor {
            kind: EntityKind::Realms,
            realm: None,
            prefix: self.realm_prefix(),
            start,
            count: end.saturating_sub(start),
            batch_size: self.entities_per_transaction,
            concurrency: self.threads_count,
            transaction_timeout_secs: self.transaction_timeout,
            cluster_size,
            operation: CampaignOperation::Remove,
            event_realms: None,
        })
    }
}

fn config_error(message: &str) -> DatasetError {
    DatasetError::Configuration(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_from_json() {
        let config: CampaignConfig =
            serde_json::from_str(r#"{"kind":"users","count":100,"realm-name":"realm-0"}"#).unwrap();

        assert_eq!(config.entities_per_transaction, 10);
        assert_eq!(config.threads_count, 5);
        assert_eq!(config.transaction_timeout, 300);
        assert_eq!(config.task_timeout, 3600);
        assert_eq!(config.prefix(), "user-");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_count_is_configuration_error() {
        let config: CampaignConfig = serde_json::from_str(r#"{"kind":"realms"}"#).unwrap();

        assert!(matches!(config.validate(), Err(DatasetError::Configuration(_))));
    }

    #[test]
    fn test_realm_required_for_users() {
        let config = CampaignConfig::new(EntityKind::Users, 10);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("realm-name"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = CampaignConfig::new(EntityKind::Realms, 10).with_batch_size(0);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descriptor_carries_parameters() {
        let config = CampaignConfig::new(EntityKind::Clients, 50)
            .in_realm("realm-3")
            .with_prefix("app-")
            .with_threads(8);

        let descriptor = config.into_descriptor(120, 3).unwrap();

        assert_eq!(descriptor.start, 120);
        assert_eq!(descriptor.end(), 170);
        assert_eq!(descriptor.prefix, "app-");
        assert_eq!(descriptor.concurrency, 8);
        assert_eq!(descriptor.realm.as_deref(), Some("realm-3"));
        assert_eq!(descriptor.cluster_size, 3);
    }

    #[test]
    fn test_descriptor_rejects_overflowing_range() {
        let config = CampaignConfig::new(EntityKind::Realms, 10);

        assert!(config.into_descriptor(u32::MAX - 5, 1).is_err());
    }

    #[test]
    fn test_removal_needs_all_or_both_bounds() {
        let config: RemovalConfig = serde_json::from_str(r#"{"first-to-remove":3}"#).unwrap();

        assert!(matches!(config.validate(), Err(DatasetError::Configuration(_))));
        assert!(RemovalConfig::range(5, 2).validate().is_err());
        assert!(RemovalConfig::all().validate().is_ok());
    }

    #[test]
    fn test_removal_descriptor_covers_requested_range() {
        let descriptor = RemovalConfig::range(2, 7).into_descriptor(100, 2).unwrap();

        assert_eq!(descriptor.operation, CampaignOperation::Remove);
        assert_eq!(descriptor.global_range(), crate::campaign::types::WorkRange::new(2, 7));
        assert_eq!(descriptor.batch_size, 1);
        assert_eq!(descriptor.describe(), "Removal of 5 realms from realm-2 to realm-6");

        let everything = RemovalConfig::all().into_descriptor(40, 2).unwrap();
        assert_eq!(everything.global_range(), crate::campaign::types::WorkRange::new(0, 40));
    }

    #[test]
    fn test_http_addr_uses_offset() {
        let args = NodeArgs::parse_from(["dataset-node", "--bind", "127.0.0.1:5000", "--seed", "127.0.0.1:4000"]);

        assert_eq!(args.http_addr().unwrap().port(), 6000);
        assert_eq!(args.seeds.len(), 1);
        assert_eq!(args.max_log_level(), tracing::Level::INFO);
    }
}
