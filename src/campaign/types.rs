use crate::storage::types::now_ms;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The kinds of synthetic entities a campaign can create.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Realms,
    Clients,
    Users,
    Sessions,
    Events,
}

impl EntityKind {
    pub fn default_prefix(self) -> &'static str {
        match self {
            EntityKind::Realms => "realm-",
            EntityKind::Clients => "client-",
            EntityKind::Users => "user-",
            EntityKind::Sessions => "session-",
            EntityKind::Events => "event-",
        }
    }

    /// Clients, users and sessions live inside one existing realm. Events are spread
    /// over a whole family of realms instead.
    pub fn requires_realm(self) -> bool {
        !matches!(self, EntityKind::Realms | EntityKind::Events)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Realms => "realms",
            EntityKind::Clients => "clients",
            EntityKind::Users => "users",
            EntityKind::Sessions => "sessions",
            EntityKind::Events => "events",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realms" => Ok(EntityKind::Realms),
            "clients" => Ok(EntityKind::Clients),
            "users" => Ok(EntityKind::Users),
            "sessions" => Ok(EntityKind::Sessions),
            "events" => Ok(EntityKind::Events),
            other => Err(format!("Unknown entity kind '{}'", other)),
        }
    }
}

/// Whether a campaign adds entities or deletes them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignOperation {
    #[default]
    Create,
    Remove,
}

impl CampaignOperation {
    /// Past tense used in progress and report messages.
    pub fn verb(self) -> &'static str {
        match self {
            CampaignOperation::Create => "Created",
            CampaignOperation::Remove => "Removed",
        }
    }
}

/// The realms `prefix + 0 .. prefix + count` an event campaign spreads over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealmSpan {
    pub prefix: String,
    pub count: u32,
}

impl RealmSpan {
    /// Realm receiving the entity at `index`, round-robin over the span.
    pub fn realm_for(&self, index: u32) -> String {
        format!("{}{}", self.prefix, index % self.count.max(1))
    }
}

/// Immutable description of one campaign.
///
/// Built once by the trigger and broadcast unmodified to every node. `cluster_size`
/// is the size of the initiator's view at trigger time, kept for diagnostics; each
/// node partitions with its own view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDescriptor {
    pub kind: EntityKind,
    pub realm: Option<String>,
    pub prefix: String,
    pub start: u32,
    pub count: u32,
    pub batch_size: u32,
    pub concurrency: usize,
    pub transaction_timeout_secs: u64,
    pub cluster_size: usize,
    #[serde(default)]
    pub operation: CampaignOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_realms: Option<RealmSpan>,
}

impl CampaignDescriptor {
    /// Exclusive end of the global range. Validation guarantees it fits in `u32`.
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.count)
    }

    pub fn global_range(&self) -> WorkRange {
        WorkRange::new(self.start, self.end())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    pub fn entity_name(&self, index: u32) -> String {
        format!("{}{}", self.prefix, index)
    }

    pub fn realm_name(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Human readable campaign message stored in the campaign record.
    pub fn describe(&self) -> String {
        if self.operation == CampaignOperation::Remove {
            return format!(
                "Removal of {} {} from {} to {}",
                self.count,
                self.kind,
                self.entity_name(self.start),
                self.entity_name(self.end().saturating_sub(1))
            );
        }

        match (&self.kind, &self.realm) {
            (EntityKind::Realms, _) => format!(
                "Creation of {} realms from {} to {}",
                self.count,
                self.entity_name(self.start),
                self.entity_name(self.end().saturating_sub(1))
            ),
            (kind, Some(realm)) => {
                format!("Creation of {} {} in the realm {}", self.count, kind, realm)
            }
            (kind, None) => format!("Creation of {} {}", self.count, kind),
        }
    }
}

/// Shared status record stored under the campaign lock key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRecord {
    pub message: String,
    pub start_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl CampaignRecord {
    pub fn started(message: impl Into<String>, start_time_ms: u64) -> Self {
        Self {
            message: message.into(),
            start_time_ms,
            end_time_ms: None,
            success: None,
        }
    }

    pub fn finished(&self, success: bool, end_time_ms: u64) -> Self {
        Self {
            message: self.message.clone(),
            start_time_ms: self.start_time_ms,
            end_time_ms: Some(end_time_ms),
            success: Some(success),
        }
    }

    pub fn is_running(&self) -> bool {
        self.end_time_ms.is_none()
    }

    /// Time from start to end, or to `now` while still running.
    pub fn elapsed_ms(&self, now: u64) -> u64 {
        self.end_time_ms
            .unwrap_or(now)
            .saturating_sub(self.start_time_ms)
    }
}

impl fmt::Display for CampaignRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = now_ms();
        write!(
            f,
            "{}, running: {}, time: {}s, started: {}, ended: {}",
            self.message,
            self.is_running(),
            self.elapsed_ms(now) / 1000,
            self.start_time_ms,
            self.end_time_ms.unwrap_or(now)
        )
    }
}

/// Half-open index interval `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkRange {
    pub start: u32,
    pub end: u32,
}

impl WorkRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Consecutive batches of at most `batch_size` indices covering the range exactly.
    pub fn batches(&self, batch_size: u32) -> Vec<BatchJob> {
        let batch_size = batch_size.max(1);
        let mut jobs = Vec::with_capacity(self.len().div_ceil(batch_size) as usize);
        let mut start = self.start;

        while start < self.end {
            let end = start.saturating_add(batch_size).min(self.end);
            jobs.push(BatchJob {
                index: jobs.len(),
                start,
                end,
            });
            start = end;
        }

        jobs
    }
}

impl fmt::Display for WorkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One transactional unit carved from a node's work range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchJob {
    /// Position of the batch within its work range.
    pub index: usize,
    pub start: u32,
    pub end: u32,
}

impl BatchJob {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Answer of the status interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CampaignStatus {
    Idle,
    Running {
        message: String,
        elapsed_ms: u64,
    },
    Completed {
        message: String,
        success: bool,
        elapsed_ms: u64,
    },
}
