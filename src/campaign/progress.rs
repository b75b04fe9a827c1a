use super::types::{CampaignDescriptor, CampaignRecord, CampaignStatus};
use crate::storage::types::now_ms;

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

/// Start time, message and outcome of one campaign, as seen by its initiator.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    record: CampaignRecord,
}

impl ProgressTracker {
    pub fn start(message: impl Into<String>) -> Self {
        Self {
            record: CampaignRecord::started(message, now_ms()),
        }
    }

    /// The record as stored in the lock while the campaign runs.
    pub fn record(&self) -> &CampaignRecord {
        &self.record
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.record.elapsed_ms(now_ms())
    }

    pub fn note(&self, event: impl Display) {
        tracing::info!(
            "{}, time since start of '{}': {} ms",
            event,
            self.record.message,
            self.elapsed_ms()
        );
    }

    pub fn debug(&self, event: impl Display) {
        tracing::debug!(
            "{}, time since start of '{}': {} ms",
            event,
            self.record.message,
            self.elapsed_ms()
        );
    }

    /// The finished record to publish before the lock is released.
    pub fn complete(&self, success: bool) -> CampaignRecord {
        let finished = self.record.finished(success, now_ms());
        if success {
            self.note("Campaign finished successfully");
        } else {
            self.note("Campaign finished with failures");
        }
        finished
    }
}

/// Running wins over completed; neither means idle.
pub fn status_of(
    running: Option<CampaignRecord>,
    completed: Option<CampaignRecord>,
    now: u64,
) -> CampaignStatus {
    if let Some(record) = running {
        return CampaignStatus::Running {
            elapsed_ms: record.elapsed_ms(now),
            message: record.message,
        };
    }

    match completed {
        Some(record) => CampaignStatus::Completed {
            elapsed_ms: record.elapsed_ms(now),
            success: record.success.unwrap_or(false),
            message: record.message,
        },
        None => CampaignStatus::Idle,
    }
}

/// Node-local count of created entities.
///
/// Logs a milestone every `20 * batch_size` entities. Only used for logging; nodes
/// never exchange or sum counters for correctness.
pub struct ProgressCounter {
    created: AtomicU64,
    milestone: u64,
    verb: &'static str,
    kind: String,
    label: String,
    started_at_ms: u64,
}

impl ProgressCounter {
    pub fn new(descriptor: &CampaignDescriptor) -> Self {
        Self {
            created: AtomicU64::new(0),
            milestone: (20 * descriptor.batch_size as u64).max(1),
            verb: descriptor.operation.verb(),
            kind: descriptor.kind.to_string(),
            label: descriptor.describe(),
            started_at_ms: now_ms(),
        }
    }

    pub fn add(&self, created: u64) -> u64 {
        let before = self.created.fetch_add(created, Ordering::SeqCst);
        let after = before + created;

        if after / self.milestone > before / self.milestone {
            tracing::info!(
                "{} {} {}, time since start of '{}': {} ms",
                self.verb,
                after,
                self.kind,
                self.label,
                now_ms().saturating_sub(self.started_at_ms)
            );
        }

        after
    }

    pub fn get(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}
