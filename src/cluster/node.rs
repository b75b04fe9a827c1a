use super::types::NodeReport;
use crate::campaign::partition::partition;
use crate::campaign::progress::ProgressCounter;
use crate::campaign::types::{CampaignDescriptor, WorkRange};
use crate::error::DatasetError;
use crate::executor::executor::BatchExecutor;
use crate::membership::types::NodeId;
use crate::membership::view::ClusterView;

use std::sync::Arc;
use std::time::Instant;

/// Runs the local share of a broadcast campaign.
///
/// The ordinal comes from this node's own membership view at the moment the
/// descriptor arrives. A view that disagrees with the initiator's snapshot is logged
/// but not corrected.
pub struct NodeRunner {
    view: Arc<dyn ClusterView>,
    executor: Arc<BatchExecutor>,
}

impl NodeRunner {
    pub fn new(view: Arc<dyn ClusterView>, executor: Arc<BatchExecutor>) -> Arc<Self> {
        Arc::new(Self { view, executor })
    }

    pub fn local_id(&self) -> NodeId {
        self.view.local_id()
    }

    pub async fn run(&self, descriptor: &CampaignDescriptor) -> NodeReport {
        let started = Instant::now();
        let local = self.view.local_id();
        let members: Vec<NodeId> = self
            .view
            .ordered_members()
            .into_iter()
            .map(|node| node.id)
            .collect();
        let ordinal = members.iter().position(|id| id == &local);

        tracing::info!(
            "Node {} received campaign '{}' (ordinal {:?}, cluster size {})",
            local,
            descriptor.describe(),
            ordinal,
            members.len()
        );
        tracing::debug!("Campaign descriptor: {:?}", descriptor);

        if members.len() != descriptor.cluster_size {
            tracing::warn!(
                "Node {} sees {} members but the campaign was planned for {}",
                local,
                members.len(),
                descriptor.cluster_size
            );
        }

        let empty = WorkRange::new(descriptor.start, descriptor.start);
        let Some(ordinal) = ordinal else {
            return self.failed_report(
                local,
                None,
                members.len(),
                empty,
                started,
                "Local node is not an alive member of its own view".to_string(),
            );
        };

        let range = match partition(descriptor, &members, ordinal) {
            Ok(range) => range,
            Err(e) => {
                return self.failed_report(local, Some(ordinal), members.len(), empty, started, e.to_string());
            }
        };

        tracing::info!(
            "Node {} (ordinal {}) assigned {} {} in range {}",
            local,
            ordinal,
            range.len(),
            descriptor.kind,
            range
        );

        let counter = Arc::new(ProgressCounter::new(descriptor));
        let result = self.executor.run(descriptor, range, counter).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(summary) => {
                let message = format!(
                    "{} {} {}. Took {} ms",
                    descriptor.operation.verb(),
                    summary.created,
                    descriptor.kind,
                    duration_ms
                );
                tracing::info!("Node {} finished: {}", local, message);
                NodeReport {
                    node: local,
                    ordinal: Some(ordinal),
                    cluster_size: members.len(),
                    range,
                    created: summary.created,
                    batches: summary.batches,
                    failed_batches: 0,
                    duration_ms,
                    message,
                    error: None,
                }
            }
            Err(DatasetError::BatchFailure {
                failed_batches,
                total_batches,
                created,
                first_cause,
            }) => {
                let message = format!(
                    "{} {} {}, {} of {} batches failed. Took {} ms",
                    descriptor.operation.verb(),
                    created,
                    descriptor.kind,
                    failed_batches,
                    total_batches,
                    duration_ms
                );
                tracing::error!("Node {} finished with failures: {}", local, message);
                NodeReport {
                    node: local,
                    ordinal: Some(ordinal),
                    cluster_size: members.len(),
                    range,
                    created,
                    batches: total_batches,
                    failed_batches,
                    duration_ms,
                    message,
                    error: Some(format!("{:#}", first_cause)),
                }
            }
            Err(e) => self.failed_report(local, Some(ordinal), members.len(), range, started, e.to_string()),
        }
    }

    fn failed_report(
        &self,
        node: NodeId,
        ordinal: Option<usize>,
        cluster_size: usize,
        range: WorkRange,
        started: Instant,
        error: String,
    ) -> NodeReport {
        tracing::error!("Node {} could not run its share: {}", node, error);
        NodeReport {
            node,
            ordinal,
            cluster_size,
            range,
            created: 0,
            batches: 0,
            failed_batches: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            message: format!("Created 0 entities. {}", error),
            error: Some(error),
        }
    }
}
