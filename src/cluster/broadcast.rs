//! Descriptor broadcast and reply aggregation.
//!
//! The initiator sends the same descriptor to every member and waits for all replies.
//! Replies only feed logging and the final success flag; ranges were already fixed by
//! each member's own partitioning.

use super::node::NodeRunner;
use super::protocol::{ENDPOINT_RUN_CAMPAIGN, RunCampaignRequest, RunCampaignResponse};
use super::types::{CampaignSummary, NodeReply, NodeReport};
use crate::campaign::types::CampaignDescriptor;
use crate::error::{DatasetError, DatasetResult};
use crate::membership::types::{Node, NodeId};
use crate::membership::view::ClusterView;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait CampaignBroadcast: Send + Sync {
    /// Runs `descriptor` on every member and returns one reply per member.
    async fn broadcast(&self, descriptor: &CampaignDescriptor) -> Vec<NodeReply>;
}

/// Dispatches over HTTP to remote members and calls the local runner directly.
///
/// Dispatch is a single attempt: repeating a campaign request would run the member's
/// batches twice.
pub struct HttpBroadcast {
    view: Arc<dyn ClusterView>,
    local: Arc<NodeRunner>,
    http_client: reqwest::Client,
}

impl HttpBroadcast {
    pub fn new(view: Arc<dyn ClusterView>, local: Arc<NodeRunner>) -> Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Arc::new(Self {
            view,
            local,
            http_client,
        }))
    }

    fn dispatch(&self, member: Node, descriptor: CampaignDescriptor) -> JoinHandle<Result<NodeReport>> {
        if member.id == self.view.local_id() {
            let runner = self.local.clone();
            return tokio::spawn(async move { Ok::<_, anyhow::Error>(runner.run(&descriptor).await) });
        }

        let client = self.http_client.clone();
        let url = format!("http://{}{}", member.http_addr, ENDPOINT_RUN_CAMPAIGN);
        tokio::spawn(async move {
            tracing::debug!("Dispatching campaign to {} at {}", member.id, url);
            let response = client
                .post(url)
                .json(&RunCampaignRequest { descriptor })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(anyhow::anyhow!("Campaign dispatch failed: {}", response.status()));
            }
            let body: RunCampaignResponse = response.json().await?;
            Ok::<_, anyhow::Error>(body.report)
        })
    }
}

#[async_trait]
impl CampaignBroadcast for HttpBroadcast {
    async fn broadcast(&self, descriptor: &CampaignDescriptor) -> Vec<NodeReply> {
        let members = self.view.ordered_members();
        tracing::info!("Broadcasting campaign to {} members", members.len());

        let pending: Vec<(NodeId, JoinHandle<Result<NodeReport>>)> = members
            .into_iter()
            .map(|member| (member.id.clone(), self.dispatch(member, descriptor.clone())))
            .collect();

        collect(pending).await
    }
}

/// Runs every campaign on a fixed set of runners inside this process.
///
/// Each runner carries its own view, which makes it possible to simulate a whole
/// cluster without sockets.
pub struct InProcessBroadcast {
    runners: Vec<Arc<NodeRunner>>,
}

impl InProcessBroadcast {
    pub fn new(runners: Vec<Arc<NodeRunner>>) -> Arc<Self> {
        Arc::new(Self { runners })
    }
}

#[async_trait]
impl CampaignBroadcast for InProcessBroadcast {
    async fn broadcast(&self, descriptor: &CampaignDescriptor) -> Vec<NodeReply> {
        let pending = self
            .runners
            .iter()
            .map(|runner| {
                let id = runner.local_id();
                let runner = runner.clone();
                let descriptor = descriptor.clone();
                let handle: JoinHandle<Result<NodeReport>> =
                    tokio::spawn(async move { Ok::<_, anyhow::Error>(runner.run(&descriptor).await) });
                (id, handle)
            })
            .collect();

        collect(pending).await
    }
}

async fn collect(pending: Vec<(NodeId, JoinHandle<Result<NodeReport>>)>) -> Vec<NodeReply> {
    let mut replies = Vec::with_capacity(pending.len());
    for (node, handle) in pending {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(anyhow::anyhow!("Campaign task on {} aborted: {}", node, e)),
        };
        replies.push(NodeReply { node, outcome });
    }
    replies
}

/// Logs every reply and folds them into the campaign result.
///
/// The campaign fails if any member failed or could not be reached; the first such
/// member is reported.
pub fn aggregate(replies: Vec<NodeReply>) -> DatasetResult<CampaignSummary> {
    let mut created = 0u64;
    let mut reports = Vec::with_capacity(replies.len());
    let mut first_failure: Option<DatasetError> = None;

    for reply in replies {
        match reply.outcome {
            Ok(report) => {
                if report.is_success() {
                    tracing::info!("Node {} replied: {}", reply.node, report.message);
                } else {
                    let error = report.error.clone().unwrap_or_default();
                    tracing::error!("Node {} replied with error: {}", reply.node, error);
                    if first_failure.is_none() {
                        first_failure = Some(DatasetError::NodeFailure {
                            node: reply.node.to_string(),
                            cause: error,
                        });
                    }
                }
                created += report.created;
                reports.push(report);
            }
            Err(e) => {
                tracing::error!("Node {} did not reply: {:#}", reply.node, e);
                if first_failure.is_none() {
                    first_failure = Some(DatasetError::NodeFailure {
                        node: reply.node.to_string(),
                        cause: format!("{:#}", e),
                    });
                }
            }
        }
    }

    tracing::info!(
        "Campaign replies collected: {} reports, {} entities created in total",
        reports.len(),
        created
    );

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(CampaignSummary {
            nodes: reports.len(),
            created,
            reports,
        }),
    }
}
