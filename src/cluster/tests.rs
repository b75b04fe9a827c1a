//! Cluster Module Tests
//!
//! ## Test Scopes
//! - **Node runner**: each member derives its own range and reports what it created.
//! - **Aggregation**: the campaign fails as soon as one member failed or was unreachable.
//! - **Broadcast**: the in-process broadcast reaches every simulated member.

#[cfg(test)]
mod tests {
    use crate::campaign::types::{CampaignDescriptor, CampaignOperation, EntityKind, WorkRange};
    use crate::cluster::broadcast::{CampaignBroadcast, InProcessBroadcast, aggregate};
    use crate::cluster::node::NodeRunner;
    use crate::cluster::protocol::RunCampaignResponse;
    use crate::cluster::types::{NodeReply, NodeReport};
    use crate::error::DatasetError;
    use crate::executor::backend::MemoryBackend;
    use crate::executor::executor::BatchExecutor;
    use crate::executor::factory::FactoryRegistry;
    use crate::membership::types::{Node, NodeId};
    use crate::membership::view::StaticView;
    use std::sync::Arc;

    fn node(id: &str, port: u16) -> Node {
        Node::alive(
            NodeId(id.to_string()),
            format!("127.0.0.1:{}", port).parse().unwrap(),
            format!("127.0.0.1:{}", port + 1000).parse().unwrap(),
        )
    }

    fn members() -> Vec<Node> {
        vec![node("node-c", 5002), node("node-a", 5000), node("node-b", 5001)]
    }

    fn descriptor(count: u32, cluster_size: usize) -> CampaignDescriptor {
        CampaignDescriptor {
            kind: EntityKind::Realms,
            realm: None,
            prefix: "realm-".to_string(),
            start: 0,
            count,
            batch_size: 3,
            concurrency: 2,
            transaction_timeout_secs: 300,
            cluster_size,
            operation: CampaignOperation::Create,
            event_realms: None,
        }
    }

    fn runner(local: &str, members: Vec<Node>, backend: Arc<MemoryBackend>) -> Arc<NodeRunner> {
        let executor = BatchExecutor::new(backend, FactoryRegistry::with_standard_factories());
        let view = Arc::new(StaticView::new(NodeId(local.to_string()), members));
        NodeRunner::new(view, executor)
    }

    fn report(node: &str, created: u64, error: Option<&str>) -> NodeReport {
        NodeReport {
            node: NodeId(node.to_string()),
            ordinal: Some(0),
            cluster_size: 2,
            range: WorkRange::new(0, created as u32),
            created,
            batches: 1,
            failed_batches: usize::from(error.is_some()),
            duration_ms: 1,
            message: format!("Created {} realms", created),
            error: error.map(str::to_string),
        }
    }

    // ============================================================
    // NODE RUNNER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_runner_takes_its_ordinal_range() {
        // ARRANGE: Member list arrives unsorted, node-c is last once ordered
        let backend = Arc::new(MemoryBackend::new());
        let runner = runner("node-c", members(), backend.clone());

        // ACT
        let report = runner.run(&descriptor(10, 3)).await;

        // ASSERT
        assert!(report.is_success(), "unexpected error: {:?}", report.error);
        assert_eq!(report.ordinal, Some(2));
        assert_eq!(report.range, WorkRange::new(6, 10));
        assert_eq!(report.created, 4);
        assert_eq!(report.batches, 2);
        assert!(report.message.starts_with("Created 4 realms"));
        assert!(backend.get(EntityKind::Realms, None, "realm-6").is_some());
        assert!(backend.get(EntityKind::Realms, None, "realm-5").is_none());
    }

    #[tokio::test]
    async fn test_runner_follows_own_view_on_size_mismatch() {
        // ARRANGE: Planned for 3, but this node only sees itself
        let backend = Arc::new(MemoryBackend::new());
        let runner = runner("node-a", vec![node("node-a", 5000)], backend.clone());

        // ACT
        let report = runner.run(&descriptor(9, 3)).await;

        // ASSERT
        assert!(report.is_success());
        assert_eq!(report.cluster_size, 1);
        assert_eq!(report.range, WorkRange::new(0, 9));
        assert_eq!(backend.count(EntityKind::Realms, None), 9);
    }

    #[tokio::test]
    async fn test_runner_outside_its_view_reports_error() {
        let backend = Arc::new(MemoryBackend::new());
        let runner = runner("stranger", members(), backend.clone());

        let report = runner.run(&descriptor(10, 3)).await;

        assert!(!report.is_success());
        assert_eq!(report.ordinal, None);
        assert_eq!(report.created, 0);
        assert_eq!(backend.count(EntityKind::Realms, None), 0);
    }

    #[tokio::test]
    async fn test_runner_reports_batch_failures() {
        // ARRANGE: Users need a realm that was never created
        let backend = Arc::new(MemoryBackend::new());
        let runner = runner("node-a", vec![node("node-a", 5000)], backend);
        let mut users = descriptor(6, 1);
        users.kind = EntityKind::Users;
        users.realm = Some("missing".to_string());
        users.prefix = "user-".to_string();

        // ACT
        let report = runner.run(&users).await;

        // ASSERT
        assert_eq!(report.created, 0);
        assert_eq!(report.failed_batches, 2);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_report_wire_format() {
        let response = RunCampaignResponse {
            report: report("node-a", 5, None),
        };

        let json = serde_json::to_string(&response).unwrap();
        let decoded: RunCampaignResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.report, response.report);
    }

    // ============================================================
    // AGGREGATION TESTS
    // ============================================================

    #[test]
    fn test_aggregate_sums_successful_replies() {
        let replies = vec![
            NodeReply {
                node: NodeId("node-a".to_string()),
                outcome: Ok(report("node-a", 5, None)),
            },
            NodeReply {
                node: NodeId("node-b".to_string()),
                outcome: Ok(report("node-b", 6, None)),
            },
        ];

        let summary = aggregate(replies).unwrap();

        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.created, 11);
    }

    #[test]
    fn test_aggregate_reports_first_failed_member() {
        let replies = vec![
            NodeReply {
                node: NodeId("node-a".to_string()),
                outcome: Ok(report("node-a", 5, None)),
            },
            NodeReply {
                node: NodeId("node-b".to_string()),
                outcome: Err(anyhow::anyhow!("connection refused")),
            },
            NodeReply {
                node: NodeId("node-c".to_string()),
                outcome: Ok(report("node-c", 2, Some("batch 1 failed"))),
            },
        ];

        let result = aggregate(replies);

        match result {
            Err(DatasetError::NodeFailure { node, cause }) => {
                assert_eq!(node, "node-b");
                assert!(cause.contains("connection refused"));
            }
            other => panic!("expected node failure, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_of_no_replies_is_empty_success() {
        let summary = aggregate(Vec::new()).unwrap();

        assert_eq!(summary.nodes, 0);
        assert_eq!(summary.created, 0);
    }

    // ============================================================
    // BROADCAST TESTS
    // ============================================================

    #[tokio::test]
    async fn test_in_process_broadcast_covers_global_range() {
        // ARRANGE
        let backend = Arc::new(MemoryBackend::new());
        let runners = ["node-a", "node-b", "node-c"]
            .into_iter()
            .map(|id| runner(id, members(), backend.clone()))
            .collect();
        let broadcast = InProcessBroadcast::new(runners);

        // ACT
        let replies = broadcast.broadcast(&descriptor(50, 3)).await;
        let summary = aggregate(replies).unwrap();

        // ASSERT
        assert_eq!(summary.created, 50);
        assert_eq!(backend.count(EntityKind::Realms, None), 50);
        let mut ranges: Vec<WorkRange> = summary.reports.iter().map(|r| r.range).collect();
        ranges.sort_by_key(|range| range.start);
        assert_eq!(
            ranges,
            vec![WorkRange::new(0, 16), WorkRange::new(16, 32), WorkRange::new(32, 50)]
        );
    }
}
