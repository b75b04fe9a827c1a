//! Executor Module Tests
//!
//! ## Test Scopes
//! - **Registry**: factory registration, lookup and failures.
//! - **Batch accounting**: slicing, worker bound and committed counts.
//! - **Failure handling**: sibling batches keep running, the error surfaces after the barrier,
//!   and a failed batch commits nothing.
//! - **Removal**: batched deletes, cascade of realm contents.
//! - **Cluster backend**: local home versus unreachable home.
//! - **Entities**: deterministic synthetic content.

#[cfg(test)]
mod tests {
    use crate::campaign::progress::ProgressCounter;
    use crate::campaign::types::{CampaignDescriptor, CampaignOperation, EntityKind, RealmSpan, WorkRange};
    use crate::error::DatasetError;
    use crate::executor::backend::{EntityBackend, MemoryBackend};
    use crate::executor::cluster::ClusterEntityBackend;
    use crate::executor::entities::{self, assign};
    use crate::executor::executor::BatchExecutor;
    use crate::executor::factory::FactoryRegistry;
    use crate::executor::types::Entity;
    use crate::membership::types::{Node, NodeId};
    use crate::membership::view::{ClusterView, StaticView};
    use dashmap::DashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn descriptor(kind: EntityKind, count: u32, batch_size: u32, concurrency: usize) -> CampaignDescriptor {
        CampaignDescriptor {
            kind,
            realm: kind.requires_realm().then(|| "realm-0".to_string()),
            prefix: kind.default_prefix().to_string(),
            start: 0,
            count,
            batch_size,
            concurrency,
            transaction_timeout_secs: 300,
            cluster_size: 1,
            operation: CampaignOperation::Create,
            event_realms: None,
        }
    }

    fn counter(descriptor: &CampaignDescriptor) -> Arc<ProgressCounter> {
        Arc::new(ProgressCounter::new(descriptor))
    }

    fn noop_entity(descriptor: &CampaignDescriptor, index: u32) -> anyhow::Result<Entity> {
        Ok(Entity::new(descriptor.entity_name(index), serde_json::json!({})))
    }

    // ============================================================
    // TEST 1: FactoryRegistry
    // ============================================================

    #[test]
    fn test_registry_register_and_lookup() {
        // ARRANGE
        let registry = FactoryRegistry::new();
        registry.register(EntityKind::Users, noop_entity);
        let descriptor = descriptor(EntityKind::Users, 1, 1, 1);

        // ACT
        let factory = registry.factory_for(descriptor.kind).unwrap();
        let entity = factory(&descriptor, 7).unwrap();

        // ASSERT
        assert!(registry.has_factory(EntityKind::Users));
        assert_eq!(registry.factory_count(), 1);
        assert_eq!(entity.name, "user-7");
    }

    #[test]
    fn test_registry_unknown_kind_returns_error() {
        let registry = FactoryRegistry::new();
        let descriptor = descriptor(EntityKind::Clients, 1, 1, 1);

        let result = registry.factory_for(descriptor.kind);

        match result {
            Err(e) => assert!(e.to_string().contains("No entity factory")),
            Ok(_) => panic!("expected missing factory error"),
        }
    }

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = FactoryRegistry::with_standard_factories();

        for kind in [
            EntityKind::Realms,
            EntityKind::Clients,
            EntityKind::Users,
            EntityKind::Sessions,
            EntityKind::Events,
        ] {
            assert!(registry.has_factory(kind), "missing {}", kind);
        }
        assert_eq!(registry.factory_count(), 5);
    }

    // ============================================================
    // TEST 2: Batch accounting
    // ============================================================

    #[tokio::test]
    async fn test_batch_accounting_37_entities() {
        // ARRANGE
        let backend = Arc::new(MemoryBackend::with_realms(["realm-0"]));
        let registry = FactoryRegistry::new();
        registry.register(EntityKind::Users, noop_entity);
        let executor = BatchExecutor::new(backend.clone(), registry);
        let descriptor = descriptor(EntityKind::Users, 37, 10, 4);
        let progress = counter(&descriptor);

        // ACT
        let summary = executor
            .run(&descriptor, WorkRange::new(0, 37), progress.clone())
            .await
            .expect("all batches should succeed");

        // ASSERT
        assert_eq!(summary.created, 37);
        assert_eq!(summary.batches, 4);
        assert_eq!(summary.failed, 0);
        assert_eq!(backend.commit_count(), 4);
        assert_eq!(backend.count(EntityKind::Users, Some("realm-0")), 37);
        assert_eq!(progress.get(), 37);
    }

    #[tokio::test]
    async fn test_workers_never_exceed_concurrency() {
        // ARRANGE: Each factory call holds a slot briefly
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let registry = FactoryRegistry::new();
        {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            registry.register(EntityKind::Realms, move |descriptor, index| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                noop_entity(descriptor, index)
            });
        }
        let backend = Arc::new(MemoryBackend::new());
        let executor = BatchExecutor::new(backend.clone(), registry);
        let descriptor = descriptor(EntityKind::Realms, 40, 5, 2);

        // ACT
        let summary = executor
            .run(&descriptor, WorkRange::new(0, 40), counter(&descriptor))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(summary.created, 40);
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak was {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_range_creates_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let executor = BatchExecutor::new(backend.clone(), FactoryRegistry::with_standard_factories());
        let descriptor = descriptor(EntityKind::Realms, 0, 10, 4);

        let summary = executor
            .run(&descriptor, WorkRange::new(5, 5), counter(&descriptor))
            .await
            .unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(summary.batches, 0);
        assert_eq!(backend.commit_count(), 0);
    }

    // ============================================================
    // TEST 3: Failure handling
    // ============================================================

    #[tokio::test]
    async fn test_third_of_five_batches_fails() {
        // ARRANGE: Index 25 sits in the 3rd batch [20, 30)
        let attempted = Arc::new(DashSet::new());
        let registry = FactoryRegistry::new();
        {
            let attempted = attempted.clone();
            registry.register(EntityKind::Users, move |descriptor, index| {
                attempted.insert(index);
                if index == 25 {
                    return Err(anyhow::anyhow!("Intentional error at {}", index));
                }
                noop_entity(descriptor, index)
            });
        }
        let backend = Arc::new(MemoryBackend::with_realms(["realm-0"]));
        let executor = BatchExecutor::new(backend.clone(), registry);
        let descriptor = descriptor(EntityKind::Users, 50, 10, 1);

        // ACT
        let result = executor
            .run(&descriptor, WorkRange::new(0, 50), counter(&descriptor))
            .await;

        // ASSERT: Batches 4 and 5 still ran
        for index in 30..50 {
            assert!(attempted.contains(&index), "index {} never attempted", index);
        }

        match result {
            Err(DatasetError::BatchFailure {
                failed_batches,
                total_batches,
                created,
                first_cause,
            }) => {
                assert_eq!(failed_batches, 1);
                assert_eq!(total_batches, 5);
                assert_eq!(created, 40);
                assert!(first_cause.to_string().contains("Intentional error at 25"));
            }
            other => panic!("expected BatchFailure, got {:?}", other),
        }

        // ASSERT: The failed batch left nothing behind
        assert_eq!(backend.count(EntityKind::Users, Some("realm-0")), 40);
        for index in 20..30 {
            assert!(!backend.exists(EntityKind::Users, Some("realm-0"), &format!("user-{}", index)).unwrap());
        }
        assert_eq!(backend.commit_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_realm_fails_every_batch() {
        let backend = Arc::new(MemoryBackend::new());
        let executor = BatchExecutor::new(backend.clone(), FactoryRegistry::with_standard_factories());
        let descriptor = descriptor(EntityKind::Clients, 20, 10, 2);

        let result = executor
            .run(&descriptor, WorkRange::new(0, 20), counter(&descriptor))
            .await;

        match result {
            Err(DatasetError::BatchFailure {
                failed_batches,
                created,
                ..
            }) => {
                assert_eq!(failed_batches, 2);
                assert_eq!(created, 0);
            }
            other => panic!("expected BatchFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transaction_timeout_aborts_batch() {
        // ARRANGE: Building the first entity outlasts the 1s transaction
        let registry = FactoryRegistry::new();
        registry.register(EntityKind::Realms, |descriptor, index| {
            std::thread::sleep(Duration::from_millis(1100));
            noop_entity(descriptor, index)
        });
        let backend = Arc::new(MemoryBackend::new());
        let executor = BatchExecutor::new(backend.clone(), registry);
        let mut descriptor = descriptor(EntityKind::Realms, 2, 2, 1);
        descriptor.transaction_timeout_secs = 1;

        // ACT
        let result = executor
            .run(&descriptor, WorkRange::new(0, 2), counter(&descriptor))
            .await;

        // ASSERT
        assert!(matches!(result, Err(DatasetError::BatchFailure { created: 0, .. })));
        assert_eq!(backend.count(EntityKind::Realms, None), 0);
    }

    #[test]
    fn test_backend_rejects_expired_deadline_and_duplicates() {
        let backend = MemoryBackend::new();
        let realm = |name: &str| Entity::new(name, serde_json::json!({}));
        let later = Instant::now() + Duration::from_secs(60);

        let expired = backend.commit_batch(
            EntityKind::Realms,
            None,
            vec![realm("a")],
            Instant::now() - Duration::from_millis(1),
        );
        backend
            .commit_batch(EntityKind::Realms, None, vec![realm("b")], later)
            .unwrap();
        let duplicate =
            backend.commit_batch(EntityKind::Realms, None, vec![realm("c"), realm("b")], later);

        assert!(expired.is_err());
        assert!(duplicate.is_err());
        assert!(!backend.exists(EntityKind::Realms, None, "c").unwrap());
        assert_eq!(backend.count(EntityKind::Realms, None), 1);
    }

    // ============================================================
    // TEST 4: Removal
    // ============================================================

    #[test]
    fn test_backend_delete_cascades_realm_contents() {
        // ARRANGE
        let backend = MemoryBackend::with_realms(["realm-0", "realm-1"]);
        let later = Instant::now() + Duration::from_secs(60);
        let user = |name: &str| Entity::new(name, serde_json::json!({}));
        backend
            .commit_batch(EntityKind::Users, Some("realm-0"), vec![user("u-0"), user("u-1")], later)
            .unwrap();
        backend
            .commit_batch(EntityKind::Users, Some("realm-1"), vec![user("u-0")], later)
            .unwrap();

        // ACT: "realm-9" never existed
        let removed = backend
            .delete_batch(
                EntityKind::Realms,
                None,
                vec!["realm-0".to_string(), "realm-9".to_string()],
                later,
            )
            .unwrap();

        // ASSERT
        assert_eq!(removed, 1);
        assert!(!backend.exists(EntityKind::Realms, None, "realm-0").unwrap());
        assert_eq!(backend.count(EntityKind::Users, Some("realm-0")), 0);
        assert_eq!(backend.count(EntityKind::Users, Some("realm-1")), 1);
    }

    #[test]
    fn test_backend_delete_after_deadline_removes_nothing() {
        let backend = MemoryBackend::with_realms(["realm-0"]);

        let result = backend.delete_batch(
            EntityKind::Realms,
            None,
            vec!["realm-0".to_string()],
            Instant::now() - Duration::from_millis(1),
        );

        assert!(result.is_err());
        assert_eq!(backend.count(EntityKind::Realms, None), 1);
    }

    #[tokio::test]
    async fn test_removal_descriptor_deletes_its_range() {
        // ARRANGE: realm-0..=realm-9
        let backend = Arc::new(MemoryBackend::new());
        let executor = BatchExecutor::new(backend.clone(), FactoryRegistry::with_standard_factories());
        let realms = descriptor(EntityKind::Realms, 10, 5, 2);
        executor
            .run(&realms, WorkRange::new(0, 10), counter(&realms))
            .await
            .unwrap();
        let mut removal = descriptor(EntityKind::Realms, 4, 3, 2);
        removal.operation = CampaignOperation::Remove;

        // ACT
        let summary = executor
            .run(&removal, WorkRange::new(3, 7), counter(&removal))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(summary.created, 4);
        assert_eq!(summary.batches, 2);
        assert_eq!(backend.count(EntityKind::Realms, None), 6);
        assert!(backend.get(EntityKind::Realms, None, "realm-2").is_some());
        assert!(backend.get(EntityKind::Realms, None, "realm-3").is_none());
        assert!(backend.get(EntityKind::Realms, None, "realm-7").is_some());
    }

    // ============================================================
    // TEST 5: Cluster backend
    // ============================================================

    fn member(id: &str, http_port: u16) -> Node {
        Node::alive(
            NodeId(id.to_string()),
            "127.0.0.1:7900".parse().unwrap(),
            format!("127.0.0.1:{}", http_port).parse().unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_member_is_its_own_entity_home() {
        // ARRANGE
        let view = Arc::new(StaticView::new(NodeId("solo".to_string()), vec![member("solo", 1)]));
        let local = Arc::new(MemoryBackend::new());
        let backend = ClusterEntityBackend::new(view, local.clone()).unwrap();

        // ACT
        let created = backend
            .clone()
            .ensure_realms(vec!["realm-0".to_string(), "realm-0".to_string()])
            .await
            .unwrap();

        // ASSERT
        assert_eq!(backend.home().map(|node| node.id), Some(NodeId("solo".to_string())));
        assert_eq!(created, 1);
        assert_eq!(local.count(EntityKind::Realms, None), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_home_fails_the_call() {
        // ARRANGE: Port 9 on loopback refuses connections
        let members = vec![member("node-a", 9), member("node-b", 9)];
        let local = Arc::new(MemoryBackend::new());
        let views: Vec<Arc<StaticView>> = ["node-a", "node-b"]
            .into_iter()
            .map(|id| Arc::new(StaticView::new(NodeId(id.to_string()), members.clone())))
            .collect();
        let any_member = ClusterEntityBackend::new(views[0].clone(), local.clone()).unwrap();
        let home = any_member.home().unwrap();
        let remote_view = views
            .into_iter()
            .find(|view| view.local_id() != home.id)
            .unwrap();
        let backend = ClusterEntityBackend::new(remote_view, local.clone()).unwrap();

        // ACT
        let result = tokio::task::spawn_blocking(move || {
            backend.commit_batch(
                EntityKind::Realms,
                None,
                vec![Entity::new("realm-0", serde_json::json!({}))],
                Instant::now() + Duration::from_secs(5),
            )
        })
        .await
        .unwrap();

        // ASSERT: Nothing falls back to the local store
        assert!(result.is_err());
        assert_eq!(local.count(EntityKind::Realms, None), 0);
    }

    // ============================================================
    // TEST 6: Standard entities
    // ============================================================

    #[test]
    fn test_user_entity_is_deterministic() {
        let descriptor = descriptor(EntityKind::Users, 10, 10, 1);

        let first = entities::user(&descriptor, 6).unwrap();
        let again = entities::user(&descriptor, 6).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.name, "user-6");
        assert_eq!(first.attributes["email"], "user-6@realm-0.com");
        assert_eq!(first.attributes["password"], "user-6-password");
        assert_eq!(
            first.attributes["realmRoles"],
            serde_json::json!(["role-24", "role-0", "role-1", "role-2"])
        );
    }

    #[test]
    fn test_assignment_wraps_round_robin() {
        assert_eq!(assign(0, 4, 20, "group-"), vec!["group-0", "group-1", "group-2", "group-3"]);
        assert_eq!(assign(5, 4, 20, "group-"), vec!["group-0", "group-1", "group-2", "group-3"]);
        assert!(assign(3, 4, 0, "group-").is_empty());
    }

    #[test]
    fn test_user_requires_realm() {
        let mut descriptor = descriptor(EntityKind::Users, 1, 1, 1);
        descriptor.realm = None;

        assert!(entities::user(&descriptor, 0).is_err());
    }

    #[test]
    fn test_event_follows_realm_span() {
        let mut events = descriptor(EntityKind::Events, 10, 10, 1);
        events.event_realms = Some(RealmSpan {
            prefix: "realm-".to_string(),
            count: 4,
        });

        let event = entities::event(&events, 6).unwrap();

        assert_eq!(event.name, "event-6");
        assert_eq!(event.attributes["realmId"], "realm-2");
        events.event_realms = None;
        assert!(entities::event(&events, 0).is_err());
    }
}
