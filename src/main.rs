use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use clap::Parser;
use dataset_cluster::campaign::handlers::{
    handle_clear_completed, handle_get_completed, handle_get_status, handle_last_entity,
    handle_remove_realms, handle_trigger_campaign,
};
use dataset_cluster::campaign::lock::CampaignLock;
use dataset_cluster::campaign::protocol::*;
use dataset_cluster::campaign::service::CampaignService;
use dataset_cluster::cluster::broadcast::HttpBroadcast;
use dataset_cluster::cluster::handlers::handle_run_campaign;
use dataset_cluster::cluster::node::NodeRunner;
use dataset_cluster::cluster::protocol::ENDPOINT_RUN_CAMPAIGN;
use dataset_cluster::config::NodeArgs;
use dataset_cluster::executor::backend::MemoryBackend;
use dataset_cluster::executor::cluster::ClusterEntityBackend;
use dataset_cluster::executor::executor::BatchExecutor;
use dataset_cluster::executor::factory::FactoryRegistry;
use dataset_cluster::executor::handlers::handle_entity_op;
use dataset_cluster::executor::protocol::ENDPOINT_ENTITY_OP;
use dataset_cluster::membership::service::MembershipService;
use dataset_cluster::membership::view::ClusterView;
use dataset_cluster::storage::cluster::ClusterLeaseStore;
use dataset_cluster::storage::handlers::{handle_lease_op, handle_lease_replicate};
use dataset_cluster::storage::memory::MemoryLeaseStore;
use dataset_cluster::storage::protocol::{ENDPOINT_LEASE_OP, ENDPOINT_LEASE_REPLICATE};
use std::sync::Arc;
use std::time::Duration;

const PURGE_INTERVAL: Duration = Duration::from_secs(30);
/// Gossip rounds to wait before preloading, so the entity store home is settled.
const PRELOAD_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = NodeArgs::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.max_log_level())
        .init();

    let http_addr = args.http_addr()?;

    tracing::info!("Starting node on {}", args.bind);
    if !args.seeds.is_empty() {
        tracing::info!("Seed nodes: {:?}", args.seeds);
    } else {
        tracing::info!("Starting as seed node (founder)");
    }

    // 1. Membership (UDP gossip):
    let membership = MembershipService::new(args.bind, http_addr, args.seeds.clone()).await?;
    tracing::info!("Node ID: {:?}", membership.local_node.id);

    // 2. Lease store and campaign lock:
    let local_leases = MemoryLeaseStore::new();
    let leases = ClusterLeaseStore::new(membership.clone(), local_leases.clone());
    let lock = CampaignLock::new(leases.clone());

    // 3. Entity backend and batch execution:
    let backend = ClusterEntityBackend::new(membership.clone(), Arc::new(MemoryBackend::new()))?;
    let factories = FactoryRegistry::with_standard_factories();
    tracing::info!("Registered {} entity factories", factories.factory_count());
    let executor = BatchExecutor::new(backend.clone(), factories);

    // 4. Campaign dispatch:
    let runner = NodeRunner::new(membership.clone(), executor);
    let broadcast = HttpBroadcast::new(membership.clone(), runner.clone())?;
    let campaigns = CampaignService::new(lock, backend.clone(), broadcast, membership.clone());

    // 5. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_CAMPAIGN, post(handle_trigger_campaign))
        .route(ENDPOINT_STATUS, get(handle_get_status))
        .route(
            ENDPOINT_STATUS_COMPLETED,
            get(handle_get_completed).delete(handle_clear_completed),
        )
        .route(ENDPOINT_LAST_ENTITY, get(handle_last_entity))
        .route(ENDPOINT_REMOVE_REALMS, post(handle_remove_realms))
        .route(ENDPOINT_RUN_CAMPAIGN, post(handle_run_campaign))
        .route(ENDPOINT_LEASE_OP, post(handle_lease_op))
        .route(ENDPOINT_LEASE_REPLICATE, post(handle_lease_replicate))
        .route(ENDPOINT_ENTITY_OP, post(handle_entity_op))
        .layer(Extension(campaigns))
        .layer(Extension(runner))
        .layer(Extension(leases))
        .layer(Extension(backend.clone()));

    // 6. Spawn membership service:
    let service_clone = membership.clone();
    tokio::spawn(async move {
        service_clone.start().await;
    });

    // 7. Spawn expired lease purging:
    tokio::spawn(local_leases.purge_loop(PURGE_INTERVAL));

    // 8. Spawn realm preloading:
    if !args.preload_realms.is_empty() {
        let realms = args.preload_realms.clone();
        let preload_backend = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(PRELOAD_DELAY).await;
            match preload_backend.ensure_realms(realms).await {
                Ok(created) => tracing::info!("Preloaded {} realms", created),
                Err(e) => tracing::error!("Failed to preload realms: {:#}", e),
            }
        });
    }

    // 9. Spawn stats reporter:
    let stats_service = membership.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let alive = stats_service.get_alive_members();
            tracing::info!(
                "Cluster stats: {} alive nodes, local ordinal {:?} of {}",
                alive.len(),
                stats_service.local_ordinal(),
                stats_service.cluster_size()
            );
            for node in alive {
                tracing::debug!(
                    "  - {:?} gossip={} http={} (inc={})",
                    node.id,
                    node.gossip_addr,
                    node.http_addr,
                    node.incarnation
                );
            }
        }
    });

    // 10. Start HTTP server:
    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
