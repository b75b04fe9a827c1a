use anyhow::Result;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use super::types::{GossipMessage, Node, NodeId, NodeState};
use super::view::ClusterView;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const SUSPECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEAD_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DATAGRAM: usize = 65536;

pub struct MembershipService {
    pub local_node: Node,
    pub members: Arc<DashMap<NodeId, Node>>,
    socket: Arc<UdpSocket>,
    incarnation: AtomicU64,
}

impl MembershipService {
    /// Binds the gossip socket and announces this node to every seed.
    ///
    /// `http_addr` is advertised to peers so they can dispatch campaign work and
    /// forward lease-store operations to this node.
    pub async fn new(
        bind_addr: SocketAddr,
        http_addr: SocketAddr,
        seed_nodes: Vec<SocketAddr>,
    ) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;
        let local_node = Node::alive(NodeId::new(), gossip_addr, http_addr);

        let members = Arc::new(DashMap::new());
        members.insert(local_node.id.clone(), local_node.clone());

        if !seed_nodes.is_empty() {
            tracing::info!("Joining cluster via {} seed node(s)", seed_nodes.len());
            let encoded = bincode::serialize(&GossipMessage::Join {
                node: local_node.clone(),
            })?;
            for seed in seed_nodes.iter() {
                socket.send_to(&encoded, seed).await?;
                tracing::info!("Sent join request to {}", seed);
            }
        }

        Ok(Arc::new(Self {
            incarnation: AtomicU64::new(local_node.incarnation),
            local_node,
            members,
            socket: Arc::new(socket),
        }))
    }

    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service...");

        let service = self.clone();
        tokio::spawn(async move { service.gossip_loop().await });

        let service = self.clone();
        tokio::spawn(async move { service.receive_loop().await });

        let service = self.clone();
        tokio::spawn(async move { service.failure_detection_loop().await });

        tracing::info!("All membership background tasks started");
    }

    pub fn get_alive_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|entry| entry.value().is_alive())
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn current_incarnation(&self) -> u64 {
        self.incarnation.load(Ordering::SeqCst)
    }

    fn local_snapshot(&self) -> Node {
        let mut node = self.local_node.clone();
        node.incarnation = self.current_incarnation();
        node
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            interval.tick().await;

            let peers: Vec<Node> = self
                .get_alive_members()
                .into_iter()
                .filter(|node| node.id != self.local_node.id)
                .collect();

            if peers.is_empty() {
                continue;
            }

            let target = {
                use rand::Rng;
                let idx = rand::thread_rng().gen_range(0..peers.len());
                peers[idx].clone()
            };

            let msg = GossipMessage::Ping {
                from: self.local_snapshot(),
            };
            if let Err(e) = self.send(&msg, target.gossip_addr).await {
                tracing::warn!("Failed to send ping to {}: {}", target.id, e);
            } else {
                tracing::trace!("Sent ping to {}", target.id);
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(msg, src).await {
                            tracing::error!("Error handling gossip from {}: {}", src, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to decode gossip from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> Result<()> {
        match msg {
            GossipMessage::Join { node } => {
                tracing::info!("Node {} joining cluster at {}", node.id, node.gossip_addr);
                self.merge_member(node);
                tracing::info!("Cluster size now: {}", self.members.len());
            }

            GossipMessage::Ping { from } => {
                tracing::trace!("Received ping from {}", from.id);
                self.merge_member(from);

                let members: Vec<Node> = self
                    .members
                    .iter()
                    .map(|entry| entry.value().clone())
                    .collect();
                let reply = GossipMessage::Ack {
                    from: self.local_node.id.clone(),
                    incarnation: self.current_incarnation(),
                    members,
                };
                self.send(&reply, src).await?;
            }

            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                tracing::trace!("Received ack from {} with {} members", from, members.len());
                if let Some(mut member) = self.members.get_mut(&from) {
                    member.last_seen = Some(Instant::now());
                    member.incarnation = member.incarnation.max(incarnation);
                }
                for member in members {
                    self.merge_member(member);
                }
            }

            GossipMessage::Suspect {
                node_id,
                incarnation,
            } => {
                if node_id == self.local_node.id {
                    self.refute(incarnation).await;
                } else {
                    self.apply_state(&node_id, incarnation, NodeState::Suspect);
                }
            }

            GossipMessage::Alive {
                node_id,
                incarnation,
            } => {
                self.apply_state(&node_id, incarnation, NodeState::Alive);
            }
        }

        Ok(())
    }

    /// Folds a remote view of `incoming` into the local table.
    ///
    /// Higher incarnation wins. At equal incarnation an Alive report clears a
    /// Suspect one.
    fn merge_member(&self, incoming: Node) {
        if incoming.id == self.local_node.id {
            return;
        }

        match self.members.get_mut(&incoming.id) {
            Some(mut existing) => {
                if incoming.incarnation > existing.incarnation {
                    existing.state = incoming.state;
                    existing.incarnation = incoming.incarnation;
                    existing.http_addr = incoming.http_addr;
                    existing.last_seen = Some(Instant::now());
                } else if incoming.incarnation == existing.incarnation
                    && incoming.state == NodeState::Alive
                    && existing.state == NodeState::Suspect
                {
                    tracing::info!("{} refuted suspicion", incoming.id);
                    existing.state = NodeState::Alive;
                    existing.last_seen = Some(Instant::now());
                } else if incoming.state == NodeState::Alive && existing.is_alive() {
                    existing.last_seen = Some(Instant::now());
                }
            }
            None => {
                tracing::info!(
                    "Discovered new member: {} at {} (http {})",
                    incoming.id,
                    incoming.gossip_addr,
                    incoming.http_addr
                );
                let mut node = incoming;
                node.last_seen = Some(Instant::now());
                self.members.insert(node.id.clone(), node);
            }
        }
    }

    fn apply_state(&self, node_id: &NodeId, incarnation: u64, state: NodeState) {
        let Some(mut existing) = self.members.get_mut(node_id) else {
            tracing::debug!("{:?} report for unknown node {}", state, node_id);
            return;
        };

        let newer = incarnation > existing.incarnation;
        let refutes = incarnation == existing.incarnation
            && state == NodeState::Alive
            && existing.state == NodeState::Suspect;

        if newer || refutes {
            tracing::info!(
                "Node {} at {} is now {:?} (inc={})",
                existing.id,
                existing.gossip_addr,
                state,
                incarnation
            );
            existing.state = state;
            existing.incarnation = incarnation;
            existing.last_seen = Some(Instant::now());
        }
    }

    /// Someone suspects this node: bump the incarnation past theirs and tell everyone.
    async fn refute(&self, suspected_incarnation: u64) {
        let current = self.current_incarnation();
        if suspected_incarnation < current {
            return;
        }

        let next = suspected_incarnation + 1;
        self.incarnation.store(next, Ordering::SeqCst);
        if let Some(mut me) = self.members.get_mut(&self.local_node.id) {
            me.incarnation = next;
            me.state = NodeState::Alive;
        }

        tracing::info!("Refuting suspicion about local node (inc={})", next);
        self.broadcast(GossipMessage::Alive {
            node_id: self.local_node.id.clone(),
            incarnation: next,
        })
        .await;
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);

        loop {
            interval.tick().await;
            let now = Instant::now();
            let mut suspects = Vec::new();

            for mut entry in self.members.iter_mut() {
                let member = entry.value_mut();
                if member.id == self.local_node.id {
                    continue;
                }

                let Some(last_seen) = member.last_seen else {
                    member.last_seen = Some(now);
                    continue;
                };
                let silence = now.duration_since(last_seen);

                match member.state {
                    NodeState::Alive if silence > SUSPECT_TIMEOUT => {
                        tracing::warn!("Node {} suspected (no contact for {:?})", member.id, silence);
                        member.state = NodeState::Suspect;
                        suspects.push(GossipMessage::Suspect {
                            node_id: member.id.clone(),
                            incarnation: member.incarnation,
                        });
                    }
                    NodeState::Suspect if silence > DEAD_TIMEOUT => {
                        tracing::warn!("Node {} declared dead (no contact for {:?})", member.id, silence);
                        member.state = NodeState::Dead;
                    }
                    _ => {}
                }
            }

            for msg in suspects {
                self.broadcast(msg).await;
            }
        }
    }

    async fn send(&self, msg: &GossipMessage, addr: SocketAddr) -> Result<()> {
        let encoded = bincode::serialize(msg)?;
        self.socket.send_to(&encoded, addr).await?;
        Ok(())
    }

    async fn broadcast(&self, msg: GossipMessage) {
        let targets: Vec<Node> = self
            .get_alive_members()
            .into_iter()
            .filter(|node| node.id != self.local_node.id)
            .collect();

        for target in targets {
            if let Err(e) = self.send(&msg, target.gossip_addr).await {
                tracing::warn!("Failed to broadcast to {}: {}", target.id, e);
            }
        }
    }
}

impl ClusterView for MembershipService {
    fn local_id(&self) -> NodeId {
        self.local_node.id.clone()
    }

    fn ordered_members(&self) -> Vec<Node> {
        let mut alive = self.get_alive_members();
        alive.sort_by(|a, b| a.id.cmp(&b.id));
        alive
    }
}
