use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Cluster-wide node identity.
///
/// Ordering is lexicographic on the inner string. Every node sorts the membership
/// list by this ordering, which is what makes node ordinals agree across the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    Alive,
    Suspect,
    Dead,
}

/// Represents a single member in the cluster.
///
/// `gossip_addr` carries UDP membership traffic, `http_addr` carries campaign
/// dispatch and lease-store forwarding. The `incarnation` is a logical clock a
/// node bumps to refute a false suspicion about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub gossip_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub state: NodeState,
    pub incarnation: u64,

    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl Node {
    pub fn alive(id: NodeId, gossip_addr: SocketAddr, http_addr: SocketAddr) -> Self {
        Self {
            id,
            gossip_addr,
            http_addr,
            state: NodeState::Alive,
            incarnation: 1,
            last_seen: Some(Instant::now()),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == NodeState::Alive
    }
}

/// The wire protocol for gossip traffic (bincode over UDP).
///
/// - `Join`: sent by a new node to its seeds.
/// - `Ping/Ack`: liveness probe; the ping carries the sender so an unknown pinger
///   is learned immediately, the ack carries the responder's full member list.
/// - `Suspect/Alive`: disseminate health changes, ordered by incarnation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    Join {
        node: Node,
    },

    Ping {
        from: Node,
    },

    Ack {
        from: NodeId,
        incarnation: u64,
        members: Vec<Node>,
    },

    Suspect {
        node_id: NodeId,
        incarnation: u64,
    },

    Alive {
        node_id: NodeId,
        incarnation: u64,
    },
}
