//! Membership Module Tests
//!
//! ## Test Scopes
//! - **Data Structures**: identity, ordering and wire serialization of nodes and gossip messages.
//! - **Ordered View**: the consistently sorted member list and local ordinal used for partitioning.
//! - **Service**: initialization of a single founder node.

#[cfg(test)]
mod tests {
    use crate::membership::service::MembershipService;
    use crate::membership::types::{GossipMessage, Node, NodeId, NodeState};
    use crate::membership::view::{ClusterView, StaticView};
    use std::net::SocketAddr;

    fn node(id: &str, port: u16) -> Node {
        Node::alive(
            NodeId(id.to_string()),
            format!("127.0.0.1:{}", port).parse().unwrap(),
            format!("127.0.0.1:{}", port + 1000).parse().unwrap(),
        )
    }

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_is_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();

        assert_ne!(id1, id2, "Each NodeId should be unique");
    }

    #[test]
    fn test_node_id_ordering_is_lexicographic() {
        let mut ids = vec![
            NodeId("node-c".to_string()),
            NodeId("node-a".to_string()),
            NodeId("node-b".to_string()),
        ];
        ids.sort();

        assert_eq!(ids[0].0, "node-a");
        assert_eq!(ids[2].0, "node-c");
    }

    // ============================================================
    // SERIALIZATION TESTS
    // ============================================================

    #[test]
    fn test_node_serialization_skips_last_seen() {
        let original = node("test-node", 5000);

        let json = serde_json::to_string(&original).expect("Serialization failed");
        let restored: Node = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.http_addr, original.http_addr);
        assert_eq!(restored.state, NodeState::Alive);
        assert!(restored.last_seen.is_none());
    }

    #[test]
    fn test_gossip_ping_carries_sender() {
        let msg = GossipMessage::Ping {
            from: node("sender-node", 5001),
        };

        let encoded = bincode::serialize(&msg).expect("Failed to serialize Ping");
        let decoded: GossipMessage =
            bincode::deserialize(&encoded).expect("Failed to deserialize Ping");

        if let GossipMessage::Ping { from } = decoded {
            assert_eq!(from.id.0, "sender-node");
            assert_eq!(from.http_addr.port(), 6001);
        } else {
            panic!("Wrong message type");
        }
    }

    // ============================================================
    // ORDERED VIEW TESTS
    // ============================================================

    #[test]
    fn test_static_view_orders_members_by_id() {
        let view = StaticView::new(
            NodeId("node-b".to_string()),
            vec![node("node-c", 5002), node("node-a", 5000), node("node-b", 5001)],
        );

        let ids: Vec<String> = view.ordered_members().into_iter().map(|n| n.id.0).collect();

        assert_eq!(ids, vec!["node-a", "node-b", "node-c"]);
        assert_eq!(view.local_ordinal(), Some(1));
        assert_eq!(view.cluster_size(), 3);
    }

    #[test]
    fn test_static_view_agrees_on_ordinals_across_nodes() {
        let members = vec![node("n2", 5002), node("n0", 5000), node("n1", 5001)];

        // Every node builds its view from the same membership in a different order
        let ordinals: Vec<Option<usize>> = ["n0", "n1", "n2"]
            .iter()
            .enumerate()
            .map(|(shift, id)| {
                let mut shuffled = members.clone();
                shuffled.rotate_left(shift);
                StaticView::new(NodeId(id.to_string()), shuffled).local_ordinal()
            })
            .collect();

        assert_eq!(ordinals, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_static_view_skips_dead_members() {
        let mut dead = node("node-a", 5000);
        dead.state = NodeState::Dead;
        let view = StaticView::new(
            NodeId("node-b".to_string()),
            vec![dead, node("node-b", 5001)],
        );

        assert_eq!(view.cluster_size(), 1);
        assert_eq!(view.local_ordinal(), Some(0));
    }

    #[test]
    fn test_static_view_without_local_node_has_no_ordinal() {
        let view = StaticView::new(NodeId("outsider".to_string()), vec![node("node-a", 5000)]);

        assert_eq!(view.local_ordinal(), None);
    }

    // ============================================================
    // SERVICE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_membership_creation() {
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let http_addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();

        let service = MembershipService::new(bind_addr, http_addr, vec![])
            .await
            .expect("Failed to create service");

        assert_eq!(service.members.len(), 1);
        assert_ne!(service.local_node.gossip_addr.port(), 0);

        let members = service.ordered_members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].http_addr, http_addr);
        assert_eq!(service.local_ordinal(), Some(0));
    }
}
