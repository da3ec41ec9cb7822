//! # Multi-Peer Relay
//!
//! Several trackers on one mesh, each installing its forward dedup hook:
//!
//! ```text
//!        A
//!       / \
//!      B───C        line: N0 ─ N1 ─ N2 ─ N3 ─ N4
//! ```
//!
//! Checks that repeated headers stop at the first hop, that headers travel
//! the whole mesh with an unlimited hop budget, and that the RPC bridge feeds
//! remote subscribers.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use header_tracker::{
        ChainSource, ChainSourceMode, HeaderTracker, HeaderTrackerApi, SourceError,
        TrackerConfig,
    };
    use shared_bus::{
        ChannelHandler, GossipNode, GossipTransport, HopBudget, InMemoryGossipNetwork,
    };
    use shared_types::{BlockHash, BlockHeader, HeaderCodec, Height, JsonHeaderCodec, PeerId};
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    const TOPIC: &str = "/relay/block-header";

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn header(height: u64) -> BlockHeader {
        BlockHeader::new(
            height,
            BlockHash::repeat_byte((height % 251) as u8 + 1),
            BlockHash::repeat_byte((height.saturating_sub(1) % 251) as u8 + 1),
            1_600_000_000 + height * 12,
        )
    }

    fn peer(id: &str) -> PeerId {
        PeerId::from(id)
    }

    struct Mesh {
        net: InMemoryGossipNetwork,
        trackers: HashMap<String, HeaderTracker<GossipNode>>,
    }

    impl Mesh {
        async fn build(ids: &[&str], links: &[(&str, &str)]) -> Self {
            let net = InMemoryGossipNetwork::new();
            let mut trackers = HashMap::new();
            for id in ids {
                let tracker = HeaderTracker::new(
                    TrackerConfig::default(),
                    Arc::new(net.add_node(*id)),
                    ChainSourceMode::SourceLess,
                );
                tracker.start().await.unwrap();
                trackers.insert(id.to_string(), tracker);
            }
            for (a, b) in links {
                net.connect(&peer(a), &peer(b)).unwrap();
            }
            Self { net, trackers }
        }

        fn tracker(&self, id: &str) -> &HeaderTracker<GossipNode> {
            &self.trackers[id]
        }
    }

    /// Chain source driven by the test.
    struct ScriptedSource {
        heights: broadcast::Sender<Height>,
        headers: HashMap<Height, BlockHeader>,
    }

    impl ScriptedSource {
        fn new(headers: impl IntoIterator<Item = BlockHeader>) -> Arc<Self> {
            let (heights, _) = broadcast::channel(16);
            Arc::new(Self {
                heights,
                headers: headers.into_iter().map(|h| (h.height(), h)).collect(),
            })
        }
    }

    #[async_trait]
    impl ChainSource for ScriptedSource {
        fn latest_heights(&self) -> broadcast::Receiver<Height> {
            self.heights.subscribe()
        }

        async fn header_by_height(
            &self,
            height: Height,
        ) -> Result<Option<BlockHeader>, SourceError> {
            Ok(self.headers.get(&height).cloned())
        }
    }

    // =========================================================================
    // DEDUP ACROSS PEERS
    // =========================================================================

    #[tokio::test]
    async fn test_header_reaches_every_peer_in_triangle() {
        let mesh = Mesh::build(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("A", "C")]).await;

        mesh.tracker("A").publish_header(&header(10)).unwrap();

        for id in ["A", "B", "C"] {
            assert_eq!(mesh.tracker(id).get_current_header(), Some(header(10)));
        }
    }

    #[tokio::test]
    async fn test_republished_header_stops_at_first_hop() {
        let mesh = Mesh::build(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("A", "C")]).await;

        let first = mesh.tracker("A").publish_header(&header(10)).unwrap();
        let second = mesh.tracker("A").publish_header(&header(10)).unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        let stats = mesh.net.stats(&peer("A")).unwrap();
        assert_eq!(stats.denied, 2);
        assert_eq!(mesh.tracker("A").metrics().forwards_suppressed, 2);
    }

    #[tokio::test]
    async fn test_new_height_passes_after_duplicate_denied() {
        let mesh = Mesh::build(&["A", "B"], &[("A", "B")]).await;

        mesh.tracker("A").publish_header(&header(10)).unwrap();
        mesh.tracker("A").publish_header(&header(10)).unwrap();
        let sent = mesh.tracker("A").publish_header(&header(11)).unwrap();

        assert_eq!(sent, 1);
        assert_eq!(mesh.tracker("B").get_current_header(), Some(header(11)));
        assert_eq!(mesh.tracker("B").get_previous_header(), Some(header(10)));
    }

    #[tokio::test]
    async fn test_relay_does_not_echo_back_to_sender() {
        let mesh = Mesh::build(&["A", "B"], &[("A", "B")]).await;

        mesh.tracker("A").publish_header(&header(3)).unwrap();

        // B relays only to neighbours other than the one it heard from.
        assert_eq!(mesh.net.stats(&peer("B")).unwrap().sent, 0);
        assert_eq!(mesh.tracker("B").metrics().forwards_allowed, 0);
    }

    #[tokio::test]
    async fn test_unlimited_budget_crosses_long_line() {
        let ids = ["N0", "N1", "N2", "N3", "N4"];
        let links = [("N0", "N1"), ("N1", "N2"), ("N2", "N3"), ("N3", "N4")];
        let mesh = Mesh::build(&ids, &links).await;

        mesh.tracker("N0").publish_header(&header(21)).unwrap();

        assert_eq!(mesh.tracker("N4").get_current_header(), Some(header(21)));
        for id in &ids[1..4] {
            assert_eq!(mesh.tracker(id).metrics().forwards_allowed, 1);
        }
    }

    #[tokio::test]
    async fn test_same_header_from_two_origins_forwarded_once_per_peer() {
        let mesh = Mesh::build(&["A", "B", "C"], &[("A", "B"), ("B", "C")]).await;
        let payload = JsonHeaderCodec.encode(&header(30)).unwrap();
        let outsider = mesh.net.add_node("X");
        mesh.net.connect(&peer("X"), &peer("A")).unwrap();

        outsider
            .publish(TOPIC, payload.clone(), HopBudget::Unlimited)
            .unwrap();
        outsider
            .publish(TOPIC, payload, HopBudget::Unlimited)
            .unwrap();

        // A forwarded 30 to B once; B forwarded it to C once.
        assert_eq!(mesh.tracker("A").metrics().forwards_allowed, 1);
        assert_eq!(mesh.tracker("A").metrics().forwards_suppressed, 1);
        assert_eq!(mesh.tracker("B").metrics().forwards_allowed, 1);
        assert_eq!(mesh.tracker("C").metrics().headers_ingested, 1);
    }

    // =========================================================================
    // RPC BRIDGE
    // =========================================================================

    #[tokio::test]
    async fn test_bridge_feeds_remote_subscriber() {
        let net = InMemoryGossipNetwork::new();
        let source = ScriptedSource::new([header(100), header(101)]);
        let bridge_node = HeaderTracker::new(
            TrackerConfig::default(),
            Arc::new(net.add_node("bridge")),
            ChainSourceMode::with_source(source.clone()),
        );
        let observer = net.add_node("observer");
        let (handler, mut received) = ChannelHandler::new();
        observer.subscribe(TOPIC, handler).unwrap();
        net.connect(&peer("bridge"), &peer("observer")).unwrap();
        bridge_node.start().await.unwrap();

        source.heights.send(100).unwrap();

        let message = timeout(Duration::from_secs(1), received.recv())
            .await
            .expect("header relayed")
            .expect("channel open");
        assert_eq!(JsonHeaderCodec.decode(&message.payload).unwrap(), header(100));
        assert_eq!(message.hops, HopBudget::Unlimited);
        assert_eq!(message.origin, peer("bridge"));

        bridge_node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bridge_header_propagates_to_source_less_peers() {
        let net = InMemoryGossipNetwork::new();
        let source = ScriptedSource::new([header(7)]);
        let origin = HeaderTracker::new(
            TrackerConfig::default(),
            Arc::new(net.add_node("origin")),
            ChainSourceMode::with_source(source.clone()),
        );
        let relay = HeaderTracker::new(
            TrackerConfig::default(),
            Arc::new(net.add_node("relay")),
            ChainSourceMode::SourceLess,
        );
        net.connect(&peer("origin"), &peer("relay")).unwrap();
        origin.start().await.unwrap();
        relay.start().await.unwrap();

        source.heights.send(7).unwrap();
        let latest = timeout(Duration::from_secs(1), relay.get_latest_header())
            .await
            .expect("relay saw header")
            .unwrap();

        assert_eq!(latest, header(7));
        assert_eq!(relay.metrics().headers_published, 0);
        assert_eq!(origin.metrics().headers_published, 1);
    }
}
