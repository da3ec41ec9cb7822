//! # Tracker Scenarios
//!
//! End-to-end behaviour of one tracker bound to a live mesh node:
//!
//! 1. **Tip ordering**: out-of-order heights, only strictly greater wins
//! 2. **Forward dedup**: per-peer allow / deny / allow
//! 3. **Source-less mode**: starts, ingests, never originates
//! 4. **Latest wait**: pending waiters resolve on the next advance
//! 5. **Lifecycle**: repeated start registers the handler once

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use header_tracker::{
        ChainSourceMode, HeaderTracker, HeaderTrackerApi, TipTransition, TrackerConfig,
        TrackerEvent,
    };
    use shared_bus::{GossipNode, GossipTransport, HopBudget, InMemoryGossipNetwork};
    use shared_types::{BlockHash, BlockHeader, HeaderCodec, JsonHeaderCodec, PeerId};
    use tokio::sync::broadcast;
    use tokio::time::timeout;

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

    fn payload(height: u64) -> Vec<u8> {
        JsonHeaderCodec.encode(&header(height)).unwrap()
    }

    fn tracker_on(net: &InMemoryGossipNetwork, id: &str) -> HeaderTracker<GossipNode> {
        HeaderTracker::new(
            TrackerConfig::default(),
            Arc::new(net.add_node(id)),
            ChainSourceMode::SourceLess,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn latest_heights(events: &[TrackerEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                TrackerEvent::Latest(h) => Some(h.height()),
                _ => None,
            })
            .collect()
    }

    /// Deliver a header through the mesh from a bare remote node.
    fn send_from(remote: &GossipNode, height: u64) {
        remote
            .publish("/relay/block-header", payload(height), HopBudget::Unlimited)
            .unwrap();
    }

    // =========================================================================
    // TIP ORDERING
    // =========================================================================

    #[tokio::test]
    async fn test_out_of_order_heights_only_advance_upward() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let remote = net.add_node("remote");
        net.connect(&PeerId::from("local"), &PeerId::from("remote"))
            .unwrap();
        let mut rx = tracker.events();
        tracker.start().await.unwrap();

        for height in [5, 3, 7] {
            send_from(&remote, height);
        }

        let events = drain(&mut rx);
        assert_eq!(latest_heights(&events), vec![5, 7]);
        assert_eq!(tracker.get_current_header(), Some(header(7)));
        assert_eq!(tracker.get_previous_header(), Some(header(5)));
        // Never the tip, still cached.
        assert_eq!(
            tracker.get_header_by_height(3).await.unwrap(),
            Some(header(3))
        );
    }

    #[tokio::test]
    async fn test_sync_carries_previous_tip() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let mut rx = tracker.events();

        tracker.ingest(&payload(5)).unwrap();
        tracker.ingest(&payload(7)).unwrap();

        let syncs: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TrackerEvent::Sync { .. }))
            .collect();
        assert_eq!(
            syncs,
            vec![
                TrackerEvent::Sync {
                    header: header(5),
                    previous: None
                },
                TrackerEvent::Sync {
                    header: header(7),
                    previous: Some(header(5))
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_equal_height_does_not_replace_tip() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let fork = BlockHeader::new(
            9,
            BlockHash::repeat_byte(0xEE),
            BlockHash::repeat_byte(0xDD),
            1,
        );

        tracker.ingest(&payload(9)).unwrap();
        let transition = tracker
            .ingest(&JsonHeaderCodec.encode(&fork).unwrap())
            .unwrap();

        assert_eq!(transition, TipTransition::Unchanged);
        assert_eq!(tracker.get_current_header(), Some(header(9)));
        assert!(tracker.get_previous_header().is_none());
    }

    #[tokio::test]
    async fn test_block_event_for_every_decoded_header() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let mut rx = tracker.events();

        for height in [4, 2, 6, 6] {
            tracker.ingest(&payload(height)).unwrap();
        }
        let _ = tracker.ingest(b"{\"number\":");

        let blocks: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TrackerEvent::Block(tip) => Some(tip.map(|t| t.height())),
                _ => None,
            })
            .collect();
        assert_eq!(blocks, vec![Some(4), Some(4), Some(6), Some(6)]);
    }

    // =========================================================================
    // FORWARD DEDUP
    // =========================================================================

    #[tokio::test]
    async fn test_forward_decisions_per_peer() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let p1 = PeerId::from("P1");

        let decisions: Vec<bool> = [10, 10, 11]
            .into_iter()
            .map(|h| tracker.should_forward(&p1, &payload(h)).unwrap().is_allowed())
            .collect();

        assert_eq!(decisions, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_forward_records_are_independent_per_peer() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");

        assert!(tracker
            .should_forward(&PeerId::from("P1"), &payload(10))
            .unwrap()
            .is_allowed());
        assert!(tracker
            .should_forward(&PeerId::from("P2"), &payload(10))
            .unwrap()
            .is_allowed());
        assert!(!tracker
            .should_forward(&PeerId::from("P1"), &payload(10))
            .unwrap()
            .is_allowed());
    }

    // =========================================================================
    // SOURCE-LESS MODE
    // =========================================================================

    #[tokio::test]
    async fn test_source_less_tracker_never_originates() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let remote = net.add_node("remote");
        net.connect(&PeerId::from("local"), &PeerId::from("remote"))
            .unwrap();

        tracker.start().await.unwrap();
        send_from(&remote, 1);
        send_from(&remote, 2);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tracker.get_current_header(), Some(header(2)));
        assert_eq!(tracker.metrics().headers_published, 0);
        let stats = net.stats(&PeerId::from("local")).unwrap();
        assert_eq!(stats.published, 0);
    }

    // =========================================================================
    // LATEST WAIT
    // =========================================================================

    #[tokio::test]
    async fn test_pending_latest_resolves_to_first_advance() {
        let net = InMemoryGossipNetwork::new();
        let tracker = Arc::new(tracker_on(&net, "local"));
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.get_latest_header().await })
        };
        tokio::task::yield_now().await;

        tracker.ingest(&payload(1)).unwrap();

        let resolved = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter resolves")
            .unwrap()
            .unwrap();
        assert_eq!(resolved, header(1));
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_resolve() {
        let net = InMemoryGossipNetwork::new();
        let tracker = Arc::new(tracker_on(&net, "local"));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.get_latest_header().await })
            })
            .collect();
        tokio::task::yield_now().await;

        tracker.ingest(&payload(8)).unwrap();

        for waiter in waiters {
            let resolved = timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter resolves")
                .unwrap()
                .unwrap();
            assert_eq!(resolved, header(8));
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_double_start_delivers_once() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let remote = net.add_node("remote");
        net.connect(&PeerId::from("local"), &PeerId::from("remote"))
            .unwrap();
        let mut rx = tracker.events();

        tracker.start().await.unwrap();
        tracker.start().await.unwrap();
        send_from(&remote, 3);

        let blocks = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TrackerEvent::Block(_)))
            .count();
        assert_eq!(blocks, 1);
        assert_eq!(tracker.metrics().headers_ingested, 1);
    }

    #[tokio::test]
    async fn test_stopped_tracker_ignores_topic() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let remote = net.add_node("remote");
        net.connect(&PeerId::from("local"), &PeerId::from("remote"))
            .unwrap();

        tracker.start().await.unwrap();
        send_from(&remote, 1);
        tracker.stop().await.unwrap();
        tracker.stop().await.unwrap();
        send_from(&remote, 2);

        assert_eq!(tracker.get_current_header(), Some(header(1)));
        assert!(!tracker.is_started());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let net = InMemoryGossipNetwork::new();
        let tracker = tracker_on(&net, "local");
        let remote = net.add_node("remote");
        net.connect(&PeerId::from("local"), &PeerId::from("remote"))
            .unwrap();

        tracker.start().await.unwrap();
        tracker.stop().await.unwrap();
        tracker.start().await.unwrap();
        send_from(&remote, 4);

        assert_eq!(tracker.get_current_header(), Some(header(4)));
        assert_eq!(tracker.metrics().headers_ingested, 1);
    }
}
