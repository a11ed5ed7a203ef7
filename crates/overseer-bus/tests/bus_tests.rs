//! Tests for overseer-bus: delivery, subscription lifecycle, readiness wait

use std::sync::Arc;
use std::time::Duration;

use overseer_bus::{MessageBus, SubscriberId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

// ===========================================================================
// Publish / subscribe
// ===========================================================================

#[tokio::test]
async fn publish_reaches_a_subscriber() {
    let bus = MessageBus::default();
    let mut sub = bus.subscribe("test/ping", SubscriberId::next());

    let delivered = bus.publish("test/ping", &Ping { seq: 1 });
    assert_eq!(delivered, 1);

    let msg = sub.recv().await.unwrap();
    let ping: Ping = serde_json::from_value(msg).unwrap();
    assert_eq!(ping, Ping { seq: 1 });
}

#[tokio::test]
async fn publish_without_listeners_reaches_nobody() {
    let bus = MessageBus::default();
    assert_eq!(bus.publish("test/ping", &Ping { seq: 1 }), 0);
}

#[tokio::test]
async fn every_subscriber_gets_its_own_copy() {
    let bus = MessageBus::default();
    let mut a = bus.subscribe("test/ping", SubscriberId::next());
    let mut b = bus.subscribe("test/ping", SubscriberId::next());

    assert_eq!(bus.publish("test/ping", &Ping { seq: 7 }), 2);

    for sub in [&mut a, &mut b] {
        let ping: Ping = serde_json::from_value(sub.recv().await.unwrap()).unwrap();
        assert_eq!(ping.seq, 7);
    }
}

#[tokio::test]
async fn topics_are_isolated() {
    let bus = MessageBus::default();
    let mut ping = bus.subscribe("test/ping", SubscriberId::next());
    let _pong = bus.subscribe("test/pong", SubscriberId::next());

    bus.publish("test/pong", &Ping { seq: 1 });
    assert!(ping.try_drain().is_empty());
}

#[tokio::test]
async fn try_drain_takes_everything_queued() {
    let bus = MessageBus::default();
    let mut sub = bus.subscribe("test/ping", SubscriberId::next());

    for seq in 0..5 {
        bus.publish("test/ping", &Ping { seq });
    }

    let drained = sub.try_drain();
    assert_eq!(drained.len(), 5);
    assert!(sub.try_drain().is_empty());
}

// ===========================================================================
// Subscription lifecycle
// ===========================================================================

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let bus = MessageBus::default();
    let id = SubscriberId::next();
    let mut sub = bus.subscribe("test/ping", id);

    bus.publish("test/ping", &Ping { seq: 1 });
    bus.unsubscribe("test/ping", id);
    assert_eq!(bus.publish("test/ping", &Ping { seq: 2 }), 0);

    // the message published before unsubscribing is still queued
    assert_eq!(sub.try_drain().len(), 1);
    // and the channel is closed afterwards
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn resubscribe_replaces_previous_registration() {
    let bus = MessageBus::default();
    let id = SubscriberId::next();
    let mut old = bus.subscribe("test/ping", id);
    let mut new = bus.subscribe("test/ping", id);

    assert_eq!(bus.listener_count("test/ping"), 1);
    bus.publish("test/ping", &Ping { seq: 1 });
    assert!(old.try_drain().is_empty());
    assert_eq!(new.try_drain().len(), 1);
}

#[tokio::test]
async fn dropped_subscription_is_pruned_on_next_publish() {
    let bus = MessageBus::default();
    let sub = bus.subscribe("test/ping", SubscriberId::next());
    assert_eq!(bus.listener_count("test/ping"), 1);

    drop(sub);
    assert_eq!(bus.publish("test/ping", &Ping { seq: 1 }), 0);
}

#[tokio::test]
async fn listener_count_tracks_registrations() {
    let bus = MessageBus::default();
    assert_eq!(bus.listener_count("test/ping"), 0);

    let a = SubscriberId::next();
    let b = SubscriberId::next();
    let _sa = bus.subscribe("test/ping", a);
    let _sb = bus.subscribe("test/ping", b);
    assert_eq!(bus.listener_count("test/ping"), 2);

    bus.unsubscribe("test/ping", a);
    assert_eq!(bus.listener_count("test/ping"), 1);
    bus.unsubscribe("test/ping", b);
    assert_eq!(bus.listener_count("test/ping"), 0);
}

#[tokio::test]
async fn subscriber_ids_are_unique() {
    let a = SubscriberId::next();
    let b = SubscriberId::next();
    assert_ne!(a, b);
}

// ===========================================================================
// Readiness wait
// ===========================================================================

#[tokio::test]
async fn wait_for_listener_returns_immediately_when_present() {
    let bus = MessageBus::default();
    let _sub = bus.subscribe("test/status", SubscriberId::next());
    assert!(
        bus.wait_for_listener("test/status", Duration::from_millis(100))
            .await
    );
}

#[tokio::test]
async fn wait_for_listener_times_out_without_one() {
    let bus = MessageBus::default();
    assert!(
        !bus.wait_for_listener("test/status", Duration::from_millis(50))
            .await
    );
}

#[tokio::test]
async fn wait_for_listener_sees_late_registration() {
    let bus = Arc::new(MessageBus::default());
    let waiter = {
        let bus = bus.clone();
        tokio::spawn(async move {
            bus.wait_for_listener("test/status", Duration::from_secs(2))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    let _sub = bus.subscribe("test/status", SubscriberId::next());

    assert!(waiter.await.unwrap());
}

// ===========================================================================
// Full-queue behavior
// ===========================================================================

#[tokio::test]
async fn full_listener_misses_messages_but_stays_registered() {
    let bus = MessageBus::new(2);
    let mut sub = bus.subscribe("test/ping", SubscriberId::next());

    for seq in 0..4 {
        bus.publish("test/ping", &Ping { seq });
    }

    // only the first two fit; later messages were dropped for this listener
    let drained = sub.try_drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(bus.listener_count("test/ping"), 1);
}
