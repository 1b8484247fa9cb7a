#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chatrelay_core::error::{RelayError, Result};
use chatrelay_core::ChatMessage;
use chatrelay_gateway::obs::RelayMetrics;
use chatrelay_gateway::realtime::{
    Broadcast, BroadcastQueue, ConnectionRegistry, FanoutDispatcher, MessageSink, SessionId,
};

use common::{msg, recv_within, FailingSink, RecordingSink, StalledSink};

struct Fixture {
    registry: Arc<ConnectionRegistry>,
    queue: BroadcastQueue,
    metrics: Arc<RelayMetrics>,
    dispatcher: FanoutDispatcher,
}

fn fixture() -> Fixture {
    let registry = Arc::new(ConnectionRegistry::new());
    let metrics = Arc::new(RelayMetrics::default());
    let (queue, drain) = BroadcastQueue::bounded(16);
    let dispatcher = FanoutDispatcher::new(Arc::clone(&registry), drain, Arc::clone(&metrics));
    Fixture {
        registry,
        queue,
        metrics,
        dispatcher,
    }
}

fn add(reg: &ConnectionRegistry, sink: Arc<dyn MessageSink>) -> SessionId {
    let id = reg.next_id();
    reg.register(id.clone(), sink).unwrap();
    id
}

fn from(origin: &SessionId, sender: &str, text: &str, ts: i64) -> Broadcast {
    let mut message = msg(sender, text);
    message.stamp(ts);
    Broadcast {
        origin: origin.clone(),
        message,
    }
}

#[tokio::test]
async fn sender_is_excluded_from_its_own_broadcast() {
    let f = fixture();
    let (a_sink, mut a_rx) = RecordingSink::new();
    let (b_sink, mut b_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);
    add(&f.registry, b_sink);

    let summary = f.dispatcher.dispatch(from(&a, "A", "hello", 100)).await;
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 0);

    let got = b_rx.try_recv().unwrap();
    assert_eq!(got.text, "hello");
    assert_eq!(got.timestamp, 100);
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn echo_to_sender_includes_origin() {
    let f = fixture();
    let dispatcher = f.dispatcher.echo_to_sender(true);
    let (a_sink, mut a_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);

    let summary = dispatcher.dispatch(from(&a, "A", "me too", 1)).await;
    assert_eq!(summary.delivered, 1);
    assert_eq!(a_rx.try_recv().unwrap().text, "me too");
}

#[tokio::test]
async fn failed_recipient_is_evicted_within_one_cycle() {
    let f = fixture();
    let (a_sink, _a_rx) = RecordingSink::new();
    let (c_sink, mut c_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);
    let broken = Arc::new(FailingSink::default());
    let b = add(&f.registry, broken.clone());
    add(&f.registry, c_sink);

    let summary = f.dispatcher.dispatch(from(&a, "A", "one", 1)).await;
    assert_eq!(summary, chatrelay_gateway::realtime::DispatchSummary { delivered: 1, failed: 1 });
    assert!(!f.registry.contains(&b));
    assert!(broken.closed.load(Ordering::SeqCst));

    // never attempted again
    f.dispatcher.dispatch(from(&a, "A", "two", 2)).await;
    assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);

    assert_eq!(c_rx.try_recv().unwrap().text, "one");
    assert_eq!(c_rx.try_recv().unwrap().text, "two");

    assert_eq!(f.metrics.deliveries.get(&[("outcome", "failed")]), 1);
    assert_eq!(f.metrics.deliveries.get(&[("outcome", "ok")]), 2);
    assert_eq!(f.metrics.evictions.get(&[("reason", "closed")]), 1);
    assert_eq!(f.metrics.fanout_duration.count(&[]), 2);
}

/// Leaves the registry on its own just before its delivery fails, like a
/// session closing cleanly while a cycle is in flight.
struct DepartingSink {
    registry: Arc<ConnectionRegistry>,
    id: SessionId,
    closed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl MessageSink for DepartingSink {
    async fn deliver(&self, _msg: &ChatMessage) -> Result<()> {
        self.registry.unregister(&self.id);
        Err(RelayError::DeliveryFailure("closed"))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn departed_recipient_is_not_counted_as_evicted() {
    let f = fixture();
    let (a_sink, _a_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);

    let id = f.registry.next_id();
    let leaving = Arc::new(DepartingSink {
        registry: Arc::clone(&f.registry),
        id: id.clone(),
        closed: Default::default(),
    });
    f.registry.register(id.clone(), leaving.clone()).unwrap();

    let summary = f.dispatcher.dispatch(from(&a, "A", "bye", 1)).await;
    assert_eq!(summary.failed, 1);
    assert!(!f.registry.contains(&id));
    assert!(!leaving.closed.load(Ordering::SeqCst));
    assert_eq!(f.metrics.deliveries.get(&[("outcome", "failed")]), 1);
    assert_eq!(f.metrics.evictions.get(&[("reason", "closed")]), 0);
}

#[tokio::test]
async fn stalled_recipient_delays_only_until_its_timeout() {
    let f = fixture();
    let (a_sink, _a_rx) = RecordingSink::new();
    let (c_sink, mut c_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);
    let slow = add(
        &f.registry,
        Arc::new(StalledSink {
            timeout: Duration::from_millis(100),
        }),
    );
    add(&f.registry, c_sink);

    let summary = tokio::time::timeout(
        Duration::from_secs(2),
        f.dispatcher.dispatch(from(&a, "A", "x", 1)),
    )
    .await
    .expect("dispatch must finish once the slow sink times out");

    assert_eq!(summary.failed, 1);
    assert!(!f.registry.contains(&slow));
    assert_eq!(c_rx.try_recv().unwrap().text, "x");
    assert_eq!(f.metrics.evictions.get(&[("reason", "timeout")]), 1);
}

#[tokio::test]
async fn run_preserves_each_senders_order_for_every_recipient() {
    let f = fixture();
    let (a_sink, mut a_rx) = RecordingSink::new();
    let (b_sink, mut b_rx) = RecordingSink::new();
    let (c_sink, mut c_rx) = RecordingSink::new();
    let a = add(&f.registry, a_sink);
    let b = add(&f.registry, b_sink);
    add(&f.registry, c_sink);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(f.dispatcher.run(shutdown.clone()));

    for i in 0..20 {
        f.queue.enqueue(from(&a, "A", &format!("a{i}"), i)).await.unwrap();
        f.queue.enqueue(from(&b, "B", &format!("b{i}"), i)).await.unwrap();
    }

    let mut c_seen = Vec::new();
    for _ in 0..40 {
        c_seen.push(recv_within(&mut c_rx, 1000).await.unwrap().text);
    }
    let c_from_a: Vec<_> = c_seen.iter().filter(|t| t.starts_with('a')).cloned().collect();
    let expected: Vec<_> = (0..20).map(|i| format!("a{i}")).collect();
    assert_eq!(c_from_a, expected);

    for i in 0..20 {
        assert_eq!(recv_within(&mut b_rx, 1000).await.unwrap().text, format!("a{i}"));
        assert_eq!(recv_within(&mut a_rx, 1000).await.unwrap().text, format!("b{i}"));
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn run_stops_when_every_producer_is_gone() {
    let f = fixture();
    drop(f.queue);
    tokio::time::timeout(Duration::from_secs(1), f.dispatcher.run(CancellationToken::new()))
        .await
        .expect("dispatcher must exit on a closed queue");
}
