//! Stream multicast, replay, and buffer backpressure.
//!
//! Verifies:
//! - subscribers present at emission time see every emission exactly
//!   once, in emission order
//! - a late subscriber first receives the full replay, then live events
//! - closed and aborted streams drop emissions silently and never
//!   convert into one another
//! - a panicking subscriber never starves the others
//! - the stream buffer honours its high-water mark and `close`

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scopegate::{create_authority, EngineConfig, ScopeConfig, StreamBuffer, StreamStatus};

fn engine() -> EngineConfig {
    EngineConfig {
        default_workers: 1,
        max_workers: 2,
        idle_timeout: Duration::ZERO,
        bus_capacity: 64,
    }
}

#[tokio::test]
async fn late_subscriber_gets_replay_then_live_events() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("st", "Streams"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let stream = task.create_stream::<i32>().expect("stream");

    stream.emit(1);
    stream.emit(2);
    stream.emit(3);
    assert_eq!(stream.replay_len(), 3);

    let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = stream.subscribe(move |v| sink.lock().push(*v));
    assert!(sub.is_registered());

    // Replay is synchronous and ordered.
    assert_eq!(*seen.lock(), vec![1, 2, 3]);

    stream.emit(4);
    assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);

    stream.close();
    stream.emit(5);
    assert_eq!(*seen.lock(), vec![1, 2, 3, 4], "closed stream drops emissions");
    assert_eq!(stream.status(), StreamStatus::Closed);

    // Terminal statuses never convert.
    stream.abort();
    assert_eq!(stream.status(), StreamStatus::Closed);

    authority.dispose();
}

#[tokio::test]
async fn unsubscribed_listener_stops_receiving() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("un", "Unsub"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let stream = task.create_stream::<u32>().expect("stream");

    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = stream.subscribe(move |v| sink.lock().push(*v));

    stream.emit(10);
    assert!(sub.unsubscribe());
    stream.emit(11);

    assert_eq!(*seen.lock(), vec![10]);
    assert_eq!(stream.subscriber_count(), 0);

    authority.dispose();
}

#[tokio::test]
async fn panicking_subscriber_does_not_starve_the_rest() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("pn", "Panics"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let stream = task.create_stream::<i32>().expect("stream");

    let _bad = stream.subscribe(|_v| panic!("listener bug"));
    let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _good = stream.subscribe(move |v| sink.lock().push(*v));

    stream.emit(7);
    stream.emit(8);
    assert_eq!(*seen.lock(), vec![7, 8]);

    authority.dispose();
}

#[tokio::test]
async fn subscribing_to_a_closed_stream_is_inert() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("cl", "Closed"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let stream = task.create_stream::<i32>().expect("stream");
    stream.emit(1);
    stream.close();

    let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = stream.subscribe(move |v| sink.lock().push(*v));

    assert!(!sub.is_registered());
    assert!(seen.lock().is_empty(), "no replay on a closed stream");
    assert!(!sub.unsubscribe());

    authority.dispose();
}

#[tokio::test]
async fn task_abort_aborts_open_streams() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("sa", "StreamAbort"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let stream = task.create_stream::<i32>().expect("stream");
    assert_eq!(task.stream_count(), 1);

    task.abort();
    assert_eq!(stream.status(), StreamStatus::Aborted);

    authority.dispose();
}

#[test]
fn buffer_rejects_pushes_at_the_high_water_mark() {
    let mut buf = StreamBuffer::with_high_water(3);
    assert!(buf.push(1));
    assert!(buf.push(2));
    assert!(buf.push(3));

    assert!(!buf.push(4), "rejected at the mark");
    assert!(!buf.push(5), "still rejected");
    assert_eq!(buf.len(), 3, "rejected pushes insert nothing");

    assert_eq!(buf.chunks(), vec![1, 2, 3]);
    assert_eq!(buf.drain(), vec![1, 2, 3]);
    assert!(buf.is_empty());

    assert!(buf.push(6), "drained buffer accepts again");
    buf.close();
    assert!(!buf.push(7), "closed buffer rejects");
    assert!(buf.is_closed());
    assert_eq!(buf.len(), 1);
}

#[test]
fn buffer_default_high_water_mark() {
    let buf: StreamBuffer<u8> = StreamBuffer::new();
    assert_eq!(buf.high_water(), scopegate::DEFAULT_HIGH_WATER);
}
