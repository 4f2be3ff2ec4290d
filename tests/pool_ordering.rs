//! Worker pool scheduling: FIFO queue, scaling, disposal.
//!
//! Verifies:
//! - submissions beyond the idle capacity queue and drain in FIFO order
//! - the logical size never exceeds `max_workers`
//! - `scale` grows with idle slots, shrinks idle slots only, and clamps
//! - `dispose` rejects queued work and is idempotent
//! - surplus idle slots retire after `idle_timeout`
//! - a failing job frees its slot instead of killing it

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scopegate::{Bus, EngineConfig, TaskError, WorkerPool};

fn engine(default_workers: usize, max_workers: usize, idle_timeout: Duration) -> EngineConfig {
    EngineConfig {
        default_workers,
        max_workers,
        idle_timeout,
        bus_capacity: 64,
    }
}

fn pool(default_workers: usize, max_workers: usize) -> Arc<WorkerPool> {
    let cfg = engine(default_workers, max_workers, Duration::ZERO);
    WorkerPool::new(&cfg, Bus::new(&cfg))
}

#[tokio::test(start_paused = true)]
async fn queued_work_drains_in_fifo_order() {
    let pool = pool(2, 4);
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let record = |name: &'static str| {
        let order = Arc::clone(&order);
        move || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            order.lock().push(name);
            name
        }
    };

    let a = pool.execute(record("a"));
    let b = pool.execute(record("b"));
    let c = pool.execute(record("c"));
    let (ra, rb, rc) = tokio::join!(a, b, c);

    assert_eq!(ra.expect("a resolves"), "a");
    assert_eq!(rb.expect("b resolves"), "b");
    assert_eq!(rc.expect("c resolves"), "c");

    let order = order.lock();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2], "c", "c waited for a free slot");

    assert_eq!(pool.size(), 2);
    assert_eq!(pool.idle_count(), 2);
}

#[tokio::test]
async fn size_never_exceeds_max_workers() {
    let pool = pool(2, 4);
    assert_eq!(pool.scale(16), 4);
    assert_eq!(pool.size(), 4);
    assert_eq!(pool.max_workers(), 4);

    assert_eq!(pool.scale(0), 0);
    assert_eq!(pool.size(), 0);

    assert_eq!(pool.scale(3), 3);
    assert_eq!(pool.idle_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn scaling_down_never_kills_busy_slots() {
    let pool = pool(2, 4);

    let slow = {
        let pool = Arc::clone(&pool);
        async move {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "done"
            })
            .await
        }
    };
    let observer = {
        let pool = Arc::clone(&pool);
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(pool.busy_count(), 1);
            // One idle slot can go; the busy one stays.
            pool.scale(0);
            assert_eq!(pool.size(), 1);
            assert_eq!(pool.busy_count(), 1);
        }
    };

    let (result, ()) = tokio::join!(slow, observer);
    assert_eq!(result.expect("job resolves"), "done");

    // The busy slot drifted out once it settled.
    assert_eq!(pool.size(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_rejects_queued_work() {
    let pool = pool(1, 1);

    let running = {
        let pool = Arc::clone(&pool);
        async move {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "ran"
            })
            .await
        }
    };
    let queued = {
        let pool = Arc::clone(&pool);
        async move { pool.execute(|| async { "never" }).await }
    };
    let disposer = {
        let pool = Arc::clone(&pool);
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(pool.queue_len(), 1);
            pool.dispose();
            pool.dispose();
        }
    };

    let (ran, rejected, ()) = tokio::join!(running, queued, disposer);

    // The in-flight job settles; the queued one is rejected.
    assert_eq!(ran.expect("in-flight job resolves"), "ran");
    assert!(matches!(rejected, Err(TaskError::Rejected { .. })));
    assert!(pool.is_disposed());
    assert_eq!(pool.size(), 0);

    // Submissions after disposal are rejected immediately.
    let err = pool.execute(|| async { 1 }).await.expect_err("disposed");
    assert!(matches!(err, TaskError::Rejected { .. }));
}

#[tokio::test(start_paused = true)]
async fn surplus_idle_slots_retire_after_idle_timeout() {
    let cfg = engine(1, 4, Duration::from_millis(20));
    let pool = WorkerPool::new(&cfg, Bus::new(&cfg));
    assert_eq!(pool.scale(3), 3);

    tokio::time::sleep(Duration::from_millis(30)).await;

    // The sweep runs on the next pool interaction.
    let out = pool.execute(|| async { 5 }).await.expect("job resolves");
    assert_eq!(out, 5);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(pool.size(), 1, "surplus slots above the default retired");
}

#[tokio::test]
async fn panicking_job_surfaces_as_failure_not_disposal() {
    let pool = pool(1, 1);

    let err = pool
        .execute::<_, _, ()>(|| async { panic!("job bug") })
        .await
        .expect_err("panic surfaces as an error");
    match err {
        TaskError::Fail { reason } => assert!(reason.contains("panicked")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!pool.is_disposed(), "a crashed job does not dispose the pool");

    // The slot settled and keeps serving.
    tokio::task::yield_now().await;
    let ok = pool.execute(|| async { 3 }).await.expect("slot still serves");
    assert_eq!(ok, 3);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn failing_job_frees_its_slot() {
    let pool = pool(1, 1);

    let failed: Result<i32, TaskError> = pool
        .execute(|| async { Err(TaskError::fail("boom")) })
        .await
        .expect("the pool resolves with the job's own result");
    assert!(matches!(failed, Err(TaskError::Fail { .. })));

    // Give the settle hook a turn, then reuse the same slot.
    tokio::task::yield_now().await;
    let ok = pool
        .execute(|| async { Ok::<_, TaskError>(9) })
        .await
        .expect("pool resolves")
        .expect("job ok");
    assert_eq!(ok, 9);
    assert_eq!(pool.size(), 1);
}
