//! Task execution paths and owned units.
//!
//! Verifies:
//! - `run` executes exactly once; a settled task rejects everything
//! - a failing run finalizes as `Error` with the failure recorded
//! - `effect` preserves the function's own shape
//! - deferred runs still settle and honour abort
//! - workers fail without being downgraded, terminate idempotently
//! - handlers run once, cancel before or during execution
//! - streaming runs surface the buffer's backpressure verdict
//! - the process-global authority slot installs and resets
//! - attached subscribers observe kernel events

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scopegate::{
    create_authority, current_authority, install_authority, reset_authority, Authority,
    EngineConfig, Event, EventKind, HandlerStatus, ScopeConfig, Subscribe, TaskError,
    TaskOutcome, TaskRunOptions, TaskStatus, WorkerStatus,
};

fn engine() -> EngineConfig {
    EngineConfig {
        default_workers: 2,
        max_workers: 4,
        idle_timeout: Duration::ZERO,
        bus_capacity: 256,
    }
}

#[tokio::test]
async fn run_executes_exactly_once() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("once", "Once"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let first = task
        .run(|_ctx| async move { Ok(1) }, TaskRunOptions::default())
        .await
        .expect("first run");
    assert_eq!(*first, 1);

    let second = task
        .run(|_ctx| async move { Ok(2) }, TaskRunOptions::default())
        .await
        .expect_err("second run fails fast");
    assert!(matches!(second, TaskError::Rejected { .. }));
    assert_eq!(task.status(), TaskStatus::Success, "status stays terminal");

    // Settled tasks reject every further operation.
    assert!(task.effect(|| ()).is_err());
    assert!(task.spawn_worker(|_t| async { Ok(()) }).is_err());
    assert!(task.add_handler(|_t| async { Ok(()) }).is_err());
    assert!(task.create_stream::<i32>().is_err());

    authority.dispose();
}

#[tokio::test]
async fn failing_run_finalizes_as_error() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("err", "Err"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let err = task
        .run(
            |_ctx| async move { Err::<(), _>(TaskError::fail("boom")) },
            TaskRunOptions::default(),
        )
        .await
        .expect_err("run fails");

    assert!(matches!(err, TaskError::Fail { .. }));
    assert_eq!(task.status(), TaskStatus::Error);
    assert_eq!(task.outcome(), Some(TaskOutcome::Error));
    let recorded = task.error().expect("failure recorded");
    assert!(recorded.contains("boom"));

    authority.dispose();
}

#[tokio::test]
async fn effect_preserves_the_functions_shape() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("fx", "Effect"))
        .expect("scope");
    scope.mount();

    // Synchronous shape.
    let task = scope.create_task(None).expect("task");
    assert_eq!(task.effect(|| 2 + 2).expect("sync effect"), 4);

    // Async shape: the future is handed back unawaited.
    let fut = task.effect(|| async { 6 * 7 }).expect("async effect");
    assert_eq!(fut.await, 42);

    authority.dispose();
}

#[tokio::test(start_paused = true)]
async fn deferred_run_settles_after_a_yield() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("df", "Deferred"))
        .expect("scope");
    scope.mount();

    let value = scope
        .run(|_ctx| async move { Ok(11) }, TaskRunOptions::deferred())
        .await
        .expect("deferred run settles");
    assert_eq!(*value, 11);

    // A task aborted beforehand refuses to run at all.
    let task = scope.create_task(None).expect("task");
    task.abort();
    let err = task
        .run(|_ctx| async move { Ok(0) }, TaskRunOptions::deferred())
        .await
        .expect_err("aborted task rejects run");
    assert!(matches!(err, TaskError::Rejected { .. }));
    assert_eq!(task.status(), TaskStatus::Aborted);

    authority.dispose();
}

#[tokio::test]
async fn worker_failure_is_recorded_and_never_downgraded() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("wf", "WorkerFail"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let worker = task
        .spawn_worker(|_token| async move { Err(TaskError::fail("disk on fire")) })
        .expect("worker");
    assert_eq!(task.worker_count(), 1);

    // Let the driver run to completion.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(worker.status(), WorkerStatus::Failed);
    assert!(worker.error().expect("recorded").contains("disk on fire"));

    // terminate never rewrites a failure.
    worker.terminate();
    assert_eq!(worker.status(), WorkerStatus::Failed);

    authority.dispose();
}

#[tokio::test]
async fn worker_observing_cancellation_terminates_quietly() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("wc", "WorkerCancel"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let worker = task
        .spawn_worker(|token| async move {
            token.cancelled().await;
            Err(TaskError::Canceled)
        })
        .expect("worker");

    tokio::task::yield_now().await;
    assert_eq!(worker.status(), WorkerStatus::Running);

    worker.terminate();
    worker.terminate();
    assert_eq!(worker.status(), WorkerStatus::Terminated);
    assert!(worker.token().is_cancelled());
    assert!(worker.error().is_none(), "abort errors are swallowed");

    authority.dispose();
}

#[tokio::test]
async fn handler_runs_once_and_cancels_cleanly() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("h", "Handlers"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");

    // Completes.
    let done = task
        .add_handler(|_token| async move { Ok(()) })
        .expect("handler");
    done.execute().await.expect("completes");
    assert_eq!(done.status(), HandlerStatus::Completed);

    // A second execute is a developer error and leaves status untouched.
    let err = done.execute().await.expect_err("single shot");
    assert!(matches!(err, TaskError::Rejected { .. }));
    assert_eq!(done.status(), HandlerStatus::Completed);

    // Cancellation preempts a pending handler.
    let preempted = task
        .add_handler(|_token| async move { Ok(()) })
        .expect("handler");
    preempted.cancel();
    assert_eq!(preempted.status(), HandlerStatus::Cancelled);
    let err = preempted.execute().await.expect_err("preempted");
    assert!(matches!(err, TaskError::Canceled));

    // Cancellation flags a running handler; the final status is set on
    // exit and no failure is recorded.
    let running = task
        .add_handler(|token| async move {
            token.cancelled().await;
            Ok(())
        })
        .expect("handler");
    let racer = running.clone();
    let join = tokio::spawn(async move { racer.execute().await });
    tokio::task::yield_now().await;
    assert_eq!(running.status(), HandlerStatus::Running);
    running.cancel();
    join.await.expect("join").expect("graceful exit");
    assert_eq!(running.status(), HandlerStatus::Cancelled);
    assert!(running.error().is_none());

    assert_eq!(task.handler_count(), 3);
    authority.dispose();
}

#[tokio::test]
async fn handler_failure_is_recorded() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("hf", "HandlerFail"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let handler = task
        .add_handler(|_token| async move { Err(TaskError::Fatal { reason: "bad".into() }) })
        .expect("handler");

    let err = handler.execute().await.expect_err("fails");
    assert!(err.is_fatal());
    assert_eq!(handler.status(), HandlerStatus::Failed);
    assert!(handler.error().expect("recorded").contains("bad"));

    authority.dispose();
}

#[tokio::test]
async fn streaming_run_surfaces_backpressure() {
    let authority = create_authority(Some(engine()));
    let scope = authority
        .create_scope(ScopeConfig::new("em", "Emit"))
        .expect("scope");
    scope.mount();

    let task = scope.create_task(None).expect("task");
    let value = task
        .run(
            |ctx| async move {
                for i in 0..5 {
                    assert!(ctx.emit(i as u64).expect("streaming enabled"));
                }
                Ok(())
            },
            TaskRunOptions::streaming(),
        )
        .await;
    assert!(value.is_ok());

    assert_eq!(task.chunk_count(), 5);
    let chunks = task.drain_chunks();
    let first = chunks[0].downcast_ref::<u64>().expect("u64 chunk");
    assert_eq!(*first, 0);
    assert_eq!(task.chunk_count(), 0);

    // Emitting without the streaming option is a developer error.
    let plain = scope.create_task(None).expect("task");
    let err = plain
        .run(
            |ctx| async move {
                ctx.emit(1u8)?;
                Ok(())
            },
            TaskRunOptions::default(),
        )
        .await
        .expect_err("emit without streaming");
    assert!(matches!(err, TaskError::Rejected { .. }));

    authority.dispose();
}

#[tokio::test]
async fn elapsed_deadlines_convert_to_task_errors() {
    let token = tokio_util::sync::CancellationToken::new();
    let elapsed = tokio::time::timeout(Duration::from_millis(5), token.cancelled())
        .await
        .expect_err("never fires");
    let err: TaskError = elapsed.into();
    assert_eq!(err.as_label(), "task_failed");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn global_authority_slot_installs_and_resets() {
    assert!(current_authority().is_err());

    let authority = create_authority(Some(engine()));
    install_authority(Arc::clone(&authority)).expect("fresh install");

    let again = create_authority(Some(engine()));
    let err = install_authority(again).expect_err("slot is taken");
    assert!(matches!(
        err,
        scopegate::KernelError::AuthorityAlreadyExists
    ));

    let current = current_authority().expect("installed");
    assert!(Arc::ptr_eq(&current, &authority));

    let removed = reset_authority().expect("slot held one");
    assert!(Arc::ptr_eq(&removed, &authority));
    assert!(current_authority().is_err());
    authority.dispose();
}

struct CountingSubscriber {
    seen: AtomicUsize,
}

#[async_trait]
impl Subscribe for CountingSubscriber {
    async fn on_event(&self, _event: &Event) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

struct FailuresOnly {
    seen: AtomicUsize,
}

#[async_trait]
impl Subscribe for FailuresOnly {
    async fn on_event(&self, _event: &Event) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    fn interest(&self, kind: EventKind) -> bool {
        kind == EventKind::TaskFailed
    }

    fn name(&self) -> &'static str {
        "failures-only"
    }
}

#[tokio::test(start_paused = true)]
async fn attached_subscribers_observe_kernel_events() {
    let counter = Arc::new(CountingSubscriber {
        seen: AtomicUsize::new(0),
    });
    let failures = Arc::new(FailuresOnly {
        seen: AtomicUsize::new(0),
    });
    let authority = Authority::with_subscribers(
        engine(),
        vec![Arc::clone(&counter) as _, Arc::clone(&failures) as _],
    );

    let scope = authority
        .create_scope(ScopeConfig::new("obs", "Observed"))
        .expect("scope");
    scope.mount();
    scope
        .run(|_ctx| async move { Ok(()) }, TaskRunOptions::default())
        .await
        .expect("run");

    // The pump and the lane workers are asynchronous; give them turns
    // until the events land.
    let mut waited = 0;
    while counter.seen.load(Ordering::Relaxed) == 0 && waited < 100 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        waited += 1;
    }
    assert!(
        counter.seen.load(Ordering::Relaxed) > 0,
        "subscriber observed kernel events"
    );
    assert_eq!(
        failures.seen.load(Ordering::Relaxed),
        0,
        "a successful run produces nothing for a failures-only interest"
    );

    authority.dispose();
}
