use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Base subscriber that logs events to stderr.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
pub struct LogSubscriber;

#[async_trait]
impl Subscribe for LogSubscriber {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::TaskStarting => {
                eprintln!("[starting] scope={:?} task={:?}", e.scope, e.task);
            }
            EventKind::TaskCompleted => {
                eprintln!("[completed] task={:?}", e.task);
            }
            EventKind::TaskFailed => {
                eprintln!("[failed] task={:?} err={:?}", e.task, e.error);
            }
            EventKind::TaskAborted => {
                eprintln!("[aborted] task={:?}", e.task);
            }
            EventKind::WorkerFailed | EventKind::HandlerFailed => {
                eprintln!(
                    "[unit-failed] task={:?} unit={:?} err={:?}",
                    e.task, e.unit, e.error
                );
            }
            EventKind::PoolScaled => {
                eprintln!("[pool-scaled] {:?}", e.reason);
            }
            EventKind::PoolSaturated => {
                eprintln!("[pool-saturated] {:?}", e.reason);
            }
            EventKind::PoolDisposed => {
                eprintln!("[pool-disposed] {:?}", e.reason);
            }
            EventKind::ScopeCreated
            | EventKind::ScopeMounted
            | EventKind::ScopeSuspended
            | EventKind::ScopeResumed
            | EventKind::ScopeDisposed => {
                eprintln!("[scope] kind={:?} scope={:?}", e.kind, e.scope);
            }
            EventKind::ListenerPanicked
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {
                eprintln!("[delivery-fault] kind={:?} err={:?}", e.kind, e.error);
            }
            EventKind::AuthorityDisposed => {
                eprintln!("[authority-disposed]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
