//! Execution queue: a single FIFO drained by one serialized pump.
//!
//! Producers (triggers, manual runs) hold a cloneable [`QueueHandle`] and send
//! [`QueuedRun`] messages over an unbounded channel. The pump task owns the
//! FIFO, appends every received message and drains from the front.
//!
//! Before dispatching the head entry the drain counts running executions in
//! the [`HistoryLedger`]. At or above the ceiling the entry goes back to the
//! *front* and draining stops until the next message arrives. Entries behind
//! a blocked head may wait indefinitely; ordering is best-effort FIFO.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoflow_types::workflow::TriggerContext;

use super::history::HistoryLedger;

/// Default ceiling on simultaneously running executions.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The pump has shut down.
    #[error("execution queue closed")]
    Closed,
}

/// A pending `(workflow, context)` request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRun {
    pub workflow_id: Uuid,
    pub context: TriggerContext,
}

pub type QueueReceiver = mpsc::UnboundedReceiver<QueuedRun>;

/// Producer side of the queue.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<QueuedRun>,
}

impl QueueHandle {
    pub fn enqueue(&self, workflow_id: Uuid, context: TriggerContext) -> Result<(), QueueError> {
        tracing::debug!(%workflow_id, trigger = context.as_str(), "workflow enqueued");
        self.tx
            .send(QueuedRun {
                workflow_id,
                context,
            })
            .map_err(|_| QueueError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create the producer handle and the receiver the pump consumes.
pub fn channel() -> (QueueHandle, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueHandle { tx }, rx)
}

/// Whatever actually executes a dequeued run.
pub trait RunDispatcher: Send + Sync {
    fn dispatch(&self, run: QueuedRun) -> impl Future<Output = ()> + Send;
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The FIFO is empty.
    Idle,
    /// The head entry was re-queued because the ceiling was reached.
    Blocked,
}

/// The FIFO plus its ceiling.
pub struct ExecutionQueue {
    pending: VecDeque<QueuedRun>,
    ceiling: usize,
    history: Arc<HistoryLedger>,
}

impl ExecutionQueue {
    pub fn new(ceiling: usize, history: Arc<HistoryLedger>) -> Self {
        Self {
            pending: VecDeque::new(),
            ceiling: ceiling.max(1),
            history,
        }
    }

    pub fn push(&mut self, run: QueuedRun) {
        self.pending.push_back(run);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Pop and dispatch entries until the FIFO is empty or the ceiling blocks.
    pub async fn drain<D: RunDispatcher>(&mut self, dispatcher: &D) -> DrainOutcome {
        while let Some(run) = self.pending.pop_front() {
            let running = self.history.running_count().await;
            if running >= self.ceiling {
                tracing::warn!(
                    workflow_id = %run.workflow_id,
                    running,
                    ceiling = self.ceiling,
                    queued = self.pending.len() + 1,
                    "concurrency ceiling reached, deferring queue"
                );
                self.pending.push_front(run);
                return DrainOutcome::Blocked;
            }
            dispatcher.dispatch(run).await;
        }
        DrainOutcome::Idle
    }

    /// Pump loop: receive, append, drain. Runs until cancelled or every
    /// producer handle is dropped.
    pub async fn run<D: RunDispatcher>(
        mut self,
        mut rx: QueueReceiver,
        dispatcher: D,
        cancel: CancellationToken,
    ) {
        tracing::info!(ceiling = self.ceiling, "execution queue pump started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(run) => {
                        self.push(run);
                        // Fold in anything else already waiting so it keeps its order.
                        while let Ok(run) = rx.try_recv() {
                            self.push(run);
                        }
                        self.drain(&dispatcher).await;
                    }
                    None => break,
                },
            }
        }

        if !self.pending.is_empty() {
            tracing::warn!(dropped = self.pending.len(), "execution queue stopped with pending runs");
        }
        tracing::info!("execution queue pump stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use autoflow_types::workflow::{Execution, Workflow};
    use tokio::sync::Mutex;

    /// Records dispatch order.
    struct RecordingDispatcher {
        seen: Arc<Mutex<Vec<Uuid>>>,
    }

    impl RunDispatcher for RecordingDispatcher {
        async fn dispatch(&self, run: QueuedRun) {
            self.seen.lock().await.push(run.workflow_id);
        }
    }

    fn run_for(id: Uuid) -> QueuedRun {
        QueuedRun {
            workflow_id: id,
            context: TriggerContext::Manual,
        }
    }

    async fn ledger_with_running(count: usize) -> Arc<HistoryLedger> {
        let ledger = Arc::new(HistoryLedger::new(100, 30));
        let wf = Workflow::new("busy", "");
        for _ in 0..count {
            ledger.record(Execution::begin(&wf, TriggerContext::Manual)).await;
        }
        ledger
    }

    #[tokio::test]
    async fn test_drain_dispatches_in_fifo_order() {
        let ledger = ledger_with_running(0).await;
        let mut queue = ExecutionQueue::new(2, ledger);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
        for id in &ids {
            queue.push(run_for(*id));
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = RecordingDispatcher { seen: seen.clone() };
        assert_eq!(queue.drain(&dispatcher).await, DrainOutcome::Idle);
        assert_eq!(*seen.lock().await, ids);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_requeues_head_at_front() {
        let ledger = ledger_with_running(2).await;
        let mut queue = ExecutionQueue::new(2, ledger.clone());
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        queue.push(run_for(first));
        queue.push(run_for(second));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = RecordingDispatcher { seen: seen.clone() };
        assert_eq!(queue.drain(&dispatcher).await, DrainOutcome::Blocked);
        assert!(seen.lock().await.is_empty());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending.front().map(|r| r.workflow_id), Some(first));
    }

    #[tokio::test]
    async fn test_blocked_queue_resumes_after_capacity_frees() {
        let ledger = ledger_with_running(1).await;
        let mut queue = ExecutionQueue::new(1, ledger.clone());
        let id = Uuid::now_v7();
        queue.push(run_for(id));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = RecordingDispatcher { seen: seen.clone() };
        assert_eq!(queue.drain(&dispatcher).await, DrainOutcome::Blocked);

        // Finish the running execution, then drain again.
        let mut running = ledger.query(None, 10).await.remove(0);
        running.finish(autoflow_types::workflow::ExecutionStatus::Completed, None);
        ledger.update(&running).await;

        assert_eq!(queue.drain(&dispatcher).await, DrainOutcome::Idle);
        assert_eq!(*seen.lock().await, vec![id]);
    }

    #[tokio::test]
    async fn test_pump_processes_messages_until_cancelled() {
        let ledger = ledger_with_running(0).await;
        let queue = ExecutionQueue::new(DEFAULT_MAX_CONCURRENT, ledger);
        let (handle, rx) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = RecordingDispatcher { seen: seen.clone() };
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(queue.run(rx, dispatcher, cancel.clone()));

        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        handle.enqueue(a, TriggerContext::Manual).unwrap();
        handle.enqueue(b, TriggerContext::Manual).unwrap();

        for _ in 0..50 {
            if seen.lock().await.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*seen.lock().await, vec![a, b]);

        cancel.cancel();
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_after_pump_dropped_fails() {
        let (handle, rx) = channel();
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.enqueue(Uuid::now_v7(), TriggerContext::Manual),
            Err(QueueError::Closed)
        ));
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        let queue = ExecutionQueue::new(0, Arc::new(HistoryLedger::new(10, 1)));
        assert_eq!(queue.ceiling(), 1);
    }
}
