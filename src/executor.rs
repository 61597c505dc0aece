//! Concurrent flow execution
//!
//! Two executors share the same worker-pool machinery. `SyncFlowExecutor`
//! drains its queue once and terminates when no work is queued or in
//! flight. `ContinuousSyncFlowExecutor` keeps running until stopped and
//! accepts new (optionally delayed) flows while executing, which is what
//! a file-watching caller needs.
//!
//! Flows are deduplicated by `FlowId`: a flow equal to one already queued
//! or in flight is dropped at submission. Dependent flows produced by a
//! completed sync re-enter the queue through the same gate.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::context::SyncContext;
use crate::error::FlowError;
use crate::flows::{execute_flow, flow_lock_keys, FlowId, FlowOutcome, SyncFlow};
use crate::locks::{LockChain, LockDistributor};

const DEFAULT_WORKERS: usize = 8;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decides what a failed flow means for the rest of the run: `Ok(())`
/// swallows the failure, `Err` aborts the executor once in-flight flows
/// drain.
pub type ExceptionHandler = dyn Fn(FlowError) -> Result<(), FlowError>;

/// Swallows recoverable failures with a warning pointing at a full
/// deployment as the fallback; anything else aborts the run.
pub fn default_exception_handler(error: FlowError) -> Result<(), FlowError> {
    if error.source.is_recoverable() {
        log::warn!(
            "could not sync '{}': {}; run a full deployment to bring it up to date",
            error.flow,
            error.source
        );
        Ok(())
    } else {
        Err(error)
    }
}

struct Task {
    flow: Box<dyn SyncFlow>,
    chain: LockChain,
}

enum TaskResult {
    Done {
        id: FlowId,
        outcome: FlowOutcome,
    },
    Failed {
        id: FlowId,
        error: FlowError,
    },
}

/// Workers pull tasks from a shared receiver and report results back.
/// They exit when the task channel disconnects.
fn spawn_workers(
    workers: usize,
    ctx: &Arc<SyncContext>,
    task_rx: Arc<Mutex<Receiver<Task>>>,
    result_tx: Sender<TaskResult>,
) -> Vec<JoinHandle<()>> {
    (0..workers)
        .map(|_| {
            let ctx = Arc::clone(ctx);
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            thread::spawn(move || loop {
                let received = task_rx
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .recv_timeout(POLL_INTERVAL);
                let mut task = match received {
                    Ok(task) => task,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                let id = task.flow.flow_id();
                let result = match execute_flow(task.flow.as_mut(), &ctx, Some(&task.chain)) {
                    Ok(outcome) => TaskResult::Done { id, outcome },
                    Err(error) => TaskResult::Failed { id, error },
                };
                if result_tx.send(result).is_err() {
                    break;
                }
            })
        })
        .collect()
}

/// One-shot executor: runs everything queued (plus transitive dependents)
/// to completion, then terminates.
pub struct SyncFlowExecutor {
    ctx: Arc<SyncContext>,
    distributor: Arc<LockDistributor>,
    workers: usize,
    queue: VecDeque<Box<dyn SyncFlow>>,
    seen: HashSet<FlowId>,
}

impl SyncFlowExecutor {
    pub fn new(ctx: Arc<SyncContext>, distributor: Arc<LockDistributor>) -> Self {
        Self {
            ctx,
            distributor,
            workers: DEFAULT_WORKERS,
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Queue a flow. Returns false if an equal flow was already queued or
    /// has already run in this execution.
    pub fn add_sync_flow(&mut self, flow: Box<dyn SyncFlow>) -> bool {
        if !self.seen.insert(flow.flow_id()) {
            log::debug!("dropping duplicate flow {}", flow.flow_id());
            return false;
        }
        self.queue.push_back(flow);
        true
    }

    /// Run every queued flow to completion.
    ///
    /// Dependents of successful syncs join the queue, deduplicated against
    /// everything seen this run. After the handler requests an abort,
    /// nothing new is dispatched; in-flight flows drain first.
    pub fn execute(&mut self, handler: &ExceptionHandler) -> Result<(), FlowError> {
        let (task_tx, task_rx) = mpsc::channel::<Task>();
        let (result_tx, result_rx) = mpsc::channel::<TaskResult>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let handles = spawn_workers(self.workers, &self.ctx, task_rx, result_tx);

        let mut in_flight = 0usize;
        let mut abort: Option<FlowError> = None;

        while let Some(flow) = self.queue.pop_front() {
            let chain = self.distributor.get_lock_chain(&flow_lock_keys(flow.as_ref()));
            // Workers only exit on disconnect, so this send cannot fail
            // while task_tx is alive.
            if task_tx.send(Task { flow, chain }).is_ok() {
                in_flight += 1;
            }
        }

        while in_flight > 0 {
            let result = match result_rx.recv() {
                Ok(result) => result,
                Err(_) => break,
            };
            in_flight -= 1;
            match result {
                TaskResult::Done {
                    outcome: FlowOutcome::Synced { dependents },
                    ..
                } if abort.is_none() => {
                    for dependent in dependents {
                        if !self.seen.insert(dependent.flow_id()) {
                            log::debug!("dropping duplicate flow {}", dependent.flow_id());
                            continue;
                        }
                        let chain = self
                            .distributor
                            .get_lock_chain(&flow_lock_keys(dependent.as_ref()));
                        if task_tx.send(Task { flow: dependent, chain }).is_ok() {
                            in_flight += 1;
                        }
                    }
                }
                TaskResult::Done { .. } => {}
                TaskResult::Failed { error, .. } => {
                    if abort.is_none() {
                        if let Err(fatal) = handler(error) {
                            log::error!("aborting sync run: {fatal}");
                            abort = Some(fatal);
                        }
                    }
                }
            }
        }

        drop(task_tx);
        for handle in handles {
            let _ = handle.join();
        }

        match abort {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Cooperative stop signal for a running `ContinuousSyncFlowExecutor`
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

struct PendingFlow {
    due: Instant,
    flow: Box<dyn SyncFlow>,
}

/// Persistent executor: accepts flows while running and keeps going until
/// stopped. A completed flow's ID leaves the dedup set, so the same
/// resource can be synced again on its next change.
pub struct ContinuousSyncFlowExecutor {
    ctx: Arc<SyncContext>,
    distributor: Arc<LockDistributor>,
    workers: usize,
    running: Arc<AtomicBool>,
    pending: Mutex<Vec<PendingFlow>>,
    tracked: Mutex<HashSet<FlowId>>,
}

impl ContinuousSyncFlowExecutor {
    pub fn new(ctx: Arc<SyncContext>, distributor: Arc<LockDistributor>) -> Self {
        Self {
            ctx,
            distributor,
            workers: DEFAULT_WORKERS,
            running: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(Vec::new()),
            tracked: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Queue a flow for immediate execution
    pub fn add_sync_flow(&self, flow: Box<dyn SyncFlow>) -> bool {
        self.add_delayed_sync_flow(flow, Duration::ZERO)
    }

    /// Queue a flow that becomes eligible to run after `delay`. Returns
    /// false if an equal flow is already queued or in flight.
    pub fn add_delayed_sync_flow(&self, flow: Box<dyn SyncFlow>, delay: Duration) -> bool {
        let id = flow.flow_id();
        if !self
            .tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone())
        {
            log::debug!("dropping duplicate flow {id}");
            return false;
        }
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PendingFlow {
                due: Instant::now() + delay,
                flow,
            });
        true
    }

    fn untrack(&self, id: &FlowId) {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    /// Take the pending flows whose delay has elapsed
    fn due_flows(&self) -> Vec<Box<dyn SyncFlow>> {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let mut due = Vec::new();
        let mut i = 0;
        while i < pending.len() {
            if pending[i].due <= now {
                due.push(pending.swap_remove(i).flow);
            } else {
                i += 1;
            }
        }
        due
    }

    /// Run until stopped or until the handler requests an abort.
    ///
    /// Flows added while running are picked up on the next poll tick.
    /// In-flight flows drain before this returns.
    pub fn execute(&self, handler: &ExceptionHandler) -> Result<(), FlowError> {
        self.running.store(true, Ordering::SeqCst);

        let (task_tx, task_rx) = mpsc::channel::<Task>();
        let (result_tx, result_rx) = mpsc::channel::<TaskResult>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let handles = spawn_workers(self.workers, &self.ctx, task_rx, result_tx);

        let mut in_flight = 0usize;
        let mut abort: Option<FlowError> = None;

        while self.running.load(Ordering::SeqCst) && abort.is_none() {
            for flow in self.due_flows() {
                let chain = self.distributor.get_lock_chain(&flow_lock_keys(flow.as_ref()));
                if task_tx.send(Task { flow, chain }).is_ok() {
                    in_flight += 1;
                }
            }

            let result = match result_rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            in_flight -= 1;
            match result {
                TaskResult::Done { id, outcome } => {
                    self.untrack(&id);
                    if let FlowOutcome::Synced { dependents } = outcome {
                        for dependent in dependents {
                            self.add_sync_flow(dependent);
                        }
                    }
                }
                TaskResult::Failed { id, error } => {
                    self.untrack(&id);
                    if let Err(fatal) = handler(error) {
                        log::error!("aborting sync loop: {fatal}");
                        abort = Some(fatal);
                    }
                }
            }
        }

        // Drain what is already running; nothing new gets dispatched.
        while in_flight > 0 {
            match result_rx.recv() {
                Ok(TaskResult::Done { id, .. }) | Ok(TaskResult::Failed { id, .. }) => {
                    self.untrack(&id);
                    in_flight -= 1;
                }
                Err(_) => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        drop(task_tx);
        for handle in handles {
            let _ = handle.join();
        }

        match abort {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
