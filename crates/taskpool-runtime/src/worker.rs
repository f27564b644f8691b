//! Worker threads
//!
//! A `ThreadWorker` is one OS thread with private state: a task queue, a
//! wake semaphore and the recollector for the results it produces. Tasks
//! never migrate between workers; balancing happens at submission time.
//!
//! # Wake protocol
//!
//! Every accepted task is pushed and then the wake semaphore is posted once,
//! both under the submission gate. Shutdown closes the gate, publishes
//! `Draining` and posts one final unit. Each wake pops at most one task, so
//! the worker sees every task before it sees the shutdown unit; an empty
//! pop while `Draining` means the queue is done and the thread may exit.
//!
//! # State machine
//!
//! ```text
//!   Idle ──wake + task──▶ Running ──body returned──▶ Idle
//!     │                      │
//!     └──── shutdown ────────┴──▶ Draining ──queue empty──▶ Stopped
//! ```
//!
//! `Stopped` is published by the spawned thread itself once the lifespan
//! returns or unwinds, whatever lifespan was installed. The gate closes with
//! it, and anything still queued is dropped so its waiter sees `NoValue`.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use taskpool_core::error::{PoolError, PoolResult, WorkerError};
use taskpool_core::{kdebug, kerror, kinfo, kwarn};
use taskpool_core::{
    OwnerId, Recollector, RecollectorStats, ResultScalar, ResultValue, SpinLock, TaskQueue,
    WorkerState,
};

use crate::async_result::{AsyncResult, Completer, ResultRecollector};
use crate::config::PoolConfig;
use crate::pool::PoolShared;
use crate::sync::{new_semaphore, PlatformSemaphore, Semaphore};
use crate::task_queue::SegTaskQueue;

/// Non-owning reference from a worker back to its pool
pub type ContainerRef = Weak<PoolShared>;

/// Worker thread body
pub type Lifespan = fn(Arc<WorkerShared>, ContainerRef);

/// Type-erased task body; `None` means it produced no value
pub type TaskBody = Box<dyn FnOnce() -> Option<ResultValue> + Send + 'static>;

/// A queued unit of work and, if someone is waiting, its producer half
pub struct Task {
    body: TaskBody,
    completer: Option<Completer>,
}

impl Task {
    /// Task whose return value is written to `completer`
    pub fn with_result<F, V>(f: F, completer: Completer) -> Self
    where
        F: FnOnce() -> V + Send + 'static,
        V: ResultScalar,
    {
        Self {
            body: Box::new(move || Some(f().into_value())),
            completer: Some(completer),
        }
    }

    /// Fire-and-forget task
    pub fn detached<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            body: Box::new(move || {
                f();
                None
            }),
            completer: None,
        }
    }
}

thread_local! {
    static CURRENT_WORKER_ID: Cell<usize> = const { Cell::new(usize::MAX) };
}

fn set_current_worker_id(id: usize) {
    CURRENT_WORKER_ID.with(|cell| cell.set(id));
}

/// Index of the worker running on this thread, `None` off-pool
#[inline]
pub fn current_worker_id() -> Option<usize> {
    let id = CURRENT_WORKER_ID.with(|cell| cell.get());
    (id != usize::MAX).then_some(id)
}

/// State shared between a worker thread and its submitters
pub struct WorkerShared {
    id: usize,
    owner: OwnerId,
    queue: SegTaskQueue<Task>,
    wake: PlatformSemaphore,
    recollector: Arc<ResultRecollector>,
    state: AtomicU8,
    /// Open while submissions are accepted
    gate: SpinLock<bool>,
    executed: AtomicU64,
    panicked: AtomicU64,
    debug_logging: bool,
}

impl WorkerShared {
    fn new(id: usize, config: &PoolConfig) -> PoolResult<Self> {
        let owner = OwnerId::for_worker(id).ok_or(WorkerError::TooManyWorkers)?;
        let wake = new_semaphore(0).map_err(PoolError::ResourceExhausted)?;
        let recollector = Arc::new(Recollector::new(owner, config.recollector_capacity));

        for _ in 0..config.prewarm_results {
            if let Err(e) = recollector.release(AsyncResult::alloc_owned(owner)) {
                e.into_inner().free();
                break;
            }
        }

        Ok(Self {
            id,
            owner,
            queue: SegTaskQueue::new(),
            wake,
            recollector,
            state: AtomicU8::new(WorkerState::Idle as u8),
            gate: SpinLock::new(true),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            debug_logging: config.debug_logging,
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::Acquire))
    }

    /// Recollector for results this worker produces
    #[inline]
    pub fn recollector(&self) -> &Arc<ResultRecollector> {
        &self.recollector
    }

    /// Queue `task` and wake the worker.
    ///
    /// Refused with `ShuttingDown` once shutdown was requested; the task is
    /// dropped, which signals its completer.
    pub fn enqueue(&self, task: Task) -> PoolResult<()> {
        let open = self.gate.lock();
        if !*open {
            return Err(PoolError::ShuttingDown);
        }
        self.queue.push(task);
        self.wake.post();
        drop(open);
        Ok(())
    }

    /// Close the gate and tell the worker to drain. Idempotent, and a
    /// no-op once the worker has stopped.
    pub fn request_shutdown(&self) {
        let mut open = self.gate.lock();
        if !*open {
            return;
        }
        *open = false;
        if self.state() != WorkerState::Stopped {
            self.state.store(WorkerState::Draining as u8, Ordering::Release);
        }
        self.wake.post();
    }

    /// Final transition once the lifespan has returned (or unwound).
    ///
    /// Closes the gate, publishes `Stopped`, and drops whatever the
    /// lifespan left queued so those waiters see `NoValue`.
    fn retire(&self) {
        {
            let mut open = self.gate.lock();
            *open = false;
            self.state.store(WorkerState::Stopped as u8, Ordering::Release);
        }
        let mut discarded = 0usize;
        while let Some(task) = self.queue.pop() {
            drop(task);
            discarded += 1;
        }
        if discarded > 0 {
            kwarn!("worker {} exited with {} tasks queued, discarded", self.id, discarded);
        }
    }

    /// Block until woken by a submission or by shutdown
    #[inline]
    pub fn park(&self) {
        self.wake.wait();
    }

    /// Next queued task, if any
    #[inline]
    pub fn next_task(&self) -> Option<Task> {
        self.queue.pop()
    }

    /// Execute one task on the calling thread.
    ///
    /// A panicking body is contained here: it is logged and counted, and its
    /// completer is dropped so the waiter sees `NoValue`.
    pub fn run(&self, task: Task, container: &ContainerRef) {
        // Draining is sticky; only an Idle worker becomes Running
        let _ = self.transition(WorkerState::Idle, WorkerState::Running);

        let Task { body, completer } = task;
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => {
                if let Some(mut completer) = completer {
                    if let Some(value) = value {
                        completer.write_value(value);
                    }
                    completer.signal();
                }
            }
            Err(payload) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                kerror!("worker {} task panicked: {}", self.id, panic_message(&*payload));
                drop(completer);
            }
        }
        self.executed.fetch_add(1, Ordering::Relaxed);

        if let Some(pool) = container.upgrade() {
            pool.note_completed();
        }

        let _ = self.transition(WorkerState::Running, WorkerState::Idle);
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            state: self.state(),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            queued: self.queue.len(),
            recollector: self.recollector.stats(),
        }
    }
}

/// Snapshot of one worker's counters
#[derive(Debug, Clone, Copy)]
pub struct WorkerStats {
    pub id: usize,
    pub state: WorkerState,
    /// Tasks run to completion or to a panic
    pub executed: u64,
    pub panicked: u64,
    /// Tasks waiting in the queue when sampled
    pub queued: usize,
    pub recollector: RecollectorStats,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Default lifespan: serve the queue until drained after shutdown
pub fn dispatch_loop(worker: Arc<WorkerShared>, container: ContainerRef) {
    set_current_worker_id(worker.id());
    if worker.debug_logging {
        kinfo!("worker {} started", worker.id());
    } else {
        kdebug!("worker {} started", worker.id());
    }

    loop {
        worker.park();
        match worker.next_task() {
            Some(task) => worker.run(task, &container),
            None if worker.state() == WorkerState::Draining => break,
            None => {}
        }
    }

    // Anything pushed between the last wake and the gate closing
    while let Some(task) = worker.next_task() {
        worker.run(task, &container);
    }

    let freed = worker.recollector().drain().len();
    let stats = worker.stats();
    if worker.debug_logging {
        kinfo!(
            "worker {} stopped: executed={} panicked={} freed={}",
            stats.id,
            stats.executed,
            stats.panicked,
            freed
        );
    } else {
        kdebug!(
            "worker {} stopped: executed={} panicked={} freed={}",
            stats.id,
            stats.executed,
            stats.panicked,
            freed
        );
    }
}

/// Retires the worker when its thread body ends, including by panic
struct Retire(Arc<WorkerShared>);

impl Drop for Retire {
    fn drop(&mut self) {
        self.0.retire();
    }
}

/// Handle to one worker thread
pub struct ThreadWorker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Create the worker's state and start its thread running `lifespan`
    pub fn spawn(
        id: usize,
        config: &PoolConfig,
        lifespan: Lifespan,
        container: ContainerRef,
    ) -> PoolResult<Self> {
        let shared = Arc::new(WorkerShared::new(id, config)?);
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name(format!("taskpool-worker-{}", id))
            .stack_size(config.worker_stack_size)
            .spawn(move || {
                let _retire = Retire(Arc::clone(&thread_shared));
                lifespan(thread_shared, container);
            })
            .map_err(|e| {
                kerror!("failed to spawn worker {}: {}", id, e);
                WorkerError::SpawnFailed
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.shared.id()
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    #[inline]
    pub fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    #[inline]
    pub fn submit(&self, task: Task) -> PoolResult<()> {
        self.shared.enqueue(task)
    }

    #[inline]
    pub fn request_shutdown(&self) {
        self.shared.request_shutdown();
    }

    /// Wait for the thread to exit. Idempotent.
    pub fn join(&mut self) -> PoolResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|_| {
            kerror!("worker {} lifespan panicked", self.id());
            PoolError::WorkerError(WorkerError::Panicked)
        })
    }

    pub fn stats(&self) -> WorkerStats {
        self.shared.stats()
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.request_shutdown();
        let _ = self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_result::handoff;
    use std::sync::mpsc;
    use std::time::Duration;

    fn config() -> PoolConfig {
        PoolConfig::new().num_workers(1).recollector_capacity(8)
    }

    fn spawn(id: usize) -> ThreadWorker {
        ThreadWorker::spawn(id, &config(), dispatch_loop, Weak::new()).unwrap()
    }

    #[test]
    fn test_runs_task_and_writes_result() {
        let worker = spawn(0);
        let (completer, handle) = handoff(worker.shared().recollector()).unwrap();
        worker.submit(Task::with_result(|| 6u64 * 7, completer)).unwrap();
        assert_eq!(handle.wait().unwrap().as_u64(), Some(42));
    }

    #[test]
    fn test_thread_identity() {
        let worker = spawn(3);
        let (completer, handle) = handoff(worker.shared().recollector()).unwrap();
        worker
            .submit(Task::with_result(
                || {
                    assert_eq!(
                        thread::current().name(),
                        Some("taskpool-worker-3")
                    );
                    current_worker_id().map_or(u32::MAX, |id| id as u32)
                },
                completer,
            ))
            .unwrap();
        assert_eq!(handle.wait_as::<u32>().unwrap(), 3);
        assert_eq!(current_worker_id(), None);
    }

    #[test]
    fn test_results_return_to_owner() {
        let worker = spawn(2);
        let home = Arc::clone(worker.shared().recollector());
        assert_eq!(home.owner(), OwnerId::new(2));

        let (completer, handle) = handoff(&home).unwrap();
        assert_eq!(handle.owner(), OwnerId::new(2));
        worker.submit(Task::with_result(|| 1i32, completer)).unwrap();
        handle.wait().unwrap();

        // Both halves are gone once wait returns and the worker has signalled
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while home.len() != 1 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        assert_eq!(home.len(), 1);
    }

    #[test]
    fn test_panicking_task_reports_no_value() {
        let mut worker = spawn(0);
        let (completer, handle) = handoff(worker.shared().recollector()).unwrap();
        worker
            .submit(Task::with_result(|| -> u64 { panic!("boom") }, completer))
            .unwrap();
        assert_eq!(handle.wait(), Err(PoolError::NoValue));

        // Worker survives and keeps serving
        let (completer, handle) = handoff(worker.shared().recollector()).unwrap();
        worker.submit(Task::with_result(|| 5u32, completer)).unwrap();
        assert_eq!(handle.wait_as::<u32>().unwrap(), 5);

        worker.request_shutdown();
        worker.join().unwrap();
        let stats = worker.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.executed, 2);
    }

    #[test]
    fn test_drains_queue_before_stopping() {
        let mut worker = spawn(0);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();

        // Hold the worker inside the first task
        worker
            .submit(Task::detached(move || {
                let _ = gate_rx.recv();
            }))
            .unwrap();

        let handles: Vec<_> = (0..3u64)
            .map(|i| {
                let (c, h) = handoff(worker.shared().recollector()).unwrap();
                worker.submit(Task::with_result(move || i + 100, c)).unwrap();
                h
            })
            .collect();

        worker.request_shutdown();
        assert_eq!(worker.state(), WorkerState::Draining);
        assert_eq!(
            worker.submit(Task::detached(|| {})).unwrap_err(),
            PoolError::ShuttingDown
        );

        gate_tx.send(()).unwrap();
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);

        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.poll(), taskpool_core::ResultStatus::Done);
            assert_eq!(h.wait().unwrap().as_u64(), Some(i as u64 + 100));
        }
        assert_eq!(worker.stats().executed, 4);
    }

    #[test]
    fn test_prewarm() {
        let config = config().prewarm_results(4);
        let worker = ThreadWorker::spawn(1, &config, dispatch_loop, Weak::new()).unwrap();
        assert_eq!(worker.shared().recollector().len(), 4);

        let (c, h) = handoff(worker.shared().recollector()).unwrap();
        assert_eq!(worker.shared().recollector().stats().hits, 1);
        worker.submit(Task::with_result(|| 0.5f64, c)).unwrap();
        assert_eq!(h.wait_as::<f64>().unwrap(), 0.5);
    }

    #[test]
    fn test_too_many_workers() {
        let err = ThreadWorker::spawn(usize::from(u8::MAX), &config(), dispatch_loop, Weak::new())
            .err()
            .unwrap();
        assert_eq!(err, PoolError::WorkerError(WorkerError::TooManyWorkers));
    }

    #[test]
    fn test_custom_lifespan() {
        fn run_one_then_exit(worker: Arc<WorkerShared>, container: ContainerRef) {
            worker.park();
            if let Some(task) = worker.next_task() {
                worker.run(task, &container);
            }
        }

        let mut worker = ThreadWorker::spawn(0, &config(), run_one_then_exit, Weak::new()).unwrap();
        let (c, h) = handoff(worker.shared().recollector()).unwrap();
        worker.submit(Task::with_result(|| 9i32, c)).unwrap();
        assert_eq!(h.wait_as::<i32>().unwrap(), 9);
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_early_exit_closes_gate() {
        fn exit_after_first_wake(worker: Arc<WorkerShared>, _container: ContainerRef) {
            worker.park();
        }

        let mut worker =
            ThreadWorker::spawn(0, &config(), exit_after_first_wake, Weak::new()).unwrap();
        let (c, h) = handoff(worker.shared().recollector()).unwrap();
        worker.submit(Task::with_result(|| 1u64, c)).unwrap();

        // Left in the queue by the lifespan, so dropped unrun
        assert_eq!(h.wait(), Err(PoolError::NoValue));
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(worker.shared().queue.len(), 0);

        assert_eq!(
            worker.submit(Task::detached(|| {})).unwrap_err(),
            PoolError::ShuttingDown
        );

        // Shutdown after exit must not move the state backwards
        let shared = Arc::clone(worker.shared());
        worker.request_shutdown();
        assert_eq!(shared.state(), WorkerState::Stopped);
        drop(worker);
        assert_eq!(shared.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_panicked_lifespan_still_stops() {
        fn explode_after_wake(worker: Arc<WorkerShared>, _container: ContainerRef) {
            worker.park();
            panic!("lifespan failure");
        }

        let mut worker =
            ThreadWorker::spawn(0, &config(), explode_after_wake, Weak::new()).unwrap();
        let (c, h) = handoff(worker.shared().recollector()).unwrap();
        worker.submit(Task::with_result(|| 2u32, c)).unwrap();

        assert_eq!(h.wait(), Err(PoolError::NoValue));
        assert!(worker.join().is_err());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(
            worker.submit(Task::detached(|| {})).unwrap_err(),
            PoolError::ShuttingDown
        );
    }

    #[test]
    fn test_join_reports_panicked_lifespan() {
        fn explode(_worker: Arc<WorkerShared>, _container: ContainerRef) {
            panic!("lifespan failure");
        }
        let mut worker = ThreadWorker::spawn(0, &config(), explode, Weak::new()).unwrap();
        assert_eq!(
            worker.join().unwrap_err(),
            PoolError::WorkerError(WorkerError::Panicked)
        );
        // Second join is a no-op
        assert!(worker.join().is_ok());
    }
}
