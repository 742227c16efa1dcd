#![forbid(unsafe_code)]

//! Bounded-concurrency task dispatcher.
//!
//! A fixed set of named worker threads pulls boxed tasks from one bounded
//! queue. At most `workers` tasks run at once and at most `queue_capacity`
//! wait for a worker. [`Dispatcher::submit`] blocks the caller while the
//! queue is full; [`Dispatcher::try_submit`] rejects with
//! [`ScheduleError::QueueFull`] instead.
//!
//! Tasks run on pool threads. Anything touching visual state must be
//! marshalled through [`crate::ui_thread::UiThread`].
//!
//! # Shutdown
//!
//! [`Dispatcher::close`] stops admission. Tasks already queued still run.
//! [`Dispatcher::join`] closes and waits for every worker; dropping the
//! dispatcher does the same.
//!
//! Calling the blocking [`Dispatcher::submit`] from inside a task can
//! deadlock when every worker does it against a full queue. Tasks that
//! schedule follow-up work should use [`Dispatcher::try_submit`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tgrid_core::snapshot::SnapshotStore;
use web_time::{Duration, Instant};

use crate::error::ScheduleError;

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_IDENTITY: &str = "tgrid-dispatch";

/// Construction parameters for a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Maximum tasks waiting for a worker. Clamped to at least 1.
    pub queue_capacity: usize,
    /// Worker thread count. Clamped to at least 1.
    pub workers: usize,
    /// Poll period of an idle worker.
    pub idle_interval: Duration,
    /// Diagnostic label; also the worker thread name prefix.
    pub identity: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            workers: 4,
            idle_interval: Duration::from_millis(200),
            identity: DEFAULT_IDENTITY.to_string(),
        }
    }
}

impl DispatcherConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

/// Point-in-time counters of a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub identity: String,
    pub workers: usize,
    pub capacity: usize,
    /// Submitted but not yet picked up by a worker.
    pub queued: usize,
    /// Currently executing.
    pub active: usize,
    /// Highest `active` observed since construction.
    pub peak_active: usize,
    /// Finished, including those that panicked.
    pub completed: u64,
    pub panicked: u64,
}

struct Job {
    task: Task,
    enqueued: Instant,
}

struct Shared {
    identity: SnapshotStore<String>,
    closed: AtomicBool,
    queued: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed pool of workers behind a bounded FIFO queue.
pub struct Dispatcher {
    shared: Arc<Shared>,
    sender: Mutex<Option<SyncSender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
    capacity: usize,
}

impl Dispatcher {
    /// Start the worker pool.
    pub fn new(config: DispatcherConfig) -> Result<Self, ScheduleError> {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Job>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared {
            identity: SnapshotStore::new(config.identity.clone()),
            closed: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let dispatcher = Self {
            shared: Arc::clone(&shared),
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(Vec::with_capacity(workers)),
            workers,
            capacity,
        };

        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let shared = Arc::clone(&shared);
            let idle = config.idle_interval;
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{index}", config.identity))
                .spawn(move || worker_loop(index, &receiver, &shared, idle));
            match spawned {
                Ok(handle) => dispatcher.lock_handles().push(handle),
                Err(e) => {
                    // Workers already running are joined by Drop.
                    return Err(ScheduleError::Spawn(e));
                }
            }
        }

        tracing::debug!(
            target: "tgrid.dispatch",
            identity = %config.identity,
            workers,
            capacity,
            "dispatcher started"
        );
        Ok(dispatcher)
    }

    /// Attach a diagnostic label used in logs and stats.
    pub fn set_identity(&self, identity: impl Into<String>) {
        self.shared.identity.store(identity.into());
    }

    pub fn identity(&self) -> String {
        String::clone(&self.shared.identity.load())
    }

    /// Enqueue `task`, blocking while the queue is full.
    pub fn submit<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender()?;
        let job = Job {
            task: Box::new(task),
            enqueued: Instant::now(),
        };
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    target: "tgrid.dispatch",
                    identity = %self.identity(),
                    capacity = self.capacity,
                    "queue full; submitter blocked"
                );
                sender.send(job).map_err(|_| {
                    self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                    ScheduleError::DispatcherClosed
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                Err(ScheduleError::DispatcherClosed)
            }
        }
    }

    /// Enqueue `task` without blocking.
    pub fn try_submit<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender()?;
        let job = Job {
            task: Box::new(task),
            enqueued: Instant::now(),
        };
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(
                    target: "tgrid.dispatch",
                    identity = %self.identity(),
                    capacity = self.capacity,
                    "queue full; task rejected"
                );
                Err(ScheduleError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                Err(ScheduleError::DispatcherClosed)
            }
        }
    }

    /// Stop accepting tasks. Queued tasks still run. Idempotent.
    pub fn close(&self) {
        let was_closed = self.shared.closed.swap(true, Ordering::AcqRel);
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);
        if !was_closed {
            tracing::debug!(
                target: "tgrid.dispatch",
                identity = %self.identity(),
                "dispatcher closed"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Close and wait for every worker to finish the remaining queue.
    ///
    /// A worker never joins itself, so calling this from a task only waits
    /// for the other workers.
    pub fn join(&self) {
        self.close();
        let handles = std::mem::take(&mut *self.lock_handles());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }

    /// Wait until nothing is queued or running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.queued.load(Ordering::Acquire) == 0
                && self.shared.active.load(Ordering::Acquire) == 0
            {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            identity: self.identity(),
            workers: self.workers,
            capacity: self.capacity,
            queued: self.shared.queued.load(Ordering::Acquire),
            active: self.shared.active.load(Ordering::Acquire),
            peak_active: self.shared.peak_active.load(Ordering::Acquire),
            completed: self.shared.completed.load(Ordering::Acquire),
            panicked: self.shared.panicked.load(Ordering::Acquire),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sender(&self) -> Result<SyncSender<Job>, ScheduleError> {
        if self.is_closed() {
            return Err(ScheduleError::DispatcherClosed);
        }
        // Clone out of the lock so a blocking send never holds it.
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .cloned()
            .ok_or(ScheduleError::DispatcherClosed)
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn worker_loop(
    index: usize,
    receiver: &Mutex<mpsc::Receiver<Job>>,
    shared: &Shared,
    idle_interval: Duration,
) {
    tracing::debug!(target: "tgrid.dispatch", worker = index, "worker started");
    loop {
        let next = {
            let rx = receiver.lock().unwrap_or_else(|e| e.into_inner());
            rx.recv_timeout(idle_interval)
        };
        match next {
            Ok(job) => run_job(index, job, shared),
            Err(RecvTimeoutError::Timeout) => {
                tracing::trace!(
                    target: "tgrid.dispatch",
                    worker = index,
                    idle_ms = idle_interval.as_millis() as u64,
                    "worker idle"
                );
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(target: "tgrid.dispatch", worker = index, "worker stopped");
}

// A dequeued job is always in at least one of queued, active or completed.
fn run_job(index: usize, job: Job, shared: &Shared) {
    let active = shared.active.fetch_add(1, Ordering::AcqRel) + 1;
    shared.queued.fetch_sub(1, Ordering::AcqRel);
    shared.peak_active.fetch_max(active, Ordering::AcqRel);

    let wait_us = job.enqueued.elapsed().as_micros() as u64;
    tracing::trace!(target: "tgrid.dispatch", worker = index, wait_us, "task started");

    let outcome = catch_unwind(AssertUnwindSafe(job.task));

    if outcome.is_err() {
        shared.panicked.fetch_add(1, Ordering::AcqRel);
    }
    shared.completed.fetch_add(1, Ordering::AcqRel);
    shared.active.fetch_sub(1, Ordering::AcqRel);
    if let Err(payload) = outcome {
        let identity = shared.identity.load();
        tracing::error!(
            target: "tgrid.dispatch",
            worker = index,
            identity = %identity,
            panic_msg = %panic_message(payload.as_ref()),
            "task panicked"
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn small(workers: usize, capacity: usize) -> Dispatcher {
        Dispatcher::new(
            DispatcherConfig::default()
                .with_workers(workers)
                .with_queue_capacity(capacity)
                .with_idle_interval(Duration::from_millis(10))
                .with_identity("test-pool"),
        )
        .unwrap()
    }

    #[test]
    fn runs_submitted_tasks() {
        let dispatcher = small(2, 8);
        let (tx, rx) = channel();
        for i in 0..5 {
            let tx = tx.clone();
            dispatcher.submit(move || tx.send(i).unwrap()).unwrap();
        }
        let mut got: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn single_worker_is_fifo() {
        let dispatcher = small(1, 16);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = Arc::clone(&order);
            dispatcher.submit(move || order.lock().unwrap().push(i)).unwrap();
        }
        dispatcher.join();
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn try_submit_rejects_when_full() {
        let dispatcher = small(1, 1);
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel::<()>();
        dispatcher
            .submit(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Worker busy; one slot in the queue.
        dispatcher.try_submit(|| {}).unwrap();
        let err = dispatcher.try_submit(|| {}).unwrap_err();
        assert!(matches!(err, ScheduleError::QueueFull));
        assert_eq!(dispatcher.stats().queued, 1);

        release_tx.send(()).unwrap();
        assert!(dispatcher.wait_idle(Duration::from_secs(2)));
        assert_eq!(dispatcher.stats().completed, 2);
    }

    #[test]
    fn submit_after_close_fails() {
        let dispatcher = small(1, 4);
        dispatcher.close();
        assert!(matches!(
            dispatcher.submit(|| {}),
            Err(ScheduleError::DispatcherClosed)
        ));
        assert!(matches!(
            dispatcher.try_submit(|| {}),
            Err(ScheduleError::DispatcherClosed)
        ));
    }

    #[test]
    fn idle_implies_every_submitted_task_is_counted() {
        let dispatcher = small(4, 8);
        let ran = Arc::new(AtomicUsize::new(0));
        for round in 1..=500 {
            let ran_task = Arc::clone(&ran);
            dispatcher
                .submit(move || {
                    ran_task.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            assert!(dispatcher.wait_idle(Duration::from_secs(2)));
            let stats = dispatcher.stats();
            assert_eq!(ran.load(Ordering::SeqCst), round);
            assert_eq!(stats.completed, round as u64);
            assert_eq!(stats.queued + stats.active, 0);
        }
    }

    #[test]
    fn queued_tasks_survive_close() {
        let dispatcher = small(1, 16);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let count = Arc::clone(&count);
            dispatcher
                .submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        dispatcher.join();
        assert_eq!(count.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let dispatcher = small(1, 4);
        dispatcher.submit(|| panic!("boom")).unwrap();
        let (tx, rx) = channel();
        dispatcher.submit(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);
        assert!(dispatcher.wait_idle(Duration::from_secs(2)));
        let stats = dispatcher.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn workers_are_named_after_identity() {
        let dispatcher = small(2, 4);
        let (tx, rx) = channel();
        dispatcher
            .submit(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            })
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(2)).unwrap().unwrap();
        assert!(name.starts_with("test-pool-worker-"), "{name}");
    }

    #[test]
    fn identity_is_reported_in_stats() {
        let dispatcher = small(1, 1);
        assert_eq!(dispatcher.stats().identity, "test-pool");
        dispatcher.set_identity("quotes");
        let stats = dispatcher.stats();
        assert_eq!(stats.identity, "quotes");
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.capacity, 1);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let dispatcher = small(0, 0);
        assert_eq!(dispatcher.workers(), 1);
        assert_eq!(dispatcher.capacity(), 1);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("borrowed");
        let other: Box<dyn std::any::Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
