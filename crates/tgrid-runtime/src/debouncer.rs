#![forbid(unsafe_code)]

//! Key-based debouncing.
//!
//! [`Debouncer::call`] arms a one-shot timer per key. Calls for a key that
//! is already armed replace the pending callback but leave the deadline
//! alone, so a burst collapses into one execution of the most recent
//! callback, `delay` after the first call of the burst. Keys are
//! independent.
//!
//! One named timer thread serves every key. It sleeps on a condition
//! variable until the earliest deadline, so arming a new key wakes it only
//! when the new deadline comes first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use rustc_hash::FxHashMap;
use web_time::{Duration, Instant};

use crate::dispatcher::Dispatcher;
use crate::error::ScheduleError;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Where a fired callback runs.
#[derive(Clone, Default)]
pub enum FireMode {
    /// On the debouncer's timer thread. Callbacks are expected to be short
    /// and to marshal visual work onto the UI thread.
    #[default]
    Inline,
    /// Submitted to a dispatcher so slow callbacks never delay other keys.
    Dispatch(Arc<Dispatcher>),
}

impl std::fmt::Debug for FireMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => write!(f, "Inline"),
            Self::Dispatch(d) => write!(f, "Dispatch({})", d.identity()),
        }
    }
}

/// Counters reported by [`Debouncer::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Calls that armed a new timer.
    pub armed: u64,
    /// Calls that replaced the callback of an armed timer.
    pub replaced: u64,
    pub fired: u64,
    pub cancelled: u64,
}

struct Entry {
    callback: Callback,
    deadline: Instant,
    seq: u64,
}

#[derive(Default)]
struct State {
    entries: FxHashMap<String, Entry>,
    timers: BinaryHeap<Reverse<(Instant, u64, String)>>,
    next_seq: u64,
    shutdown: bool,
    stats: DebounceStats,
}

impl State {
    /// Drop heap items whose entry was cancelled or re-armed once they
    /// outnumber the live ones, keeping the heap within
    /// `2 * entries + STALE_SLACK` items.
    fn prune_stale(&mut self) {
        if self.timers.len() <= 2 * self.entries.len() + STALE_SLACK {
            return;
        }
        let before = self.timers.len();
        let entries = &self.entries;
        self.timers
            .retain(|Reverse((_, seq, key))| entries.get(key).is_some_and(|e| e.seq == *seq));
        tracing::trace!(
            target: "tgrid.debounce",
            dropped = before - self.timers.len(),
            "stale timers pruned"
        );
    }
}

const STALE_SLACK: usize = 32;

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Collapses bursts of keyed callbacks into one delayed execution.
pub struct Debouncer {
    shared: Arc<Shared>,
    mode: FireMode,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Start the timer thread.
    pub fn new(mode: FireMode) -> Result<Self, ScheduleError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wake: Condvar::new(),
        });
        let timer = {
            let shared = Arc::clone(&shared);
            let mode = mode.clone();
            thread::Builder::new()
                .name("tgrid-debounce".into())
                .spawn(move || timer_loop(&shared, &mode))?
        };
        Ok(Self {
            shared,
            mode,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Arm or re-arm `key` with `callback`.
    ///
    /// When `key` is already armed only the callback is replaced; the
    /// original deadline stands and `delay` is ignored.
    pub fn call<F>(
        &self,
        key: impl Into<String>,
        delay: Duration,
        callback: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(ScheduleError::DebouncerClosed);
        }

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.callback = Box::new(callback);
            state.stats.replaced += 1;
            tracing::trace!(target: "tgrid.debounce", key = %key, "callback replaced");
            return Ok(());
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = Instant::now() + delay;
        let earliest = state
            .timers
            .peek()
            .is_none_or(|Reverse((next, _, _))| deadline < *next);
        state.entries.insert(
            key.clone(),
            Entry {
                callback: Box::new(callback),
                deadline,
                seq,
            },
        );
        state.timers.push(Reverse((deadline, seq, key.clone())));
        state.stats.armed += 1;
        state.prune_stale();
        drop(state);

        tracing::trace!(
            target: "tgrid.debounce",
            key = %key,
            delay_ms = delay.as_millis() as u64,
            "timer armed"
        );
        if earliest {
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    /// Discard the pending callback for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &str) -> bool {
        let mut state = self.shared.lock();
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.cancelled += 1;
            state.prune_stale();
            tracing::trace!(target: "tgrid.debounce", key = %key, "timer cancelled");
        }
        removed
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.shared.lock().entries.contains_key(key)
    }

    /// When the pending callback for `key` will fire.
    pub fn deadline(&self, key: &str) -> Option<Instant> {
        self.shared.lock().entries.get(key).map(|e| e.deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn stats(&self) -> DebounceStats {
        self.shared.lock().stats
    }

    pub fn mode(&self) -> &FireMode {
        &self.mode
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Discard pending callbacks and stop the timer thread. Idempotent.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.timers.clear();
            let discarded = state.entries.len();
            state.entries.clear();
            discarded
        };
        self.shared.wake.notify_all();

        let handle = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            tracing::debug!(target: "tgrid.debounce", discarded, "debouncer shut down");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("mode", &self.mode)
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn timer_loop(shared: &Shared, mode: &FireMode) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let Some((deadline, seq, key)) = state
            .timers
            .peek()
            .map(|Reverse((deadline, seq, key))| (*deadline, *seq, key.clone()))
        else {
            state = shared.wake.wait(state).unwrap_or_else(|e| e.into_inner());
            continue;
        };

        // Timers whose entry was cancelled or re-armed are stale.
        if state.entries.get(&key).is_none_or(|entry| entry.seq != seq) {
            state.timers.pop();
            continue;
        }

        let now = Instant::now();
        if deadline > now {
            state = shared
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
            continue;
        }

        state.timers.pop();
        let Some(entry) = state.entries.remove(&key) else {
            continue;
        };
        state.stats.fired += 1;
        drop(state);

        let late_us = now.duration_since(entry.deadline).as_micros() as u64;
        tracing::debug!(target: "tgrid.debounce", key = %key, late_us, "debounce fired");
        fire(&key, entry.callback, mode);

        state = shared.lock();
    }
}

fn fire(key: &str, callback: Callback, mode: &FireMode) {
    match mode {
        FireMode::Inline => {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!(target: "tgrid.debounce", key = %key, "debounced callback panicked");
            }
        }
        FireMode::Dispatch(dispatcher) => {
            if let Err(e) = dispatcher.submit(callback) {
                tracing::warn!(
                    target: "tgrid.debounce",
                    key = %key,
                    error = %e,
                    "debounced callback dropped"
                );
            }
        }
    }
}
