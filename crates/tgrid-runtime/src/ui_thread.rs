#![forbid(unsafe_code)]

//! Marshalling onto the UI thread.
//!
//! Visual state may only be mutated on the UI thread. Background code hands
//! closures to a [`UiThread`] implementation and the host runs them from its
//! event loop. [`UiQueue`] is the channel-backed implementation used by
//! headless hosts and tests: producers hold a cloneable [`UiHandle`], the
//! owning thread calls [`UiQueue::drain`] or [`UiQueue::pump_for`].

use std::sync::Arc;
use std::sync::mpsc;

use web_time::{Duration, Instant};

/// A closure to run on the UI thread.
pub type UiAction = Box<dyn FnOnce() + Send + 'static>;

/// Host primitive that runs a closure on the UI thread.
pub trait UiThread: Send + Sync {
    /// Queue `action` for execution on the UI thread. Never blocks.
    fn run_on_ui(&self, action: UiAction);
}

impl<T: UiThread + ?Sized> UiThread for Arc<T> {
    fn run_on_ui(&self, action: UiAction) {
        (**self).run_on_ui(action);
    }
}

/// Runs actions immediately on the calling thread.
///
/// For hosts whose visual objects are already thread-safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineUi;

impl UiThread for InlineUi {
    fn run_on_ui(&self, action: UiAction) {
        action();
    }
}

/// Receiving end of the UI queue. Owned by the UI thread.
pub struct UiQueue {
    sender: mpsc::Sender<UiAction>,
    receiver: mpsc::Receiver<UiAction>,
    executed: u64,
}

/// Cloneable producer side of a [`UiQueue`].
#[derive(Clone)]
pub struct UiHandle {
    sender: mpsc::Sender<UiAction>,
}

impl UiQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            executed: 0,
        }
    }

    pub fn handle(&self) -> UiHandle {
        UiHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run every action queued so far. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(action) = self.receiver.try_recv() {
            action();
            ran += 1;
        }
        self.executed += ran as u64;
        ran
    }

    /// Run actions as they arrive for `duration`. Returns how many ran.
    pub fn pump_for(&mut self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(action) => {
                    action();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        self.executed += ran as u64;
        ran
    }

    /// Run actions until `done` returns true or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub fn pump_until(&mut self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = (deadline - now).min(Duration::from_millis(5));
            if let Ok(action) = self.receiver.recv_timeout(wait) {
                action();
                self.executed += 1;
            }
        }
    }

    /// Total actions executed by this queue.
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UiQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiQueue")
            .field("executed", &self.executed)
            .finish()
    }
}

impl UiThread for UiHandle {
    fn run_on_ui(&self, action: UiAction) {
        if self.sender.send(action).is_err() {
            tracing::trace!(target: "tgrid.ui", "ui queue dropped; action discarded");
        }
    }
}

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle").finish_non_exhaustive()
    }
}
