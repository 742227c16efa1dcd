#![forbid(unsafe_code)]

//! Cooperative cancellation for timer loops.
//!
//! Every timer-driven loop in tgrid (animation sequences, the drag sampler)
//! is owned by a visual object through a [`CancelSource`]. The loop holds a
//! [`CancelToken`] and sleeps with [`CancelToken::wait_timeout`], so a
//! cancel wakes it immediately instead of after the next tick.
//!
//! ```
//! use tgrid_core::cancellation::CancelSource;
//! use std::time::Duration;
//!
//! let source = CancelSource::new();
//! let token = source.token();
//! let worker = std::thread::spawn(move || {
//!     let mut ticks = 0;
//!     while !token.wait_timeout(Duration::from_millis(5)) {
//!         ticks += 1;
//!     }
//!     ticks
//! });
//! source.cancel();
//! let _ = worker.join();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use web_time::{Duration, Instant};

struct Shared {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Control side of a cancellation pair.
///
/// Dropping the source does not cancel; owners cancel explicitly on
/// teardown (see `AnimationHandle` and the drag session in the runtime).
pub struct CancelSource {
    shared: Arc<Shared>,
}

/// Observer side of a cancellation pair. Cheap to clone.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// A token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request cancellation and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        // Store under the lock so a waiter cannot check the flag and then
        // park after the notification was sent.
        let _guard = self.shared.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` or until cancelled.
    ///
    /// Returns `true` if cancelled, `false` if the full duration elapsed.
    /// Spurious wakeups are absorbed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let deadline = Instant::now() + duration;
        let mut guard = self.shared.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .shared
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
