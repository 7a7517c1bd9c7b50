//! Cooperative cancellation shared by all capture loops.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A one-way stop flag that sleeping loops can wait on.
///
/// Clones share the same flag. Once stopped it stays stopped.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Creates a signal that has not been stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop and wakes every waiter.
    pub fn stop(&self) {
        let (lock, condvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !*stopped {
            *stopped = true;
            tracing::info!("Stop requested");
        }
        condvar.notify_all();
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for `interval` unless a stop arrives first.
    ///
    /// Returns `true` if the signal was stopped before or during the wait.
    pub fn wait_timeout(&self, interval: Duration) -> bool {
        let (lock, condvar) = &*self.inner;
        let deadline = Instant::now() + interval;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Loop to ride out spurious wakeups.
        while !*stopped {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let (guard, _) = condvar
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
        *stopped
    }

    /// Installs a SIGINT/SIGTERM handler that stops this signal.
    ///
    /// Only one handler can be installed per process.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.stop())
    }
}
