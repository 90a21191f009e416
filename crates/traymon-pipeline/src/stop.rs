use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Shared, one-way stop flag that sleeping loops can wait on.
///
/// Every component's idle wait goes through [`StopSignal::wait_timeout`], so
/// a stop request wakes it immediately instead of after the full interval.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    /// Create an un-triggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake every waiter.
    pub fn stop(&self) {
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.inner.cvar.notify_all();
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` or until stop is requested.
    ///
    /// Returns `true` if stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .inner
            .cvar
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}
