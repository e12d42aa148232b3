use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cooperative cancellation signal for the blocking `start` call.
///
/// Clones share one flag. A device blocked in `start` either polls
/// [`CancelToken::is_cancelled`] or parks in [`CancelToken::wait_timeout`];
/// [`CancelToken::cancel`] from any thread wakes it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Parks for at most `timeout`. Returns `true` once cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            return true;
        }
        let (cancelled, _) = self
            .inner
            .signal
            .wait_timeout(cancelled, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_a_parked_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            while !waiter.wait_timeout(Duration::from_secs(5)) {}
            started.elapsed()
        });

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let waited = handle.join().expect("waiter thread panicked");
        assert!(waited < Duration::from_secs(5));
    }
}
