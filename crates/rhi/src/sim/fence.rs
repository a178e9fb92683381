//! Software completion fence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::error::{RhiError, RhiResult};
use crate::sync::CompletionFence;

struct FenceState {
    name: String,
    value: Mutex<u64>,
    signaled: Condvar,
}

/// Counter + condition variable standing in for a native fence and its OS event.
///
/// Clones share the same counter; the queue worker holds a clone to signal it.
#[derive(Clone)]
pub struct SimFence {
    state: Arc<FenceState>,
}

impl SimFence {
    /// Creates a fence whose counter starts at 0.
    pub fn new(name: &str) -> Self {
        debug!("Created sim fence '{}'", name);
        Self {
            state: Arc::new(FenceState {
                name: name.to_owned(),
                value: Mutex::new(0),
                signaled: Condvar::new(),
            }),
        }
    }

    /// Debug name given at creation.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Advances the counter to `value` and wakes waiters.
    ///
    /// This is the GPU side of the fence; the queue worker calls it once the
    /// preceding work has retired. Values at or below the current one are
    /// ignored so the counter stays monotonic.
    pub fn signal(&self, value: u64) {
        let mut current = self.state.value.lock();
        if value <= *current {
            warn!(
                "Fence '{}' signaled with stale value {} (current {})",
                self.state.name, value, *current
            );
            return;
        }
        *current = value;
        trace!("Fence '{}' reached {}", self.state.name, value);
        self.state.signaled.notify_all();
    }
}

impl CompletionFence for SimFence {
    fn completed_value(&self) -> u64 {
        *self.state.value.lock()
    }

    fn wait(&self, value: u64, timeout: Duration) -> RhiResult<()> {
        let mut current = self.state.value.lock();
        if *current >= value {
            return Ok(());
        }

        trace!(
            "Waiting on fence '{}' for {} (completed {})",
            self.state.name, value, *current
        );

        // A timeout too large to represent behaves like an unbounded wait.
        let deadline = Instant::now().checked_add(timeout);
        while *current < value {
            match deadline {
                Some(deadline) => {
                    if self.state.signaled.wait_until(&mut current, deadline).timed_out()
                        && *current < value
                    {
                        return Err(RhiError::WaitTimeout {
                            value,
                            completed: *current,
                            timeout,
                        });
                    }
                }
                None => self.state.signaled.wait(&mut current),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SimFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimFence")
            .field("name", &self.state.name)
            .field("value", &self.completed_value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_on_completed_value_returns_immediately() {
        let fence = SimFence::new("test");
        for value in 1..=5 {
            fence.signal(value);
        }

        let start = Instant::now();
        fence.wait(5, Duration::from_secs(10)).expect("already complete");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_unsignaled_value_times_out() {
        let fence = SimFence::new("test");
        fence.signal(4);

        let start = Instant::now();
        let err = fence.wait(5, Duration::from_millis(10)).unwrap_err();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(2), "wait hung for {elapsed:?}");
        match err {
            RhiError::WaitTimeout {
                value, completed, ..
            } => {
                assert_eq!(value, 5);
                assert_eq!(completed, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wait_wakes_on_signal_from_other_thread() {
        let fence = SimFence::new("test");
        let signaler = fence.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signaler.signal(1);
            signaler.signal(2);
        });

        fence.wait(2, Duration::from_secs(5)).expect("signaled in time");
        assert!(fence.is_complete(2));
        handle.join().expect("signaler thread");
    }

    #[test]
    fn test_stale_signal_keeps_counter_monotonic() {
        let fence = SimFence::new("test");
        fence.signal(7);
        fence.signal(3);
        assert_eq!(fence.completed_value(), 7);

        let mut last = 0;
        for value in [8, 8, 2, 9] {
            fence.signal(value);
            let observed = fence.completed_value();
            assert!(observed >= last);
            last = observed;
        }
        assert_eq!(last, 9);
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SimFence>();
    }
}
