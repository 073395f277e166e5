//! Cooperative cancellation for reader and relay tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of the interruptible sleep in [`StopSignal::wait`]
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Cancellation flag shared between the orchestrator and one task.
///
/// Every task gets its own signal rather than a process-global one: the UWB
/// driver clears its signal between the ranging stage and the cleanup
/// stages, which must not affect sibling tasks. Tasks poll the signal at
/// protocol-step boundaries, so all blocking calls in the loops need a
/// bounded timeout for the latency guarantee to hold.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a new, unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the owning task to stop at its next protocol-step boundary
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clear the signal so cleanup stages can run their drain loops
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Check whether a stop has been requested
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `duration`, waking early if the signal is set.
    ///
    /// Returns `true` when the signal was observed before the full duration
    /// elapsed. Sleeps in short slices so long backoff pauses stay
    /// cancellable.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_set() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_and_clear() {
        let stop = StopSignal::new();
        assert!(!stop.is_set());
        stop.set();
        assert!(stop.is_set());
        stop.clear();
        assert!(!stop.is_set());
    }

    #[test]
    fn test_clones_share_state() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.set();
        assert!(stop.is_set());
    }

    #[test]
    fn test_wait_runs_to_completion_when_unset() {
        let stop = StopSignal::new();
        let start = Instant::now();
        assert!(!stop.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_wakes_early_on_signal() {
        let stop = StopSignal::new();
        let setter = stop.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        let start = Instant::now();
        assert!(stop.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_returns_immediately_when_already_set() {
        let stop = StopSignal::new();
        stop.set();
        let start = Instant::now();
        assert!(stop.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
