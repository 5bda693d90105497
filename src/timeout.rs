//! Timeout Scheduler
//!
//! One background worker arms one-shot, cancellable timers. The process-wide
//! instance is created on first use and lives until exit; separate instances
//! can be built for tests.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

static SHARED: OnceLock<TimeoutScheduler> = OnceLock::new();

/// Arms one-shot timers on a single worker thread
#[derive(Clone)]
pub struct TimeoutScheduler {
    runtime: Arc<Runtime>,
}

impl TimeoutScheduler {
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("popup-timeout")
            .enable_time()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// The process-wide scheduler, started on first use.
    ///
    /// Panics if the timer worker thread cannot be spawned.
    pub fn shared() -> &'static TimeoutScheduler {
        SHARED.get_or_init(|| {
            debug!("Starting shared timeout scheduler");
            Self::new().expect("Failed to start timeout scheduler")
        })
    }

    /// Run `on_fire` once after `after`, unless the returned handle is
    /// cancelled first.
    pub fn arm<F>(&self, after: Duration, on_fire: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(ARMED));
        let fire_state = state.clone();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            // Losing this race means cancel() got there first.
            if fire_state
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                trace!(after_ms = after.as_millis() as u64, "timer fired");
                on_fire();
            }
        });

        TimerHandle {
            state,
            abort: task.abort_handle(),
        }
    }

    /// Same as [`TimerHandle::cancel`]
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        handle.cancel()
    }
}

/// Cancellable handle to one armed timer. Handles are independent of each
/// other; cancelling one never touches another.
#[derive(Debug)]
pub struct TimerHandle {
    state: Arc<AtomicU8>,
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancel the timer. Returns `true` when this call stopped the callback
    /// from running; after the timer fired (or a previous cancel) it is a
    /// no-op that returns `false`.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.abort.abort();
        }
        cancelled
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    #[test]
    fn test_timer_fires_once() {
        let scheduler = TimeoutScheduler::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = scheduler.arm(Duration::from_millis(10), move || {
            let _ = tx.send(());
        });

        rx.recv_timeout(Duration::from_secs(2)).expect("timer should fire");
        assert!(handle.has_fired());
        assert!(!handle.cancel(), "cancel after firing is a no-op");
        assert!(handle.has_fired());
    }

    #[test]
    fn test_cancel_before_fire_suppresses_callback() {
        let scheduler = TimeoutScheduler::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = scheduler.arm(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.is_pending());
        assert!(scheduler.cancel(&handle));
        assert!(!handle.cancel(), "second cancel is a no-op");

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!handle.has_fired());
    }

    #[test]
    fn test_handles_are_independent() {
        let scheduler = TimeoutScheduler::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let tx_a = tx.clone();
        let a = scheduler.arm(Duration::from_millis(40), move || {
            let _ = tx_a.send("a");
        });
        let b = scheduler.arm(Duration::from_millis(40), move || {
            let _ = tx.send("b");
        });

        assert!(a.cancel());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok("b"));
        assert!(b.has_fired());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_zero_delay_fires() {
        let scheduler = TimeoutScheduler::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let _handle = scheduler.arm(Duration::ZERO, move || {
            let _ = tx.send(());
        });
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_shared_is_single_instance() {
        let a = TimeoutScheduler::shared();
        let b = TimeoutScheduler::shared();
        assert!(Arc::ptr_eq(&a.runtime, &b.runtime));
    }
}
