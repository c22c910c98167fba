//! Idle watchdog
//!
//! A background thread that notices when no frame has arrived for a configured
//! interval. It fires its callback once per idle period and does not stop frame
//! processing; the next [`Watchdog::feed`] clears the idle state.

use crate::types::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct State {
    last_feed: Instant,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    idle: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to a running watchdog thread; dropping it stops the thread
pub struct Watchdog {
    shared: Arc<Shared>,
    timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start a watchdog that calls `on_idle` after `timeout` without a feed
    pub fn spawn<F>(timeout: Duration, on_idle: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                last_feed: Instant::now(),
                shutdown: false,
            }),
            wake: Condvar::new(),
            idle: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("can-telemetry-watchdog".to_string())
            .spawn(move || run(&worker, timeout, on_idle))?;

        log::debug!("Watchdog started with {:?} timeout", timeout);

        Ok(Self {
            shared,
            timeout,
            handle: Some(handle),
        })
    }

    /// Record activity; returns true when this ends an idle period
    pub fn feed(&self) -> bool {
        let mut state = self.shared.lock();
        state.last_feed = Instant::now();
        let resumed = self.shared.idle.swap(false, Ordering::SeqCst);
        drop(state);

        if resumed {
            log::info!("Activity resumed");
            self.shared.wake.notify_one();
        }
        resumed
    }

    /// Whether the idle timeout has fired since the last feed
    pub fn is_idle(&self) -> bool {
        self.shared.idle.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_one();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Watchdog thread panicked");
            }
        }
    }
}

fn run<F: Fn()>(shared: &Shared, timeout: Duration, on_idle: F) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }

        let elapsed = state.last_feed.elapsed();
        if elapsed < timeout {
            state = shared
                .wake
                .wait_timeout(state, timeout - elapsed)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
            continue;
        }

        if shared.idle.swap(true, Ordering::SeqCst) {
            // Already reported; sleep until fed or stopped
            state = shared.wake.wait(state).unwrap_or_else(|e| e.into_inner());
            continue;
        }

        drop(state);
        log::warn!("No frames for {:?}, bridge idle", timeout);
        on_idle();
        state = shared.lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_watchdog(timeout_ms: u64) -> (Watchdog, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let watchdog = Watchdog::spawn(Duration::from_millis(timeout_ms), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (watchdog, fired)
    }

    #[test]
    fn test_fires_once_per_idle_period() {
        let (watchdog, fired) = counting_watchdog(30);
        thread::sleep(Duration::from_millis(200));

        assert!(watchdog.is_idle());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(watchdog.feed());
        assert!(!watchdog.is_idle());
        assert!(!watchdog.feed());

        thread::sleep(Duration::from_millis(200));
        assert!(watchdog.is_idle());
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_feeding_keeps_it_awake() {
        let (watchdog, fired) = counting_watchdog(300);
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(20));
            assert!(!watchdog.feed());
        }
        assert!(!watchdog.is_idle());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_stops_thread() {
        let (watchdog, fired) = counting_watchdog(10_000);
        assert_eq!(watchdog.timeout(), Duration::from_secs(10));
        drop(watchdog);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
