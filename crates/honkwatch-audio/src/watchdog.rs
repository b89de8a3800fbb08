use honkwatch_foundation::clock::{RealClock, SharedClock};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Detects a stalled capture stream: when the callback stops feeding for
/// longer than the timeout, `is_triggered` latches true until the next feed.
#[derive(Clone)]
pub struct WatchdogTimer {
    timeout: Duration,
    clock: SharedClock,
    last_feed: Arc<RwLock<Option<std::time::Instant>>>,
    triggered: Arc<AtomicBool>,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl WatchdogTimer {
    pub fn new(timeout: Duration) -> Self {
        Self::new_with_clock(timeout, Arc::new(RealClock))
    }

    /// Clock-injected constructor so tests can advance time manually.
    pub fn new_with_clock(timeout: Duration, clock: SharedClock) -> Self {
        Self {
            timeout,
            clock,
            last_feed: Arc::new(RwLock::new(None)),
            triggered: Arc::new(AtomicBool::new(false)),
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Spawns the checker thread. It runs until `running` goes false; the
    /// poll interval is short so tests with sub-second timeouts work.
    pub fn start(&mut self, running: Arc<AtomicBool>) {
        let timeout = self.timeout;
        let clock = Arc::clone(&self.clock);
        let last_feed = Arc::clone(&self.last_feed);
        let triggered = Arc::clone(&self.triggered);

        *last_feed.write() = Some(clock.now());

        let handle = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));

                let now = clock.now();
                let elapsed = {
                    let guard = last_feed.read();
                    guard.map(|last_time| now.duration_since(last_time))
                };

                if let Some(elapsed) = elapsed {
                    if elapsed > timeout && !triggered.load(Ordering::SeqCst) {
                        tracing::error!("Watchdog timeout! No audio data for {:?}", elapsed);
                        triggered.store(true, Ordering::SeqCst);
                    }
                }
            }
        });

        *self.handle.write() = Some(handle);
    }

    pub fn feed(&self) {
        *self.last_feed.write() = Some(self.clock.now());
        self.triggered.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Joins the checker thread. The caller must have dropped `running` to
    /// false first or this blocks until it does.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.write().take() {
            let _ = handle.join();
        }
        self.triggered.store(false, Ordering::SeqCst);
        *self.last_feed.write() = None;
    }
}
