//! Fixed-period publish loop on a dedicated thread.
//!
//! Each cycle runs the supplied callback, then sleeps for whatever is left of
//! the target period. Slow cycles are followed immediately by the next one;
//! the loop never bursts to catch up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info};

/// Lifecycle of a [`PublishScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Stopped,
    Running,
    Stopping,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Sleep needed after a cycle that took `elapsed` to hold `period`.
pub fn remaining_sleep(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Marks the scheduler stopped when the loop thread exits, including by panic.
struct ExitGuard(Arc<AtomicU8>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.store(SchedulerState::Stopped as u8, Ordering::SeqCst);
    }
}

/// Periodic loop driving deferred publishing.
pub struct PublishScheduler {
    stop_requested: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    cycles: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PublishScheduler {
    /// Spawn the loop thread and start running `cycle` every `period`.
    pub fn start<F>(name: &str, period: Duration, mut cycle: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(SchedulerState::Running as u8));
        let cycles = Arc::new(AtomicU64::new(0));

        let handle = {
            let stop_requested = Arc::clone(&stop_requested);
            let cycles = Arc::clone(&cycles);
            let guard = ExitGuard(Arc::clone(&state));
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    let _guard = guard;
                    while !stop_requested.load(Ordering::SeqCst) {
                        let t1 = Instant::now();
                        cycle();
                        cycles.fetch_add(1, Ordering::Relaxed);

                        let sleep = remaining_sleep(period, t1.elapsed());
                        if !sleep.is_zero() {
                            thread::sleep(sleep);
                        }
                    }
                })
                .with_context(|| format!("failed to spawn scheduler thread '{name}'"))?
        };

        info!("Publish scheduler '{}' started ({:?} period)", name, period);

        Ok(Self {
            stop_requested,
            state,
            cycles,
            handle: Some(handle),
        })
    }

    /// Current lifecycle state. A loop killed by a panicking task is `Stopped`.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True once the loop thread has exited, whether stopped or panicked.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Ask the loop to exit after its current cycle without waiting for it.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        // Only a live loop moves to Stopping; an exited one stays Stopped
        let _ = self.state.compare_exchange(
            SchedulerState::Running as u8,
            SchedulerState::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Request the loop to exit and wait for it.
    ///
    /// The flag is checked once per cycle, so this can wait up to one cycle
    /// plus one period. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.request_stop();
        let Some(handle) = self.handle.take() else {
            return;
        };

        let name = handle.thread().name().unwrap_or("scheduler").to_string();
        match handle.join() {
            Ok(()) => info!(
                "Publish scheduler '{}' stopped after {} cycles",
                name,
                self.cycles()
            ),
            Err(_) => error!(
                "Publish scheduler '{}' terminated by a panicking task after {} cycles",
                name,
                self.cycles()
            ),
        }
        self.state
            .store(SchedulerState::Stopped as u8, Ordering::SeqCst);
    }
}

impl Drop for PublishScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
