//! Elapsed-time bookkeeping for sync runs

use std::sync::Mutex;
use tokio::time::Instant;

/// Time since the previous step and since the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub step_ms: u64,
    pub total_ms: u64,
}

/// Tracks elapsed time across the steps of one run
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    last_step: Mutex<Instant>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_step: Mutex::new(now),
        }
    }

    /// Elapsed times, marking the end of the current step
    pub fn step(&self) -> Elapsed {
        let now = Instant::now();
        let mut last = self.last_step.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = Elapsed {
            step_ms: now.duration_since(*last).as_millis() as u64,
            total_ms: now.duration_since(self.started).as_millis() as u64,
        };
        *last = now;
        elapsed
    }
}
