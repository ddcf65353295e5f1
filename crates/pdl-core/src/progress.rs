//! Progress reporting: the sink every fetch path reports byte deltas to.
//!
//! The core never renders anything. It calls `ProgressSink::add` once per
//! received chunk; consumers decide how to display the totals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Receives byte-count increments from concurrent workers.
///
/// Implementations must combine deltas from different threads without losing
/// or double-counting any of them.
pub trait ProgressSink: Send + Sync {
    fn add(&self, delta: u64);

    /// Called once the total size is known (never for unknown lengths).
    fn set_total(&self, _total: u64) {}
}

/// Sink that discards all deltas.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn add(&self, _delta: u64) {}
}

/// Atomic byte counter. Also knows the expected total once the probe ran,
/// so a reporter can compute rate and ETA from a `snapshot`.
#[derive(Debug)]
pub struct ByteCounter {
    done: AtomicU64,
    total: AtomicU64,
    started: Instant,
}

impl Default for ByteCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteCounter {
    pub fn new() -> Self {
        Self {
            done: AtomicU64::new(0),
            total: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn bytes_done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressStats {
        ProgressStats {
            bytes_done: self.bytes_done(),
            total_bytes: self.total.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl ProgressSink for ByteCounter {
    fn add(&self, delta: u64) {
        self.done.fetch_add(delta, Ordering::Relaxed);
    }

    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }
}

/// Snapshot of download progress (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub bytes_done: u64,
    /// Total size in bytes; 0 when unknown.
    pub total_bytes: u64,
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if the total is unknown or nothing moved yet).
    pub fn eta_secs(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]; None when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.bytes_done as f64 / self.total_bytes as f64).min(1.0))
    }
}
