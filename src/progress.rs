//! Coarse progress tracking for the streaming phases.
//!
//! Workers report work in chunks; chunks below the configured threshold are
//! ignored so the shared lock is touched roughly once per percent of a
//! thread's workload. Percent milestones are logged.

use std::sync::Mutex;

use tracing::info;

struct Progress {
    done: u64,
    percent: u16,
}

/// Tracker for one phase's total workload.
pub struct ProgressTracker {
    total: u64,
    chunk_threshold: u64,
    label: &'static str,
    progress: Mutex<Progress>,
}

impl ProgressTracker {
    /// Track `total` units of work, coalescing updates below
    /// `chunk_threshold` units.
    pub fn new(total: u64, chunk_threshold: u64, label: &'static str) -> Self {
        Self {
            total: total.max(1),
            chunk_threshold,
            label,
            progress: Mutex::new(Progress { done: 0, percent: 0 }),
        }
    }

    /// Report a chunk of completed work. Returns `true` iff the chunk was
    /// large enough to be absorbed; callers keep accumulating otherwise.
    pub fn track_work(&self, chunk: u64) -> bool {
        if chunk < self.chunk_threshold {
            return false;
        }

        let mut progress = self.progress.lock().unwrap();
        progress.done += chunk;
        let percent = ((progress.done as f64 * 100.0) / self.total as f64).round() as u16;
        if percent > progress.percent {
            progress.percent = percent;
            info!("[{}] {}%", self.label, percent.min(100));
        }
        true
    }
}

/// The per-thread chunk threshold for a workload: about 1% of the per-thread
/// share.
pub fn chunk_threshold(total: u64, threads: usize) -> u64 {
    ((total as f64 / 100.0) / threads.max(1) as f64).round() as u64
}
