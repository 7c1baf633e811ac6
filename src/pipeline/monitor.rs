//! Ingestion progress monitoring.
//!
//! Tracks per-document outcomes and derives throughput plus an ETA from a
//! moving average over the last 50 completions. Shared across workers
//! behind a mutex; snapshots are cheap copies for logging.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Completions kept for the moving-average ETA.
const MOVING_AVERAGE_WINDOW: usize = 50;

/// Point-in-time view of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSnapshot {
    /// Documents discovered for this run.
    pub total: usize,
    /// Documents completed.
    pub completed: usize,
    /// Documents failed.
    pub failed: usize,
    /// Documents skipped (already stored or out of retry budget).
    pub skipped: usize,
    /// Wall-clock elapsed since the run started.
    pub elapsed: Duration,
    /// Documents per minute over the whole run.
    pub throughput_per_min: f64,
    /// Estimated time to finish the remaining documents.
    pub eta: Option<Duration>,
}

impl MonitorSnapshot {
    /// Documents with a terminal outcome so far.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

struct MonitorState {
    completed: usize,
    failed: usize,
    skipped: usize,
    recent: VecDeque<Duration>,
}

/// Shared run monitor.
pub struct IngestMonitor {
    total: usize,
    started: Instant,
    state: Mutex<MonitorState>,
}

impl IngestMonitor {
    /// Creates a monitor for a run over `total` documents.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
            state: Mutex::new(MonitorState {
                completed: 0,
                failed: 0,
                skipped: 0,
                recent: VecDeque::with_capacity(MOVING_AVERAGE_WINDOW),
            }),
        }
    }

    /// Records a completed document and its processing duration.
    pub fn record_completed(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.completed += 1;
            if state.recent.len() == MOVING_AVERAGE_WINDOW {
                state.recent.pop_front();
            }
            state.recent.push_back(duration);
        }
    }

    /// Records a failed document.
    pub fn record_failed(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failed += 1;
        }
    }

    /// Records a skipped document.
    pub fn record_skipped(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.skipped += 1;
        }
    }

    /// Takes a snapshot for logging.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn snapshot(&self) -> MonitorSnapshot {
        let elapsed = self.started.elapsed();
        let Ok(state) = self.state.lock() else {
            return MonitorSnapshot {
                total: self.total,
                completed: 0,
                failed: 0,
                skipped: 0,
                elapsed,
                throughput_per_min: 0.0,
                eta: None,
            };
        };

        let processed = state.completed + state.failed + state.skipped;
        let throughput_per_min = if elapsed.as_secs_f64() > 0.0 {
            processed as f64 / elapsed.as_secs_f64() * 60.0
        } else {
            0.0
        };

        let remaining = self.total.saturating_sub(processed);
        let eta = if remaining > 0 && !state.recent.is_empty() {
            let avg = state.recent.iter().sum::<Duration>() / state.recent.len() as u32;
            Some(avg.saturating_mul(remaining as u32))
        } else {
            None
        };

        MonitorSnapshot {
            total: self.total,
            completed: state.completed,
            failed: state.failed,
            skipped: state.skipped,
            elapsed,
            throughput_per_min,
            eta,
        }
    }
}

impl std::fmt::Debug for IngestMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestMonitor")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let monitor = IngestMonitor::new(10);
        monitor.record_completed(Duration::from_secs(1));
        monitor.record_completed(Duration::from_secs(3));
        monitor.record_failed();
        monitor.record_skipped();

        let snap = monitor.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.processed(), 4);
        assert_eq!(snap.total, 10);
    }

    #[test]
    fn test_eta_uses_moving_average() {
        let monitor = IngestMonitor::new(4);
        monitor.record_completed(Duration::from_secs(2));
        monitor.record_completed(Duration::from_secs(4));
        let snap = monitor.snapshot();
        // 2 remaining at ~3s average
        assert_eq!(snap.eta, Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_eta_absent_when_done_or_no_data() {
        let monitor = IngestMonitor::new(1);
        assert_eq!(monitor.snapshot().eta, None);
        monitor.record_completed(Duration::from_secs(1));
        assert_eq!(monitor.snapshot().eta, None);
    }

    #[test]
    fn test_window_caps_at_fifty() {
        let monitor = IngestMonitor::new(1000);
        // 60 slow completions then 50 fast ones push the slow ones out.
        for _ in 0..60 {
            monitor.record_completed(Duration::from_secs(100));
        }
        for _ in 0..50 {
            monitor.record_completed(Duration::from_secs(1));
        }
        let snap = monitor.snapshot();
        let remaining = 1000 - 110;
        assert_eq!(snap.eta, Some(Duration::from_secs(remaining as u64)));
    }
}
