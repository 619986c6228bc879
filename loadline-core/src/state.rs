//! Shared state of one run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::MetricsRegistry;
use crate::runner::{IterationOutcome, IterationResult};

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Iterations that started executing
    pub issued: u64,
    /// Iterations executing right now
    pub active: u64,
    /// Iterations that ran every step
    pub completed: u64,
    /// Iterations ended early by a transport failure
    pub incomplete: u64,
    /// Iterations that stopped at a step boundary because the run was ending
    pub truncated: u64,
    /// Iterations aborted after the graceful stop expired
    pub interrupted: u64,
    /// Due iterations skipped because the pool was saturated
    pub dropped: u64,
    /// Due iterations that had to wait for a worker
    pub delayed: u64,
    /// Largest number of workers the pool grew to
    pub peak_pool_size: usize,
    /// Largest number of iterations in flight at once
    pub peak_active: u64,
}

/// Process-wide state of a run, shared by the scheduler and every iteration.
///
/// Created per run and passed around explicitly, so concurrent runs (tests)
/// never see each other's numbers.
#[derive(Debug)]
pub struct RunState {
    started_at: DateTime<Utc>,
    started: Instant,
    target_end: Option<Duration>,
    issued: AtomicU64,
    active: AtomicU64,
    completed: AtomicU64,
    incomplete: AtomicU64,
    truncated: AtomicU64,
    interrupted: AtomicU64,
    dropped: AtomicU64,
    delayed: AtomicU64,
    pool_size: AtomicUsize,
    peak_pool_size: AtomicUsize,
    peak_active: AtomicU64,
    aborted: AtomicBool,
    metrics: MetricsRegistry,
}

/// Keeps an iteration counted as active until dropped
#[derive(Debug)]
pub struct ActiveGuard {
    state: Arc<RunState>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RunState {
    /// Create the state for a run starting now
    pub fn new(metrics: MetricsRegistry, target_end: Option<Duration>) -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            target_end,
            issued: AtomicU64::new(0),
            active: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            incomplete: AtomicU64::new(0),
            truncated: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
            pool_size: AtomicUsize::new(0),
            peak_pool_size: AtomicUsize::new(0),
            peak_active: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Planned end of the schedule, relative to the start
    pub fn target_end(&self) -> Option<Duration> {
        self.target_end
    }

    /// Count an iteration as issued and active
    pub fn begin_iteration(self: &Arc<Self>) -> ActiveGuard {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
        ActiveGuard {
            state: Arc::clone(self),
        }
    }

    /// Fold a finished iteration into the counters
    pub fn record_iteration(&self, result: &IterationResult) {
        let counter = match result.outcome {
            IterationOutcome::Completed => &self.completed,
            IterationOutcome::Incomplete { .. } => &self.incomplete,
            IterationOutcome::Truncated { .. } => &self.truncated,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_delayed(&self) {
        self.delayed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_interrupted(&self, count: u64) {
        self.interrupted.fetch_add(count, Ordering::SeqCst);
    }

    /// Publish the current pool size
    pub fn set_pool_size(&self, size: usize) {
        self.pool_size.store(size, Ordering::SeqCst);
        self.peak_pool_size.fetch_max(size, Ordering::SeqCst);
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Mark the run as aborted by a threshold
    pub fn set_aborted(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            issued: self.issued.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            incomplete: self.incomplete.load(Ordering::SeqCst),
            truncated: self.truncated.load(Ordering::SeqCst),
            interrupted: self.interrupted.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
            delayed: self.delayed.load(Ordering::SeqCst),
            peak_pool_size: self.peak_pool_size.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
        }
    }
}
