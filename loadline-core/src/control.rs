//! Run-wide stop signal
//!
//! One [`RunControl`] is shared by the scheduler, every iteration, the
//! threshold monitor and whoever started the run. The first stop request
//! wins and its reason is kept for the report.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Why a run stopped issuing iterations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The configured schedule ran to its end
    DurationElapsed,
    /// An abort-on-fail threshold was violated
    ThresholdBreached { threshold: String },
    /// Stopped from outside (Ctrl-C, caller)
    Interrupted,
    /// A fixed iteration plan finished every iteration
    IterationsExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::DurationElapsed => write!(f, "duration elapsed"),
            StopReason::ThresholdBreached { threshold } => {
                write!(f, "threshold breached: {}", threshold)
            }
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::IterationsExhausted => write!(f, "iterations exhausted"),
        }
    }
}

/// Cloneable handle on the run's stop flag
#[derive(Debug, Clone)]
pub struct RunControl {
    sender: Arc<watch::Sender<Option<StopReason>>>,
}

impl RunControl {
    /// Create a new control in the running state
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request a stop. Returns false if a stop was already requested.
    pub fn stop(&self, reason: StopReason) -> bool {
        let mut accepted = false;
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            accepted = true;
            true
        });

        if accepted {
            info!(%reason, "Stopping run");
        }
        accepted
    }

    /// Check if a stop was requested
    pub fn is_stopping(&self) -> bool {
        self.sender.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.sender.borrow().clone()
    }

    /// Resolve once a stop has been requested (immediately if it already was)
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        let _ = receiver.wait_for(Option::is_some).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
