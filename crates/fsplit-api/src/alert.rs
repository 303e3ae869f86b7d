//! Operator alerting for repeated empty extractions.

use std::sync::atomic::{AtomicU32, Ordering};

/// Counts NoFrames outcomes process-wide.
///
/// A single zero-frame video may just be a bad upload; a run of them
/// points at a pipeline defect, so logging escalates once the count
/// crosses the threshold. Success resets the streak.
#[derive(Debug)]
pub struct NoFramesAlert {
    consecutive: AtomicU32,
    threshold: u32,
}

impl NoFramesAlert {
    /// Create an alert tracker with the given escalation threshold.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            threshold,
        }
    }

    /// Record a NoFrames outcome.
    ///
    /// Returns `true` once the consecutive count reaches the threshold,
    /// meaning the occurrence should be logged at error level.
    pub fn record_occurrence(&self) -> bool {
        let count = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        count >= self.threshold
    }

    /// Record a successful extraction (resets the streak).
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }
}
