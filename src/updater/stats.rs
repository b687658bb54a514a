//! Per-cycle reconciliation statistics

use crate::node::Frequency;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Outcome counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Nodes patched successfully
    pub updated: usize,

    /// Nodes already converged
    pub skipped: usize,

    /// Nodes whose diff or patch failed
    pub error: usize,
}

impl CycleStats {
    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.error += 1;
    }

    /// Number of nodes accounted for
    pub fn total(&self) -> usize {
        self.updated + self.skipped + self.error
    }

    /// The single summary line logged after each cycle
    pub fn summary(&self) -> String {
        format!(
            "TSC frequency node update status: {} updated, {} skipped, {} errors",
            self.updated, self.skipped, self.error
        )
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Everything known about a finished cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub stats: CycleStats,

    /// Nodes that passed the eligibility filter
    pub eligible: usize,

    /// Required frequencies the cycle reconciled against
    pub required: Vec<Frequency>,

    pub started_at: DateTime<Utc>,

    pub duration: Duration,

    /// Patches were computed but not submitted
    pub dry_run: bool,
}

impl CycleReport {
    /// Whether any node failed
    pub fn has_errors(&self) -> bool {
        self.stats.error > 0
    }

    /// Summary line, marked when nothing was actually patched
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!("{} (dry run, no patches submitted)", self.stats.summary())
        } else {
            self.stats.summary()
        }
    }
}
