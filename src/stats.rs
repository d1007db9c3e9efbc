use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::comfort::Tally;

/// Data-quality counters for one pipeline run.
///
/// Every record dropped, left incomplete or failed along the way shows up in
/// one of these counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,

    // loading and cleaning
    pub survey_rows: usize,
    pub environment_rows: usize,
    pub survey_dropped: usize,
    pub environment_dropped: usize,

    // alignment
    pub aligned: usize,
    pub partitions: usize,
    pub unmatched_partitions: usize,
    pub join_misses: usize,

    // resolution
    pub unmapped_clothing: usize,
    pub unmapped_activity: usize,

    // evaluation
    pub coercion_failures: usize,
    pub evaluated: usize,
    pub succeeded: usize,
    pub domain_failures: usize,
    pub timed_out: usize,
    pub panicked: usize,
}

impl RunStats {
    pub fn new() -> Self {
        RunStats {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of aligned records that ended with a PMV/PPD result.
    pub fn success_pct(&self) -> f64 {
        Self::pct(self.succeeded, self.aligned)
    }

    pub fn join_miss_pct(&self) -> f64 {
        Self::pct(self.join_misses, self.aligned)
    }

    /// Copies evaluation outcome counts in.
    pub fn with_tally(mut self, tally: Tally) -> Self {
        self.succeeded = tally.succeeded;
        self.domain_failures = tally.domain_failures;
        self.timed_out = tally.timed_out;
        self.panicked = tally.panicked;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(RunStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(RunStats::pct(50, 100), 50.0);
        assert_eq!(RunStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_success_pct() {
        let stats = RunStats {
            aligned: 8,
            succeeded: 6,
            join_misses: 2,
            ..Default::default()
        };

        assert_eq!(stats.success_pct(), 75.0);
        assert_eq!(stats.join_miss_pct(), 25.0);
    }

    #[test]
    fn test_with_tally() {
        let tally = Tally {
            succeeded: 3,
            domain_failures: 1,
            timed_out: 2,
            panicked: 0,
        };
        let stats = RunStats::new().with_tally(tally);

        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.domain_failures, 1);
        assert_eq!(stats.timed_out, 2);
    }
}
