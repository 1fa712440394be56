//! Cohort state — per-stage counts, cumulative totals, and year history.
//!
//! Counts are real numbers. Applying percentages to a stage routinely yields
//! fractional students; they are kept as-is and only rounded for display.

use serde::{Deserialize, Serialize};

/// Pre-transition snapshot recorded once per simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSnapshot {
    /// Year the snapshot was taken in (before that year's transition).
    pub year: u32,
    pub stage_counts: Vec<f64>,
    pub total_graduated: f64,
    pub total_dropped: f64,
    pub total_enrolled: f64,
}

/// Mutable projection state owned by a [`CohortEngine`](crate::engine::CohortEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortState {
    /// Transition steps applied so far.
    pub year: u32,
    /// `stage_counts[i]` = students currently in stage `i + 1`.
    pub stage_counts: Vec<f64>,
    /// Cached sum of `stage_counts`.
    pub total_enrolled: f64,
    pub total_graduated: f64,
    pub total_dropped: f64,
    /// Append-only, one entry per step, in step order.
    pub history: Vec<YearSnapshot>,
}

impl CohortState {
    /// Empty state at year 0. Stage 1 starts empty too; the first intake
    /// arrives with the first step.
    pub fn new(stage_count: usize) -> Self {
        Self {
            year: 0,
            stage_counts: vec![0.0; stage_count],
            total_enrolled: 0.0,
            total_graduated: 0.0,
            total_dropped: 0.0,
            history: Vec::new(),
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stage_counts.len()
    }

    /// Snapshot of the current (pre-transition) values.
    pub fn snapshot(&self) -> YearSnapshot {
        YearSnapshot {
            year: self.year,
            stage_counts: self.stage_counts.clone(),
            total_graduated: self.total_graduated,
            total_dropped: self.total_dropped,
            total_enrolled: self.total_enrolled,
        }
    }

    /// Everyone who has ever entered and is accounted for: enrolled,
    /// graduated, or dropped.
    pub fn total_accounted(&self) -> f64 {
        self.total_enrolled + self.total_graduated + self.total_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = CohortState::new(4);
        assert_eq!(state.year, 0);
        assert_eq!(state.stage_counts, vec![0.0; 4]);
        assert_eq!(state.stage_count(), 4);
        assert_eq!(state.total_accounted(), 0.0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_snapshot_copies_values() {
        let mut state = CohortState::new(2);
        state.year = 3;
        state.stage_counts = vec![10.0, 5.5];
        state.total_enrolled = 15.5;
        state.total_graduated = 7.0;
        state.total_dropped = 2.0;

        let snap = state.snapshot();
        assert_eq!(snap.year, 3);
        assert_eq!(snap.stage_counts, vec![10.0, 5.5]);
        assert_eq!(snap.total_enrolled, 15.5);
        assert_eq!(snap.total_graduated, 7.0);
        assert_eq!(snap.total_dropped, 2.0);

        state.stage_counts[0] = 99.0;
        assert_eq!(snap.stage_counts[0], 10.0);
    }
}
