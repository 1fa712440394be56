//! Threshold alerts over the current cohort state.
//!
//! Checks run in a fixed order: overcapacity per stage (stage order), then
//! attrition, then graduation. The order reflects check priority, not
//! severity.

use serde::{Deserialize, Serialize};

use crate::config::ConfigModel;
use crate::state::CohortState;

/// A stage is overcrowded above this multiple of the yearly intake.
pub const OVERCAPACITY_FACTOR: f64 = 2.0;

/// Share of everyone seen so far who has dropped out.
pub const HIGH_ATTRITION_RATIO: f64 = 0.30;

/// Graduates below this fraction of the expected count raise an alert.
pub const LOW_GRADUATION_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Alert {
    /// `stage` is 1-based.
    Overcapacity { stage: usize, count: f64 },
    /// `ratio` in 0..1: dropped / (dropped + enrolled).
    HighAttrition { ratio: f64 },
    LowGraduation { actual: f64, expected: f64 },
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alert::Overcapacity { stage, count } => write!(
                f,
                "OVERCAPACITY in stage {stage}: {} students",
                count.trunc()
            ),
            Alert::HighAttrition { ratio } => write!(
                f,
                "HIGH ATTRITION: {:.1}% of students have dropped out",
                ratio * 100.0
            ),
            Alert::LowGraduation { actual, expected } => write!(
                f,
                "LOW GRADUATION: only {} graduates vs {} expected",
                actual.trunc(),
                expected.trunc()
            ),
        }
    }
}

/// Evaluate every alert condition against the current state.
pub fn detect_alerts(config: &ConfigModel, state: &CohortState) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let limit = config.new_entrants_per_year * OVERCAPACITY_FACTOR;

    for (i, &count) in state.stage_counts.iter().enumerate() {
        if count > limit {
            alerts.push(Alert::Overcapacity {
                stage: i + 1,
                count,
            });
        }
    }

    if state.year > 0 && state.total_enrolled > 0.0 {
        let ratio = state.total_dropped / (state.total_dropped + state.total_enrolled);
        if ratio > HIGH_ATTRITION_RATIO {
            alerts.push(Alert::HighAttrition { ratio });
        }
    }

    if state.year as usize >= config.stage_count && config.stage_count > 0 {
        let expected =
            config.new_entrants_per_year * state.year as f64 / config.stage_count as f64;
        if state.total_graduated < expected * LOW_GRADUATION_FRACTION {
            alerts.push(Alert::LowGraduation {
                actual: state.total_graduated,
                expected,
            });
        }
    }

    alerts
}
