//! Cohort engine — applies the yearly stage transition and exposes analytics.
//!
//! Each [`CohortEngine::step`] moves every stage's population forward by one
//! year:
//! - `advance`% moves to the next stage, or graduates from the last one
//! - `repeat`% stays in the same stage
//! - `drop`% leaves the program for good
//! - stage 1 additionally receives the yearly intake
//!
//! The three fractions are taken from the same pre-step count, so a stage is
//! conserved exactly when its rates sum to 100. Unbalanced rates are applied
//! as given; the engine never clamps or renormalizes.

use serde::Serialize;

use crate::alerts::{detect_alerts, Alert};
use crate::analysis::{self, EnrollmentTrend, Recommendation};
use crate::config::{ConfigModel, ConfigWarning};
use crate::state::{CohortState, YearSnapshot};

/// Apply one year's transition to `state` in place.
pub fn project_year(config: &ConfigModel, state: &mut CohortState) {
    state.history.push(state.snapshot());

    let stage_count = state.stage_counts.len();
    let mut next = vec![0.0; stage_count];

    for (i, &current) in state.stage_counts.iter().enumerate() {
        let rates = config.rates_for_stage(i);

        let advancing = current * rates.advance / 100.0;
        if i + 1 < stage_count {
            next[i + 1] += advancing;
        } else {
            state.total_graduated += advancing;
        }

        next[i] += current * rates.repeat / 100.0;
        state.total_dropped += current * rates.drop / 100.0;
    }

    if let Some(first) = next.first_mut() {
        *first += config.new_entrants_per_year;
    }

    state.total_enrolled = next.iter().sum();
    state.stage_counts = next;
    state.year += 1;
}

/// Owns one projection: its parameters and evolving state.
#[derive(Debug, Clone, Serialize)]
pub struct CohortEngine {
    config: ConfigModel,
    state: CohortState,
    warnings: Vec<ConfigWarning>,
}

impl CohortEngine {
    /// Start a projection at year 0. Unbalanced rates are logged and kept.
    pub fn new(config: ConfigModel) -> Self {
        let warnings = checked_warnings(&config);
        let state = CohortState::new(config.stage_count);
        log::info!(
            "Cohort engine ready: {} stages, {} entrants/year",
            config.stage_count,
            config.new_entrants_per_year
        );
        Self {
            config,
            state,
            warnings,
        }
    }

    /// Discard all state and history and start over with `config`.
    pub fn reset(&mut self, config: ConfigModel) -> &[ConfigWarning] {
        *self = CohortEngine::new(config);
        &self.warnings
    }

    /// Advance the projection by one year.
    pub fn step(&mut self) {
        project_year(&self.config, &mut self.state);
        log::debug!(
            "year {}: enrolled={:.1} graduated={:.1} dropped={:.1}",
            self.state.year,
            self.state.total_enrolled,
            self.state.total_graduated,
            self.state.total_dropped
        );
    }

    /// Step `years` times.
    pub fn run(&mut self, years: u32) {
        for _ in 0..years {
            self.step();
        }
    }

    pub fn config(&self) -> &ConfigModel {
        &self.config
    }

    pub fn state(&self) -> &CohortState {
        &self.state
    }

    /// Warnings raised when this projection's config was applied.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn year(&self) -> u32 {
        self.state.year
    }

    pub fn stage_counts(&self) -> &[f64] {
        &self.state.stage_counts
    }

    pub fn total_enrolled(&self) -> f64 {
        self.state.total_enrolled
    }

    pub fn total_graduated(&self) -> f64 {
        self.state.total_graduated
    }

    pub fn total_dropped(&self) -> f64 {
        self.state.total_dropped
    }

    pub fn history(&self) -> &[YearSnapshot] {
        &self.state.history
    }

    pub fn detect_alerts(&self) -> Vec<Alert> {
        detect_alerts(&self.config, &self.state)
    }

    pub fn rooms_needed(&self, capacity_per_room: u32) -> u64 {
        analysis::rooms_needed(&self.state.stage_counts, capacity_per_room)
    }

    pub fn retention_rate(&self) -> f64 {
        analysis::retention_rate(&self.state)
    }

    pub fn graduation_rate(&self) -> Option<f64> {
        analysis::graduation_rate(&self.config, &self.state)
    }

    pub fn enrollment_trend(&self) -> Option<EnrollmentTrend> {
        analysis::enrollment_trend(&self.state.history)
    }

    pub fn peak_stage(&self) -> Option<(usize, f64)> {
        analysis::peak_stage(&self.state.stage_counts)
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        analysis::recommendations(&self.config, &self.state)
    }
}

fn checked_warnings(config: &ConfigModel) -> Vec<ConfigWarning> {
    let warnings = config.validate();
    for w in &warnings {
        log::warn!("{w}; projecting with the supplied rates anyway");
    }
    warnings
}
