//! Capacity and outcome analytics — rooms, retention, graduation, trends.
//!
//! Everything here is a pure function of the current state and is
//! recomputed on demand. Ratios whose denominator is zero are defined as
//! exactly 0 rather than reported as errors.

use serde::{Deserialize, Serialize};

use crate::config::ConfigModel;
use crate::state::{CohortState, YearSnapshot};

/// Room size assumed by the planning recommendations.
pub const DEFAULT_ROOM_CAPACITY: u32 = 30;

/// Retention below this is critical.
pub const RETENTION_CRITICAL: f64 = 0.60;
/// Retention below this needs attention.
pub const RETENTION_CAUTION: f64 = 0.75;
/// Graduation above this is considered effective.
pub const GRADUATION_GOOD: f64 = 0.50;

/// Years averaged on each side of the enrollment trend comparison.
pub const TREND_WINDOW: usize = 5;
pub const TREND_GROWTH_FACTOR: f64 = 1.1;
pub const TREND_DECLINE_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Good,
    Caution,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentTrend {
    Growing,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecommendationKind {
    /// Busiest stage (1-based) and its head count.
    PeakEnrollment { stage: usize, count: f64 },
    /// Rooms needed simultaneously at `capacity` students per room.
    RoomsNeeded { rooms: u64, capacity: u32 },
    Retention { rate: f64 },
    Graduation { rate: f64 },
    Trend(EnrollmentTrend),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub kind: RecommendationKind,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, self.severity) {
            (RecommendationKind::PeakEnrollment { stage, count }, _) => write!(
                f,
                "PEAK CAPACITY: stage {stage} holds the most students ({}).",
                count.trunc()
            ),
            (RecommendationKind::RoomsNeeded { rooms, capacity }, _) => write!(
                f,
                "ROOMS NEEDED: about {rooms} rooms in simultaneous use ({capacity} students/room)."
            ),
            (RecommendationKind::Retention { rate }, Severity::Critical) => write!(
                f,
                "CRITICAL: retention rate is {:.1}%. Student support programs are urgently needed.",
                rate * 100.0
            ),
            (RecommendationKind::Retention { rate }, Severity::Caution) => write!(
                f,
                "ATTENTION: retention rate is {:.1}%. Consider tutoring and follow-up.",
                rate * 100.0
            ),
            (RecommendationKind::Retention { rate }, _) => write!(
                f,
                "GOOD: retention rate is {:.1}%. The program keeps most of its students.",
                rate * 100.0
            ),
            (RecommendationKind::Graduation { rate }, Severity::Good) => write!(
                f,
                "EXCELLENT: graduation rate is {:.1}%. The program is effective.",
                rate * 100.0
            ),
            (RecommendationKind::Graduation { rate }, _) => write!(
                f,
                "NEEDS REVIEW: graduation rate is {:.1}%. Review what keeps students from graduating.",
                rate * 100.0
            ),
            (RecommendationKind::Trend(EnrollmentTrend::Growing), _) => write!(
                f,
                "GROWTH: enrollment is rising. Plan for infrastructure expansion."
            ),
            (RecommendationKind::Trend(EnrollmentTrend::Declining), _) => write!(
                f,
                "DECLINE: enrollment is falling. Investigate causes and take action."
            ),
            (RecommendationKind::Trend(EnrollmentTrend::Stable), _) => {
                write!(f, "STABLE: enrollment is steady.")
            }
        }
    }
}

/// Rooms needed if every stage is taught separately:
/// `Σ ceil(count / capacity_per_room)`. Zero capacity needs zero rooms,
/// and negative counts need no rooms.
///
/// Counts are unbounded (unbalanced rates grow them without limit), so the
/// total saturates at `u64::MAX` instead of overflowing.
pub fn rooms_needed(stage_counts: &[f64], capacity_per_room: u32) -> u64 {
    if capacity_per_room == 0 {
        return 0;
    }
    let capacity = capacity_per_room as f64;
    stage_counts
        .iter()
        .map(|&count| (count.max(0.0) / capacity).ceil() as u64)
        .fold(0u64, |total, rooms| total.saturating_add(rooms))
}

/// `enrolled / (enrolled + dropped)`, or 0 when nobody has been seen yet.
pub fn retention_rate(state: &CohortState) -> f64 {
    let denominator = state.total_enrolled + state.total_dropped;
    if denominator == 0.0 {
        return 0.0;
    }
    state.total_enrolled / denominator
}

/// Graduates per entrant since the first cohort could have finished.
///
/// `None` until `year >= stage_count`. A non-positive denominator (zero
/// intake) gives 0.
pub fn graduation_rate(config: &ConfigModel, state: &CohortState) -> Option<f64> {
    let year = state.year as usize;
    if year < config.stage_count {
        return None;
    }
    let cohorts = (year - config.stage_count + 1) as f64;
    let denominator = config.new_entrants_per_year * cohorts;
    if denominator <= 0.0 {
        return Some(0.0);
    }
    Some(state.total_graduated / denominator)
}

/// Compare mean enrollment over the last five years against the five before.
///
/// `None` with fewer than six snapshots. With fewer than ten the baseline is
/// the recent mean itself, which always reads as stable.
pub fn enrollment_trend(history: &[YearSnapshot]) -> Option<EnrollmentTrend> {
    if history.len() <= TREND_WINDOW {
        return None;
    }
    let mean = |window: &[YearSnapshot]| {
        window.iter().map(|s| s.total_enrolled).sum::<f64>() / TREND_WINDOW as f64
    };

    let n = history.len();
    let recent = mean(&history[n - TREND_WINDOW..]);
    let baseline = if n >= 2 * TREND_WINDOW {
        mean(&history[n - 2 * TREND_WINDOW..n - TREND_WINDOW])
    } else {
        recent
    };

    Some(if recent > baseline * TREND_GROWTH_FACTOR {
        EnrollmentTrend::Growing
    } else if recent < baseline * TREND_DECLINE_FACTOR {
        EnrollmentTrend::Declining
    } else {
        EnrollmentTrend::Stable
    })
}

/// 1-based stage with the most students; the earliest wins ties.
pub fn peak_stage(stage_counts: &[f64]) -> Option<(usize, f64)> {
    let mut peak: Option<(usize, f64)> = None;
    for (i, &count) in stage_counts.iter().enumerate() {
        match peak {
            Some((_, best)) if count <= best => {}
            _ => peak = Some((i + 1, count)),
        }
    }
    peak
}

/// Planning guidance for the current state. Empty before the first step.
pub fn recommendations(config: &ConfigModel, state: &CohortState) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    if state.year == 0 {
        return recs;
    }

    if let Some((stage, count)) = peak_stage(&state.stage_counts) {
        recs.push(Recommendation {
            severity: Severity::Info,
            kind: RecommendationKind::PeakEnrollment { stage, count },
        });
    }

    recs.push(Recommendation {
        severity: Severity::Info,
        kind: RecommendationKind::RoomsNeeded {
            rooms: rooms_needed(&state.stage_counts, DEFAULT_ROOM_CAPACITY),
            capacity: DEFAULT_ROOM_CAPACITY,
        },
    });

    if state.total_enrolled + state.total_dropped > 0.0 {
        let rate = retention_rate(state);
        let severity = if rate < RETENTION_CRITICAL {
            Severity::Critical
        } else if rate < RETENTION_CAUTION {
            Severity::Caution
        } else {
            Severity::Good
        };
        recs.push(Recommendation {
            severity,
            kind: RecommendationKind::Retention { rate },
        });
    }

    if let Some(rate) = graduation_rate(config, state) {
        let severity = if rate > GRADUATION_GOOD {
            Severity::Good
        } else {
            Severity::Caution
        };
        recs.push(Recommendation {
            severity,
            kind: RecommendationKind::Graduation { rate },
        });
    }

    match enrollment_trend(&state.history) {
        Some(EnrollmentTrend::Growing) => recs.push(Recommendation {
            severity: Severity::Info,
            kind: RecommendationKind::Trend(EnrollmentTrend::Growing),
        }),
        Some(EnrollmentTrend::Declining) => recs.push(Recommendation {
            severity: Severity::Caution,
            kind: RecommendationKind::Trend(EnrollmentTrend::Declining),
        }),
        Some(EnrollmentTrend::Stable) | None => {}
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateTriple;
    use crate::engine::CohortEngine;

    fn snapshots(enrolled: &[f64]) -> Vec<YearSnapshot> {
        enrolled
            .iter()
            .enumerate()
            .map(|(i, &e)| YearSnapshot {
                year: i as u32,
                stage_counts: vec![e],
                total_graduated: 0.0,
                total_dropped: 0.0,
                total_enrolled: e,
            })
            .collect()
    }

    fn kinds(recs: &[Recommendation]) -> Vec<&RecommendationKind> {
        recs.iter().map(|r| &r.kind).collect()
    }

    #[test]
    fn test_rooms_needed() {
        assert_eq!(rooms_needed(&[100.0, 0.0, 0.0, 0.0, 0.0], 30), 4);
        assert_eq!(rooms_needed(&[30.0, 31.0, 0.5], 30), 1 + 2 + 1);
        assert_eq!(rooms_needed(&[], 30), 0);
    }

    #[test]
    fn test_rooms_needed_degenerate_inputs() {
        assert_eq!(rooms_needed(&[100.0], 0), 0);
        assert_eq!(rooms_needed(&[-40.0, 10.0], 30), 1);
    }

    #[test]
    fn test_rooms_needed_past_u32_range() {
        // Each stage alone needs more than u32::MAX rooms.
        assert_eq!(rooms_needed(&[1.2e12, 6e11], 1), 1_800_000_000_000);
        assert_eq!(rooms_needed(&[1.2e12, 6e11], 30), 60_000_000_000);
    }

    #[test]
    fn test_rooms_needed_saturates() {
        assert_eq!(rooms_needed(&[1e30], 30), u64::MAX);
        assert_eq!(rooms_needed(&[1e30, 1e30, 5.0], 30), u64::MAX);
        assert_eq!(rooms_needed(&[f64::INFINITY, 1.0], 30), u64::MAX);
    }

    #[test]
    fn test_recommendations_with_huge_counts() {
        let config = ConfigModel::default();
        let mut state = CohortState::new(config.stage_count);
        state.year = 80;
        state.stage_counts = vec![1e25, 1e24, 1e23, 1e22, 1e21];
        state.total_enrolled = state.stage_counts.iter().sum();

        let recs = recommendations(&config, &state);
        assert!(recs.iter().any(|r| r.kind
            == RecommendationKind::RoomsNeeded {
                rooms: u64::MAX,
                capacity: DEFAULT_ROOM_CAPACITY,
            }));
    }

    #[test]
    fn test_retention_rate() {
        let mut state = CohortState::new(3);
        assert_eq!(retention_rate(&state), 0.0);

        state.total_enrolled = 75.0;
        state.total_dropped = 25.0;
        assert!((retention_rate(&state) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_graduation_rate_window() {
        let config = ConfigModel::default();
        let mut state = CohortState::new(5);
        state.year = 4;
        assert_eq!(graduation_rate(&config, &state), None);

        state.year = 6;
        state.total_graduated = 120.0;
        // 120 / (100 * 2)
        assert_eq!(graduation_rate(&config, &state), Some(0.6));
    }

    #[test]
    fn test_graduation_rate_zero_intake() {
        let config = ConfigModel {
            new_entrants_per_year: 0.0,
            ..ConfigModel::default()
        };
        let mut state = CohortState::new(5);
        state.year = 9;
        state.total_graduated = 3.0;
        assert_eq!(graduation_rate(&config, &state), Some(0.0));
    }

    #[test]
    fn test_trend_requires_six_snapshots() {
        assert_eq!(enrollment_trend(&snapshots(&[1.0; 5])), None);
        assert_eq!(
            enrollment_trend(&snapshots(&[1.0, 2.0, 3.0, 4.0, 500.0, 900.0])),
            Some(EnrollmentTrend::Stable)
        );
    }

    #[test]
    fn test_trend_growth_and_decline() {
        let growing = snapshots(&[
            100.0, 100.0, 100.0, 100.0, 100.0, 120.0, 120.0, 120.0, 120.0, 120.0,
        ]);
        assert_eq!(enrollment_trend(&growing), Some(EnrollmentTrend::Growing));

        let declining = snapshots(&[
            100.0, 100.0, 100.0, 100.0, 100.0, 80.0, 80.0, 80.0, 80.0, 80.0,
        ]);
        assert_eq!(enrollment_trend(&declining), Some(EnrollmentTrend::Declining));

        let steady = snapshots(&[
            100.0, 100.0, 100.0, 100.0, 100.0, 105.0, 105.0, 105.0, 105.0, 105.0,
        ]);
        assert_eq!(enrollment_trend(&steady), Some(EnrollmentTrend::Stable));
    }

    #[test]
    fn test_trend_uses_latest_ten_only() {
        let mut values = vec![5000.0; 4];
        values.extend([100.0; 5]);
        values.extend([150.0; 5]);
        assert_eq!(
            enrollment_trend(&snapshots(&values)),
            Some(EnrollmentTrend::Growing)
        );
    }

    #[test]
    fn test_peak_stage() {
        assert_eq!(peak_stage(&[]), None);
        assert_eq!(peak_stage(&[3.0, 9.0, 9.0, 1.0]), Some((2, 9.0)));
        assert_eq!(peak_stage(&[0.0, 0.0]), Some((1, 0.0)));
    }

    #[test]
    fn test_recommendations_empty_before_first_step() {
        let engine = CohortEngine::new(ConfigModel::default());
        assert!(engine.recommendations().is_empty());
    }

    #[test]
    fn test_recommendations_after_first_year() {
        let mut engine = CohortEngine::new(ConfigModel::default());
        engine.step();
        let recs = engine.recommendations();
        assert_eq!(
            kinds(&recs),
            vec![
                &RecommendationKind::PeakEnrollment {
                    stage: 1,
                    count: 100.0
                },
                &RecommendationKind::RoomsNeeded {
                    rooms: 4,
                    capacity: 30
                },
                &RecommendationKind::Retention { rate: 1.0 },
            ]
        );
        assert_eq!(recs[2].severity, Severity::Good);
    }

    #[test]
    fn test_retention_severity_thresholds() {
        let config = ConfigModel::default();
        let severity_for = |enrolled: f64, dropped: f64| {
            let mut state = CohortState::new(5);
            state.year = 1;
            state.total_enrolled = enrolled;
            state.total_dropped = dropped;
            recommendations(&config, &state)
                .into_iter()
                .find(|r| matches!(r.kind, RecommendationKind::Retention { .. }))
                .map(|r| r.severity)
        };
        assert_eq!(severity_for(50.0, 50.0), Some(Severity::Critical));
        assert_eq!(severity_for(70.0, 30.0), Some(Severity::Caution));
        assert_eq!(severity_for(75.0, 25.0), Some(Severity::Good));
        assert_eq!(severity_for(0.0, 0.0), None);
    }

    #[test]
    fn test_graduation_recommendation_severity() {
        let mut engine = CohortEngine::new(ConfigModel::default());
        engine.run(12);
        let grad = engine
            .recommendations()
            .into_iter()
            .find(|r| matches!(r.kind, RecommendationKind::Graduation { .. }))
            .expect("graduation rate is reported once the program has run its length");
        let rate = engine.graduation_rate().unwrap();
        let expected = if rate > GRADUATION_GOOD {
            Severity::Good
        } else {
            Severity::Caution
        };
        assert_eq!(grad.severity, expected);
    }

    #[test]
    fn test_declining_enrollment_recommended_as_caution() {
        let mut engine = CohortEngine::new(ConfigModel::default());
        engine.run(15);
        // Intake stops: the program drains over the next years.
        let drained = ConfigModel {
            new_entrants_per_year: 0.0,
            ..ConfigModel::default()
        };
        let mut state = engine.state().clone();
        for _ in 0..10 {
            crate::engine::project_year(&drained, &mut state);
        }
        let recs = recommendations(&drained, &state);
        let trend = recs
            .iter()
            .find(|r| matches!(r.kind, RecommendationKind::Trend(_)))
            .unwrap();
        assert_eq!(trend.kind, RecommendationKind::Trend(EnrollmentTrend::Declining));
        assert_eq!(trend.severity, Severity::Caution);
    }

    #[test]
    fn test_growing_enrollment_recommended() {
        // Long repeat loops keep the program filling up for years.
        let config = ConfigModel {
            stage1_rates: RateTriple::new(10.0, 0.0, 90.0),
            later_stage_rates: RateTriple::new(10.0, 0.0, 90.0),
            ..ConfigModel::default()
        };
        let mut engine = CohortEngine::new(config);
        engine.run(12);
        assert_eq!(engine.enrollment_trend(), Some(EnrollmentTrend::Growing));
        assert!(engine
            .recommendations()
            .iter()
            .any(|r| r.kind == RecommendationKind::Trend(EnrollmentTrend::Growing)));
    }

    #[test]
    fn test_messages_render() {
        let rec = Recommendation {
            severity: Severity::Critical,
            kind: RecommendationKind::Retention { rate: 0.5 },
        };
        assert!(rec.to_string().starts_with("CRITICAL: retention rate is 50.0%"));

        let rec = Recommendation {
            severity: Severity::Info,
            kind: RecommendationKind::RoomsNeeded {
                rooms: 12,
                capacity: 30,
            },
        };
        assert!(rec.to_string().contains("12 rooms"));
    }
}
