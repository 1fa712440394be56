//! Pure cohort flow projection logic.
//!
//! This crate projects, year over year, how a cohort of students spreads
//! across the stages of a multi-year program given fixed advance, repeat,
//! and drop percentages. Functions take plain data and return results; no
//! rendering, no timers, no I/O beyond the `log` facade. Front ends (the
//! headless `cohortflow-simtest` harness, or any UI) poll the engine after
//! each step.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Parameters, raw-field and JSON parsing, rate-sum warnings |
//! | [`state`] | Per-stage counts, cumulative totals, yearly snapshots |
//! | [`engine`] | Yearly stage transition and the engine's read accessors |
//! | [`alerts`] | Overcapacity, attrition and graduation threshold alerts |
//! | [`analysis`] | Rooms needed, retention/graduation rates, trends, recommendations |
//!
//! ```
//! use cohortflow_logic::config::ConfigModel;
//! use cohortflow_logic::engine::CohortEngine;
//!
//! let mut engine = CohortEngine::new(ConfigModel::default());
//! engine.run(2);
//! assert_eq!(engine.year(), 2);
//! assert_eq!(engine.rooms_needed(30), 4 + 2);
//! ```

pub mod alerts;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod state;
