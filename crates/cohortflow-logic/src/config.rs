//! Projection parameters — entrant intake, transition rates, program length.
//!
//! A [`ConfigModel`] is built from raw key/value input (the fields of a
//! configuration form or command line) or from its JSON form. Parsing only
//! rejects input that is not numeric; semantic problems such as rate triples
//! that do not add up to 100% are reported as [`ConfigWarning`]s and left for
//! the caller to act on.
//!
//! ```
//! use std::collections::HashMap;
//! use cohortflow_logic::config::{ConfigModel, ConfigWarning};
//!
//! let mut fields = HashMap::new();
//! fields.insert("x".to_string(), "120".to_string());
//! fields.insert("a1".to_string(), "55.5".to_string());
//! let config = ConfigModel::parse(&fields).unwrap();
//! assert_eq!(config.new_entrants_per_year, 120.0);
//! assert_eq!(
//!     config.validate(),
//!     vec![ConfigWarning::Stage1RatesSum(95.5)]
//! );
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Allowed deviation of a rate triple from 100%.
pub const RATE_SUM_TOLERANCE: f64 = 0.1;

/// Longest accepted program, in stages. Each stage is a state slot.
pub const MAX_STAGE_COUNT: usize = 100;

/// Field keys accepted by [`ConfigModel::parse`].
pub mod fields {
    pub const NEW_ENTRANTS: &str = "x";
    pub const STAGE1_ADVANCE: &str = "a1";
    pub const STAGE1_DROP: &str = "b1";
    pub const STAGE1_REPEAT: &str = "c1";
    pub const LATER_ADVANCE: &str = "ai";
    pub const LATER_DROP: &str = "bi";
    pub const LATER_REPEAT: &str = "ci";
    pub const STAGE_COUNT: &str = "total_years";

    pub const ALL: [&str; 8] = [
        NEW_ENTRANTS,
        STAGE1_ADVANCE,
        STAGE1_DROP,
        STAGE1_REPEAT,
        LATER_ADVANCE,
        LATER_DROP,
        LATER_REPEAT,
        STAGE_COUNT,
    ];
}

/// Percentages (0–100) applied to a stage's population each year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTriple {
    /// Moves on to the next stage (or graduates from the last one).
    pub advance: f64,
    /// Leaves the program.
    pub drop: f64,
    /// Stays in the same stage for another year.
    pub repeat: f64,
}

impl RateTriple {
    pub fn new(advance: f64, drop: f64, repeat: f64) -> Self {
        Self {
            advance,
            drop,
            repeat,
        }
    }

    pub fn sum(&self) -> f64 {
        self.advance + self.drop + self.repeat
    }

    /// True when the triple accounts for 100% of a stage within tolerance.
    pub fn is_balanced(&self) -> bool {
        (self.sum() - 100.0).abs() <= RATE_SUM_TOLERANCE
    }
}

/// Simulation parameters. Immutable once handed to an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigModel {
    /// Students admitted into stage 1 every simulated year.
    pub new_entrants_per_year: f64,
    /// Rates for stage 1 only.
    pub stage1_rates: RateTriple,
    /// Rates for stages 2..N.
    pub later_stage_rates: RateTriple,
    /// Number of stages before graduation.
    pub stage_count: usize,
}

impl Default for ConfigModel {
    fn default() -> Self {
        Self {
            new_entrants_per_year: 100.0,
            stage1_rates: RateTriple::new(60.0, 20.0, 20.0),
            later_stage_rates: RateTriple::new(70.0, 15.0, 15.0),
            stage_count: 5,
        }
    }
}

/// Non-fatal configuration problem. Carries the offending sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConfigWarning {
    /// `a1 + b1 + c1` is not 100.
    Stage1RatesSum(f64),
    /// `ai + bi + ci` is not 100.
    LaterStageRatesSum(f64),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::Stage1RatesSum(sum) => write!(
                f,
                "stage 1 rates (a1+b1+c1) sum to {sum:.1}%, expected 100%"
            ),
            ConfigWarning::LaterStageRatesSum(sum) => write!(
                f,
                "later stage rates (ai+bi+ci) sum to {sum:.1}%, expected 100%"
            ),
        }
    }
}

/// Fatal configuration error. The caller keeps whatever config it had.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid number for `{field}`: {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error(
        "program length must be a whole number of years from 1 to {max}, got {value:?}",
        max = MAX_STAGE_COUNT
    )]
    InvalidStageCount { value: String },

    #[error("unknown configuration field `{field}`")]
    UnknownField { field: String },

    #[error("malformed JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigModel {
    /// Build a config from raw user-entered fields.
    ///
    /// Missing keys keep their [`Default`] values. Both `"60"` and `"60.5"`
    /// are accepted; fractional precision is preserved.
    pub fn parse(raw: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = ConfigModel::default();

        // Deterministic error reporting regardless of map order.
        let mut keys: Vec<&String> = raw.keys().collect();
        keys.sort();

        for key in keys {
            let value = &raw[key];
            match key.as_str() {
                fields::NEW_ENTRANTS => config.new_entrants_per_year = parse_number(key, value)?,
                fields::STAGE1_ADVANCE => config.stage1_rates.advance = parse_number(key, value)?,
                fields::STAGE1_DROP => config.stage1_rates.drop = parse_number(key, value)?,
                fields::STAGE1_REPEAT => config.stage1_rates.repeat = parse_number(key, value)?,
                fields::LATER_ADVANCE => {
                    config.later_stage_rates.advance = parse_number(key, value)?
                }
                fields::LATER_DROP => config.later_stage_rates.drop = parse_number(key, value)?,
                fields::LATER_REPEAT => config.later_stage_rates.repeat = parse_number(key, value)?,
                fields::STAGE_COUNT => config.stage_count = parse_stage_count(key, value)?,
                _ => {
                    return Err(ConfigError::UnknownField {
                        field: key.clone(),
                    })
                }
            }
        }

        log::debug!("parsed configuration: {config:?}");
        Ok(config)
    }

    /// Load the serialized form produced by `serde_json::to_string`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ConfigModel = serde_json::from_str(json)?;
        if config.stage_count == 0 || config.stage_count > MAX_STAGE_COUNT {
            return Err(ConfigError::InvalidStageCount {
                value: config.stage_count.to_string(),
            });
        }
        Ok(config)
    }

    /// Check both rate triples. Never fails; the caller decides what to do.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !self.stage1_rates.is_balanced() {
            warnings.push(ConfigWarning::Stage1RatesSum(self.stage1_rates.sum()));
        }
        if !self.later_stage_rates.is_balanced() {
            warnings.push(ConfigWarning::LaterStageRatesSum(
                self.later_stage_rates.sum(),
            ));
        }

        warnings
    }

    /// Rates that apply to the 0-based stage `index`.
    pub fn rates_for_stage(&self, index: usize) -> &RateTriple {
        if index == 0 {
            &self.stage1_rates
        } else {
            &self.later_stage_rates
        }
    }
}

fn parse_number(field: &str, value: &str) -> Result<f64, ConfigError> {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_stage_count(field: &str, value: &str) -> Result<usize, ConfigError> {
    let n = parse_number(field, value)?;
    if n < 1.0 || n.fract() != 0.0 || n > MAX_STAGE_COUNT as f64 {
        return Err(ConfigError::InvalidStageCount {
            value: value.to_string(),
        });
    }
    Ok(n as usize)
}
