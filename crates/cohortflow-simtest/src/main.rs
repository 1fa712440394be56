//! Cohort Flow Headless Projection Harness
//!
//! Projects a student cohort year by year and prints the history table,
//! alerts, and planning recommendations. Runs entirely in-process — no UI,
//! no timers.
//!
//! Usage:
//!   cargo run -p cohortflow-simtest -- x=120 a1=55 b1=25 c1=20 --years 15
//!   cargo run -p cohortflow-simtest -- --config cohort.json --json
//!   cargo run -p cohortflow-simtest -- --check --verbose

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use cohortflow_logic::alerts::{self, Alert};
use cohortflow_logic::analysis::{self, Recommendation, Severity, DEFAULT_ROOM_CAPACITY};
use cohortflow_logic::config::{ConfigError, ConfigModel, ConfigWarning, RateTriple};
use cohortflow_logic::engine::CohortEngine;
use cohortflow_logic::state::{CohortState, YearSnapshot};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cohortflow-simtest")]
#[command(about = "Project how a student cohort flows through a multi-year program")]
struct Cli {
    /// Parameter overrides: x, a1, b1, c1, ai, bi, ci, total_years
    #[arg(value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// JSON config file (serialized ConfigModel) instead of KEY=VALUE pairs
    #[arg(long, conflicts_with = "params")]
    config: Option<PathBuf>,

    /// Number of years to project
    #[arg(long, default_value_t = 20)]
    years: u32,

    /// Students per room for the rooms-needed column
    #[arg(long, default_value_t = DEFAULT_ROOM_CAPACITY)]
    room_capacity: u32,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Run the built-in validation sweep instead of a projection
    #[arg(long)]
    check: bool,

    /// Show passing checks and per-year detail
    #[arg(long)]
    verbose: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohortflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.check {
        let failed = run_checks(cli.verbose);
        if failed > 0 {
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration rejected: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = CohortEngine::new(config);
    if !engine.warnings().is_empty() {
        warn!(
            "Projecting with {} rate warning(s); totals will not be conserved",
            engine.warnings().len()
        );
    }

    if cli.json {
        engine.run(cli.years);
        let report = ProjectionReport::from_engine(&engine, cli.room_capacity);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    print_projection(&mut engine, cli.years, cli.room_capacity, cli.verbose);
}

// ── Configuration ───────────────────────────────────────────────────────

fn load_config(cli: &Cli) -> Result<ConfigModel, String> {
    if let Some(path) = &cli.config {
        info!("Loading config from: {}", path.display());
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        return ConfigModel::from_json(&json).map_err(|e| e.to_string());
    }

    let fields = parse_assignments(&cli.params)?;
    ConfigModel::parse(&fields).map_err(|e| e.to_string())
}

fn parse_assignments(params: &[String]) -> Result<HashMap<String, String>, String> {
    let mut fields = HashMap::new();
    for p in params {
        let (key, value) = p
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", p))?;
        fields.insert(key.trim().to_string(), value.to_string());
    }
    Ok(fields)
}

// ── Projection output ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ProjectionReport<'a> {
    config: &'a ConfigModel,
    warnings: &'a [ConfigWarning],
    year: u32,
    stage_counts: &'a [f64],
    total_enrolled: f64,
    total_graduated: f64,
    total_dropped: f64,
    retention_rate: f64,
    graduation_rate: Option<f64>,
    room_capacity: u32,
    rooms_needed: u64,
    alerts: Vec<Alert>,
    recommendations: Vec<Recommendation>,
    history: &'a [YearSnapshot],
}

impl<'a> ProjectionReport<'a> {
    fn from_engine(engine: &'a CohortEngine, room_capacity: u32) -> Self {
        Self {
            config: engine.config(),
            warnings: engine.warnings(),
            year: engine.year(),
            stage_counts: engine.stage_counts(),
            total_enrolled: engine.total_enrolled(),
            total_graduated: engine.total_graduated(),
            total_dropped: engine.total_dropped(),
            retention_rate: engine.retention_rate(),
            graduation_rate: engine.graduation_rate(),
            room_capacity,
            rooms_needed: engine.rooms_needed(room_capacity),
            alerts: engine.detect_alerts(),
            recommendations: engine.recommendations(),
            history: engine.history(),
        }
    }
}

fn print_projection(engine: &mut CohortEngine, years: u32, room_capacity: u32, verbose: bool) {
    let stages = engine.config().stage_count;
    println!("=== Cohort Flow Projection ===\n");
    print_config(engine.config());

    let mut header = format!("{:>4} |", "Year");
    for s in 1..=stages {
        header.push_str(&format!(" {:>6} |", format!("S{}", s)));
    }
    header.push_str(&format!(
        " {:>7} | {:>7} | {:>8} | {:>5}",
        "Grad", "Dropped", "Enrolled", "Rooms"
    ));
    println!("{}", header);
    println!("{}", "-".repeat(header.chars().count()));

    for _ in 0..years {
        engine.step();
        let mut row = format!("{:>4} |", engine.year());
        for count in engine.stage_counts() {
            row.push_str(&format!(" {:>6} |", count.trunc()));
        }
        row.push_str(&format!(
            " {:>7} | {:>7} | {:>8} | {:>5}",
            engine.total_graduated().trunc(),
            engine.total_dropped().trunc(),
            engine.total_enrolled().trunc(),
            engine.rooms_needed(room_capacity)
        ));
        println!("{}", row);

        if verbose {
            for alert in engine.detect_alerts() {
                println!("       ! {}", alert);
            }
        }
    }

    println!(
        "\nRetention: {:.1}%   Rooms needed ({} students/room): {}",
        engine.retention_rate() * 100.0,
        room_capacity,
        engine.rooms_needed(room_capacity)
    );

    let alerts = engine.detect_alerts();
    if !alerts.is_empty() {
        println!("\n--- Alerts ---");
        for a in &alerts {
            println!("  ⚠ {}", a);
        }
    }

    let recs = engine.recommendations();
    if !recs.is_empty() {
        println!("\n--- Recommendations ---");
        for r in &recs {
            let icon = match r.severity {
                Severity::Info => "ℹ",
                Severity::Good => "✓",
                Severity::Caution => "⚠",
                Severity::Critical => "✗",
            };
            println!("  {} {}", icon, r);
        }
    }
}

fn print_config(config: &ConfigModel) {
    let show = |r: &RateTriple| {
        format!(
            "advance {}% / drop {}% / repeat {}%",
            r.advance, r.drop, r.repeat
        )
    };
    println!("  Entrants per year: {}", config.new_entrants_per_year);
    println!("  Stage 1 rates:     {}", show(&config.stage1_rates));
    println!("  Later stage rates: {}", show(&config.later_stage_rates));
    println!("  Program length:    {} years\n", config.stage_count);
}

// ── Validation sweep ────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

const EPS: f64 = 1e-9;

/// Run every check, print the summary, return the number of failures.
fn run_checks(verbose: bool) -> usize {
    println!("=== Cohort Flow Validation Harness ===\n");

    let mut results = Vec::new();

    // 1. Reference scenario
    results.extend(validate_reference_scenario());

    // 2. Conservation across rate configurations
    results.extend(validate_conservation());

    // 3. Cumulative totals & history
    results.extend(validate_cumulative_and_history());

    // 4. Determinism
    results.extend(validate_determinism());

    // 5. Boundaries: single stage, alert threshold, rooms
    results.extend(validate_boundaries());

    // 6. Config parsing & warnings
    results.extend(validate_config_handling());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    failed
}

// ── 1. Reference Scenario ───────────────────────────────────────────────

fn validate_reference_scenario() -> Vec<TestResult> {
    println!("--- Reference Scenario ---");
    let mut results = Vec::new();
    let mut engine = CohortEngine::new(ConfigModel::default());

    engine.step();
    let c = engine.stage_counts().to_vec();
    results.push(TestResult {
        name: "year1_only_entrants".into(),
        passed: c[0] == 100.0
            && c[1..].iter().all(|&v| v == 0.0)
            && engine.total_graduated() == 0.0
            && engine.total_dropped() == 0.0,
        detail: format!("counts={:?}", c),
    });

    engine.step();
    let c = engine.stage_counts().to_vec();
    results.push(TestResult {
        name: "year2_flows".into(),
        passed: (c[0] - 120.0).abs() < EPS
            && (c[1] - 60.0).abs() < EPS
            && (engine.total_dropped() - 20.0).abs() < EPS,
        detail: format!(
            "stage1={:.1} stage2={:.1} dropped={:.1}",
            c[0],
            c[1],
            engine.total_dropped()
        ),
    });

    results
}

// ── 2. Conservation ─────────────────────────────────────────────────────

fn validate_conservation() -> Vec<TestResult> {
    println!("--- Conservation ---");
    let mut results = Vec::new();

    let cases = [
        ("default", ConfigModel::default()),
        (
            "all_repeat",
            ConfigModel {
                stage1_rates: RateTriple::new(0.0, 0.0, 100.0),
                later_stage_rates: RateTriple::new(0.0, 0.0, 100.0),
                ..ConfigModel::default()
            },
        ),
        (
            "fast_track",
            ConfigModel {
                stage1_rates: RateTriple::new(100.0, 0.0, 0.0),
                later_stage_rates: RateTriple::new(100.0, 0.0, 0.0),
                stage_count: 3,
                ..ConfigModel::default()
            },
        ),
        (
            "fractional",
            ConfigModel {
                new_entrants_per_year: 37.5,
                stage1_rates: RateTriple::new(33.3, 33.3, 33.4),
                later_stage_rates: RateTriple::new(12.5, 62.5, 25.0),
                stage_count: 7,
            },
        ),
    ];

    for (label, config) in cases {
        let x = config.new_entrants_per_year;
        let mut engine = CohortEngine::new(config);
        let mut worst: f64 = 0.0;
        for year in 1..=50u32 {
            engine.step();
            let drift = (engine.state().total_accounted() - x * year as f64).abs();
            worst = worst.max(drift);
        }
        results.push(TestResult {
            name: format!("conservation_{}", label),
            passed: worst < 1e-6,
            detail: format!("max drift over 50 years = {:.2e}", worst),
        });
    }

    results
}

// ── 3. Cumulative Totals & History ──────────────────────────────────────

fn validate_cumulative_and_history() -> Vec<TestResult> {
    println!("--- Cumulative Totals & History ---");
    let mut results = Vec::new();

    // Unbalanced on purpose: the engine must still run it.
    let config = ConfigModel {
        stage1_rates: RateTriple::new(80.0, 30.0, 10.0),
        ..ConfigModel::default()
    };
    let mut engine = CohortEngine::new(config);

    let mut monotonic = true;
    let mut append_only = true;
    let mut prev_grad = 0.0;
    let mut prev_drop = 0.0;
    let mut prev_history: Vec<YearSnapshot> = Vec::new();

    for _ in 0..40 {
        engine.step();
        monotonic &= engine.total_graduated() >= prev_grad && engine.total_dropped() >= prev_drop;
        prev_grad = engine.total_graduated();
        prev_drop = engine.total_dropped();

        let history = engine.history();
        append_only &= history.len() == prev_history.len() + 1
            && history[..prev_history.len()] == prev_history[..];
        prev_history = history.to_vec();
    }

    results.push(TestResult {
        name: "totals_monotonic".into(),
        passed: monotonic,
        detail: format!(
            "graduated={:.1} dropped={:.1} after 40 years",
            prev_grad, prev_drop
        ),
    });
    results.push(TestResult {
        name: "history_append_only".into(),
        passed: append_only,
        detail: format!("{} snapshots", prev_history.len()),
    });

    let sum: f64 = engine.stage_counts().iter().sum();
    results.push(TestResult {
        name: "enrolled_matches_stages".into(),
        passed: sum == engine.total_enrolled(),
        detail: format!("sum={:.3} enrolled={:.3}", sum, engine.total_enrolled()),
    });

    results
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism() -> Vec<TestResult> {
    println!("--- Determinism ---");
    let config = ConfigModel {
        new_entrants_per_year: 173.0,
        stage1_rates: RateTriple::new(47.0, 31.0, 22.0),
        later_stage_rates: RateTriple::new(66.6, 11.1, 22.3),
        stage_count: 6,
    };
    let mut a = CohortEngine::new(config.clone());
    let mut b = CohortEngine::new(config);
    a.run(25);
    b.run(25);

    vec![TestResult {
        name: "identical_runs".into(),
        passed: a.state() == b.state()
            && a.detect_alerts() == b.detect_alerts()
            && a.recommendations() == b.recommendations(),
        detail: format!("year {} enrolled={:.3}", a.year(), a.total_enrolled()),
    }]
}

// ── 5. Boundaries ───────────────────────────────────────────────────────

fn validate_boundaries() -> Vec<TestResult> {
    println!("--- Boundaries ---");
    let mut results = Vec::new();

    let mut single = CohortEngine::new(ConfigModel {
        stage_count: 1,
        ..ConfigModel::default()
    });
    single.run(2);
    results.push(TestResult {
        name: "single_stage_graduates".into(),
        passed: (single.total_graduated() - 60.0).abs() < EPS,
        detail: format!("graduated={:.1}", single.total_graduated()),
    });

    let config = ConfigModel::default();
    let mut state = CohortState::new(config.stage_count);
    state.stage_counts[1] = 200.0;
    let at_limit = alerts::detect_alerts(&config, &state);
    state.stage_counts[1] = 250.0;
    let over_limit = alerts::detect_alerts(&config, &state);
    results.push(TestResult {
        name: "overcapacity_strict".into(),
        passed: at_limit.is_empty()
            && over_limit
                == vec![Alert::Overcapacity {
                    stage: 2,
                    count: 250.0,
                }],
        detail: format!("at 200: {:?}, at 250: {:?}", at_limit, over_limit),
    });

    let rooms = analysis::rooms_needed(&[100.0, 0.0, 0.0, 0.0, 0.0], 30);
    results.push(TestResult {
        name: "rooms_needed".into(),
        passed: rooms == 4,
        detail: format!("100 students at 30/room -> {} rooms", rooms),
    });

    let huge = analysis::rooms_needed(&[1e30, 1e30], 30);
    results.push(TestResult {
        name: "rooms_needed_saturates".into(),
        passed: huge == u64::MAX,
        detail: format!("1e30 students twice at 30/room -> {} rooms", huge),
    });

    let empty = CohortState::new(5);
    results.push(TestResult {
        name: "retention_zero_fallback".into(),
        passed: analysis::retention_rate(&empty) == 0.0,
        detail: "empty state retention is 0".into(),
    });

    results
}

// ── 6. Config Handling ──────────────────────────────────────────────────

fn validate_config_handling() -> Vec<TestResult> {
    println!("--- Config Handling ---");
    let mut results = Vec::new();

    let bad = parse_assignments(&["x=12".to_string(), "a1=sixty".to_string()])
        .and_then(|f| ConfigModel::parse(&f).map_err(|e| e.to_string()));
    results.push(TestResult {
        name: "invalid_number_rejected".into(),
        passed: bad.is_err(),
        detail: match &bad {
            Err(e) => e.clone(),
            Ok(_) => "non-numeric a1 was accepted".into(),
        },
    });

    let long = parse_assignments(&["total_years=4000000000".to_string()])
        .and_then(|f| ConfigModel::parse(&f).map_err(|e| e.to_string()));
    results.push(TestResult {
        name: "oversized_program_rejected".into(),
        passed: long.is_err(),
        detail: match &long {
            Err(e) => e.clone(),
            Ok(c) => format!("accepted {} stages", c.stage_count),
        },
    });

    let decimal = parse_assignments(&["a1=60.25".to_string(), "c1=19.75".to_string()])
        .ok()
        .and_then(|f| ConfigModel::parse(&f).ok());
    results.push(TestResult {
        name: "decimal_precision_kept".into(),
        passed: decimal
            .as_ref()
            .is_some_and(|c| c.stage1_rates.advance == 60.25 && c.validate().is_empty()),
        detail: format!("{:?}", decimal.map(|c| c.stage1_rates)),
    });

    let unbalanced = ConfigModel {
        later_stage_rates: RateTriple::new(70.0, 15.0, 5.0),
        ..ConfigModel::default()
    };
    let warnings = unbalanced.validate();
    results.push(TestResult {
        name: "unbalanced_rates_warned".into(),
        passed: warnings == vec![ConfigWarning::LaterStageRatesSum(90.0)],
        detail: format!("{:?}", warnings),
    });

    let zero_stages = ConfigModel::from_json(
        r#"{"new_entrants_per_year":100,"stage1_rates":{"advance":60,"drop":20,"repeat":20},
            "later_stage_rates":{"advance":70,"drop":15,"repeat":15},"stage_count":0}"#,
    );
    results.push(TestResult {
        name: "zero_stage_json_rejected".into(),
        passed: matches!(zero_stages, Err(ConfigError::InvalidStageCount { .. })),
        detail: format!("{:?}", zero_stages.map(|c| c.stage_count)),
    });

    results
}
