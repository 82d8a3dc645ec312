//! Balance runner CLI.
//!
//! Logs go to stderr; reports go to stdout unless an output path is given.
//!
//! # Usage
//!
//! ```bash
//! # Win-rate matrix for a roster, stored under balance_store/run/<id>.json
//! cargo run -p balance_runner -- matrix --roster data/archetypes/roster.ron --fast
//!
//! # Elasticities for one pairing
//! cargo run -p balance_runner -- sensitivity --roster data/archetypes/roster.ron -a guardian -d rogue
//!
//! # Proposals from a saved run
//! cargo run -p balance_runner -- propose --roster data/archetypes/roster.ron --run results/run.json
//!
//! # Template sweep with CSV and markdown output
//! cargo run -p balance_runner -- batch --config data/batches/sweep.ron --output results/
//! ```

use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use balance_core::archetype::{find, roster_from_ron, Archetype};
use balance_core::resolver::{predict_win_probability, resolve};
use balance_core::sensitivity::{analyze_bidirectional, SensitivityReport};
use balance_runner::batch::{run_batch, BatchConfig};
use balance_runner::matrix::{run_matrix, MatrixOptions, MatrixRunResult, ProgressAction};
use balance_runner::proposer::{
    adjustments_to_markdown, propose_adjustments, Aggressiveness, TuningConfig,
};
use balance_runner::session::{run_auto_balance, AutoBalanceOptions};
use balance_runner::storage::{BalancePreset, FileStore, Records};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "balance_runner")]
#[command(about = "Combat balance matrix runner and tuning assistant")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding stored runs, archetypes and presets
    #[arg(long, global = true, default_value = "balance_store")]
    store: PathBuf,

    /// Preset to load from the store
    #[arg(long, global = true, default_value = "default")]
    preset: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every ordered pairing of a roster
    Matrix {
        /// Roster RON file
        #[arg(short, long)]
        roster: PathBuf,

        /// Use the fast simulation count
        #[arg(long)]
        fast: bool,

        /// Base random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Also write the run JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show stat elasticities for one pairing
    Sensitivity {
        /// Roster RON file
        #[arg(short, long)]
        roster: PathBuf,

        /// Attacker archetype id
        #[arg(short, long)]
        attacker: String,

        /// Defender archetype id
        #[arg(short, long)]
        defender: String,

        /// Number of stats to show per side
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Propose stat adjustments toward a 50% win rate
    Propose {
        /// Roster RON file
        #[arg(short, long)]
        roster: PathBuf,

        /// Existing run JSON; a fast matrix is sampled when omitted
        #[arg(long)]
        run: Option<PathBuf>,

        /// Adjust up to three stats per archetype
        #[arg(long)]
        aggressive: bool,

        /// Output markdown report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Iterate matrix, propose and apply until balanced
    AutoBalance {
        /// Roster RON file
        #[arg(short, long)]
        roster: PathBuf,

        /// Iteration budget
        #[arg(long, default_value = "10")]
        max_iterations: u32,

        /// Base random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Adjust up to three stats per archetype
        #[arg(long)]
        aggressive: bool,

        /// Write the tuned roster as RON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep templates across budgets and trial counts
    Batch {
        /// Batch configuration RON file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory for CSV, markdown and JSON results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify that repeated runs with one seed are identical
    Verify {
        /// Roster RON file
        #[arg(short, long)]
        roster: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(long, default_value = "3")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let records = Records::new(FileStore::new(&cli.store));
    let preset = records.load_preset_or_default(&cli.preset);
    tracing::debug!(preset = %preset.id, store = %cli.store.display(), "Preset resolved");

    let result = match cli.command {
        Commands::Matrix {
            roster,
            fast,
            seed,
            output,
        } => cmd_matrix(&records, &preset, &roster, fast, seed, output.as_deref()),
        Commands::Sensitivity {
            roster,
            attacker,
            defender,
            top,
        } => cmd_sensitivity(&preset, &roster, &attacker, &defender, top),
        Commands::Propose {
            roster,
            run,
            aggressive,
            output,
        } => cmd_propose(&preset, &roster, run.as_deref(), aggressive, output.as_deref()),
        Commands::AutoBalance {
            roster,
            max_iterations,
            seed,
            aggressive,
            output,
        } => cmd_auto_balance(
            &records,
            &preset,
            &roster,
            max_iterations,
            seed,
            aggressive,
            output.as_deref(),
        ),
        Commands::Batch {
            config,
            seed,
            output,
        } => cmd_batch(&preset, &config, seed, &output),
        Commands::Verify { roster, seed, runs } => cmd_verify(&preset, &roster, seed, runs),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn load_roster(path: &Path) -> Result<Vec<Archetype>, Box<dyn Error>> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read roster '{}': {e}", path.display()))?;
    let roster = roster_from_ron(&source, &path.display().to_string())?;
    tracing::info!(path = %path.display(), archetypes = roster.len(), "Roster loaded");
    Ok(roster)
}

fn write_or_print(report: &str, output: Option<&Path>) -> CliResult {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, report)?;
            eprintln!("Report saved to: {}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}

/// Sample a matrix and store it
fn cmd_matrix(
    records: &Records<FileStore>,
    preset: &BalancePreset,
    roster: &Path,
    fast: bool,
    seed: u64,
    output: Option<&Path>,
) -> CliResult {
    let archetypes = load_roster(roster)?;
    let options = MatrixOptions::new(preset.config.clone())
        .with_fast(fast)
        .with_seed(seed)
        .with_progress(|update| {
            if update.completed % 10 == 0 || update.completed == update.total {
                tracing::info!("Progress: {}/{} cells", update.completed, update.total);
            }
            ProgressAction::Continue
        });

    let run = run_matrix(&archetypes, &options)?;
    records.save_run(&run)?;
    if let Some(path) = output {
        run.save(path)?;
        eprintln!("Run saved to: {}", path.display());
    }

    println!("{}", run.win_rate_table());
    eprintln!("Run id: {}", run.run_id);
    eprintln!("Balance score: {:.3}", run.balance_score());
    for cell in run.most_imbalanced(3) {
        eprintln!(
            "  {} vs {}: {:.1}%",
            cell.row_id,
            cell.col_id,
            cell.win_rate_row * 100.0
        );
    }
    Ok(())
}

fn print_side(label: &str, report: &SensitivityReport, top: usize) {
    println!("\n{label}:");
    if report.results.is_empty() {
        println!("  (undefined: draw, timeout or outcome flip)");
    }
    for r in report.top(top) {
        println!(
            "  {:<24} {:+.3} ({} -> {} turns)",
            r.stat.to_string(),
            r.elasticity,
            r.baseline_turns,
            r.perturbed_turns
        );
    }
}

/// Deterministic outcome and elasticities for one pairing
fn cmd_sensitivity(
    preset: &BalancePreset,
    roster: &Path,
    attacker: &str,
    defender: &str,
    top: usize,
) -> CliResult {
    let archetypes = load_roster(roster)?;
    let a = find(&archetypes, attacker)?;
    let d = find(&archetypes, defender)?;

    let outcome = resolve(&a.stats, &d.stats, &preset.config, None);
    let win = predict_win_probability(&a.stats, &d.stats, &preset.config);
    println!("{} vs {}", a.id, d.id);
    println!(
        "Outcome: {:?} after {} turns (HP {:.1} / {:.1}), estimate {:.0}%",
        outcome.result,
        outcome.turns,
        outcome.final_hp_attacker,
        outcome.final_hp_defender,
        win * 100.0
    );

    let both = analyze_bidirectional(&a.stats, &d.stats, &preset.config);
    print_side(&format!("Perturbing {}", a.id), &both.attacker, top);
    print_side(&format!("Perturbing {}", d.id), &both.defender, top);
    Ok(())
}

fn tuning_for(preset: &BalancePreset, aggressive: bool) -> TuningConfig {
    let tuning = preset.tuning.clone();
    if aggressive {
        tuning.with_aggressiveness(Aggressiveness::Aggressive)
    } else {
        tuning
    }
}

/// Propose adjustments from a run
fn cmd_propose(
    preset: &BalancePreset,
    roster: &Path,
    run: Option<&Path>,
    aggressive: bool,
    output: Option<&Path>,
) -> CliResult {
    let archetypes = load_roster(roster)?;
    let matrix = match run {
        Some(path) => MatrixRunResult::load(path)?,
        None => run_matrix(
            &archetypes,
            &MatrixOptions::new(preset.config.clone()).with_fast(true),
        )?,
    };

    let tuning = tuning_for(preset, aggressive);
    let adjustments = propose_adjustments(&matrix, &archetypes, &tuning);

    let mut report = String::from("# Balance Proposals\n\n");
    let _ = writeln!(report, "**Run:** {}  ", matrix.run_id);
    let _ = writeln!(report, "**Balance score:** {:.3}\n", matrix.balance_score());
    report.push_str(&adjustments_to_markdown(&adjustments));
    write_or_print(&report, output)
}

/// Iterate toward balance and save the tuned roster
fn cmd_auto_balance(
    records: &Records<FileStore>,
    preset: &BalancePreset,
    roster: &Path,
    max_iterations: u32,
    seed: u64,
    aggressive: bool,
    output: Option<&Path>,
) -> CliResult {
    let archetypes = load_roster(roster)?;
    let options = AutoBalanceOptions::new(
        MatrixOptions::new(preset.config.clone())
            .with_fast(true)
            .with_seed(seed),
        tuning_for(preset, aggressive),
    )
    .with_max_iterations(max_iterations);

    let (session, tuned) = run_auto_balance(&archetypes, &options)?;
    for archetype in &tuned {
        records.save_archetype(archetype)?;
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("AUTO-BALANCE COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Iterations: {}", session.iterations.len());
    eprintln!(
        "Balance score: {:.3} -> {:.3}",
        session.initial_score, session.final_score
    );
    eprintln!(
        "Target reached: {}",
        if session.target_reached { "yes" } else { "no" }
    );

    if let Some(path) = output {
        let ron = ron::ser::to_string_pretty(&tuned, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, ron)?;
        let log_path = path.with_extension("session.json");
        std::fs::write(&log_path, serde_json::to_string_pretty(&session)?)?;
        eprintln!("Tuned roster saved to: {}", path.display());
        eprintln!("Session log saved to: {}", log_path.display());
    }
    Ok(())
}

/// Run a template batch sweep
fn cmd_batch(preset: &BalancePreset, config: &Path, seed: Option<u64>, output: &Path) -> CliResult {
    let source = std::fs::read_to_string(config)
        .map_err(|e| format!("Cannot read batch config '{}': {e}", config.display()))?;
    let mut batch = BatchConfig::from_ron_str(&source)?;
    batch.config = preset.config.clone();
    if let Some(seed) = seed {
        batch.seed = seed;
    }

    std::fs::create_dir_all(output)?;
    let report = run_batch(&batch);

    let csv_path = output.join("batch.csv");
    std::fs::write(&csv_path, report.to_csv())?;
    let md_path = output.join("batch_report.md");
    std::fs::write(&md_path, report.to_markdown())?;
    let json_path = output.join("batch_results.json");
    report.save(&json_path)?;

    eprintln!("Matchups: {}", report.records.len());
    eprintln!("Checks passed: {}, failed: {}", report.passed, report.failed);
    if !report.errors.is_empty() {
        eprintln!("Template build errors: {}", report.errors.len());
    }
    eprintln!("Results saved to: {}", output.display());
    Ok(())
}

fn digest(run: &MatrixRunResult) -> Result<u64, serde_json::Error> {
    let json = serde_json::to_string(&run.normalized())?;
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Verify determinism by sampling the same matrix several times
fn cmd_verify(preset: &BalancePreset, roster: &Path, seed: u64, runs: u32) -> CliResult {
    let archetypes = load_roster(roster)?;
    let options = MatrixOptions::new(preset.config.clone())
        .with_fast(true)
        .with_seed(seed);

    let mut hashes = Vec::with_capacity(runs as usize);
    for i in 0..runs {
        let run = run_matrix(&archetypes, &options)?;
        let hash = digest(&run)?;
        tracing::info!(run = i + 1, hash = format!("{hash:016x}"), "Verification run");
        hashes.push(hash);
    }

    hashes.sort_unstable();
    hashes.dedup();
    if hashes.len() > 1 {
        return Err(format!(
            "Determinism check failed: {} distinct results over {runs} runs",
            hashes.len()
        )
        .into());
    }
    eprintln!("Determinism verified: {runs} identical runs (seed {seed})");
    Ok(())
}
