//! Batch sweeps over templates, budgets and trial counts.
//!
//! Builds every template at every budget, samples every unordered pair of
//! distinct templates at every trial count in parallel using rayon, and
//! checks the results against named balance targets.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use balance_core::archetype::Archetype;
use balance_core::config::BalancerConfig;
use balance_core::rng::derive_cell_seed;
use balance_core::sampler::sample_matchup;
use balance_core::template::ArchetypeTemplate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// CSV header written by [`BatchReport::to_csv`].
pub const CSV_HEADER: &str = "archetypeA,archetypeB,budget,avgRounds,minRounds,maxRounds,stdDevRounds,winRateA,winRateB,drawRate,totalSimulations";

/// Acceptance criteria checked against every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceTarget {
    /// Target name used in the report.
    pub name: String,
    /// Accepted range of `win_rate_a`, inclusive.
    pub win_rate_band: Option<(f64, f64)>,
    /// Accepted range of average rounds, inclusive.
    pub avg_rounds: Option<(f64, f64)>,
    /// Largest accepted draw rate.
    pub max_draw_rate: Option<f64>,
    /// Passing values this close to a limit are reported as warnings.
    pub warning_margin: f64,
}

impl Default for BalanceTarget {
    fn default() -> Self {
        Self {
            name: "fair_fight".to_string(),
            win_rate_band: Some((0.40, 0.60)),
            avg_rounds: None,
            max_draw_rate: Some(0.10),
            warning_margin: 0.02,
        }
    }
}

/// Configuration for a batch sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Templates to build.
    pub templates: Vec<ArchetypeTemplate>,
    /// Point budgets to build every template at.
    pub budgets: Vec<f64>,
    /// Trials per matchup, one sweep per value.
    pub trial_counts: Vec<u32>,
    /// Base seed for deterministic runs.
    pub seed: u64,
    /// Formula and simulation constants. The CLI replaces these with the
    /// active preset's config.
    pub config: BalancerConfig,
    /// Targets to check.
    pub targets: Vec<BalanceTarget>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            budgets: vec![100.0, 250.0, 500.0],
            trial_counts: vec![200],
            seed: 0,
            config: BalancerConfig::default(),
            targets: vec![BalanceTarget::default()],
        }
    }
}

impl BatchConfig {
    /// Create config for a set of templates
    pub fn new(templates: Vec<ArchetypeTemplate>) -> Self {
        Self {
            templates,
            ..Default::default()
        }
    }

    /// Set budgets
    pub fn with_budgets(mut self, budgets: Vec<f64>) -> Self {
        self.budgets = budgets;
        self
    }

    /// Set trial counts
    pub fn with_trial_counts(mut self, trial_counts: Vec<u32>) -> Self {
        self.trial_counts = trial_counts;
        self
    }

    /// Set seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set targets
    pub fn with_targets(mut self, targets: Vec<BalanceTarget>) -> Self {
        self.targets = targets;
        self
    }

    /// Parse a batch configuration from RON.
    pub fn from_ron_str(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }
}

/// One sampled pairing at one budget and trial count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// First template id.
    pub archetype_a: String,
    /// Second template id.
    pub archetype_b: String,
    /// Budget both were built at.
    pub budget: f64,
    /// Trials requested for this record.
    pub trials: u32,
    /// Mean rounds.
    pub avg_rounds: f64,
    /// Shortest fight.
    pub min_rounds: u32,
    /// Longest fight.
    pub max_rounds: u32,
    /// Population standard deviation of rounds.
    pub std_dev_rounds: f64,
    /// Share of fights A won.
    pub win_rate_a: f64,
    /// Share of fights B won.
    pub win_rate_b: f64,
    /// Share of draws.
    pub draw_rate: f64,
    /// Fights sampled.
    pub total_simulations: u32,
}

impl BatchRecord {
    /// Short label for reports.
    pub fn label(&self) -> String {
        format!(
            "{} vs {} @ {} ({} sims)",
            self.archetype_a, self.archetype_b, self.budget, self.total_simulations
        )
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{:.2},{},{},{:.2},{:.4},{:.4},{:.4},{}",
            self.archetype_a,
            self.archetype_b,
            self.budget,
            self.avg_rounds,
            self.min_rounds,
            self.max_rounds,
            self.std_dev_rounds,
            self.win_rate_a,
            self.win_rate_b,
            self.draw_rate,
            self.total_simulations
        )
    }
}

/// A template that could not be built at a budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Template id.
    pub template: String,
    /// Budget requested.
    pub budget: f64,
    /// Error message
    pub message: String,
}

/// Whether a finding breaks a target or only comes close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingKind {
    /// Inside the limit but within the warning margin.
    Warning,
    /// Outside the limit.
    Failure,
}

/// One metric of one record checked against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFinding {
    /// Target name.
    pub target: String,
    /// Record label.
    pub record: String,
    /// Metric checked.
    pub metric: String,
    /// Observed value.
    pub value: f64,
    /// Accepted range.
    pub expected_range: (f64, f64),
    /// Failure or warning.
    pub kind: FindingKind,
}

fn check_range(
    target: &BalanceTarget,
    record: &BatchRecord,
    metric: &str,
    value: f64,
    (low, high): (f64, f64),
) -> Option<TargetFinding> {
    let kind = if value < low || value > high {
        FindingKind::Failure
    } else if value - low < target.warning_margin || high - value < target.warning_margin {
        FindingKind::Warning
    } else {
        return None;
    };
    Some(TargetFinding {
        target: target.name.clone(),
        record: record.label(),
        metric: metric.to_string(),
        value,
        expected_range: (low, high),
        kind,
    })
}

impl BalanceTarget {
    /// Findings for one record; empty when the record passes cleanly.
    pub fn evaluate(&self, record: &BatchRecord) -> Vec<TargetFinding> {
        let mut findings = Vec::new();
        if let Some(band) = self.win_rate_band {
            findings.extend(check_range(self, record, "win_rate_a", record.win_rate_a, band));
        }
        if let Some(range) = self.avg_rounds {
            findings.extend(check_range(self, record, "avg_rounds", record.avg_rounds, range));
        }
        if let Some(max) = self.max_draw_rate {
            // lower bound is never near-missed
            let range = (f64::NEG_INFINITY, max);
            findings.extend(check_range(self, record, "draw_rate", record.draw_rate, range));
        }
        findings
    }
}

/// Results of a batch sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One record per pairing, budget and trial count.
    pub records: Vec<BatchRecord>,
    /// Templates that failed to build.
    pub errors: Vec<BatchError>,
    /// Every failure and warning.
    pub findings: Vec<TargetFinding>,
    /// Record × target checks with no failure.
    pub passed: usize,
    /// Record × target checks with at least one failure.
    pub failed: usize,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchReport {
    /// Records as CSV, header first.
    pub fn to_csv(&self) -> String {
        let mut csv = String::with_capacity(64 * (self.records.len() + 1));
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        for record in &self.records {
            csv.push_str(&record.csv_row());
            csv.push('\n');
        }
        csv
    }

    /// Failures only.
    pub fn failures(&self) -> impl Iterator<Item = &TargetFinding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Failure)
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &TargetFinding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Warning)
    }

    /// Generate markdown report
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Batch Balance Report\n\n");
        let _ = writeln!(md, "**Matchups:** {}", self.records.len());
        let simulations: u64 = self
            .records
            .iter()
            .map(|r| u64::from(r.total_simulations))
            .sum();
        let _ = writeln!(md, "**Simulations:** {simulations}");
        let _ = writeln!(md, "**Runtime:** {:.1}s", self.duration_seconds);
        let _ = writeln!(md, "**Checks passed:** {}", self.passed);
        let _ = writeln!(md, "**Checks failed:** {}\n", self.failed);

        if !self.errors.is_empty() {
            md.push_str("## Build Errors\n\n");
            for error in &self.errors {
                let _ = writeln!(md, "- `{}` @ {}: {}", error.template, error.budget, error.message);
            }
            md.push('\n');
        }

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            md.push_str("## Failures\n\n");
            for f in failures {
                let _ = writeln!(
                    md,
                    "- **{}** {}: {} = {:.3} (expected {:.3} to {:.3})",
                    f.target, f.record, f.metric, f.value, f.expected_range.0, f.expected_range.1
                );
            }
            md.push('\n');
        }

        let warnings: Vec<_> = self.warnings().collect();
        if !warnings.is_empty() {
            md.push_str("## Warnings\n\n");
            for f in warnings {
                let _ = writeln!(
                    md,
                    "- **{}** {}: {} = {:.3} is close to its limit",
                    f.target, f.record, f.metric, f.value
                );
            }
            md.push('\n');
        }

        if self.failed == 0 && self.errors.is_empty() {
            md.push_str("All targets met.\n");
        }
        md
    }

    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// One sampling job: a pairing at one budget and trial count.
struct Job<'a> {
    a: &'a Archetype,
    b: &'a Archetype,
    budget: f64,
    trials: u32,
}

/// Run a batch sweep. Build errors are collected, never fatal.
pub fn run_batch(config: &BatchConfig) -> BatchReport {
    let start = Instant::now();
    let mut errors = Vec::new();

    // built[budget index] = archetypes that built at that budget
    let built: Vec<(f64, Vec<Archetype>)> = config
        .budgets
        .iter()
        .map(|&budget| {
            let archetypes = config
                .templates
                .iter()
                .filter_map(|template| match template.build(budget) {
                    Ok(archetype) => Some(archetype),
                    Err(e) => {
                        warn!("Template '{}' failed at budget {}: {}", template.id, budget, e);
                        errors.push(BatchError {
                            template: template.id.clone(),
                            budget,
                            message: e.to_string(),
                        });
                        None
                    }
                })
                .collect();
            (budget, archetypes)
        })
        .collect();

    let mut jobs = Vec::new();
    for (budget, archetypes) in &built {
        for &trials in &config.trial_counts {
            for (i, a) in archetypes.iter().enumerate() {
                for b in &archetypes[i + 1..] {
                    jobs.push(Job {
                        a,
                        b,
                        budget: *budget,
                        trials,
                    });
                }
            }
        }
    }

    info!(
        "Starting batch run: {} matchups across {} budgets",
        jobs.len(),
        config.budgets.len()
    );
    let completed = AtomicUsize::new(0);
    let total = jobs.len();

    let records: Vec<BatchRecord> = jobs
        .par_iter()
        .enumerate()
        .map(|(index, job)| {
            let seed = derive_cell_seed(config.seed, index);
            let stats = sample_matchup(&job.a.stats, &job.b.stats, job.trials, seed, &config.config);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!("Progress: {}/{}", done, total);
            }
            BatchRecord {
                archetype_a: job.a.id.clone(),
                archetype_b: job.b.id.clone(),
                budget: job.budget,
                trials: job.trials,
                avg_rounds: stats.avg_turns,
                min_rounds: stats.min_turns,
                max_rounds: stats.max_turns,
                std_dev_rounds: stats.std_dev_turns,
                win_rate_a: stats.win_rate_a,
                win_rate_b: stats.win_rate_b,
                draw_rate: stats.draw_rate,
                total_simulations: stats.trials,
            }
        })
        .collect();

    let mut findings = Vec::new();
    let (mut passed, mut failed) = (0, 0);
    for record in &records {
        for target in &config.targets {
            let found = target.evaluate(record);
            if found.iter().any(|f| f.kind == FindingKind::Failure) {
                failed += 1;
            } else {
                passed += 1;
            }
            findings.extend(found);
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} matchups in {:.1}s, {} checks passed, {} failed",
        records.len(),
        duration_seconds,
        passed,
        failed
    );

    BatchReport {
        records,
        errors,
        findings,
        passed,
        failed,
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::stats::{StatKey, StatProfile};

    fn template(id: &str, hp_share: f64) -> ArchetypeTemplate {
        ArchetypeTemplate {
            id: id.to_string(),
            name: id.to_string(),
            role: String::new(),
            description: String::new(),
            base: StatProfile::with_hp_damage(100.0, 10.0),
            budget_range: (50.0, 600.0),
            allocation: [(StatKey::Hp, hp_share), (StatKey::Damage, 1.0 - hp_share)]
                .into_iter()
                .collect(),
        }
    }

    fn record(win_rate_a: f64, draw_rate: f64) -> BatchRecord {
        BatchRecord {
            archetype_a: "a".to_string(),
            archetype_b: "b".to_string(),
            budget: 100.0,
            trials: 100,
            avg_rounds: 10.0,
            min_rounds: 5,
            max_rounds: 15,
            std_dev_rounds: 2.0,
            win_rate_a,
            win_rate_b: 1.0 - win_rate_a - draw_rate,
            draw_rate,
            total_simulations: 100,
        }
    }

    #[test]
    fn test_row_count_matches_sweep() {
        let config = BatchConfig::new(vec![
            template("tank", 0.8),
            template("blade", 0.3),
            template("even", 0.5),
        ])
        .with_budgets(vec![100.0, 300.0])
        .with_trial_counts(vec![20, 40]);

        let report = run_batch(&config);
        // 3 pairs * 2 budgets * 2 trial counts
        assert_eq!(report.records.len(), 12);
        assert_eq!(report.to_csv().lines().count(), 13);
        assert!(report.errors.is_empty());
        assert_eq!(report.passed + report.failed, 12);
    }

    #[test]
    fn test_build_errors_collected() {
        let config = BatchConfig::new(vec![template("tank", 0.8), template("blade", 0.3)])
            .with_budgets(vec![100.0, 1000.0])
            .with_trial_counts(vec![10]);

        let report = run_batch(&config);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.records.len(), 1);
        assert!(report.to_markdown().contains("## Build Errors"));
    }

    #[test]
    fn test_csv_header_and_row() {
        let report = BatchReport {
            records: vec![record(0.5, 0.0)],
            errors: Vec::new(),
            findings: Vec::new(),
            passed: 1,
            failed: 0,
            duration_seconds: 0.0,
        };
        let csv = report.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("a,b,100,10.00,5,15,2.00,0.5000,0.5000,0.0000,100")
        );
    }

    #[test]
    fn test_target_failures_and_warnings() {
        let target = BalanceTarget::default();
        assert!(target.evaluate(&record(0.5, 0.0)).is_empty());

        let fail = target.evaluate(&record(0.8, 0.0));
        assert_eq!(fail.len(), 1);
        assert_eq!(fail[0].kind, FindingKind::Failure);
        assert_eq!(fail[0].metric, "win_rate_a");

        let warn = target.evaluate(&record(0.59, 0.0));
        assert_eq!(warn.len(), 1);
        assert_eq!(warn[0].kind, FindingKind::Warning);

        let draws = target.evaluate(&record(0.45, 0.2));
        assert!(draws
            .iter()
            .any(|f| f.metric == "draw_rate" && f.kind == FindingKind::Failure));
    }

    #[test]
    fn test_markdown_summary() {
        let target = BalanceTarget::default();
        let records = vec![record(0.5, 0.0), record(0.9, 0.0)];
        let findings: Vec<_> = records.iter().flat_map(|r| target.evaluate(r)).collect();
        let report = BatchReport {
            records,
            errors: Vec::new(),
            findings,
            passed: 1,
            failed: 1,
            duration_seconds: 1.5,
        };
        let md = report.to_markdown();
        assert!(md.contains("**Matchups:** 2"));
        assert!(md.contains("**Checks failed:** 1"));
        assert!(md.contains("## Failures"));
        assert!(!md.contains("All targets met."));
    }
}
