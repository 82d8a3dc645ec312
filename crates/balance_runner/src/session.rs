//! Auto-balance sessions.
//!
//! Repeats matrix → propose → apply until the roster is inside the target
//! band, the proposer runs out of ideas, or the iteration budget is spent.
//! Every iteration is appended to an [`AutoBalanceSession`] log.

use std::time::{SystemTime, UNIX_EPOCH};

use balance_core::archetype::Archetype;
use balance_core::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::matrix::{run_matrix, MatrixOptions};
use crate::proposer::{
    apply_adjustments, is_target_achieved, propose_adjustments, StatAdjustment, TuningConfig,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One matrix → propose → apply step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceIteration {
    /// When the iteration finished, unix seconds.
    pub timestamp: u64,
    /// Matrix run the adjustments were proposed from.
    pub prior_run_id: String,
    /// Balance score of that run.
    pub score_before: f64,
    /// Balance score of the next run, once known.
    pub score_after: Option<f64>,
    /// Adjustments applied.
    pub adjustments: Vec<StatAdjustment>,
}

/// Append-only log of an auto-balance session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBalanceSession {
    /// Start time, unix seconds.
    pub started_at: u64,
    /// End time, unix seconds; `None` while running.
    pub ended_at: Option<u64>,
    /// Score of the first matrix run.
    pub initial_score: f64,
    /// Score of the last matrix run.
    pub final_score: f64,
    /// Iterations in order.
    pub iterations: Vec<BalanceIteration>,
    /// Whether the last run met the target.
    pub target_reached: bool,
}

impl AutoBalanceSession {
    /// Open a session from the first run's score.
    pub fn start(initial_score: f64) -> Self {
        Self {
            started_at: unix_now(),
            ended_at: None,
            initial_score,
            final_score: initial_score,
            iterations: Vec::new(),
            target_reached: false,
        }
    }

    /// Append an iteration. Fills in the previous iteration's `score_after`.
    pub fn record_iteration(&mut self, prior_run_id: &str, score: f64, adjustments: Vec<StatAdjustment>) {
        if let Some(last) = self.iterations.last_mut() {
            last.score_after = Some(score);
        }
        self.iterations.push(BalanceIteration {
            timestamp: unix_now(),
            prior_run_id: prior_run_id.to_string(),
            score_before: score,
            score_after: None,
            adjustments,
        });
        self.final_score = score;
    }

    /// Close the session with the last measured score.
    pub fn finish(&mut self, final_score: f64, target_reached: bool) {
        if let Some(last) = self.iterations.last_mut() {
            if last.score_after.is_none() {
                last.score_after = Some(final_score);
            }
        }
        self.final_score = final_score;
        self.target_reached = target_reached;
        self.ended_at = Some(unix_now());
    }

    /// Score gained from start to finish (positive is better).
    pub fn improvement(&self) -> f64 {
        self.initial_score - self.final_score
    }
}

/// Options for [`run_auto_balance`].
#[derive(Debug, Clone)]
pub struct AutoBalanceOptions {
    /// Matrix settings used for every iteration. A fixed `run_id` is ignored.
    pub matrix: MatrixOptions,
    /// Proposer settings.
    pub tuning: TuningConfig,
    /// Iteration budget.
    pub max_iterations: u32,
}

impl AutoBalanceOptions {
    /// Options with a default iteration budget of 10.
    pub fn new(matrix: MatrixOptions, tuning: TuningConfig) -> Self {
        Self {
            matrix,
            tuning,
            max_iterations: 10,
        }
    }

    /// Set iteration budget
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Iterate toward balance. Returns the session log and the final roster.
pub fn run_auto_balance(
    archetypes: &[Archetype],
    options: &AutoBalanceOptions,
) -> Result<(AutoBalanceSession, Vec<Archetype>)> {
    let mut matrix_options = options.matrix.clone();
    matrix_options.run_id = None;

    let mut roster = archetypes.to_vec();
    let mut run = run_matrix(&roster, &matrix_options)?;
    let mut session = AutoBalanceSession::start(run.balance_score());

    for iteration in 0..options.max_iterations {
        if is_target_achieved(&run, &options.tuning) {
            break;
        }
        let adjustments = propose_adjustments(&run, &roster, &options.tuning);
        if adjustments.is_empty() {
            info!(iteration, "No further adjustments proposed");
            break;
        }

        roster = apply_adjustments(&roster, &adjustments);
        session.record_iteration(&run.run_id, run.balance_score(), adjustments);

        // run ids derive from ids and seed, so advance the seed per iteration
        matrix_options.seed = matrix_options.seed.wrapping_add(1);
        run = run_matrix(&roster, &matrix_options)?;
        info!(
            iteration,
            score = run.balance_score(),
            "Auto-balance iteration complete"
        );
    }

    let reached = is_target_achieved(&run, &options.tuning);
    session.finish(run.balance_score(), reached);
    info!(
        initial = session.initial_score,
        final_score = session.final_score,
        iterations = session.iterations.len(),
        target_reached = reached,
        "Auto-balance finished"
    );
    Ok((session, roster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::config::BalancerConfig;
    use balance_core::stats::StatProfile;

    #[test]
    fn test_session_log_links_scores() {
        let mut session = AutoBalanceSession::start(0.4);
        session.record_iteration("run-1", 0.4, Vec::new());
        session.record_iteration("run-2", 0.3, Vec::new());
        session.finish(0.2, false);

        assert_eq!(session.iterations.len(), 2);
        assert_eq!(session.iterations[0].score_after, Some(0.3));
        assert_eq!(session.iterations[1].score_after, Some(0.2));
        assert_eq!(session.final_score, 0.2);
        assert!(session.ended_at.is_some());
        assert!((session.improvement() - 0.2).abs() < 1e-12);
    }

    fn options(max_iterations: u32) -> AutoBalanceOptions {
        let config = BalancerConfig {
            fast_simulations: 30,
            ..BalancerConfig::default()
        };
        AutoBalanceOptions::new(
            MatrixOptions::new(config).with_fast(true),
            TuningConfig::default(),
        )
        .with_max_iterations(max_iterations)
    }

    #[test]
    fn test_balanced_roster_stops_immediately() {
        let roster = vec![Archetype::new("solo", "Solo", StatProfile::with_hp_damage(300.0, 20.0))];
        let (session, tuned) = run_auto_balance(&roster, &options(5)).unwrap();
        assert!(session.iterations.is_empty());
        assert!(session.target_reached);
        assert_eq!(tuned, roster);
    }

    #[test]
    fn test_iterations_bounded_and_roster_changes() {
        let roster = vec![
            Archetype::new("bully", "Bully", StatProfile::with_hp_damage(900.0, 40.0)),
            Archetype::new("victim", "Victim", StatProfile::with_hp_damage(600.0, 20.0)),
        ];
        let (session, tuned) = run_auto_balance(&roster, &options(3)).unwrap();
        assert!(session.iterations.len() <= 3);
        assert!(!session.iterations.is_empty());
        assert!(tuned[0].stats.damage < roster[0].stats.damage);
        assert!(tuned[1].stats.hp > roster[1].stats.hp);
        assert!(session.ended_at.is_some());
    }
}
