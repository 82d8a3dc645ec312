//! Seeded Monte Carlo sampling of one matchup.
//!
//! Runs `trials` randomized duels through [`CombatEngine`] with a single
//! [`Lcg`] seeded from `seed`, then aggregates the trial outcomes. Identical
//! inputs give identical aggregates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BalancerConfig;
use crate::engine::{CombatEngine, TrialOutcome, Winner};
use crate::rng::Lcg;
use crate::stats::StatProfile;

/// Mean and median damage for one turn index across trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDamagePoint {
    /// 1-based turn index.
    pub turn: u32,
    /// Mean damage on this turn.
    pub mean: f64,
    /// Median damage on this turn.
    pub median: f64,
    /// Trials that lasted at least this many turns.
    pub samples: u32,
}

/// Aggregate of many stochastic trials of A versus B.
///
/// Per-turn figures (`early_impact`, `damage_series`) assume each trial's
/// total damage (both sides) was spread evenly over its own turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupStats {
    /// Trials run.
    pub trials: u32,
    /// Trials won by A.
    pub wins_a: u32,
    /// Trials won by B.
    pub wins_b: u32,
    /// Drawn trials, including turn-cap draws.
    pub draws: u32,
    /// `wins_a / trials`.
    pub win_rate_a: f64,
    /// `wins_b / trials`.
    pub win_rate_b: f64,
    /// `draws / trials`.
    pub draw_rate: f64,
    /// Mean turns of trials A won.
    pub avg_ttk_a_wins: f64,
    /// Mean turns of trials B won.
    pub avg_ttk_b_wins: f64,
    /// Mean turns over all trials.
    pub avg_turns: f64,
    /// Median turns over all trials.
    pub median_turns: f64,
    /// Population standard deviation of turns over all trials.
    pub std_dev_turns: f64,
    /// Shortest trial.
    pub min_turns: u32,
    /// Longest trial.
    pub max_turns: u32,
    /// Mean HP A had left in the trials A won.
    pub avg_hp_remaining_a_wins: f64,
    /// Mean HP B had left in the trials B won.
    pub avg_hp_remaining_b_wins: f64,
    /// Mean winner overkill over decisive trials.
    pub avg_overkill: f64,
    /// Mean damage on each of the first `early_impact_turns` turns.
    pub early_impact: Vec<f64>,
    /// Damage per turn up to `damage_series_turns`.
    pub damage_series: Vec<TurnDamagePoint>,
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Average damage per turn of one trial, 0 for zero-length trials.
fn per_turn_damage(outcome: &TrialOutcome) -> f64 {
    if outcome.turns == 0 {
        0.0
    } else {
        (outcome.damage_dealt[0] + outcome.damage_dealt[1]) / f64::from(outcome.turns)
    }
}

/// Damage per turn for turns `1..=len`, with mean and median per turn.
fn damage_series(outcomes: &[TrialOutcome], len: usize) -> Vec<TurnDamagePoint> {
    (1..=len as u32)
        .map(|turn| {
            let mut values: Vec<f64> = outcomes
                .iter()
                .filter(|o| o.turns >= turn)
                .map(per_turn_damage)
                .collect();
            TurnDamagePoint {
                turn,
                mean: mean(&values),
                samples: values.len() as u32,
                median: median(&mut values),
            }
        })
        .collect()
}

impl MatchupStats {
    /// Aggregate a set of trial outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[TrialOutcome], config: &BalancerConfig) -> Self {
        let trials = outcomes.len() as u32;
        let count = |w: Winner| outcomes.iter().filter(|o| o.winner == w).count() as u32;
        let wins_a = count(Winner::SideA);
        let wins_b = count(Winner::SideB);
        let draws = count(Winner::Draw);

        let turns_where = |w: Winner| -> Vec<f64> {
            outcomes
                .iter()
                .filter(|o| o.winner == w)
                .map(|o| f64::from(o.turns))
                .collect()
        };
        let hp_where = |w: Winner, side: usize| -> Vec<f64> {
            outcomes
                .iter()
                .filter(|o| o.winner == w)
                .map(|o| o.hp_remaining[side])
                .collect()
        };

        let mut all_turns: Vec<f64> = outcomes.iter().map(|o| f64::from(o.turns)).collect();
        let overkill: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| match o.winner {
                Winner::SideA => Some(o.overkill[0]),
                Winner::SideB => Some(o.overkill[1]),
                Winner::Draw => None,
            })
            .collect();

        let series = damage_series(outcomes, config.damage_series_turns);
        let early = damage_series(outcomes, config.early_impact_turns)
            .into_iter()
            .map(|point| point.mean)
            .collect();

        Self {
            trials,
            wins_a,
            wins_b,
            draws,
            win_rate_a: ratio(wins_a, trials),
            win_rate_b: ratio(wins_b, trials),
            draw_rate: ratio(draws, trials),
            avg_ttk_a_wins: mean(&turns_where(Winner::SideA)),
            avg_ttk_b_wins: mean(&turns_where(Winner::SideB)),
            avg_turns: mean(&all_turns),
            std_dev_turns: population_std_dev(&all_turns),
            min_turns: outcomes.iter().map(|o| o.turns).min().unwrap_or(0),
            max_turns: outcomes.iter().map(|o| o.turns).max().unwrap_or(0),
            median_turns: median(&mut all_turns),
            avg_hp_remaining_a_wins: mean(&hp_where(Winner::SideA, 0)),
            avg_hp_remaining_b_wins: mean(&hp_where(Winner::SideB, 1)),
            avg_overkill: mean(&overkill),
            early_impact: early,
            damage_series: series,
        }
    }
}

/// Run `trials` seeded duels of `a` versus `b` and aggregate them.
#[must_use]
pub fn sample_matchup(
    a: &StatProfile,
    b: &StatProfile,
    trials: u32,
    seed: u64,
    config: &BalancerConfig,
) -> MatchupStats {
    let engine = CombatEngine::new(config);
    let mut rng = Lcg::new(seed);
    let outcomes: Vec<TrialOutcome> = (0..trials)
        .map(|_| engine.resolve(a, b, config.engine_turn_limit, &mut rng))
        .collect();

    let stats = MatchupStats::from_outcomes(&outcomes, config);
    debug!(
        trials,
        seed,
        win_rate_a = stats.win_rate_a,
        avg_turns = stats.avg_turns,
        "matchup sampled"
    );
    stats
}
