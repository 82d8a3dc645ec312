//! Stat sensitivity ("weight impact") analysis.
//!
//! Perturbs one stat by `config.sensitivity_delta` and re-runs the
//! deterministic resolver. The elasticity is
//!
//! ```text
//! ((baseline_turns - perturbed_turns) / baseline_turns) / delta
//! ```
//!
//! Positive values mean raising the stat shortens the fight. Draws and
//! timeouts have no time-to-kill, so they produce no result.
//!
//! A shorter fight only helps the side that wins it. When the perturbed
//! side loses the baseline, the turns measure the opponent's time-to-kill,
//! so [`SensitivityReport::advantage_map`] flips those signs.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::BalancerConfig;
use crate::resolver::{resolve, DeterministicOutcome, Outcome};
use crate::stats::{StatKey, StatProfile};

/// Which side of the duel is perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The first profile passed to the resolver.
    Attacker,
    /// The second profile passed to the resolver.
    Defender,
}

/// Elasticity of time-to-kill with respect to one stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    /// Perturbed stat.
    pub stat: StatKey,
    /// Side whose stat was perturbed.
    pub side: Side,
    /// Signed elasticity.
    pub elasticity: f64,
    /// Perturbation applied, in percent.
    pub delta_percent: f64,
    /// Turns of the unperturbed duel.
    pub baseline_turns: u32,
    /// Turns of the perturbed duel.
    pub perturbed_turns: u32,
}

/// All defined results for one side, by descending absolute elasticity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// Side that was perturbed.
    pub side: Side,
    /// Result of the unperturbed duel.
    pub baseline: Outcome,
    /// Sorted results; stats with undefined elasticity are omitted.
    pub results: Vec<SensitivityResult>,
}

impl SensitivityReport {
    /// Stat → elasticity map.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<StatKey, f64> {
        self.results.iter().map(|r| (r.stat, r.elasticity)).collect()
    }

    /// Stat → elasticity map where positive values help the perturbed side win.
    ///
    /// Identical to [`as_map`](Self::as_map) when the perturbed side won the
    /// baseline; negated when it lost.
    #[must_use]
    pub fn advantage_map(&self) -> BTreeMap<StatKey, f64> {
        let lost = matches!(
            (self.side, self.baseline),
            (Side::Attacker, Outcome::Defender) | (Side::Defender, Outcome::Attacker)
        );
        self.results
            .iter()
            .map(|r| (r.stat, if lost { -r.elasticity } else { r.elasticity }))
            .collect()
    }

    /// The `n` most influential stats.
    #[must_use]
    pub fn top(&self, n: usize) -> &[SensitivityResult] {
        &self.results[..n.min(self.results.len())]
    }
}

/// Sensitivity of both sides of one pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidirectionalSensitivity {
    /// Perturbing the attacker's stats.
    pub attacker: SensitivityReport,
    /// Perturbing the defender's stats.
    pub defender: SensitivityReport,
}

fn perturbed_outcome(
    attacker: &StatProfile,
    defender: &StatProfile,
    stat: StatKey,
    side: Side,
    config: &BalancerConfig,
) -> DeterministicOutcome {
    let factor = 1.0 + config.sensitivity_delta;
    match side {
        Side::Attacker => resolve(&attacker.scaled(stat, factor), defender, config, None),
        Side::Defender => resolve(attacker, &defender.scaled(stat, factor), config, None),
    }
}

fn against_baseline(
    baseline: &DeterministicOutcome,
    attacker: &StatProfile,
    defender: &StatProfile,
    stat: StatKey,
    side: Side,
    config: &BalancerConfig,
) -> Option<SensitivityResult> {
    let delta = config.sensitivity_delta;
    if !baseline.result.is_decisive() || delta == 0.0 || baseline.turns == 0 {
        return None;
    }

    let perturbed = perturbed_outcome(attacker, defender, stat, side, config);
    if perturbed.result != baseline.result {
        return None;
    }

    let base = f64::from(baseline.turns);
    let elasticity = ((base - f64::from(perturbed.turns)) / base) / delta;
    Some(SensitivityResult {
        stat,
        side,
        elasticity,
        delta_percent: delta * 100.0,
        baseline_turns: baseline.turns,
        perturbed_turns: perturbed.turns,
    })
}

/// Elasticity of one stat on one side, or `None` if undefined.
#[must_use]
pub fn analyze_stat(
    attacker: &StatProfile,
    defender: &StatProfile,
    stat: StatKey,
    side: Side,
    config: &BalancerConfig,
) -> Option<SensitivityResult> {
    let baseline = resolve(attacker, defender, config, None);
    against_baseline(&baseline, attacker, defender, stat, side, config)
}

/// Elasticities of every analyzable stat on one side, evaluated independently.
#[must_use]
pub fn analyze_all(
    attacker: &StatProfile,
    defender: &StatProfile,
    side: Side,
    config: &BalancerConfig,
) -> SensitivityReport {
    let baseline = resolve(attacker, defender, config, None);
    let mut results: Vec<SensitivityResult> = StatKey::ANALYZABLE
        .iter()
        .filter_map(|&stat| against_baseline(&baseline, attacker, defender, stat, side, config))
        .collect();

    results.sort_by(|a, b| {
        b.elasticity
            .abs()
            .partial_cmp(&a.elasticity.abs())
            .unwrap_or(Ordering::Equal)
            .then(a.stat.cmp(&b.stat))
    });

    SensitivityReport {
        side,
        baseline: baseline.result,
        results,
    }
}

/// Run [`analyze_all`] once per side.
#[must_use]
pub fn analyze_bidirectional(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> BidirectionalSensitivity {
    BidirectionalSensitivity {
        attacker: analyze_all(attacker, defender, Side::Attacker, config),
        defender: analyze_all(attacker, defender, Side::Defender, config),
    }
}
