//! Deterministic expected-value duel resolver.
//!
//! Both sides deal their expected per-turn damage simultaneously, so there
//! is no initiative bias and a mirror matchup always ends in a draw.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{BalancerConfig, LifestealMode};
use crate::formulas::{fastest_kill_estimate, mitigated_damage_per_turn};
use crate::stats::StatProfile;

/// How a deterministic duel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The attacker survived and the defender died.
    Attacker,
    /// The defender survived and the attacker died.
    Defender,
    /// Both sides died on the same turn.
    Draw,
    /// Nobody died before the turn limit.
    Timeout,
}

impl Outcome {
    /// True for `Attacker` and `Defender`.
    #[must_use]
    pub const fn is_decisive(self) -> bool {
        matches!(self, Outcome::Attacker | Outcome::Defender)
    }
}

/// Result of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeterministicOutcome {
    /// Winner or terminal state.
    pub result: Outcome,
    /// Turns elapsed.
    pub turns: u32,
    /// Attacker HP at the end, floored at 0.
    pub final_hp_attacker: f64,
    /// Defender HP at the end, floored at 0.
    pub final_hp_defender: f64,
}

/// Hit point and shield pools of one side during a fight.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pool {
    pub hp: f64,
    pub shield: f64,
    pub max_hp: f64,
}

impl Pool {
    pub fn new(profile: &StatProfile) -> Self {
        Self {
            hp: profile.hp.max(0.0),
            shield: profile.energy_shield.max(0.0),
            max_hp: profile.hp.max(0.0),
        }
    }

    pub fn alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Apply damage, shield first. Returns the amount removed from the pools.
    pub fn take(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let from_shield = amount.min(self.shield);
        self.shield -= from_shield;
        let rest = amount - from_shield;
        let from_hp = rest.min(self.hp.max(0.0));
        self.hp -= rest;
        from_shield + from_hp
    }

    pub fn heal(&mut self, amount: f64) {
        if amount > 0.0 && self.alive() {
            self.hp = (self.hp + amount).min(self.max_hp);
        }
    }
}

/// Lifesteal healing earned by one direction of damage.
pub(crate) fn lifesteal_heal(
    dealer: &StatProfile,
    mode: LifestealMode,
    gross: f64,
    removed: f64,
) -> f64 {
    let fraction = (dealer.lifesteal / 100.0).max(0.0);
    match mode {
        LifestealMode::OnHit => gross * fraction,
        LifestealMode::OnDamage => removed * fraction,
    }
}

/// Terminal state after a turn, if any.
pub(crate) fn terminal(a: &Pool, b: &Pool) -> Option<Outcome> {
    match (a.alive(), b.alive()) {
        (false, false) => Some(Outcome::Draw),
        (true, false) => Some(Outcome::Attacker),
        (false, true) => Some(Outcome::Defender),
        (true, true) => None,
    }
}

/// Turn limit derived from the configured policy.
#[must_use]
pub fn default_turn_limit(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> u32 {
    config
        .turn_limit
        .limit_for(fastest_kill_estimate(attacker, defender, config))
}

/// Simulate a duel turn by turn using expected values.
///
/// Per turn: simultaneous damage, thorns reflection, lifesteal, then
/// end-of-turn regeneration, then the termination check. When `turn_limit`
/// is `None` the limit comes from [`default_turn_limit`].
#[must_use]
pub fn resolve(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
    turn_limit: Option<u32>,
) -> DeterministicOutcome {
    let a_to_b = mitigated_damage_per_turn(attacker, defender, config);
    let b_to_a = mitigated_damage_per_turn(defender, attacker, config);
    let limit = turn_limit.unwrap_or_else(|| default_turn_limit(attacker, defender, config));

    let mut a = Pool::new(attacker);
    let mut b = Pool::new(defender);

    for turn in 1..=limit {
        let removed_from_b = b.take(a_to_b);
        let removed_from_a = a.take(b_to_a);

        a.take(removed_from_b * (defender.thorns / 100.0).max(0.0));
        b.take(removed_from_a * (attacker.thorns / 100.0).max(0.0));

        a.heal(lifesteal_heal(
            attacker,
            config.lifesteal_mode,
            a_to_b,
            removed_from_b,
        ));
        b.heal(lifesteal_heal(
            defender,
            config.lifesteal_mode,
            b_to_a,
            removed_from_a,
        ));

        a.heal(attacker.regen);
        b.heal(defender.regen);

        if let Some(result) = terminal(&a, &b) {
            trace!(?result, turn, "deterministic duel finished");
            return DeterministicOutcome {
                result,
                turns: turn,
                final_hp_attacker: a.hp.max(0.0),
                final_hp_defender: b.hp.max(0.0),
            };
        }
    }

    DeterministicOutcome {
        result: Outcome::Timeout,
        turns: limit,
        final_hp_attacker: a.hp.max(0.0),
        final_hp_defender: b.hp.max(0.0),
    }
}

/// Soft win estimate for the attacker derived from [`resolve`].
///
/// Decisive results map to 1.0 / 0.0 and draws to 0.5. A timeout maps to
/// the attacker's share of the remaining HP. This is an approximation, not
/// a true probability.
#[must_use]
pub fn predict_win_probability(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> f64 {
    let outcome = resolve(attacker, defender, config, None);
    match outcome.result {
        Outcome::Attacker => 1.0,
        Outcome::Defender => 0.0,
        Outcome::Draw => 0.5,
        Outcome::Timeout => {
            let total = outcome.final_hp_attacker + outcome.final_hp_defender;
            if total <= 0.0 {
                0.5
            } else {
                outcome.final_hp_attacker / total
            }
        }
    }
}
