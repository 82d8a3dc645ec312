//! Stochastic turn-resolution engine.
//!
//! Resolves one randomized duel between two stat profiles. Every random
//! decision is drawn from an injected [`RandomSource`], in a fixed order
//! (side A's attacks, then side B's), so a seeded source reproduces the
//! same fight exactly.
//!
//! Per attack:
//! 1. crit / fumble roll (sets the multiplier and accuracy modifier)
//! 2. hit roll from the accuracy-versus-evasion contest
//! 3. block roll
//! 4. mitigation through the same pipeline as [`crate::formulas`]
//!
//! Damage is applied simultaneously at the end of the attack phase, then
//! thorns, lifesteal and regeneration, matching [`crate::resolver`].

use serde::{Deserialize, Serialize};

use crate::config::BalancerConfig;
use crate::formulas::{attacks_per_turn, combined_mitigation, crit_fumble_chances, hit_chance, mitigate_hit};
use crate::resolver::{lifesteal_heal, terminal, Outcome, Pool};
use crate::rng::RandomSource;
use crate::stats::StatProfile;

/// Winner of a single stochastic trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    /// First profile won.
    SideA,
    /// Second profile won.
    SideB,
    /// Both died together, or the turn cap was reached.
    Draw,
}

/// Result of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Winner of the trial.
    pub winner: Winner,
    /// Turns elapsed.
    pub turns: u32,
    /// Post-mitigation damage dealt by each side.
    pub damage_dealt: [f64; 2],
    /// HP left on each side, floored at 0.
    pub hp_remaining: [f64; 2],
    /// Damage beyond what was needed for the kill, per side.
    pub overkill: [f64; 2],
}

/// The turn-resolution engine.
#[derive(Debug, Clone, Copy)]
pub struct CombatEngine<'a> {
    config: &'a BalancerConfig,
}

impl<'a> CombatEngine<'a> {
    /// Create an engine bound to a configuration.
    #[must_use]
    pub fn new(config: &'a BalancerConfig) -> Self {
        Self { config }
    }

    /// Resolve a single attack. Returns the damage it deals (0 on miss or block).
    fn roll_attack<R: RandomSource + ?Sized>(
        &self,
        attacker: &StatProfile,
        defender: &StatProfile,
        rng: &mut R,
    ) -> f64 {
        let (crit, fumble) = crit_fumble_chances(attacker);
        let roll = rng.next_f64();
        let (multiplier, accuracy) = if roll < crit {
            (
                attacker.crit_multiplier,
                attacker.accuracy + attacker.crit_accuracy_bonus,
            )
        } else if roll < crit + fumble {
            (
                attacker.fumble_multiplier,
                attacker.accuracy - attacker.fumble_accuracy_penalty,
            )
        } else {
            (1.0, attacker.accuracy)
        };

        if !rng.chance(hit_chance(accuracy, defender.evasion)) {
            return 0.0;
        }
        if rng.chance(defender.block / 100.0) {
            return 0.0;
        }

        let base = attacker.damage.max(0.0);
        let k = self.config.armor_constant;
        if attacker.crit_before_mitigation {
            mitigate_hit(attacker, defender, base * multiplier, k)
        } else {
            let reduction = combined_mitigation(attacker, defender, base, k);
            (base * (1.0 - reduction) * multiplier - defender.ward.max(0.0)).max(0.0)
        }
    }

    /// Total damage one side deals in a turn.
    fn attack_phase<R: RandomSource + ?Sized>(
        &self,
        attacker: &StatProfile,
        defender: &StatProfile,
        rng: &mut R,
    ) -> f64 {
        let rate = attacks_per_turn(attacker);
        let whole = rate.floor();
        let extra = u32::from(rng.chance(rate - whole));
        let attacks = whole as u32 + extra;
        (0..attacks)
            .map(|_| self.roll_attack(attacker, defender, rng))
            .sum()
    }

    /// Resolve one duel, capped at `turn_limit` turns.
    pub fn resolve<R: RandomSource + ?Sized>(
        &self,
        a: &StatProfile,
        b: &StatProfile,
        turn_limit: u32,
        rng: &mut R,
    ) -> TrialOutcome {
        let mut pool_a = Pool::new(a);
        let mut pool_b = Pool::new(b);
        let mut dealt = [0.0_f64; 2];
        let mut overkill = [0.0_f64; 2];
        let mode = self.config.lifesteal_mode;

        for turn in 1..=turn_limit {
            let from_a = self.attack_phase(a, b, rng);
            let from_b = self.attack_phase(b, a, rng);
            dealt[0] += from_a;
            dealt[1] += from_b;

            let removed_from_b = pool_b.take(from_a);
            let removed_from_a = pool_a.take(from_b);
            if !pool_b.alive() {
                overkill[0] = from_a - removed_from_b;
            }
            if !pool_a.alive() {
                overkill[1] = from_b - removed_from_a;
            }

            pool_a.take(removed_from_b * (b.thorns / 100.0).max(0.0));
            pool_b.take(removed_from_a * (a.thorns / 100.0).max(0.0));

            pool_a.heal(lifesteal_heal(a, mode, from_a, removed_from_b));
            pool_b.heal(lifesteal_heal(b, mode, from_b, removed_from_a));
            pool_a.heal(a.regen);
            pool_b.heal(b.regen);

            if let Some(result) = terminal(&pool_a, &pool_b) {
                let winner = match result {
                    Outcome::Attacker => Winner::SideA,
                    Outcome::Defender => Winner::SideB,
                    Outcome::Draw | Outcome::Timeout => Winner::Draw,
                };
                return TrialOutcome {
                    winner,
                    turns: turn,
                    damage_dealt: dealt,
                    hp_remaining: [pool_a.hp.max(0.0), pool_b.hp.max(0.0)],
                    overkill,
                };
            }
        }

        TrialOutcome {
            winner: Winner::Draw,
            turns: turn_limit,
            damage_dealt: dealt,
            hp_remaining: [pool_a.hp.max(0.0), pool_b.hp.max(0.0)],
            overkill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Lcg;

    /// Always returns the same value.
    struct Constant(f64);

    impl RandomSource for Constant {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_certain_hits_match_expected_model() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let a = StatProfile::with_hp_damage(500.0, 100.0);
        let b = StatProfile::with_hp_damage(100.0, 10.0);

        let outcome = engine.resolve(&a, &b, 50, &mut Lcg::new(1));
        assert_eq!(outcome.winner, Winner::SideA);
        assert_eq!(outcome.turns, 1);
        assert_eq!(outcome.hp_remaining, [490.0, 0.0]);
        assert_eq!(outcome.overkill[0], 0.0);
        assert_eq!(outcome.damage_dealt, [100.0, 10.0]);
    }

    #[test]
    fn test_overkill_recorded() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let a = StatProfile::with_hp_damage(500.0, 130.0);
        let b = StatProfile::with_hp_damage(100.0, 10.0);
        let outcome = engine.resolve(&a, &b, 50, &mut Lcg::new(9));
        assert_eq!(outcome.overkill[0], 30.0);
        assert_eq!(outcome.overkill[1], 0.0);
    }

    #[test]
    fn test_turn_cap_is_draw() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let idle = StatProfile::with_hp_damage(100.0, 0.0);
        let outcome = engine.resolve(&idle, &idle, 7, &mut Lcg::new(3));
        assert_eq!(outcome.winner, Winner::Draw);
        assert_eq!(outcome.turns, 7);
        assert_eq!(outcome.hp_remaining, [100.0, 100.0]);
    }

    #[test]
    fn test_full_block_prevents_damage() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let a = StatProfile::with_hp_damage(100.0, 50.0);
        let wall = StatProfile {
            block: 100.0,
            damage: 0.0,
            ..StatProfile::default()
        };
        let outcome = engine.resolve(&a, &wall, 10, &mut Lcg::new(5));
        assert_eq!(outcome.damage_dealt[0], 0.0);
        assert_eq!(outcome.winner, Winner::Draw);
    }

    #[test]
    fn test_crit_roll_uses_multiplier() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let critter = StatProfile {
            crit_chance: 100.0,
            crit_multiplier: 3.0,
            ..StatProfile::with_hp_damage(100.0, 10.0)
        };
        let target = StatProfile::with_hp_damage(1000.0, 0.0);
        // 0.5 rolls: always crit, always hit, never block
        let outcome = engine.resolve(&critter, &target, 1, &mut Constant(0.5));
        assert_eq!(outcome.damage_dealt[0], 30.0);
    }

    #[test]
    fn test_seeded_trials_repeat() {
        let config = BalancerConfig::default();
        let engine = CombatEngine::new(&config);
        let a = StatProfile {
            evasion: 40.0,
            crit_chance: 25.0,
            ..StatProfile::with_hp_damage(300.0, 20.0)
        };
        let b = StatProfile {
            block: 15.0,
            armor: 20.0,
            ..StatProfile::with_hp_damage(350.0, 18.0)
        };
        let first = engine.resolve(&a, &b, 200, &mut Lcg::new(77));
        let second = engine.resolve(&a, &b, 200, &mut Lcg::new(77));
        assert_eq!(first, second);
    }
}
