//! Expected-value combat formulas.
//!
//! Pure functions translating a pair of stat profiles into per-turn damage
//! and effective-HP quantities. No state, no randomness.
//!
//! Damage pipeline for one direction:
//! ```text
//! Hit          = Damage × AvgMultiplier            (crit/fumble blend)
//! Armor'       = Armor after flat/percent penetration
//! ArmorMit     = Armor' / (Armor' + k × Incoming)  (capped at 90%)
//! Combined     = 1 - (1 - ArmorMit)(1 - Resistance) (capped at 90%)
//! PerHit       = max(Hit × (1 - Combined) - Ward, 0)
//! PerTurn      = PerHit × P(hit) × (1 - Block) × AttackRate
//! EDPT         = max(PerTurn - Regen, 0)
//! ```

use crate::config::BalancerConfig;
use crate::stats::StatProfile;

/// Cap applied to every mitigation fraction.
pub const MAX_MITIGATION: f64 = 0.90;

/// Incoming damage used by [`effective_hp_reference`].
pub const REFERENCE_DAMAGE: f64 = 100.0;

/// Armor damage reduction with diminishing returns against large hits.
///
/// Returns 0 when `armor <= 0` or `incoming <= 0`; otherwise
/// `armor / (armor + scaling_constant * incoming)` capped at [`MAX_MITIGATION`].
#[must_use]
pub fn armor_mitigation(armor: f64, scaling_constant: f64, incoming: f64) -> f64 {
    if armor <= 0.0 || incoming <= 0.0 {
        return 0.0;
    }
    let denominator = armor + scaling_constant * incoming;
    if denominator <= 0.0 {
        return MAX_MITIGATION;
    }
    (armor / denominator).min(MAX_MITIGATION)
}

/// Critical and fumble probabilities as fractions.
///
/// Each chance is clamped to `[0, 1]`; if together they exceed 1 both are
/// scaled down proportionally so the plain-hit remainder is never negative.
#[must_use]
pub fn crit_fumble_chances(profile: &StatProfile) -> (f64, f64) {
    let crit = (profile.crit_chance / 100.0).clamp(0.0, 1.0);
    let fumble = (profile.fumble_chance / 100.0).clamp(0.0, 1.0);
    let total = crit + fumble;
    if total > 1.0 {
        (crit / total, fumble / total)
    } else {
        (crit, fumble)
    }
}

/// Probability-weighted damage multiplier of a single hit.
#[must_use]
pub fn average_hit_multiplier(profile: &StatProfile) -> f64 {
    let (crit, fumble) = crit_fumble_chances(profile);
    crit * profile.crit_multiplier + fumble * profile.fumble_multiplier + (1.0 - crit - fumble)
}

/// Raw expected damage of one hit before any mitigation.
#[must_use]
pub fn expected_damage_per_hit(profile: &StatProfile) -> f64 {
    profile.damage.max(0.0) * average_hit_multiplier(profile)
}

/// Accuracy after folding in the crit bonus and the fumble penalty.
#[must_use]
pub fn modified_accuracy(profile: &StatProfile) -> f64 {
    let (crit, fumble) = crit_fumble_chances(profile);
    profile.accuracy + crit * profile.crit_accuracy_bonus
        - fumble * profile.fumble_accuracy_penalty
}

/// Accuracy-versus-evasion contest.
///
/// `accuracy / (accuracy + evasion)`; 1 when both sides are at zero,
/// 0 when the attacker has no accuracy against a positive evasion.
#[must_use]
pub fn hit_chance(accuracy: f64, evasion: f64) -> f64 {
    let evasion = evasion.max(0.0);
    if accuracy <= 0.0 {
        return if evasion <= 0.0 { 1.0 } else { 0.0 };
    }
    (accuracy / (accuracy + evasion)).clamp(0.0, 1.0)
}

/// Probability that one attack lands and is not blocked, in `[0, 1]`.
#[must_use]
pub fn landed_hit_chance(attacker: &StatProfile, defender: &StatProfile) -> f64 {
    let landed = hit_chance(modified_accuracy(attacker), defender.evasion);
    let block = (defender.block / 100.0).clamp(0.0, 1.0);
    landed * (1.0 - block)
}

/// Expected unblocked hits per turn: [`landed_hit_chance`] times [`attacks_per_turn`].
#[must_use]
pub fn expected_hits_per_turn(attacker: &StatProfile, defender: &StatProfile) -> f64 {
    landed_hit_chance(attacker, defender) * attacks_per_turn(attacker)
}

/// Expected attacks per turn (1 plus the cast speed bonus).
#[must_use]
pub fn attacks_per_turn(profile: &StatProfile) -> f64 {
    (1.0 + profile.cast_speed / 100.0).max(0.0)
}

/// Defender armor left after the attacker's flat and percent penetration.
#[must_use]
pub fn effective_armor(attacker: &StatProfile, defender: &StatProfile) -> f64 {
    let armor = defender.armor.max(0.0);
    let flat = attacker.armor_pen_flat.max(0.0);
    let percent = (attacker.armor_pen_percent / 100.0).clamp(0.0, 1.0);
    if attacker.flat_pen_before_percent {
        (armor - flat).max(0.0) * (1.0 - percent)
    } else {
        (armor * (1.0 - percent) - flat).max(0.0)
    }
}

/// Combined armor and resistance reduction for a hit of size `incoming`.
#[must_use]
pub fn combined_mitigation(
    attacker: &StatProfile,
    defender: &StatProfile,
    incoming: f64,
    scaling_constant: f64,
) -> f64 {
    let armor = armor_mitigation(
        effective_armor(attacker, defender),
        scaling_constant,
        incoming,
    );
    let resistance = (defender.resistance / 100.0).clamp(0.0, MAX_MITIGATION);
    (1.0 - (1.0 - armor) * (1.0 - resistance)).clamp(0.0, MAX_MITIGATION)
}

/// Damage of one hit of size `incoming` after mitigation and ward.
#[must_use]
pub fn mitigate_hit(
    attacker: &StatProfile,
    defender: &StatProfile,
    incoming: f64,
    scaling_constant: f64,
) -> f64 {
    let reduction = combined_mitigation(attacker, defender, incoming, scaling_constant);
    (incoming * (1.0 - reduction) - defender.ward.max(0.0)).max(0.0)
}

/// Expected damage of one landed hit after mitigation and ward.
///
/// Respects the attacker's `crit_before_mitigation` flag: when set, the
/// crit-blended hit is what armor sees; otherwise armor sees the base hit and
/// the blend is applied to the mitigated value.
#[must_use]
pub fn expected_mitigated_hit(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> f64 {
    let base = attacker.damage.max(0.0);
    let multiplier = average_hit_multiplier(attacker);
    let k = config.armor_constant;
    if attacker.crit_before_mitigation {
        mitigate_hit(attacker, defender, base * multiplier, k)
    } else {
        let reduction = combined_mitigation(attacker, defender, base, k);
        (base * (1.0 - reduction) * multiplier - defender.ward.max(0.0)).max(0.0)
    }
}

/// Expected damage per turn before the defender's regeneration.
#[must_use]
pub fn mitigated_damage_per_turn(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> f64 {
    expected_mitigated_hit(attacker, defender, config) * expected_hits_per_turn(attacker, defender)
}

/// Net expected damage per turn (EDPT) after the defender's regeneration.
///
/// Never negative: regeneration can cancel damage but not invert it.
#[must_use]
pub fn effective_damage_per_turn(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> f64 {
    (mitigated_damage_per_turn(attacker, defender, config) - defender.regen.max(0.0)).max(0.0)
}

/// Turns `attacker` needs to kill `defender`; infinite when EDPT is zero.
#[must_use]
pub fn time_to_kill_estimate(
    attacker: &StatProfile,
    defender: &StatProfile,
    config: &BalancerConfig,
) -> f64 {
    let edpt = effective_damage_per_turn(attacker, defender, config);
    if edpt <= 0.0 {
        f64::INFINITY
    } else {
        defender.total_pool() / edpt
    }
}

/// Time-to-kill of whichever side kills faster.
#[must_use]
pub fn fastest_kill_estimate(a: &StatProfile, b: &StatProfile, config: &BalancerConfig) -> f64 {
    time_to_kill_estimate(a, b, config).min(time_to_kill_estimate(b, a, config))
}

/// Diagnostic HP-equivalent against a plain [`REFERENCE_DAMAGE`] hit.
///
/// Returns `f64::INFINITY` if combined mitigation reaches 100%.
#[must_use]
pub fn effective_hp_reference(profile: &StatProfile, config: &BalancerConfig) -> f64 {
    let reference = StatProfile {
        damage: REFERENCE_DAMAGE,
        ..StatProfile::default()
    };
    let reduction =
        combined_mitigation(&reference, profile, REFERENCE_DAMAGE, config.armor_constant);
    if reduction >= 1.0 {
        f64::INFINITY
    } else {
        profile.total_pool() / (1.0 - reduction)
    }
}
