//! Stat profiles and typed stat keys.
//!
//! A [`StatProfile`] is a closed set of combat attributes. Every numeric
//! attribute has a matching [`StatKey`], so code that reads or writes a stat
//! by name (sensitivity analysis, the proposer, template budgets) goes through
//! an exhaustive `match` instead of an open string map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier for one numeric stat of a [`StatProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    /// Maximum hit points.
    Hp,
    /// Base damage per hit.
    Damage,
    /// Accuracy rating used in the hit contest.
    Accuracy,
    /// Evasion rating used in the hit contest.
    Evasion,
    /// Critical hit chance, 0-100.
    CritChance,
    /// Damage multiplier on a critical hit.
    CritMultiplier,
    /// Accuracy bonus on a critical roll.
    CritAccuracyBonus,
    /// Fumble chance, 0-100.
    FumbleChance,
    /// Damage multiplier on a fumble.
    FumbleMultiplier,
    /// Accuracy penalty on a fumble roll.
    FumbleAccuracyPenalty,
    /// Armor rating (diminishing returns against large hits).
    Armor,
    /// Percent damage resistance, 0-100.
    Resistance,
    /// Flat armor ignored by this side's hits.
    ArmorPenFlat,
    /// Percent armor ignored by this side's hits, 0-100.
    ArmorPenPercent,
    /// Percent of damage dealt returned as healing, 0-100.
    Lifesteal,
    /// Hit points regenerated at the end of each turn.
    Regen,
    /// Flat damage absorbed from every incoming hit.
    Ward,
    /// Chance to negate an incoming hit, 0-100.
    Block,
    /// Damage pool consumed before hit points.
    EnergyShield,
    /// Percent of damage taken reflected to the attacker, 0-100.
    Thorns,
    /// Cooldown reduction (no effect in a duel).
    CooldownReduction,
    /// Percent bonus to attacks per turn.
    CastSpeed,
    /// Movement speed (no effect in a duel).
    MovementSpeed,
}

impl StatKey {
    /// Every numeric stat, in declaration order.
    pub const ALL: [StatKey; 23] = [
        StatKey::Hp,
        StatKey::Damage,
        StatKey::Accuracy,
        StatKey::Evasion,
        StatKey::CritChance,
        StatKey::CritMultiplier,
        StatKey::CritAccuracyBonus,
        StatKey::FumbleChance,
        StatKey::FumbleMultiplier,
        StatKey::FumbleAccuracyPenalty,
        StatKey::Armor,
        StatKey::Resistance,
        StatKey::ArmorPenFlat,
        StatKey::ArmorPenPercent,
        StatKey::Lifesteal,
        StatKey::Regen,
        StatKey::Ward,
        StatKey::Block,
        StatKey::EnergyShield,
        StatKey::Thorns,
        StatKey::CooldownReduction,
        StatKey::CastSpeed,
        StatKey::MovementSpeed,
    ];

    /// Stats that influence a duel and are therefore worth perturbing.
    pub const ANALYZABLE: [StatKey; 19] = [
        StatKey::Hp,
        StatKey::Damage,
        StatKey::Accuracy,
        StatKey::Evasion,
        StatKey::CritChance,
        StatKey::CritMultiplier,
        StatKey::FumbleChance,
        StatKey::Armor,
        StatKey::Resistance,
        StatKey::ArmorPenFlat,
        StatKey::ArmorPenPercent,
        StatKey::Lifesteal,
        StatKey::Regen,
        StatKey::Ward,
        StatKey::Block,
        StatKey::EnergyShield,
        StatKey::Thorns,
        StatKey::CastSpeed,
        StatKey::CritAccuracyBonus,
    ];

    /// Snake-case name, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StatKey::Hp => "hp",
            StatKey::Damage => "damage",
            StatKey::Accuracy => "accuracy",
            StatKey::Evasion => "evasion",
            StatKey::CritChance => "crit_chance",
            StatKey::CritMultiplier => "crit_multiplier",
            StatKey::CritAccuracyBonus => "crit_accuracy_bonus",
            StatKey::FumbleChance => "fumble_chance",
            StatKey::FumbleMultiplier => "fumble_multiplier",
            StatKey::FumbleAccuracyPenalty => "fumble_accuracy_penalty",
            StatKey::Armor => "armor",
            StatKey::Resistance => "resistance",
            StatKey::ArmorPenFlat => "armor_pen_flat",
            StatKey::ArmorPenPercent => "armor_pen_percent",
            StatKey::Lifesteal => "lifesteal",
            StatKey::Regen => "regen",
            StatKey::Ward => "ward",
            StatKey::Block => "block",
            StatKey::EnergyShield => "energy_shield",
            StatKey::Thorns => "thorns",
            StatKey::CooldownReduction => "cooldown_reduction",
            StatKey::CastSpeed => "cast_speed",
            StatKey::MovementSpeed => "movement_speed",
        }
    }

    /// Stat value bought by one budget point when building from a template.
    #[must_use]
    pub const fn point_value(self) -> f64 {
        match self {
            StatKey::Hp => 10.0,
            StatKey::Damage => 1.0,
            StatKey::Accuracy | StatKey::Evasion => 2.0,
            StatKey::CritChance | StatKey::Block => 0.5,
            StatKey::CritMultiplier => 0.05,
            StatKey::CritAccuracyBonus => 2.0,
            StatKey::FumbleChance => -0.5,
            StatKey::FumbleMultiplier => 0.05,
            StatKey::FumbleAccuracyPenalty => -2.0,
            StatKey::Armor => 2.0,
            StatKey::Resistance | StatKey::ArmorPenPercent => 0.5,
            StatKey::ArmorPenFlat => 1.0,
            StatKey::Lifesteal | StatKey::Thorns => 0.5,
            StatKey::Regen => 0.5,
            StatKey::Ward => 0.5,
            StatKey::EnergyShield => 5.0,
            StatKey::CooldownReduction | StatKey::CastSpeed => 1.0,
            StatKey::MovementSpeed => 1.0,
        }
    }

    /// Stats that raise damage output rather than survivability.
    #[must_use]
    pub const fn is_offensive(self) -> bool {
        matches!(
            self,
            StatKey::Damage
                | StatKey::Accuracy
                | StatKey::CritChance
                | StatKey::CritMultiplier
                | StatKey::CritAccuracyBonus
                | StatKey::ArmorPenFlat
                | StatKey::ArmorPenPercent
                | StatKey::CastSpeed
        )
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stat name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stat key '{0}'")]
pub struct UnknownStatKey(pub String);

impl FromStr for StatKey {
    type Err = UnknownStatKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownStatKey(s.to_string()))
    }
}

/// Complete combat stat block of an archetype.
///
/// Chances and percentages are expressed on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatProfile {
    /// Maximum hit points.
    pub hp: f64,
    /// Base damage per hit.
    pub damage: f64,
    /// Accuracy rating.
    pub accuracy: f64,
    /// Evasion rating.
    pub evasion: f64,
    /// Critical hit chance (0-100).
    pub crit_chance: f64,
    /// Critical hit damage multiplier.
    pub crit_multiplier: f64,
    /// Accuracy bonus on a critical roll.
    pub crit_accuracy_bonus: f64,
    /// Fumble chance (0-100).
    pub fumble_chance: f64,
    /// Fumble damage multiplier.
    pub fumble_multiplier: f64,
    /// Accuracy penalty on a fumble roll.
    pub fumble_accuracy_penalty: f64,
    /// Armor rating.
    pub armor: f64,
    /// Percent resistance (0-100).
    pub resistance: f64,
    /// Flat armor penetration.
    pub armor_pen_flat: f64,
    /// Percent armor penetration (0-100).
    pub armor_pen_percent: f64,
    /// Percent lifesteal (0-100).
    pub lifesteal: f64,
    /// Regeneration per turn.
    pub regen: f64,
    /// Flat per-hit damage absorption.
    pub ward: f64,
    /// Block chance (0-100).
    pub block: f64,
    /// Energy shield pool.
    pub energy_shield: f64,
    /// Percent thorns (0-100).
    pub thorns: f64,
    /// Cooldown reduction.
    pub cooldown_reduction: f64,
    /// Percent attack rate bonus.
    pub cast_speed: f64,
    /// Movement speed.
    pub movement_speed: f64,
    /// Apply flat armor penetration before percent penetration.
    pub flat_pen_before_percent: bool,
    /// Blend crit/fumble multipliers into the hit before armor is evaluated.
    pub crit_before_mitigation: bool,
}

impl Default for StatProfile {
    fn default() -> Self {
        Self {
            hp: 100.0,
            damage: 10.0,
            accuracy: 100.0,
            evasion: 0.0,
            crit_chance: 0.0,
            crit_multiplier: 2.0,
            crit_accuracy_bonus: 0.0,
            fumble_chance: 0.0,
            fumble_multiplier: 0.5,
            fumble_accuracy_penalty: 0.0,
            armor: 0.0,
            resistance: 0.0,
            armor_pen_flat: 0.0,
            armor_pen_percent: 0.0,
            lifesteal: 0.0,
            regen: 0.0,
            ward: 0.0,
            block: 0.0,
            energy_shield: 0.0,
            thorns: 0.0,
            cooldown_reduction: 0.0,
            cast_speed: 0.0,
            movement_speed: 0.0,
            flat_pen_before_percent: true,
            crit_before_mitigation: true,
        }
    }
}

impl StatProfile {
    /// Shorthand for a profile that only differs from the default in HP and damage.
    #[must_use]
    pub fn with_hp_damage(hp: f64, damage: f64) -> Self {
        Self {
            hp,
            damage,
            ..Self::default()
        }
    }

    /// Read one stat.
    #[must_use]
    pub fn get(&self, key: StatKey) -> f64 {
        match key {
            StatKey::Hp => self.hp,
            StatKey::Damage => self.damage,
            StatKey::Accuracy => self.accuracy,
            StatKey::Evasion => self.evasion,
            StatKey::CritChance => self.crit_chance,
            StatKey::CritMultiplier => self.crit_multiplier,
            StatKey::CritAccuracyBonus => self.crit_accuracy_bonus,
            StatKey::FumbleChance => self.fumble_chance,
            StatKey::FumbleMultiplier => self.fumble_multiplier,
            StatKey::FumbleAccuracyPenalty => self.fumble_accuracy_penalty,
            StatKey::Armor => self.armor,
            StatKey::Resistance => self.resistance,
            StatKey::ArmorPenFlat => self.armor_pen_flat,
            StatKey::ArmorPenPercent => self.armor_pen_percent,
            StatKey::Lifesteal => self.lifesteal,
            StatKey::Regen => self.regen,
            StatKey::Ward => self.ward,
            StatKey::Block => self.block,
            StatKey::EnergyShield => self.energy_shield,
            StatKey::Thorns => self.thorns,
            StatKey::CooldownReduction => self.cooldown_reduction,
            StatKey::CastSpeed => self.cast_speed,
            StatKey::MovementSpeed => self.movement_speed,
        }
    }

    fn slot_mut(&mut self, key: StatKey) -> &mut f64 {
        match key {
            StatKey::Hp => &mut self.hp,
            StatKey::Damage => &mut self.damage,
            StatKey::Accuracy => &mut self.accuracy,
            StatKey::Evasion => &mut self.evasion,
            StatKey::CritChance => &mut self.crit_chance,
            StatKey::CritMultiplier => &mut self.crit_multiplier,
            StatKey::CritAccuracyBonus => &mut self.crit_accuracy_bonus,
            StatKey::FumbleChance => &mut self.fumble_chance,
            StatKey::FumbleMultiplier => &mut self.fumble_multiplier,
            StatKey::FumbleAccuracyPenalty => &mut self.fumble_accuracy_penalty,
            StatKey::Armor => &mut self.armor,
            StatKey::Resistance => &mut self.resistance,
            StatKey::ArmorPenFlat => &mut self.armor_pen_flat,
            StatKey::ArmorPenPercent => &mut self.armor_pen_percent,
            StatKey::Lifesteal => &mut self.lifesteal,
            StatKey::Regen => &mut self.regen,
            StatKey::Ward => &mut self.ward,
            StatKey::Block => &mut self.block,
            StatKey::EnergyShield => &mut self.energy_shield,
            StatKey::Thorns => &mut self.thorns,
            StatKey::CooldownReduction => &mut self.cooldown_reduction,
            StatKey::CastSpeed => &mut self.cast_speed,
            StatKey::MovementSpeed => &mut self.movement_speed,
        }
    }

    /// Copy of this profile with one stat replaced.
    #[must_use]
    pub fn with(&self, key: StatKey, value: f64) -> Self {
        let mut copy = self.clone();
        *copy.slot_mut(key) = value;
        copy
    }

    /// Copy of this profile with one stat multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, key: StatKey, factor: f64) -> Self {
        self.with(key, self.get(key) * factor)
    }

    /// Copy of this profile with `amount` added to one stat.
    #[must_use]
    pub fn added(&self, key: StatKey, amount: f64) -> Self {
        self.with(key, self.get(key) + amount)
    }

    /// Total starting damage pool (HP plus energy shield).
    #[must_use]
    pub fn total_pool(&self) -> f64 {
        self.hp.max(0.0) + self.energy_shield.max(0.0)
    }
}
