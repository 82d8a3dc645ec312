//! Test fixtures and helpers.
//!
//! Pre-built archetypes and rosters for consistent testing.

use balance_core::archetype::Archetype;
use balance_core::stats::{StatKey, StatProfile};
use balance_core::template::ArchetypeTemplate;

/// Profile with only HP and damage set.
#[must_use]
pub fn profile(hp: f64, damage: f64) -> StatProfile {
    StatProfile::with_hp_damage(hp, damage)
}

/// Durable, armored, low damage.
#[must_use]
pub fn guardian() -> Archetype {
    Archetype::new(
        "guardian",
        "Guardian",
        StatProfile {
            armor: 60.0,
            block: 15.0,
            regen: 2.0,
            ..profile(900.0, 22.0)
        },
    )
    .with_role("tank")
}

/// Fragile, evasive, crit-heavy.
#[must_use]
pub fn rogue() -> Archetype {
    Archetype::new(
        "rogue",
        "Rogue",
        StatProfile {
            evasion: 40.0,
            crit_chance: 35.0,
            crit_multiplier: 2.2,
            armor_pen_percent: 20.0,
            ..profile(420.0, 38.0)
        },
    )
    .with_role("assassin")
}

/// Lifesteal bruiser.
#[must_use]
pub fn berserker() -> Archetype {
    Archetype::new(
        "berserker",
        "Berserker",
        StatProfile {
            armor: 20.0,
            lifesteal: 15.0,
            fumble_chance: 5.0,
            ..profile(650.0, 34.0)
        },
    )
    .with_role("bruiser")
}

/// Warded caster with an energy shield and fast casts.
#[must_use]
pub fn mystic() -> Archetype {
    Archetype::new(
        "mystic",
        "Mystic",
        StatProfile {
            resistance: 20.0,
            ward: 3.0,
            energy_shield: 120.0,
            cast_speed: 25.0,
            ..profile(380.0, 30.0)
        },
    )
    .with_role("caster")
}

/// Deep HP pool with almost no damage; loses every pairing.
#[must_use]
pub fn underdog() -> Archetype {
    Archetype::new("underdog", "Underdog", profile(1000.0, 1.0)).with_role("punching bag")
}

/// Four archetypes with deliberately different strengths.
#[must_use]
pub fn sample_roster() -> Vec<Archetype> {
    vec![guardian(), rogue(), berserker(), mystic()]
}

/// [`sample_roster`] plus the [`underdog`], so at least one archetype is
/// far outside any reasonable target band.
#[must_use]
pub fn lopsided_roster() -> Vec<Archetype> {
    let mut roster = sample_roster();
    roster.push(underdog());
    roster
}

/// `count` identical archetypes with distinct ids.
#[must_use]
pub fn mirror_roster(count: usize) -> Vec<Archetype> {
    (0..count)
        .map(|i| Archetype::new(format!("clone_{i}"), format!("Clone {i}"), profile(400.0, 25.0)))
        .collect()
}

/// Valid template splitting its budget across HP, damage and armor.
#[must_use]
pub fn sample_template(id: &str) -> ArchetypeTemplate {
    ArchetypeTemplate {
        id: id.to_string(),
        name: id.to_string(),
        role: "fighter".to_string(),
        description: String::new(),
        base: profile(100.0, 10.0),
        budget_range: (50.0, 1000.0),
        allocation: [
            (StatKey::Hp, 0.5),
            (StatKey::Damage, 0.3),
            (StatKey::Armor, 0.2),
        ]
        .into_iter()
        .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_roster_ids_unique() {
        let roster = sample_roster();
        let mut ids: Vec<&str> = roster.iter().map(|a| a.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), roster.len());
    }

    #[test]
    fn test_mirror_roster_shares_profile() {
        let roster = mirror_roster(3);
        assert_eq!(roster.len(), 3);
        assert!(roster.windows(2).all(|w| w[0].stats == w[1].stats));
    }

    #[test]
    fn test_sample_template_is_valid() {
        assert!(sample_template("t").validate().is_ok());
    }
}
