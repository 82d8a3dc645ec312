//! Archetype definitions.
//!
//! Archetypes are value objects: any change produces a new archetype.
//!
//! # Example RON
//!
//! ```ron
//! Archetype(
//!     id: "warrior",
//!     name: "Warrior",
//!     role: "bruiser",
//!     description: "Durable melee fighter",
//!     stats: StatProfile(hp: 600.0, damage: 45.0, armor: 40.0),
//!     metadata: ArchetypeMetadata(creator: "design", created_at: 0),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};
use crate::stats::StatProfile;

/// Free-form authoring information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeMetadata {
    /// Who created the archetype.
    pub creator: String,
    /// Creation time, unix seconds.
    pub created_at: u64,
}

/// A named character archetype with one stat profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role label (tank, assassin, ...).
    #[serde(default)]
    pub role: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Combat stats.
    pub stats: StatProfile,
    /// Authoring metadata.
    #[serde(default)]
    pub metadata: ArchetypeMetadata,
}

impl Archetype {
    /// Create an archetype with empty role, description and metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, stats: StatProfile) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: String::new(),
            description: String::new(),
            stats,
            metadata: ArchetypeMetadata::default(),
        }
    }

    /// Builder method to set the role label.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Builder method to set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// New archetype with the same identity and a different stat profile.
    #[must_use]
    pub fn with_profile(&self, stats: StatProfile) -> Self {
        Self {
            stats,
            ..self.clone()
        }
    }
}

/// Parse a roster from a RON list of archetypes.
pub fn roster_from_ron(source: &str, origin: &str) -> Result<Vec<Archetype>> {
    ron::from_str(source).map_err(|e| BalanceError::DataParseError {
        path: origin.to_string(),
        message: e.to_string(),
    })
}

/// Find an archetype by id.
pub fn find<'a>(roster: &'a [Archetype], id: &str) -> Result<&'a Archetype> {
    roster
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| BalanceError::UnknownArchetype(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_from_ron_uses_stat_defaults() {
        let source = r#"[
            Archetype(id: "warrior", name: "Warrior", stats: StatProfile(hp: 600.0, damage: 45.0)),
            Archetype(id: "rogue", name: "Rogue", role: "assassin", stats: StatProfile(crit_chance: 30.0)),
        ]"#;
        let roster = roster_from_ron(source, "inline").unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].stats.hp, 600.0);
        assert_eq!(roster[0].stats.accuracy, StatProfile::default().accuracy);
        assert_eq!(roster[1].role, "assassin");
    }

    #[test]
    fn test_roster_parse_error_names_origin() {
        let err = roster_from_ron("[Archetype(", "roster.ron").unwrap_err();
        assert!(err.to_string().contains("roster.ron"));
    }

    #[test]
    fn test_find_unknown_archetype() {
        let roster = vec![Archetype::new("a", "A", StatProfile::default())];
        assert!(find(&roster, "a").is_ok());
        assert!(matches!(
            find(&roster, "b"),
            Err(BalanceError::UnknownArchetype(id)) if id == "b"
        ));
    }

    #[test]
    fn test_with_profile_keeps_identity() {
        let original = Archetype::new("mage", "Mage", StatProfile::default()).with_role("caster");
        let updated = original.with_profile(StatProfile::with_hp_damage(50.0, 80.0));
        assert_eq!(updated.id, "mage");
        assert_eq!(updated.role, "caster");
        assert_eq!(original.stats.damage, 10.0);
        assert_eq!(updated.stats.damage, 80.0);
    }
}
