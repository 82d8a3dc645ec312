//! Archetype templates with point budgets.
//!
//! A template fixes a base profile and splits a point budget across stats.
//! Building at budget `B` adds `fraction * B * stat.point_value()` to each
//! allocated stat of the base profile.
//!
//! # Example RON
//!
//! ```ron
//! ArchetypeTemplate(
//!     id: "duelist",
//!     name: "Duelist",
//!     role: "skirmisher",
//!     base: StatProfile(hp: 100.0, damage: 10.0),
//!     budget_range: (50.0, 500.0),
//!     allocation: {
//!         hp: 0.4,
//!         damage: 0.4,
//!         crit_chance: 0.2,
//!     },
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::archetype::Archetype;
use crate::error::{BalanceError, Result};
use crate::stats::{StatKey, StatProfile};

/// Tolerance on the allocation sum.
pub const ALLOCATION_TOLERANCE: f64 = 1e-6;

/// Recipe for building archetypes at different power levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTemplate {
    /// Id given to built archetypes.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role label.
    #[serde(default)]
    pub role: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Stats before any budget is spent.
    #[serde(default)]
    pub base: StatProfile,
    /// Accepted budgets, inclusive.
    pub budget_range: (f64, f64),
    /// Fraction of the budget spent on each stat.
    pub allocation: BTreeMap<StatKey, f64>,
}

impl ArchetypeTemplate {
    /// Check the template without building it.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BalanceError::MalformedTemplate(
                "template id must not be empty".to_string(),
            ));
        }

        let (min, max) = self.budget_range;
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(BalanceError::MalformedTemplate(format!(
                "template '{}' has invalid budget range {min}..={max}",
                self.id
            )));
        }

        if self.allocation.is_empty() {
            return Err(self.allocation_error("allocation is empty".to_string()));
        }
        for (stat, fraction) in &self.allocation {
            if !(0.0..=1.0).contains(fraction) {
                return Err(self.allocation_error(format!(
                    "fraction {fraction} for '{stat}' is outside [0, 1]"
                )));
            }
        }

        let sum: f64 = self.allocation.values().sum();
        if (sum - 1.0).abs() > ALLOCATION_TOLERANCE {
            return Err(self.allocation_error(format!("fractions sum to {sum}, expected 1")));
        }
        Ok(())
    }

    fn allocation_error(&self, reason: String) -> BalanceError {
        BalanceError::InvalidAllocation {
            template: self.id.clone(),
            reason,
        }
    }

    /// Build an archetype spending `budget` points.
    ///
    /// Budgets outside `budget_range` are rejected, never clamped.
    pub fn build(&self, budget: f64) -> Result<Archetype> {
        self.validate()?;
        let (min, max) = self.budget_range;
        if !(min..=max).contains(&budget) {
            return Err(BalanceError::BudgetOutOfRange {
                template: self.id.clone(),
                budget,
                min,
                max,
            });
        }

        let stats = self
            .allocation
            .iter()
            .fold(self.base.clone(), |profile, (&stat, &fraction)| {
                profile.added(stat, fraction * budget * stat.point_value())
            });

        Ok(Archetype::new(self.id.clone(), self.name.clone(), stats)
            .with_role(self.role.clone())
            .with_description(self.description.clone()))
    }
}

/// Parse a list of templates from RON.
pub fn templates_from_ron(source: &str, origin: &str) -> Result<Vec<ArchetypeTemplate>> {
    ron::from_str(source).map_err(|e| BalanceError::DataParseError {
        path: origin.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duelist() -> ArchetypeTemplate {
        ArchetypeTemplate {
            id: "duelist".to_string(),
            name: "Duelist".to_string(),
            role: "skirmisher".to_string(),
            description: String::new(),
            base: StatProfile::default(),
            budget_range: (50.0, 500.0),
            allocation: [
                (StatKey::Hp, 0.5),
                (StatKey::Damage, 0.3),
                (StatKey::CritChance, 0.2),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_build_spends_budget() {
        let built = duelist().build(100.0).unwrap();
        assert_eq!(built.id, "duelist");
        assert_eq!(built.role, "skirmisher");
        // 50 points * 10 hp
        assert!((built.stats.hp - 600.0).abs() < 1e-9);
        // 30 points * 1 damage
        assert!((built.stats.damage - 40.0).abs() < 1e-9);
        // 20 points * 0.5 crit
        assert!((built.stats.crit_chance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_bounds_inclusive() {
        assert!(duelist().build(50.0).is_ok());
        assert!(duelist().build(500.0).is_ok());
    }

    #[test]
    fn test_budget_out_of_range() {
        let err = duelist().build(501.0).unwrap_err();
        assert!(matches!(err, BalanceError::BudgetOutOfRange { .. }));
        let err = duelist().build(10.0).unwrap_err();
        assert!(matches!(err, BalanceError::BudgetOutOfRange { .. }));
    }

    #[test]
    fn test_bad_sum_rejected() {
        let mut template = duelist();
        template.allocation.insert(StatKey::Armor, 0.1);
        let err = template.validate().unwrap_err();
        assert!(matches!(err, BalanceError::InvalidAllocation { .. }));
    }

    #[test]
    fn test_negative_fraction_rejected() {
        let mut template = duelist();
        template.allocation.insert(StatKey::Hp, -0.1);
        template.allocation.insert(StatKey::Damage, 0.9);
        assert!(matches!(
            template.validate(),
            Err(BalanceError::InvalidAllocation { .. })
        ));
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut template = duelist();
        template.id = "  ".to_string();
        assert!(matches!(
            template.build(100.0),
            Err(BalanceError::MalformedTemplate(_))
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut template = duelist();
        template.budget_range = (300.0, 100.0);
        assert!(matches!(
            template.validate(),
            Err(BalanceError::MalformedTemplate(_))
        ));
    }

    #[test]
    fn test_parse_from_ron() {
        let source = r#"[
            ArchetypeTemplate(
                id: "tank",
                name: "Tank",
                budget_range: (10.0, 100.0),
                allocation: { hp: 0.7, armor: 0.3 },
            ),
        ]"#;
        let templates = templates_from_ron(source, "inline").unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates[0].validate().is_ok());
        assert_eq!(templates[0].allocation[&StatKey::Armor], 0.3);
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = templates_from_ron("[ nope", "templates.ron").unwrap_err();
        match err {
            BalanceError::DataParseError { path, .. } => assert_eq!(path, "templates.ron"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
