//! Rule-based stat adjustment proposals.
//!
//! Archetypes whose average non-mirror win rate is outside the target band
//! get small multiplicative changes to the stats they are most sensitive
//! to: nerfs above the band, buffs below it. Cell sensitivities are already
//! signed toward the row archetype, so the same positive entries drive both.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use balance_core::archetype::Archetype;
use balance_core::stats::StatKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix::MatrixRunResult;

/// How many stats one archetype may have adjusted per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Aggressiveness {
    /// One stat per archetype.
    #[default]
    Conservative,
    /// Up to three stats per archetype.
    Aggressive,
}

impl Aggressiveness {
    /// Maximum stats adjusted per archetype.
    pub fn max_stats(self) -> usize {
        match self {
            Self::Conservative => 1,
            Self::Aggressive => 3,
        }
    }
}

/// Proposer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Acceptable average win rate, inclusive.
    pub target_band: (f64, f64),
    /// Largest fractional change to a single stat.
    pub max_adjustment: f64,
    /// Stats per archetype.
    pub aggressiveness: Aggressiveness,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            target_band: (0.45, 0.55),
            max_adjustment: 0.05,
            aggressiveness: Aggressiveness::Conservative,
        }
    }
}

impl TuningConfig {
    /// Set aggressiveness
    pub fn with_aggressiveness(mut self, aggressiveness: Aggressiveness) -> Self {
        self.aggressiveness = aggressiveness;
        self
    }

    /// Set target band
    pub fn with_target_band(mut self, low: f64, high: f64) -> Self {
        self.target_band = (low, high);
        self
    }
}

/// A proposed change to one stat of one archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatAdjustment {
    /// Archetype to change.
    pub archetype_id: String,
    /// Stat to change.
    pub stat: StatKey,
    /// Value before the change.
    pub current: f64,
    /// Value after the change.
    pub proposed: f64,
    /// Signed change in percent.
    pub percent_change: f64,
    /// Human-readable reasoning.
    pub reason: String,
}

/// Stat sensitivities averaged over an archetype's non-mirror row cells.
fn average_row_sensitivity(matrix: &MatrixRunResult, id: &str) -> BTreeMap<StatKey, f64> {
    let rows: Vec<_> = matrix
        .cells
        .iter()
        .filter(|c| c.row_id == id && !c.is_mirror())
        .collect();
    if rows.is_empty() {
        return BTreeMap::new();
    }

    let mut sums: BTreeMap<StatKey, f64> = BTreeMap::new();
    for cell in &rows {
        for (stat, value) in &cell.sensitivity {
            *sums.entry(*stat).or_insert(0.0) += value;
        }
    }
    let count = rows.len() as f64;
    sums.into_iter().map(|(stat, sum)| (stat, sum / count)).collect()
}

/// Adjustments for one archetype, or nothing if it is inside the band.
fn propose_for(
    archetype: &Archetype,
    matrix: &MatrixRunResult,
    tuning: &TuningConfig,
) -> Vec<StatAdjustment> {
    let Some(win_rate) = matrix.average_win_rate(&archetype.id) else {
        return Vec::new();
    };
    let (low, high) = tuning.target_band;
    if (low..=high).contains(&win_rate) {
        return Vec::new();
    }
    let nerf = win_rate > high;

    let mut candidates: Vec<(StatKey, f64)> = average_row_sensitivity(matrix, &archetype.id)
        .into_iter()
        .filter(|(stat, sensitivity)| *sensitivity > 0.0 && archetype.stats.get(*stat) != 0.0)
        .collect();
    // offense-leaning stats win ties
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.0.is_offensive().cmp(&a.0.is_offensive()))
            .then(a.0.cmp(&b.0))
    });

    let distance = (win_rate - 0.5).abs();
    candidates
        .into_iter()
        .take(tuning.aggressiveness.max_stats())
        .filter_map(|(stat, sensitivity)| {
            let magnitude = (distance * sensitivity * 0.5).min(tuning.max_adjustment);
            if magnitude <= 0.0 {
                return None;
            }
            let change = if nerf { -magnitude } else { magnitude };
            let current = archetype.stats.get(stat);
            let verb = if nerf { "Reduce" } else { "Increase" };
            Some(StatAdjustment {
                archetype_id: archetype.id.clone(),
                stat,
                current,
                proposed: current * (1.0 + change),
                percent_change: change * 100.0,
                reason: format!(
                    "{} wins {:.1}% of non-mirror matchups (target {:.0}-{:.0}%). \
                     {verb} {stat} (sensitivity {sensitivity:.2}).",
                    archetype.id,
                    win_rate * 100.0,
                    low * 100.0,
                    high * 100.0,
                ),
            })
        })
        .collect()
}

/// Propose bounded adjustments for every archetype outside the target band.
pub fn propose_adjustments(
    matrix: &MatrixRunResult,
    archetypes: &[Archetype],
    tuning: &TuningConfig,
) -> Vec<StatAdjustment> {
    let adjustments: Vec<StatAdjustment> = archetypes
        .iter()
        .flat_map(|a| propose_for(a, matrix, tuning))
        .collect();
    debug!(
        run_id = %matrix.run_id,
        count = adjustments.len(),
        "adjustments proposed"
    );
    adjustments
}

/// New roster with every adjustment applied. Unknown ids are ignored.
pub fn apply_adjustments(archetypes: &[Archetype], adjustments: &[StatAdjustment]) -> Vec<Archetype> {
    archetypes
        .iter()
        .map(|archetype| {
            let stats = adjustments
                .iter()
                .filter(|adj| adj.archetype_id == archetype.id)
                .fold(archetype.stats.clone(), |stats, adj| {
                    stats.with(adj.stat, adj.proposed)
                });
            archetype.with_profile(stats)
        })
        .collect()
}

/// True when the balance score is within the band's upper half-width.
pub fn is_target_achieved(matrix: &MatrixRunResult, tuning: &TuningConfig) -> bool {
    matrix.balance_score() <= tuning.target_band.1 - 0.5
}

/// Markdown table of adjustments.
pub fn adjustments_to_markdown(adjustments: &[StatAdjustment]) -> String {
    if adjustments.is_empty() {
        return "No adjustments proposed.\n".to_string();
    }
    let mut md = String::new();
    md.push_str("| Archetype | Stat | Current | Proposed | Change |\n");
    md.push_str("|-----------|------|---------|----------|--------|\n");
    for adj in adjustments {
        let _ = writeln!(
            md,
            "| {} | {} | {:.2} | {:.2} | {:+.1}% |",
            adj.archetype_id, adj.stat, adj.current, adj.proposed, adj.percent_change
        );
    }
    md.push('\n');
    for adj in adjustments {
        let _ = writeln!(md, "- {}", adj.reason);
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{run_matrix, CellMetadata, MatchupResult, MatrixOptions, TtkSummary};
    use balance_core::config::BalancerConfig;
    use balance_core::stats::StatProfile;

    fn config() -> BalancerConfig {
        BalancerConfig {
            fast_simulations: 40,
            ..BalancerConfig::default()
        }
    }

    fn lopsided() -> Vec<Archetype> {
        vec![
            Archetype::new("bully", "Bully", StatProfile::with_hp_damage(900.0, 40.0)),
            Archetype::new("victim", "Victim", StatProfile::with_hp_damage(600.0, 20.0)),
        ]
    }

    #[test]
    fn test_nerfs_winner_and_buffs_loser() {
        let roster = lopsided();
        let run = run_matrix(&roster, &MatrixOptions::new(config()).with_fast(true)).unwrap();
        let adjustments = propose_adjustments(&run, &roster, &TuningConfig::default());

        let bully: Vec<_> = adjustments.iter().filter(|a| a.archetype_id == "bully").collect();
        let victim: Vec<_> = adjustments.iter().filter(|a| a.archetype_id == "victim").collect();
        assert_eq!(bully.len(), 1);
        assert!(bully[0].percent_change < 0.0);
        assert!(bully[0].proposed < bully[0].current);

        assert_eq!(victim.len(), 1);
        assert_eq!(victim[0].stat, StatKey::Hp);
        assert!(victim[0].percent_change > 0.0);
        assert!(victim[0].proposed > victim[0].current);
    }

    #[test]
    fn test_winless_archetype_is_buffed_when_aggressive() {
        let roster = lopsided();
        let run = run_matrix(&roster, &MatrixOptions::new(config()).with_fast(true)).unwrap();
        assert_eq!(run.average_win_rate("victim"), Some(0.0));

        let tuning = TuningConfig::default().with_aggressiveness(Aggressiveness::Aggressive);
        let buffs: Vec<_> = propose_adjustments(&run, &roster, &tuning)
            .into_iter()
            .filter(|a| a.archetype_id == "victim")
            .collect();
        assert!(!buffs.is_empty());
        assert!(buffs.iter().all(|a| a.percent_change > 0.0));
    }

    #[test]
    fn test_offensive_stat_breaks_ties() {
        let mut run = two_by_two(0.9);
        let tied: BTreeMap<StatKey, f64> =
            [(StatKey::Hp, 0.8), (StatKey::Armor, 0.8), (StatKey::Damage, 0.8)]
                .into_iter()
                .collect();
        run.cells[1].sensitivity = tied;

        let roster = vec![
            Archetype::new(
                "a",
                "A",
                StatProfile {
                    armor: 10.0,
                    ..StatProfile::with_hp_damage(500.0, 30.0)
                },
            ),
            Archetype::new("b", "B", StatProfile::with_hp_damage(500.0, 30.0)),
        ];
        let adjustments = propose_adjustments(&run, &roster, &TuningConfig::default());
        let picked: Vec<_> = adjustments.iter().filter(|a| a.archetype_id == "a").collect();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].stat, StatKey::Damage);
        assert!(picked[0].percent_change < 0.0);
    }

    #[test]
    fn test_adjustments_are_bounded() {
        let roster = lopsided();
        let run = run_matrix(&roster, &MatrixOptions::new(config()).with_fast(true)).unwrap();
        let tuning = TuningConfig::default().with_aggressiveness(Aggressiveness::Aggressive);
        for adj in propose_adjustments(&run, &roster, &tuning) {
            assert!(adj.percent_change.abs() <= tuning.max_adjustment * 100.0 + 1e-9);
            assert_ne!(adj.current, 0.0);
        }
    }

    #[test]
    fn test_balanced_roster_needs_nothing() {
        let roster: Vec<Archetype> = (0..3)
            .map(|i| {
                Archetype::new(
                    format!("twin_{i}"),
                    "Twin",
                    StatProfile::with_hp_damage(400.0, 25.0),
                )
            })
            .collect();
        let run = run_matrix(&roster, &MatrixOptions::new(config()).with_fast(true)).unwrap();
        assert!(propose_adjustments(&run, &roster, &TuningConfig::default()).is_empty());
    }

    fn cell(row: &str, col: &str, win_rate_row: f64) -> MatchupResult {
        MatchupResult {
            row_id: row.to_string(),
            col_id: col.to_string(),
            total_simulations: 100,
            wins_row: (win_rate_row * 100.0) as u32,
            wins_col: 100 - (win_rate_row * 100.0) as u32,
            draws: 0,
            win_rate_row,
            ttk: TtkSummary {
                mean_row_wins: 0.0,
                mean_col_wins: 0.0,
                median: 0.0,
                std_dev: 0.0,
                min: 0,
                max: 0,
            },
            avg_hp_remaining_row_wins: 0.0,
            avg_hp_remaining_col_wins: 0.0,
            avg_overkill: 0.0,
            early_impact: Vec::new(),
            damage_series: Vec::new(),
            sensitivity: BTreeMap::new(),
            metadata: CellMetadata {
                runtime_ms: 0,
                seed: 0,
            },
        }
    }

    fn two_by_two(rate: f64) -> MatrixRunResult {
        MatrixRunResult {
            run_id: "manual".to_string(),
            archetype_ids: vec!["a".to_string(), "b".to_string()],
            cells: vec![
                cell("a", "a", 0.0),
                cell("a", "b", rate),
                cell("b", "a", 1.0 - rate),
                cell("b", "b", 0.0),
            ],
            seed: 0,
            simulations_per_cell: 100,
            config: BalancerConfig::default(),
            created_at: 0,
        }
    }

    #[test]
    fn test_target_achieved_within_band() {
        let tuning = TuningConfig::default();
        assert!(is_target_achieved(&two_by_two(0.52), &tuning));
        assert!(is_target_achieved(&two_by_two(0.47), &tuning));
        assert!(!is_target_achieved(&two_by_two(0.60), &tuning));
    }

    #[test]
    fn test_apply_returns_new_roster() {
        let roster = lopsided();
        let adjustment = StatAdjustment {
            archetype_id: "bully".to_string(),
            stat: StatKey::Damage,
            current: 40.0,
            proposed: 38.0,
            percent_change: -5.0,
            reason: String::new(),
        };
        let tuned = apply_adjustments(&roster, &[adjustment]);
        assert_eq!(tuned[0].stats.damage, 38.0);
        assert_eq!(tuned[1], roster[1]);
        assert_eq!(roster[0].stats.damage, 40.0);
    }

    #[test]
    fn test_markdown_lists_changes() {
        let adjustment = StatAdjustment {
            archetype_id: "bully".to_string(),
            stat: StatKey::Damage,
            current: 40.0,
            proposed: 38.0,
            percent_change: -5.0,
            reason: "too strong".to_string(),
        };
        let md = adjustments_to_markdown(&[adjustment]);
        assert!(md.contains("| bully | damage | 40.00 | 38.00 | -5.0% |"));
        assert!(md.contains("- too strong"));
        assert_eq!(adjustments_to_markdown(&[]), "No adjustments proposed.\n");
    }
}
