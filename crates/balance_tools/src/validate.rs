//! Data validation utilities.
//!
//! A data directory holds RON files in four subdirectories:
//!
//! - `archetypes/` - rosters (`[Archetype]`)
//! - `templates/` - template lists (`[ArchetypeTemplate]`)
//! - `presets/` - one `BalancePreset` per file
//! - `batches/` - one `BatchConfig` per file
//!
//! Missing subdirectories are skipped. Every problem found is reported;
//! validation never stops at the first one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use balance_core::archetype::{roster_from_ron, Archetype};
use balance_core::config::BalancerConfig;
use balance_core::stats::{StatKey, StatProfile};
use balance_core::template::{templates_from_ron, ArchetypeTemplate};
use balance_runner::batch::BatchConfig;
use balance_runner::storage::BalancePreset;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop validation before any file is checked.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The data directory does not exist.
    #[error("Data directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// A directory could not be listed.
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// Directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// One problem in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// File the problem was found in.
    pub path: PathBuf,
    /// What is wrong.
    pub message: String,
}

/// Outcome of validating a data directory.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Files parsed or attempted.
    pub files_checked: usize,
    /// Archetypes found across all rosters.
    pub archetypes: usize,
    /// Templates found across all template files.
    pub templates: usize,
    /// Every problem found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no issue was found.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn issue(&mut self, path: &Path, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }
}

/// Stats expressed as a 0-100 percentage.
const PERCENT_STATS: [StatKey; 7] = [
    StatKey::CritChance,
    StatKey::FumbleChance,
    StatKey::Resistance,
    StatKey::ArmorPenPercent,
    StatKey::Lifesteal,
    StatKey::Block,
    StatKey::Thorns,
];

/// Problems with one stat profile.
pub fn profile_issues(profile: &StatProfile) -> Vec<String> {
    let mut issues = Vec::new();
    for key in StatKey::ALL {
        let value = profile.get(key);
        if !value.is_finite() {
            issues.push(format!("{key} is not a finite number"));
        } else if PERCENT_STATS.contains(&key) && !(0.0..=100.0).contains(&value) {
            issues.push(format!("{key} = {value} is outside 0-100"));
        }
    }
    if profile.hp <= 0.0 {
        issues.push(format!("hp = {} must be positive", profile.hp));
    }
    if profile.damage < 0.0 {
        issues.push(format!("damage = {} must not be negative", profile.damage));
    }
    if profile.armor < 0.0 {
        issues.push(format!("armor = {} must not be negative", profile.armor));
    }
    issues
}

/// Problems with balancer constants.
pub fn config_issues(config: &BalancerConfig) -> Vec<String> {
    let mut issues = Vec::new();
    if config.armor_constant <= 0.0 {
        issues.push("armor_constant must be positive".to_string());
    }
    if config.fast_simulations == 0 || config.full_simulations == 0 {
        issues.push("simulation counts must be at least 1".to_string());
    }
    if !(config.sensitivity_delta > 0.0 && config.sensitivity_delta <= 1.0) {
        issues.push(format!(
            "sensitivity_delta = {} is outside (0, 1]",
            config.sensitivity_delta
        ));
    }
    if !(config.max_adjustment > 0.0 && config.max_adjustment <= 1.0) {
        issues.push(format!(
            "max_adjustment = {} is outside (0, 1]",
            config.max_adjustment
        ));
    }
    if config.engine_turn_limit == 0 {
        issues.push("engine_turn_limit must be at least 1".to_string());
    }
    issues
}

fn ron_files(dir: &Path) -> Result<Vec<PathBuf>, ValidateError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| ValidateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();
    Ok(files)
}

fn read(path: &Path, report: &mut ValidationReport) -> Option<String> {
    report.files_checked += 1;
    match fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            report.issue(path, format!("cannot read file: {e}"));
            None
        }
    }
}

fn parse<T: DeserializeOwned>(path: &Path, source: &str, report: &mut ValidationReport) -> Option<T> {
    match ron::from_str(source) {
        Ok(value) => Some(value),
        Err(e) => {
            report.issue(path, format!("parse error: {e}"));
            None
        }
    }
}

fn check_roster(path: &Path, roster: &[Archetype], seen: &mut BTreeMap<String, PathBuf>, report: &mut ValidationReport) {
    for archetype in roster {
        if archetype.id.trim().is_empty() {
            report.issue(path, format!("archetype '{}' has an empty id", archetype.name));
        } else if let Some(first) = seen.insert(archetype.id.clone(), path.to_path_buf()) {
            report.issue(
                path,
                format!("duplicate archetype id '{}' (first in {})", archetype.id, first.display()),
            );
        }
        for problem in profile_issues(&archetype.stats) {
            report.issue(path, format!("archetype '{}': {problem}", archetype.id));
        }
    }
}

fn check_template(path: &Path, template: &ArchetypeTemplate, report: &mut ValidationReport) {
    if let Err(e) = template.validate() {
        report.issue(path, e.to_string());
        return;
    }
    let (min, max) = template.budget_range;
    for budget in [min, max] {
        match template.build(budget) {
            Ok(built) => {
                for problem in profile_issues(&built.stats) {
                    report.issue(
                        path,
                        format!("template '{}' at budget {budget}: {problem}", template.id),
                    );
                }
            }
            Err(e) => report.issue(path, e.to_string()),
        }
    }
}

fn check_templates(
    path: &Path,
    templates: &[ArchetypeTemplate],
    seen: &mut BTreeMap<String, PathBuf>,
    report: &mut ValidationReport,
) {
    for template in templates {
        if let Some(first) = seen.insert(template.id.clone(), path.to_path_buf()) {
            report.issue(
                path,
                format!("duplicate template id '{}' (first in {})", template.id, first.display()),
            );
        }
        check_template(path, template, report);
    }
}

fn check_preset(path: &Path, preset: &BalancePreset, report: &mut ValidationReport) {
    if preset.id.trim().is_empty() {
        report.issue(path, "preset has an empty id");
    }
    for problem in config_issues(&preset.config) {
        report.issue(path, format!("preset '{}': {problem}", preset.id));
    }
    let (low, high) = preset.tuning.target_band;
    if !(0.0 <= low && low < high && high <= 1.0) {
        report.issue(
            path,
            format!("preset '{}': target band ({low}, {high}) is not an increasing range in [0, 1]", preset.id),
        );
    }
}

fn check_batch(path: &Path, batch: &BatchConfig, report: &mut ValidationReport) {
    if batch.templates.len() < 2 {
        report.issue(path, "batch needs at least two templates to form a pair");
    }
    if batch.budgets.is_empty() || batch.trial_counts.is_empty() {
        report.issue(path, "batch needs at least one budget and one trial count");
    }
    if batch.trial_counts.contains(&0) {
        report.issue(path, "trial counts must be at least 1");
    }
    for template in &batch.templates {
        check_template(path, template, report);
    }
    for problem in config_issues(&batch.config) {
        report.issue(path, problem);
    }
}

/// Validate all RON data files in a directory.
///
/// # Errors
///
/// Returns an error if the directory is missing or cannot be listed.
/// Problems inside files are collected in the report instead.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport, ValidateError> {
    if !path.is_dir() {
        return Err(ValidateError::DirectoryNotFound(path.to_path_buf()));
    }
    let mut report = ValidationReport::default();

    let mut archetype_ids = BTreeMap::new();
    for file in ron_files(&path.join("archetypes"))? {
        let Some(source) = read(&file, &mut report) else {
            continue;
        };
        match roster_from_ron(&source, &file.display().to_string()) {
            Ok(roster) => {
                debug!(file = %file.display(), archetypes = roster.len(), "roster parsed");
                report.archetypes += roster.len();
                check_roster(&file, &roster, &mut archetype_ids, &mut report);
            }
            Err(e) => report.issue(&file, e.to_string()),
        }
    }

    let mut template_ids = BTreeMap::new();
    for file in ron_files(&path.join("templates"))? {
        let Some(source) = read(&file, &mut report) else {
            continue;
        };
        match templates_from_ron(&source, &file.display().to_string()) {
            Ok(templates) => {
                report.templates += templates.len();
                check_templates(&file, &templates, &mut template_ids, &mut report);
            }
            Err(e) => report.issue(&file, e.to_string()),
        }
    }

    for file in ron_files(&path.join("presets"))? {
        let Some(source) = read(&file, &mut report) else {
            continue;
        };
        if let Some(preset) = parse::<BalancePreset>(&file, &source, &mut report) {
            check_preset(&file, &preset, &mut report);
        }
    }

    for file in ron_files(&path.join("batches"))? {
        let Some(source) = read(&file, &mut report) else {
            continue;
        };
        if let Some(batch) = parse::<BatchConfig>(&file, &source, &mut report) {
            check_batch(&file, &batch, &mut report);
        }
    }

    if report.files_checked == 0 {
        warn!("No data files found under {}", path.display());
    }
    info!(
        files = report.files_checked,
        archetypes = report.archetypes,
        templates = report.templates,
        issues = report.issues.len(),
        "Validation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_test_utils::fixtures::{guardian, rogue, sample_template};

    fn write(dir: &Path, sub: &str, name: &str, contents: &str) {
        let target = dir.join(sub);
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(name), contents).unwrap();
    }

    fn to_ron<T: serde::Serialize>(value: &T) -> String {
        ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_data_directory(&dir.path().join("nope"));
        assert!(matches!(result, Err(ValidateError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_valid_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "archetypes", "core.ron", &to_ron(&vec![guardian(), rogue()]));
        write(dir.path(), "templates", "core.ron", &to_ron(&vec![sample_template("fighter")]));
        write(dir.path(), "presets", "default.ron", &to_ron(&BalancePreset::default()));

        let report = validate_data_directory(dir.path()).unwrap();
        assert!(report.is_valid(), "Issues: {:?}", report.issues);
        assert_eq!(report.files_checked, 3);
        assert_eq!(report.archetypes, 2);
        assert_eq!(report.templates, 1);
    }

    #[test]
    fn test_duplicate_ids_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "archetypes", "a.ron", &to_ron(&vec![guardian()]));
        write(dir.path(), "archetypes", "b.ron", &to_ron(&vec![guardian()]));

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("duplicate archetype id"));
    }

    #[test]
    fn test_bad_template_and_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut template = sample_template("lopsided");
        template.allocation.insert(StatKey::Hp, 0.9);
        write(dir.path(), "templates", "bad.ron", &to_ron(&vec![template]));
        write(dir.path(), "presets", "broken.ron", "( id: ");

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.issues.len(), 2);
        assert!(report
            .issues
            .iter()
            .any(|i| i.path.ends_with("broken.ron") && i.message.starts_with("parse error")));
    }

    #[test]
    fn test_profile_out_of_range() {
        let mut profile = StatProfile::with_hp_damage(0.0, 10.0);
        profile.block = 150.0;
        let issues = profile_issues(&profile);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.starts_with("block")));
    }

    #[test]
    fn test_preset_band_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut preset = BalancePreset::default();
        preset.tuning.target_band = (0.6, 0.4);
        write(dir.path(), "presets", "inverted.ron", &to_ron(&preset));

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("target band"));
    }
}
