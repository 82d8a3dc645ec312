//! End-to-end tests for balance_runner.
//!
//! These tests drive matrix runs, storage, proposals and batch sweeps
//! together, the way the CLI does.

use balance_core::config::BalancerConfig;
use balance_runner::batch::{run_batch, BatchConfig, CSV_HEADER};
use balance_runner::matrix::{run_matrix, MatrixOptions, MatrixRunResult};
use balance_runner::proposer::{apply_adjustments, propose_adjustments, TuningConfig};
use balance_runner::storage::{BalancePreset, FileStore, Records, Store};
use balance_test_utils::determinism::{verify_determinism, verify_parallel_determinism};
use balance_test_utils::fixtures::{lopsided_roster, mirror_roster, sample_roster, sample_template};

fn fast_options(seed: u64) -> MatrixOptions {
    let config = BalancerConfig {
        fast_simulations: 40,
        ..BalancerConfig::default()
    };
    MatrixOptions::new(config).with_fast(true).with_seed(seed)
}

// =============================================================================
// Matrix Runs
// =============================================================================

mod matrix {
    use super::*;

    #[test]
    fn test_matrix_shape_and_counts() {
        let roster = sample_roster();
        let run = run_matrix(&roster, &fast_options(1)).unwrap();

        assert_eq!(run.cells.len(), roster.len() * roster.len());
        for cell in &run.cells {
            assert_eq!(cell.wins_row + cell.wins_col + cell.draws, cell.total_simulations);
            assert!((0.0..=1.0).contains(&cell.win_rate_row));
        }
    }

    #[test]
    fn test_matrix_runs_are_reproducible() {
        let roster = sample_roster();
        let options = fast_options(42);
        let result = verify_determinism(3, || run_matrix(&roster, &options).unwrap().normalized());
        result.assert_deterministic();
    }

    #[test]
    fn test_matrix_reproducible_across_threads() {
        let roster = sample_roster();
        let options = fast_options(7);
        let result =
            verify_parallel_determinism(3, || run_matrix(&roster, &options).unwrap().normalized());
        result.assert_deterministic();
    }

    #[test]
    fn test_opposite_cells_mirror_win_rates() {
        let roster = sample_roster();
        let config = BalancerConfig {
            fast_simulations: 200,
            ..BalancerConfig::default()
        };
        let options = MatrixOptions::new(config).with_fast(true).with_seed(21);
        let run = run_matrix(&roster, &options).unwrap();

        for i in 0..roster.len() {
            for j in (i + 1)..roster.len() {
                let forward = run.cell_at(i, j).unwrap();
                let backward = run.cell_at(j, i).unwrap();
                let n = f64::from(backward.total_simulations);
                let backward_draws = f64::from(backward.draws) / n;
                // row wins in one cell are column wins in the other, up to sampling noise
                let expected = 1.0 - backward.win_rate_row - backward_draws;
                assert!(
                    (forward.win_rate_row - expected).abs() <= 0.2,
                    "{} vs {}: {} against {}",
                    forward.row_id,
                    forward.col_id,
                    forward.win_rate_row,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_different_seeds_give_different_run_ids() {
        let roster = sample_roster();
        let a = run_matrix(&roster, &fast_options(1)).unwrap();
        let b = run_matrix(&roster, &fast_options(2)).unwrap();
        assert_ne!(a.run_id, b.run_id);
    }
}

// =============================================================================
// Storage
// =============================================================================

mod storage {
    use super::*;

    #[test]
    fn test_file_store_round_trips_run() {
        let dir = tempfile::tempdir().unwrap();
        let records = Records::new(FileStore::new(dir.path()));

        let run = run_matrix(&sample_roster(), &fast_options(3)).unwrap();
        records.save_run(&run).unwrap();

        let loaded = records.load_run(&run.run_id).unwrap();
        assert_eq!(loaded, run);
        assert_eq!(records.list_runs(), vec![run.run_id.clone()]);
        assert!(dir
            .path()
            .join("run")
            .join(format!("{}.json", run.run_id))
            .exists());
    }

    #[test]
    fn test_missing_keys_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let records = Records::new(FileStore::new(dir.path()));

        assert!(records.load_run("run-missing").is_none());
        assert!(records.load_archetype("nobody").is_none());
        assert!(records.list_presets().is_empty());
        assert_eq!(records.load_preset_or_default("absent"), BalancePreset::default());
    }

    #[test]
    fn test_corrupt_file_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("archetype")).unwrap();
        std::fs::write(dir.path().join("archetype").join("broken.json"), "{ not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(store.get("archetype/broken").is_none());
        let records = Records::new(store);
        assert!(records.load_archetype("broken").is_none());
    }

    #[test]
    fn test_saved_run_file_loads_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("run.json");

        let run = run_matrix(&mirror_roster(2), &fast_options(9)).unwrap();
        run.save(&path).unwrap();
        assert_eq!(MatrixRunResult::load(&path).unwrap(), run);
    }
}

// =============================================================================
// Proposals
// =============================================================================

mod proposals {
    use super::*;

    #[test]
    fn test_mirror_roster_needs_no_adjustments() {
        let roster = mirror_roster(3);
        let run = run_matrix(&roster, &fast_options(5)).unwrap();
        assert!(propose_adjustments(&run, &roster, &TuningConfig::default()).is_empty());
    }

    #[test]
    fn test_adjustments_respect_max_fraction() {
        let roster = lopsided_roster();
        let run = run_matrix(&roster, &fast_options(11)).unwrap();
        let tuning = TuningConfig::default();
        let adjustments = propose_adjustments(&run, &roster, &tuning);
        assert!(!adjustments.is_empty());

        for adj in &adjustments {
            let change = (adj.proposed - adj.current).abs();
            assert!(change <= adj.current.abs() * tuning.max_adjustment + 1e-9);
        }

        let tuned = apply_adjustments(&roster, &adjustments);
        assert_eq!(tuned.len(), roster.len());
        for adj in &adjustments {
            let archetype = tuned.iter().find(|a| a.id == adj.archetype_id).unwrap();
            assert_eq!(archetype.stats.get(adj.stat), adj.proposed);
        }
    }

    #[test]
    fn test_outclassed_archetype_gets_buffed() {
        let roster = lopsided_roster();
        let run = run_matrix(&roster, &fast_options(13)).unwrap();
        assert!(run.average_win_rate("underdog").unwrap() < 0.05);

        let adjustments = propose_adjustments(&run, &roster, &TuningConfig::default());
        let buffs: Vec<_> = adjustments
            .iter()
            .filter(|a| a.archetype_id == "underdog")
            .collect();
        assert_eq!(buffs.len(), 1);
        assert!(buffs[0].percent_change > 0.0);
        assert!(buffs[0].proposed > buffs[0].current);
    }
}

// =============================================================================
// Batch Sweeps
// =============================================================================

mod batch {
    use super::*;

    #[test]
    fn test_csv_rows_equal_pairs_budgets_trials() {
        let templates = vec![
            sample_template("alpha"),
            sample_template("beta"),
            sample_template("gamma"),
            sample_template("delta"),
        ];
        let config = BatchConfig::new(templates)
            .with_budgets(vec![100.0, 200.0, 400.0])
            .with_trial_counts(vec![10, 20])
            .with_seed(4);

        let report = run_batch(&config);
        // 6 pairs * 3 budgets * 2 trial counts
        let csv = report.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.count(), 36);
    }

    #[test]
    fn test_identical_templates_split_evenly() {
        let config = BatchConfig::new(vec![sample_template("left"), sample_template("right")])
            .with_budgets(vec![200.0])
            .with_trial_counts(vec![50]);

        let report = run_batch(&config);
        assert_eq!(report.records.len(), 1);
        // identical builds with certain hits trade blows evenly and die together
        let record = &report.records[0];
        assert_eq!(record.win_rate_a, record.win_rate_b);
    }

    #[test]
    fn test_batch_config_from_ron() {
        let source = r#"(
            templates: [],
            budgets: [150.0],
            trial_counts: [25, 50],
            seed: 9,
        )"#;
        let config = BatchConfig::from_ron_str(source).unwrap();
        assert_eq!(config.budgets, vec![150.0]);
        assert_eq!(config.trial_counts, vec![25, 50]);
        assert_eq!(config.seed, 9);
        assert_eq!(config.targets.len(), 1);

        let report = run_batch(&config);
        assert!(report.records.is_empty());
        assert_eq!(report.to_csv().lines().count(), 1);
    }
}
