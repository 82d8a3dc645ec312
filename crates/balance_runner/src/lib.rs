//! Matchup matrix runner and balance tooling.
//!
//! This crate drives the deterministic core over whole rosters:
//!
//! - **Matrix runs**: every ordered pairing sampled in parallel, with
//!   per-cell sensitivity, stored as a reproducible JSON artifact
//! - **Proposals**: bounded stat adjustments that move win rates toward 50%
//! - **Auto-balance**: repeated matrix → propose → apply iterations
//! - **Batch runs**: template × budget × trial-count sweeps with CSV and
//!   markdown reports
//!
//! # Example
//!
//! ```bash
//! # Fast matrix over a roster
//! cargo run -p balance_runner -- matrix --roster data/archetypes/roster.ron --fast
//!
//! # Iterate toward balance and write the tuned roster
//! cargo run -p balance_runner -- auto-balance --roster data/archetypes/roster.ron --output tuned.ron
//!
//! # Verify that two runs with the same seed match
//! cargo run -p balance_runner -- verify --roster data/archetypes/roster.ron --seed 7
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod matrix;
pub mod proposer;
pub mod session;
pub mod storage;
