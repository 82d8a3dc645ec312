//! # Balance Core
//!
//! Deterministic combat balance core.
//!
//! This crate contains **only** pure logic:
//! - No IO (data is parsed from strings handed in by the caller)
//! - No global state (every entry point takes a [`config::BalancerConfig`])
//! - No system randomness (stochastic sampling uses a seeded [`rng::Lcg`])
//!
//! This separation enables:
//! - Reproducible matrix runs across machines
//! - Parallel evaluation of matchups
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`stats`] - Stat keys and stat profiles
//! - [`archetype`] - Archetype definitions
//! - [`template`] - Point-budget templates
//! - [`formulas`] - Damage, mitigation and time-to-kill formulas
//! - [`resolver`] - Deterministic expected-value duel resolver
//! - [`sensitivity`] - Stat elasticity analysis
//! - [`engine`] - Stochastic turn-resolution engine
//! - [`sampler`] - Seeded Monte Carlo aggregation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod archetype;
pub mod config;
pub mod engine;
pub mod error;
pub mod formulas;
pub mod resolver;
pub mod rng;
pub mod sampler;
pub mod sensitivity;
pub mod stats;
pub mod template;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::archetype::{Archetype, ArchetypeMetadata};
    pub use crate::config::{BalancerConfig, LifestealMode, TurnLimitPolicy};
    pub use crate::engine::{CombatEngine, TrialOutcome, Winner};
    pub use crate::error::{BalanceError, Result};
    pub use crate::resolver::{resolve, DeterministicOutcome, Outcome};
    pub use crate::rng::{derive_cell_seed, Lcg, RandomSource};
    pub use crate::sampler::{sample_matchup, MatchupStats, TurnDamagePoint};
    pub use crate::sensitivity::{
        analyze_all, analyze_bidirectional, analyze_stat, SensitivityReport, SensitivityResult,
        Side,
    };
    pub use crate::stats::{StatKey, StatProfile};
    pub use crate::template::ArchetypeTemplate;
}
