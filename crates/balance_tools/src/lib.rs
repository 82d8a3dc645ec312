//! # Balance Development Tools
//!
//! Command-line tools for development:
//! - Data validators for rosters, templates, presets and batch configs

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
