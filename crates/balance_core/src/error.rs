//! Error types for the balance engine.

use thiserror::Error;

/// Result type alias using [`BalanceError`].
pub type Result<T> = std::result::Result<T, BalanceError>;

/// Top-level error type for all balance engine errors.
///
/// Undefined analysis results (e.g. sensitivity on a draw) are not errors;
/// they are represented as `None` by the functions that produce them.
#[derive(Debug, Error)]
pub enum BalanceError {
    /// Template stat allocation does not sum to one, or contains a bad fraction.
    #[error("Invalid stat allocation for template '{template}': {reason}")]
    InvalidAllocation {
        /// Template identifier.
        template: String,
        /// What is wrong with the allocation.
        reason: String,
    },

    /// Budget lies outside the range a template declares.
    #[error("Budget {budget} is outside the range {min}..={max} of template '{template}'")]
    BudgetOutOfRange {
        /// Template identifier.
        template: String,
        /// Requested budget.
        budget: f64,
        /// Smallest accepted budget.
        min: f64,
        /// Largest accepted budget.
        max: f64,
    },

    /// Template is structurally invalid.
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// Archetype id not present in the roster.
    #[error("Unknown archetype: {0}")]
    UnknownArchetype(String),

    /// Two archetypes in one roster share an id.
    #[error("Duplicate archetype id: {0}")]
    DuplicateArchetype(String),

    /// A roster must contain at least one archetype.
    #[error("Roster is empty")]
    EmptyRoster,

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Underlying IO failure.
    #[error("IO error on '{path}': {message}")]
    Io {
        /// Path involved in the failed operation.
        path: String,
        /// Error message.
        message: String,
    },

    /// A long-running computation was abandoned by its caller.
    #[error("Run cancelled after {completed} of {total} cells")]
    Cancelled {
        /// Cells finished before cancellation.
        completed: usize,
        /// Cells scheduled in total.
        total: usize,
    },
}
