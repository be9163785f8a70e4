//! Error types for the kbase logic engine.

use thiserror::Error;

use crate::rule::RuleId;

/// A specialized `Result` type for logic engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Defines the errors that can occur while loading rules or running inference.
///
/// Ordinary inference outcomes (an unreachable goal, a cyclic proof branch,
/// an unknown atom in a distance query) are never errors; they are encoded
/// in the returned results.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A rule was defined incorrectly.
    #[error("Invalid rule definition: {0}")]
    InvalidRule(String),

    /// Two rules in one set share an identifier.
    #[error("Duplicate rule id: {0}")]
    DuplicateRule(RuleId),

    /// A rule id was referenced that is not part of the rule set.
    #[error("Unknown rule id: {0}")]
    UnknownRule(RuleId),

    /// A rule source could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Forward chaining used up its step budget before saturating.
    #[error("Step budget exhausted after {steps} steps")]
    StepBudgetExceeded { steps: usize },

    /// Backward chaining recursed deeper than the configured limit.
    #[error("Max inference depth exceeded: {depth}")]
    MaxDepthExceeded { depth: usize },

    /// The engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error from the underlying I/O system.
    #[error("IO error: {0}")]
    Io(String),

    /// An error occurred during data serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
