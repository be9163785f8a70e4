//! Error types for the kbase command line.

use thiserror::Error;

/// A specialized `Result` type for command execution.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the user by the `kbase` binary.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the rule engine.
    #[error(transparent)]
    Logic(#[from] kbase_logic::Error),

    /// An error from the underlying I/O system.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The command line was inconsistent.
    #[error("Usage error: {0}")]
    Usage(String),

    /// `check` found issues of error severity.
    #[error("Knowledge base has {0} error(s)")]
    Invalid(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (Error::Usage("no goal".into()), "Usage error: no goal"),
            (Error::Invalid(2), "Knowledge base has 2 error(s)"),
            (
                Error::Logic(kbase_logic::Error::DuplicateRule(3)),
                "Duplicate rule id: 3",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(format!("{}", error), expected);
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io_err.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
