//! Error types for testrig-harness.

use rig_core::MatchError;

/// Errors surfaced by suite registration, runs, and report output.
///
/// Test failures are not errors: they are recorded in the
/// [`Report`](rig_types::Report) returned by a successful run.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    /// A root test name was registered twice.
    #[error("duplicate test registration: {name}")]
    DuplicateRegistration {
        /// The name that was already taken.
        name: String,
    },

    /// The filter pattern or sharding selector is invalid. No test ran.
    #[error("{0}")]
    Match(#[from] MatchError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error while writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode the JSON report.
    #[error("report encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
