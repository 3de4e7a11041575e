//! Error types for filter and shard configuration.

use thiserror::Error;

/// Errors raised while building a [`Matcher`](crate::Matcher) or parsing a
/// [`Sharding`](crate::Sharding) selector.
///
/// Both are configuration errors: they are reported before any test starts.
#[derive(Debug, Error)]
pub enum MatchError {
    /// One level of the filter is not a valid regular expression.
    #[error("invalid regexp for element {index} of {label} ({pattern:?}): {source}")]
    InvalidPattern {
        /// Zero-based level index within the filter.
        index: usize,
        /// The offending level, after rewriting.
        pattern: String,
        /// Where the filter came from (flag or config key).
        label: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },

    /// Sharding selector is not of the form `hash:m/n` with `1 <= m <= n`.
    #[error("invalid sharding {0:?}: expected hash:m/n with 1 <= m <= n")]
    InvalidSharding(String),
}
