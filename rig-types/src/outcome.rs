//! Terminal status of a test node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a (sub)test ended.
///
/// `FailFast` and `Filtered` are both "did not run", but for different
/// reasons: the first because an earlier sibling failed while fail-fast was
/// enabled, the second because the filter pattern rejected the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Body completed and nothing in the subtree failed.
    Passed,
    /// Body, or one of its descendants, signalled failure.
    Failed,
    /// Body called one of the skip methods.
    Skipped,
    /// Never started: a sibling at the same level failed under fail-fast.
    FailFast,
    /// Never started: rejected by the filter pattern.
    Filtered,
}

impl Outcome {
    /// Returns true for [`Outcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    /// Returns true if the node's body actually executed.
    pub fn executed(&self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Failed | Outcome::Skipped)
    }

    /// Short uppercase label used by the text and TAP reporters.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASS",
            Outcome::Failed => "FAIL",
            Outcome::Skipped | Outcome::FailFast => "SKIP",
            Outcome::Filtered => "FILTERED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
