//! Per-node results and the aggregate report of a suite run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Outcome;

/// Final state of a single (sub)test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Unique `/`-joined name from the root test down.
    pub name: String,
    /// Full name of the enclosing test (None for root tests).
    pub parent: Option<String>,
    /// Nesting depth (root tests are 0).
    pub depth: usize,
    /// How the node ended.
    pub outcome: Outcome,
    /// Time spent running the body, excluding time parked at a parallel
    /// barrier.
    pub elapsed: Duration,
    /// Diagnostic text logged by the body.
    pub output: String,
}

impl NodeReport {
    /// Report for a node that never started.
    pub fn not_run(name: String, parent: Option<String>, depth: usize, outcome: Outcome) -> Self {
        Self {
            name,
            parent,
            depth,
            outcome,
            elapsed: Duration::ZERO,
            output: String::new(),
        }
    }
}

/// Aggregate counts over a [`Report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Nodes that passed.
    pub passed: usize,
    /// Nodes that failed (including parents failed by a descendant).
    pub failed: usize,
    /// Nodes that skipped themselves.
    pub skipped: usize,
    /// Nodes skipped because of fail-fast.
    pub fail_fast: usize,
    /// Nodes rejected by the filter pattern.
    pub filtered: usize,
}

/// Results of one suite run.
///
/// Nodes are kept in completion order, so children always appear before
/// their parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    nodes: Vec<NodeReport>,
    counts: Counts,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished node and update the counts.
    pub fn record(&mut self, node: NodeReport) {
        match node.outcome {
            Outcome::Passed => self.counts.passed += 1,
            Outcome::Failed => self.counts.failed += 1,
            Outcome::Skipped => self.counts.skipped += 1,
            Outcome::FailFast => self.counts.fail_fast += 1,
            Outcome::Filtered => self.counts.filtered += 1,
        }
        self.nodes.push(node);
    }

    /// All recorded nodes, in completion order.
    pub fn nodes(&self) -> &[NodeReport] {
        &self.nodes
    }

    /// Aggregate counts.
    pub fn counts(&self) -> Counts {
        self.counts
    }

    /// Look up a node by its full name.
    pub fn get(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Full names of every failed node.
    pub fn failures(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.outcome.is_failed())
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Root tests, in completion order.
    pub fn roots(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    /// Direct children of `name`, in completion order.
    pub fn children_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a NodeReport> {
        self.nodes
            .iter()
            .filter(move |n| n.parent.as_deref() == Some(name))
    }

    /// Returns true if any node's body executed.
    pub fn ran(&self) -> bool {
        self.nodes.iter().any(|n| n.outcome.executed())
    }

    /// Returns true if no node failed.
    pub fn is_success(&self) -> bool {
        self.counts.failed == 0
    }
}
