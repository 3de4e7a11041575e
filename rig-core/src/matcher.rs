//! Unique naming and pattern filtering of (sub)tests.
//!
//! One [`Matcher`] exists per suite run and is shared by every node of that
//! run. It owns two pieces of mutable state, each behind its own lock:
//!
//! - the name table: every full name handed out so far, with the next
//!   disambiguation counter
//! - the regex cache used to test name segments against filter levels
//!
//! [`Matcher::full_name`] is the only place that takes both, and it always
//! takes the name table first.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::cache::RegexCache;
use crate::error::MatchError;
use crate::pattern::{rewrite, split_levels};

/// Computes unique hierarchical names and decides whether each should run.
#[derive(Debug)]
pub struct Matcher {
    filter: Vec<String>,
    names: Mutex<HashMap<String, u64>>,
    cache: Mutex<RegexCache>,
}

impl Matcher {
    /// Build a matcher from a raw filter string.
    ///
    /// `label` names the filter's origin (e.g. `--filter`) in error messages.
    /// An empty filter matches everything. Each level is rewritten and
    /// compiled up front, so a bad level fails here rather than midway
    /// through a run.
    pub fn new(patterns: &str, label: &str) -> Result<Self, MatchError> {
        let mut cache = RegexCache::new();
        let mut filter = Vec::new();
        if !patterns.is_empty() {
            filter = split_levels(patterns).iter().map(|s| rewrite(s)).collect();
            for (index, pattern) in filter.iter().enumerate() {
                cache
                    .is_match(pattern, "non-empty")
                    .map_err(|source| MatchError::InvalidPattern {
                        index,
                        pattern: pattern.clone(),
                        label: label.to_string(),
                        source,
                    })?;
            }
        }
        Ok(Self {
            filter,
            names: Mutex::new(HashMap::new()),
            cache: Mutex::new(cache),
        })
    }

    /// A matcher that runs every test.
    pub fn match_all() -> Self {
        Self {
            filter: Vec::new(),
            names: Mutex::new(HashMap::new()),
            cache: Mutex::new(RegexCache::new()),
        }
    }

    /// The per-level patterns, after rewriting.
    pub fn filter(&self) -> &[String] {
        &self.filter
    }

    /// Name a new (sub)test and decide whether it should run.
    ///
    /// `parent` is the full name of the enclosing test, or `None` for a root
    /// test. Root names are used verbatim (registration already guarantees
    /// uniqueness); subtest names are rewritten and made unique under the
    /// parent. The name is claimed even when the test is filtered out, so
    /// numbering does not depend on the filter.
    ///
    /// Level `i` of the name must contain a match for level `i` of the
    /// filter; levels deeper than the filter are unconstrained.
    pub fn full_name(&self, parent: Option<&str>, subname: &str) -> (String, bool) {
        let mut names = self.names.lock();
        let name = match parent {
            Some(parent) => unique(&mut names, parent, &rewrite(subname)),
            None => subname.to_string(),
        };

        let mut cache = self.cache.lock();
        // The whole name is re-checked each time because a filter level may
        // itself contain a '/'.
        for (segment, pattern) in name.split('/').zip(&self.filter) {
            if !cache.is_match(pattern, segment).unwrap_or(false) {
                return (name, false);
            }
        }
        (name, true)
    }

    /// Number of distinct full names claimed so far.
    #[cfg(test)]
    pub(crate) fn claimed(&self) -> usize {
        self.names.lock().len()
    }
}

/// Claim `parent/sub`, appending `#NN` counters until the result is unused.
///
/// An empty `sub` is never used bare: the first one becomes `parent/#00`.
fn unique(names: &mut HashMap<String, u64>, parent: &str, sub: &str) -> String {
    let mut name = format!("{parent}/{sub}");
    let mut empty = sub.is_empty();
    loop {
        let existing = names.get(&name).copied();
        if !empty && existing.is_none() {
            names.insert(name.clone(), 1);
            return name;
        }
        let next = existing.unwrap_or(0);
        names.insert(name.clone(), next + 1);
        name = format!("{name}#{next:02}");
        empty = false;
    }
}
