//! # rig-core
//!
//! Pure logic for testrig (no I/O, no async, instant tests).
//!
//! This crate decides *which* tests run and *what they are called*:
//! - [`pattern`] splits a filter string into per-level regular expressions
//!   and rewrites subtest names into path-safe segments
//! - [`RegexCache`] keeps the most recently compiled expression
//! - [`Matcher`] hands out unique hierarchical names and run/skip decisions
//! - [`Sharding`] spreads root tests over several runners
//!
//! Running the tests is the job of `rig-harness`, which owns one `Matcher`
//! per suite run and consults it from every concurrently executing node.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod matcher;
pub mod pattern;
pub mod shard;

pub use cache::RegexCache;
pub use error::MatchError;
pub use matcher::Matcher;
pub use pattern::{rewrite, split_levels};
pub use shard::Sharding;
