//! # rig-types
//!
//! Result types shared by every testrig crate:
//! - [`Outcome`] - terminal status of one (sub)test
//! - [`NodeReport`] - final name, status, timing and buffered log of one node
//! - [`Report`] - all node reports of a run plus aggregate [`Counts`]
//!
//! The harness produces these; reporters and the CLI only consume them.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod outcome;
mod report;

pub use outcome::Outcome;
pub use report::{Counts, NodeReport, Report};
