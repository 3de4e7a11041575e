//! # rig-harness
//!
//! Hierarchical async test harness for integration suites.
//!
//! A [`Suite`] holds named root tests. Each test body receives an [`H`]
//! handle with which it can:
//! - start nested subtests with [`H::run`]
//! - hand the rest of its body to the parallel phase with [`H::parallel`]
//! - log, fail, skip, or stop early
//!
//! ## Execution model
//!
//! ```text
//! Suite::run
//!   root "a" ─────────────► body ─┬─ run("x") ──► x (sequential, awaited)
//!                                 ├─ run("p1") ─► p1.parallel() ─┐ parked
//!                                 ├─ run("p2") ─► p2.parallel() ─┤ parked
//!                                 └─ returns ─► barrier opens ───┴─► p1, p2 run
//!                                               (a completes after p1, p2)
//! ```
//!
//! At most `parallel` bodies run at once (see [`ParallelGate`]). Failures
//! propagate to every ancestor. Results are collected into a
//! [`Report`](rig_types::Report) that [`reporters`] renders as text, TAP,
//! or JSON.
//!
//! ## Example
//!
//! ```no_run
//! use testrig_harness::{RunConfig, Suite};
//!
//! # async fn demo() -> Result<(), testrig_harness::SuiteError> {
//! let mut suite = Suite::new(RunConfig::default());
//! suite.register("math", |h| async move {
//!     h.run("add", |t| async move {
//!         if 1 + 1 != 2 {
//!             t.error("addition is broken");
//!         }
//!     })
//!     .await;
//! })?;
//! let report = suite.run("").await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gate;
pub mod group;
pub mod node;
pub mod reporters;
pub mod suite;

pub use config::{ConfigError, HarnessConfig, OutputConfig, RunConfig};
pub use error::SuiteError;
pub use gate::ParallelGate;
pub use group::JoinGroup;
pub use node::{TestFn, H};
pub use suite::Suite;

pub use rig_types::{Counts, NodeReport, Outcome, Report};
