//! Registry of root tests and the entry point of a run.

use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic;
use std::sync::Arc;
use std::time::Instant;

use rig_core::{Matcher, Sharding};
use rig_types::Report;

use crate::config::RunConfig;
use crate::error::SuiteError;
use crate::gate::ParallelGate;
use crate::group::JoinGroup;
use crate::node::{launch, RunContext, TestFn, H};

/// A named collection of root tests.
///
/// Roots run in lexicographic name order. A root that calls
/// [`H::parallel`] overlaps with the roots after it.
pub struct Suite {
    config: RunConfig,
    tests: BTreeMap<String, TestFn>,
}

impl Suite {
    /// Create an empty suite.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            tests: BTreeMap::new(),
        }
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Register a root test.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::DuplicateRegistration`] if `name` is taken.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<(), SuiteError>
    where
        F: Fn(H) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if self.tests.contains_key(&name) {
            return Err(SuiteError::DuplicateRegistration { name });
        }
        let test: TestFn = Arc::new(move |h| f(h).boxed());
        self.tests.insert(name, test);
        Ok(())
    }

    /// Registered root names, in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Number of registered root tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Run every registered test matching `pattern`.
    ///
    /// Test failures are reported in the returned [`Report`], not as an
    /// error. A panic that is not a test-control signal propagates out of
    /// this call once every started test has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Match`] before any test starts if the pattern
    /// or the configured sharding is invalid.
    pub async fn run(&self, pattern: &str) -> Result<Report, SuiteError> {
        let matcher = Matcher::new(pattern, "filter")?;
        let sharding = self
            .config
            .sharding
            .as_deref()
            .map(str::parse::<Sharding>)
            .transpose()?;

        let gate = ParallelGate::new(self.config.parallelism());
        tracing::info!(
            "Running {} registered tests (parallel: {}, filter: {:?})",
            self.tests.len(),
            gate.max(),
            pattern
        );
        if let Some(shard) = &sharding {
            tracing::info!("Sharding enabled: {}", shard);
        }

        let ctx = Arc::new(RunContext::new(
            matcher,
            gate,
            self.config.fail_fast,
            self.config.verbose,
        ));
        let roots = Arc::new(JoinGroup::new());
        let started = Instant::now();

        for (name, test) in &self.tests {
            if let Some(shard) = &sharding {
                if !shard.includes(name) {
                    tracing::debug!("{} belongs to another shard", name);
                    continue;
                }
            }
            let test = Arc::clone(test);
            launch(&ctx, None, &roots, name, move |h| test(h)).await;
        }

        // Parallel roots proceed once every root has been launched.
        if let Some(payload) = roots.join(&ctx.gate, false).await {
            panic::resume_unwind(payload);
        }

        let report = ctx.take_report();
        let counts = report.counts();
        tracing::info!(
            "Suite finished in {:.2}s: {} passed, {} failed, {} skipped",
            started.elapsed().as_secs_f64(),
            counts.passed,
            counts.failed,
            counts.skipped + counts.fail_fast
        );
        Ok(report)
    }
}
