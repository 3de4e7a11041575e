//! List registered root tests.

use anyhow::{Context, Result};
use rig_core::Matcher;
use rig_harness::HarnessConfig;

use crate::probes;

/// Run the list command.
///
/// Only the first level of `pattern` applies, since subtests are not known
/// until their parent runs.
pub fn run(config: &HarnessConfig, pattern: &str) -> Result<()> {
    let suite = probes::suite(config.run.clone())?;
    let matcher = Matcher::new(pattern, "pattern").context("Invalid pattern")?;

    for name in suite.names() {
        if matcher.full_name(None, name).1 {
            println!("{name}");
        }
    }
    Ok(())
}
