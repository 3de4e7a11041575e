//! Run the suite and write reports.

use anyhow::{bail, Result};
use rig_harness::{reporters, HarnessConfig};

use crate::probes;

/// Run the run command.
///
/// Fails if any test failed, or if nothing ran outside of a sharded run
/// (an empty shard is normal when there are more shards than tests).
pub async fn run(config: HarnessConfig) -> Result<()> {
    let suite = probes::suite(config.run.clone())?;
    let report = suite.run(&config.run.filter).await?;

    print!("{}", reporters::render_text(&report, config.run.verbose));

    let written = reporters::write_outputs(&config.output, &report).await?;
    for path in &written {
        tracing::info!("Report written to {}", path.display());
    }

    if !report.is_success() {
        bail!("{} test(s) failed: {}", report.counts().failed, report.failures().join(", "));
    }
    if !report.ran() && config.run.sharding.is_none() {
        bail!("no tests matched filter {:?}", config.run.filter);
    }
    Ok(())
}
