//! Stats command - display sccache statistics

use crate::cli::args::StatsArgs;
use crate::config::RunnerEnv;
use crate::error::{CiError, CiResult};
use crate::stats::show_stats;
use tracing::debug;

/// Execute the stats command
pub async fn execute(args: StatsArgs) -> CiResult<()> {
    if args.disable_annotations {
        debug!("annotations disabled, skipping stats");
        return Ok(());
    }

    let env = RunnerEnv::capture();
    let exe = env
        .sccache_path
        .ok_or(CiError::MissingInput("SCCACHE_PATH"))?;

    show_stats(&exe, env.step_summary.as_deref()).await
}
