//! Post command - stats, then dedup and save the remote cache
//!
//! Runs after the build. The statistics display can fail the step (a
//! broken sccache is worth surfacing); the cache steps never do.

use crate::cache::{derive_key, CacheCoordinator, GhaCacheStore};
use crate::cli::args::PostArgs;
use crate::config::RunnerEnv;
use crate::error::{CiError, CiResult};
use crate::platform::{HostInfo, PlatformTriple};
use crate::stats::show_stats;
use tracing::{debug, warn};

/// Execute the post command
pub async fn execute(args: PostArgs) -> CiResult<()> {
    let env = RunnerEnv::capture();

    if args.disable_annotations {
        debug!("annotations disabled, skipping stats");
    } else {
        let exe = env
            .sccache_path
            .clone()
            .ok_or(CiError::MissingInput("SCCACHE_PATH"))?;
        show_stats(&exe, env.step_summary.as_deref()).await?;
    }

    if args.cache.local {
        save_cache(&args, &env).await;
    }

    Ok(())
}

/// Best-effort dedup + save. Ordering matters: entries are write-once,
/// so the stale entry under the exact key goes first.
async fn save_cache(args: &PostArgs, env: &RunnerEnv) {
    // Setup already resolved this platform or the job would not be here;
    // an unsupported host at this point only costs the cache write
    let triple = match PlatformTriple::resolve(&HostInfo::detect()) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "platform unsupported, skipping cache save");
            return;
        }
    };

    let key = derive_key(
        &triple.to_string(),
        &env.workspace,
        args.cache.lockfile.as_deref(),
    );

    match GhaCacheStore::new(&env.cache_url, &env.runtime_token, args.token.clone()) {
        Ok(store) => {
            let coordinator = CacheCoordinator::new(store);
            coordinator.deduplicate(env.repository.as_ref(), &key).await;
            coordinator.save(env.cache_dir.as_deref(), &key).await;
        }
        Err(e) => warn!(error = %e, "cache service unavailable, skipping save"),
    }
}
