//! Setup command - install sccache and restore its remote cache
//!
//! Runs at the start of the job: resolve the release, acquire it
//! (skipped on a warm host), publish it onto the PATH, then restore the
//! remote cache. Acquisition errors fail the job; cache restore never
//! does.

use crate::acquire::{acquire, ReleaseTarget};
use crate::cache::{derive_key, CacheCoordinator, GhaCacheStore};
use crate::cli::args::SetupArgs;
use crate::config::RunnerEnv;
use crate::error::CiResult;
use crate::install::{ExportedEnv, Installer};
use crate::platform::{HostInfo, PlatformTriple};
use crate::release::{resolve_version, GithubReleases};
use crate::toolcache::ToolCache;
use console::style;
use tracing::{info, warn};

/// Execute the setup command
pub async fn execute(args: SetupArgs) -> CiResult<()> {
    let env = RunnerEnv::capture();
    let host = HostInfo::detect();
    let triple = PlatformTriple::resolve(&host)?;

    let index = GithubReleases::new(args.token.clone());
    let version = resolve_version(args.sccache_version.as_deref(), &index).await?;
    info!(%version, platform = %triple, "resolved sccache release");

    let tool_cache = ToolCache::new();
    let home_dir = match tool_cache.find("sccache", &version) {
        Some(dir) => {
            info!(dir = %dir.display(), "using cached sccache, skipping download");
            dir
        }
        None => {
            let target = ReleaseTarget {
                triple,
                version: version.clone(),
            };
            let workdir =
                std::env::temp_dir().join(format!("sccache-ci-{}", std::process::id()));
            let acquired = acquire(&target, &index, &workdir).await?;
            let stored = tool_cache.store("sccache", &version, &acquired.home_dir)?;
            let _ = std::fs::remove_dir_all(&workdir);
            stored
        }
    };

    let installer = Installer::from_env();
    let exported = ExportedEnv {
        cache_url: env.cache_url.clone(),
        runtime_token: env.runtime_token.clone(),
        cache_dir: env.cache_dir.clone(),
    };
    let tool = installer.install(&home_dir, triple.exe_name(), &version, &exported)?;

    println!(
        "{} sccache {} installed ({})",
        style("[OK]").green(),
        version,
        tool.executable_path.display()
    );

    if args.cache.local {
        restore_cache(&args, &env, &triple).await;
    }

    Ok(())
}

/// Best-effort cache restore; a failure here starts the build cold
/// instead of failing the job
async fn restore_cache(args: &SetupArgs, env: &RunnerEnv, triple: &PlatformTriple) {
    let key = derive_key(
        &triple.to_string(),
        &env.workspace,
        args.cache.lockfile.as_deref(),
    );

    match GhaCacheStore::new(&env.cache_url, &env.runtime_token, args.token.clone()) {
        Ok(store) => {
            let coordinator = CacheCoordinator::new(store);
            coordinator.restore(env.cache_dir.as_deref(), &key).await;
        }
        Err(e) => warn!(error = %e, "cache service unavailable, skipping restore"),
    }
}
