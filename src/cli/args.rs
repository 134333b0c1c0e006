//! CLI argument definitions using clap derive
//!
//! Every workflow input doubles as an environment variable so the
//! invoking step can pass inputs either way.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// sccache-ci - provision sccache on CI runners
///
/// Installs a verified sccache release onto the job's PATH and
/// coordinates a remote cache of sccache's state directory.
#[derive(Parser, Debug)]
#[command(name = "sccache-ci")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands, one per job phase
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install sccache and restore its remote cache (start of job)
    Setup(SetupArgs),

    /// Show sccache statistics for the build so far
    Stats(StatsArgs),

    /// Show statistics, then deduplicate and save the remote cache
    /// (end of job)
    Post(PostArgs),
}

/// Cache coordination inputs shared by the setup and post phases
#[derive(Parser, Debug, Clone)]
pub struct CacheOpts {
    /// Enable remote save/restore of the sccache state directory
    #[arg(long, env = "SCCACHE_CI_LOCAL")]
    pub local: bool,

    /// Lockfile used for the cache fingerprint (discovered in the
    /// workspace when not given)
    #[arg(long, env = "SCCACHE_CI_LOCKFILE")]
    pub lockfile: Option<PathBuf>,
}

/// Arguments for the setup command
#[derive(Parser, Debug)]
pub struct SetupArgs {
    /// sccache release tag to install (latest release when empty)
    #[arg(long = "sccache-version", env = "SCCACHE_VERSION")]
    pub sccache_version: Option<String>,

    /// Token for release index queries and cache deletion
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(flatten)]
    pub cache: CacheOpts,
}

/// Arguments for the stats command
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Skip statistics display and job annotations
    #[arg(long, env = "SCCACHE_CI_DISABLE_ANNOTATIONS")]
    pub disable_annotations: bool,
}

/// Arguments for the post command
#[derive(Parser, Debug)]
pub struct PostArgs {
    /// Skip statistics display and job annotations
    #[arg(long, env = "SCCACHE_CI_DISABLE_ANNOTATIONS")]
    pub disable_annotations: bool,

    /// Token for release index queries and cache deletion
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(flatten)]
    pub cache: CacheOpts,
}
