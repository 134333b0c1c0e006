//! Job configuration
//!
//! All ambient runner facts are captured once into [`RunnerEnv`] and
//! passed to components explicitly. Nothing downstream reads process
//! environment variables directly; the environment is only touched
//! again at the installer's export boundary.

use crate::error::{CiError, CiResult};
use std::path::PathBuf;

/// `owner/name` repository coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse the `owner/name` form used by `GITHUB_REPOSITORY`
    pub fn parse(s: &str) -> CiResult<Self> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(CiError::InvalidInput {
                name: "GITHUB_REPOSITORY",
                reason: format!("expected owner/name, got '{}'", s),
            }),
        }
    }
}

/// Ambient facts of the CI job, captured once per run
#[derive(Debug, Clone, Default)]
pub struct RunnerEnv {
    /// Remote cache service url (`ACTIONS_CACHE_URL`), empty if unset
    pub cache_url: String,
    /// Remote cache service token (`ACTIONS_RUNTIME_TOKEN`), empty if unset
    pub runtime_token: String,
    /// sccache state directory (`SCCACHE_CACHE_DIR`); never defaulted
    pub cache_dir: Option<PathBuf>,
    /// Repository the job runs for (`GITHUB_REPOSITORY`)
    pub repository: Option<RepoSlug>,
    /// Workspace checked out for the job (`GITHUB_WORKSPACE`, else cwd)
    pub workspace: PathBuf,
    /// Installed executable exported by the setup phase (`SCCACHE_PATH`)
    pub sccache_path: Option<PathBuf>,
    /// Job summary file (`GITHUB_STEP_SUMMARY`)
    pub step_summary: Option<PathBuf>,
}

impl RunnerEnv {
    /// Capture the current process environment
    pub fn capture() -> Self {
        let workspace = std::env::var_os("GITHUB_WORKSPACE")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            cache_url: std::env::var("ACTIONS_CACHE_URL").unwrap_or_default(),
            runtime_token: std::env::var("ACTIONS_RUNTIME_TOKEN").unwrap_or_default(),
            cache_dir: std::env::var_os("SCCACHE_CACHE_DIR").map(PathBuf::from),
            repository: std::env::var("GITHUB_REPOSITORY")
                .ok()
                .and_then(|s| RepoSlug::parse(&s).ok()),
            workspace,
            sccache_path: std::env::var_os("SCCACHE_PATH").map(PathBuf::from),
            step_summary: std::env::var_os("GITHUB_STEP_SUMMARY").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn repo_slug_parses() {
        let slug = RepoSlug::parse("mozilla/sccache").unwrap();
        assert_eq!(slug.owner, "mozilla");
        assert_eq!(slug.repo, "sccache");
    }

    #[test]
    fn repo_slug_rejects_malformed() {
        assert!(RepoSlug::parse("no-slash").is_err());
        assert!(RepoSlug::parse("/repo").is_err());
        assert!(RepoSlug::parse("owner/").is_err());
        assert!(RepoSlug::parse("").is_err());
    }

    #[test]
    #[serial]
    fn capture_reads_runner_variables() {
        std::env::set_var("ACTIONS_CACHE_URL", "https://cache.invalid/");
        std::env::set_var("ACTIONS_RUNTIME_TOKEN", "runtime-token");
        std::env::set_var("SCCACHE_CACHE_DIR", "/tmp/sccache-state");
        std::env::set_var("GITHUB_REPOSITORY", "octo/widgets");

        let env = RunnerEnv::capture();
        assert_eq!(env.cache_url, "https://cache.invalid/");
        assert_eq!(env.runtime_token, "runtime-token");
        assert_eq!(env.cache_dir, Some(PathBuf::from("/tmp/sccache-state")));
        assert_eq!(env.repository, Some(RepoSlug::parse("octo/widgets").unwrap()));

        for var in [
            "ACTIONS_CACHE_URL",
            "ACTIONS_RUNTIME_TOKEN",
            "SCCACHE_CACHE_DIR",
            "GITHUB_REPOSITORY",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn capture_without_runner_variables() {
        for var in [
            "ACTIONS_CACHE_URL",
            "ACTIONS_RUNTIME_TOKEN",
            "SCCACHE_CACHE_DIR",
            "GITHUB_REPOSITORY",
            "SCCACHE_PATH",
        ] {
            std::env::remove_var(var);
        }

        let env = RunnerEnv::capture();
        assert!(env.cache_url.is_empty());
        assert!(env.cache_dir.is_none());
        assert!(env.repository.is_none());
        assert!(env.sccache_path.is_none());
    }
}
