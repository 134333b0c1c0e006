//! Installation onto the runner environment
//!
//! Publishes a verified tool home through the runner's file-based
//! environment surface: a PATH entry via `GITHUB_PATH` and exported
//! variables via `GITHUB_ENV`. These writes are the one place the tool
//! communicates with later build steps; everything else passes state
//! explicitly. Lifecycle is the remaining duration of the job, torn
//! down with the runner environment.

use crate::error::{CiError, CiResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A tool published onto the job's PATH
#[derive(Debug, Clone)]
pub struct InstalledTool {
    pub home_dir: PathBuf,
    pub executable_path: PathBuf,
    pub version: String,
}

/// Values mirrored into the build environment alongside the executable
#[derive(Debug, Clone, Default)]
pub struct ExportedEnv {
    /// Remote cache service url, passed through verbatim (may be empty)
    pub cache_url: String,
    /// Remote cache service token, passed through verbatim (may be empty)
    pub runtime_token: String,
    /// sccache state directory; only exported when configured
    pub cache_dir: Option<PathBuf>,
}

/// Writer for the runner's environment files
#[derive(Debug, Clone)]
pub struct Installer {
    github_path: Option<PathBuf>,
    github_env: Option<PathBuf>,
}

impl Installer {
    /// Use the environment files named by the ambient `GITHUB_PATH` /
    /// `GITHUB_ENV` variables
    pub fn from_env() -> Self {
        Self {
            github_path: std::env::var_os("GITHUB_PATH").map(PathBuf::from),
            github_env: std::env::var_os("GITHUB_ENV").map(PathBuf::from),
        }
    }

    /// Use explicit environment files
    pub fn with_files(github_path: Option<PathBuf>, github_env: Option<PathBuf>) -> Self {
        Self {
            github_path,
            github_env,
        }
    }

    /// Publish `home_dir` and export the variables later build steps
    /// consume. Returns the installed tool description.
    pub fn install(
        &self,
        home_dir: &Path,
        exe_name: &str,
        version: &str,
        env: &ExportedEnv,
    ) -> CiResult<InstalledTool> {
        let executable_path = home_dir.join(exe_name);

        self.add_path(home_dir)?;
        self.export_var("SCCACHE_PATH", &executable_path.to_string_lossy())?;

        if let Some(dir) = &env.cache_dir {
            self.export_var("SCCACHE_CACHE_DIR", &dir.to_string_lossy())?;
        }

        // Verbatim passthrough so nested tool invocations inherit the
        // cache service credentials without their own discovery logic
        self.export_var("ACTIONS_CACHE_URL", &env.cache_url)?;
        self.export_var("ACTIONS_RUNTIME_TOKEN", &env.runtime_token)?;

        info!(
            exe = %executable_path.display(),
            %version,
            "sccache installed onto PATH"
        );

        Ok(InstalledTool {
            home_dir: home_dir.to_path_buf(),
            executable_path,
            version: version.to_string(),
        })
    }

    /// Add a directory to the job's executable search path
    pub fn add_path(&self, dir: &Path) -> CiResult<()> {
        match &self.github_path {
            Some(file) => append_line(file, &dir.to_string_lossy()),
            None => {
                // Outside a runner: mutate only this process
                warn!("GITHUB_PATH not set, PATH change is process-local");
                let current = std::env::var_os("PATH").unwrap_or_default();
                let mut paths = vec![dir.to_path_buf()];
                paths.extend(std::env::split_paths(&current));
                let joined = std::env::join_paths(paths).map_err(|e| {
                    CiError::Internal(format!("rebuilding PATH: {}", e))
                })?;
                std::env::set_var("PATH", joined);
                Ok(())
            }
        }
    }

    /// Export a variable to later job steps
    pub fn export_var(&self, name: &str, value: &str) -> CiResult<()> {
        match &self.github_env {
            Some(file) => {
                let line = if value.contains('\n') {
                    format!("{}<<__SCCACHE_CI_EOF__\n{}\n__SCCACHE_CI_EOF__", name, value)
                } else {
                    format!("{}={}", name, value)
                };
                append_line(file, &line)
            }
            None => {
                warn!(%name, "GITHUB_ENV not set, export is process-local");
                std::env::set_var(name, value);
                Ok(())
            }
        }
    }
}

fn append_line(file: &Path, line: &str) -> CiResult<()> {
    use std::io::Write;

    let mut handle = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .map_err(|e| CiError::io(format!("opening {}", file.display()), e))?;
    writeln!(handle, "{}", line)
        .map_err(|e| CiError::io(format!("appending to {}", file.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn runner_files(dir: &Path) -> (PathBuf, PathBuf, Installer) {
        let path_file = dir.join("github_path");
        let env_file = dir.join("github_env");
        let installer =
            Installer::with_files(Some(path_file.clone()), Some(env_file.clone()));
        (path_file, env_file, installer)
    }

    #[test]
    fn install_writes_path_and_exports() {
        let dir = TempDir::new().unwrap();
        let (path_file, env_file, installer) = runner_files(dir.path());
        let home = dir.path().join("sccache-v0.7.0-x86_64-unknown-linux-musl");

        let env = ExportedEnv {
            cache_url: "https://cache.invalid/".to_string(),
            runtime_token: "tok".to_string(),
            cache_dir: Some(dir.path().join("state")),
        };
        let tool = installer.install(&home, "sccache", "v0.7.0", &env).unwrap();

        assert_eq!(tool.executable_path, home.join("sccache"));
        assert_eq!(tool.version, "v0.7.0");

        let paths = std::fs::read_to_string(path_file).unwrap();
        assert_eq!(paths.trim(), home.to_string_lossy());

        let envs = std::fs::read_to_string(env_file).unwrap();
        assert!(envs.contains(&format!("SCCACHE_PATH={}", home.join("sccache").display())));
        assert!(envs.contains("SCCACHE_CACHE_DIR="));
        assert!(envs.contains("ACTIONS_CACHE_URL=https://cache.invalid/"));
        assert!(envs.contains("ACTIONS_RUNTIME_TOKEN=tok"));
    }

    #[test]
    fn unset_cache_dir_is_not_exported() {
        let dir = TempDir::new().unwrap();
        let (_path_file, env_file, installer) = runner_files(dir.path());

        let env = ExportedEnv::default();
        installer
            .install(dir.path(), "sccache", "v0.7.0", &env)
            .unwrap();

        let envs = std::fs::read_to_string(env_file).unwrap();
        assert!(!envs.contains("SCCACHE_CACHE_DIR"));
        // Passthroughs are exported even when empty
        assert!(envs.contains("ACTIONS_CACHE_URL=\n"));
        assert!(envs.contains("ACTIONS_RUNTIME_TOKEN=\n"));
    }

    #[test]
    fn multiline_values_use_delimiter_syntax() {
        let dir = TempDir::new().unwrap();
        let (_path_file, env_file, installer) = runner_files(dir.path());

        installer.export_var("NOTE", "line one\nline two").unwrap();

        let envs = std::fs::read_to_string(env_file).unwrap();
        assert!(envs.contains("NOTE<<__SCCACHE_CI_EOF__"));
        assert!(envs.contains("line two"));
    }

    #[test]
    fn exports_append_rather_than_truncate() {
        let dir = TempDir::new().unwrap();
        let (_path_file, env_file, installer) = runner_files(dir.path());

        installer.export_var("A", "1").unwrap();
        installer.export_var("B", "2").unwrap();

        let envs = std::fs::read_to_string(env_file).unwrap();
        assert!(envs.contains("A=1"));
        assert!(envs.contains("B=2"));
    }

    #[test]
    #[serial]
    fn path_fallback_is_process_local() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::with_files(None, Some(dir.path().join("env")));
        let original = std::env::var_os("PATH");

        installer.add_path(dir.path()).unwrap();
        let updated = std::env::var("PATH").unwrap();
        assert!(updated.starts_with(&*dir.path().to_string_lossy()));

        match original {
            Some(p) => std::env::set_var("PATH", p),
            None => std::env::remove_var("PATH"),
        }
    }
}
