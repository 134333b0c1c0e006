//! Upstream release index access
//!
//! Version resolution and artifact downloads go through the
//! [`ReleaseIndex`] trait so the acquisition pipeline can be tested
//! without network access. The real client speaks the GitHub releases
//! API over ureq; HTTP calls run on the blocking pool.

use crate::error::{CiError, CiResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// GitHub org publishing sccache releases
pub const RELEASE_OWNER: &str = "mozilla";
/// GitHub repository publishing sccache releases
pub const RELEASE_REPO: &str = "sccache";

const USER_AGENT: &str = concat!("sccache-ci/", env!("CARGO_PKG_VERSION"));

/// Release metadata returned by the index
#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Abstract release index interface
///
/// Covers the two upstream interactions the acquisition phase needs:
/// the latest published tag, and raw artifact bytes.
#[async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Tag name of the latest published release
    async fn latest_tag(&self, owner: &str, repo: &str) -> CiResult<String>;

    /// Download a release artifact, returning its bytes
    async fn download(&self, url: &str) -> CiResult<Vec<u8>>;
}

/// GitHub-backed release index
#[derive(Debug, Clone)]
pub struct GithubReleases {
    token: Option<String>,
}

impl GithubReleases {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    fn latest_tag_blocking(&self, owner: &str, repo: &str) -> CiResult<String> {
        let url = format!("https://api.github.com/repos/{}/{}/releases/latest", owner, repo);
        debug!(%url, "querying release index");

        let mut request = ureq::get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let mut response = request
            .call()
            .map_err(|e| CiError::ReleaseIndex(format!("{}: {}", url, e)))?;

        let release: LatestRelease = response
            .body_mut()
            .read_json()
            .map_err(|e| CiError::ReleaseIndex(format!("malformed release metadata: {}", e)))?;

        Ok(release.tag_name)
    }

    fn download_blocking(&self, url: &str) -> CiResult<Vec<u8>> {
        debug!(%url, "downloading");

        let mut request = ureq::get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let mut response = request
            .call()
            .map_err(|e| CiError::download(url, e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .body_mut()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| CiError::download(url, e.to_string()))?;

        debug!(len = bytes.len(), %url, "downloaded");
        Ok(bytes)
    }
}

#[async_trait]
impl ReleaseIndex for GithubReleases {
    async fn latest_tag(&self, owner: &str, repo: &str) -> CiResult<String> {
        let client = self.clone();
        let owner = owner.to_string();
        let repo = repo.to_string();
        tokio::task::spawn_blocking(move || client.latest_tag_blocking(&owner, &repo))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))?
    }

    async fn download(&self, url: &str) -> CiResult<Vec<u8>> {
        let client = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || client.download_blocking(&url))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))?
    }
}

/// Resolve the requested version to a concrete release tag.
///
/// A present, non-empty request is returned verbatim; it is not checked
/// against the index (an invalid version fails later at download). An
/// empty or absent request resolves to the latest published tag, and a
/// failed index query is fatal; there is no fallback default version.
pub async fn resolve_version(
    requested: Option<&str>,
    index: &dyn ReleaseIndex,
) -> CiResult<String> {
    match requested {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => {
            debug!("no version requested, resolving latest");
            index.latest_tag(RELEASE_OWNER, RELEASE_REPO).await
        }
    }
}
