//! Binary acquisition
//!
//! Downloads a release artifact plus its `.sha256` sidecar, verifies the
//! digest, and unpacks the archive. The digest check is the trust
//! boundary for binaries pulled into the CI environment: it is
//! unconditional, and nothing touches disk until it has passed.

use crate::error::{CiError, CiResult};
use crate::extract::extract_archive;
use crate::platform::PlatformTriple;
use crate::release::ReleaseIndex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The concrete release to fetch, fixed once per run
#[derive(Debug, Clone)]
pub struct ReleaseTarget {
    pub triple: PlatformTriple,
    pub version: String,
}

/// Download coordinates derived from a [`ReleaseTarget`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Artifact file name, e.g. `sccache-v0.7.0-x86_64-unknown-linux-musl.tar.gz`
    pub filename: String,
    /// Top-level directory inside the archive
    pub dirname: String,
    pub download_url: String,
    pub checksum_url: String,
}

impl ArtifactDescriptor {
    pub fn new(target: &ReleaseTarget) -> Self {
        let dirname = format!("sccache-{}-{}", target.version, target.triple);
        let filename = format!("{}.{}", dirname, target.triple.archive_kind().extension());
        let download_url = format!(
            "https://github.com/mozilla/sccache/releases/download/{}/{}",
            target.version, filename
        );
        let checksum_url = format!("{}.sha256", download_url);

        Self {
            filename,
            dirname,
            download_url,
            checksum_url,
        }
    }
}

/// An artifact whose digest matched its sidecar
///
/// Only constructed after verification; holding one is proof the archive
/// on disk is the bytes the vendor published.
#[derive(Debug, Clone)]
pub struct VerifiedArtifact {
    pub local_path: PathBuf,
    pub sha256: String,
}

/// A verified, unpacked release ready for installation
#[derive(Debug)]
pub struct AcquiredTool {
    pub artifact: VerifiedArtifact,
    /// Directory containing the executable (the archive's top-level dir)
    pub home_dir: PathBuf,
}

/// Download, verify, and unpack the release for `target` under `workdir`.
///
/// Every step is a failure point and every failure aborts: a failed
/// download of either file, a digest mismatch, or an extraction error.
/// On mismatch nothing has been written under `workdir`.
pub async fn acquire(
    target: &ReleaseTarget,
    index: &dyn ReleaseIndex,
    workdir: &Path,
) -> CiResult<AcquiredTool> {
    let desc = ArtifactDescriptor::new(target);
    info!(url = %desc.download_url, "fetching sccache release");

    let artifact_bytes = index.download(&desc.download_url).await?;
    let sidecar_bytes = index.download(&desc.checksum_url).await?;

    let actual = hex::encode(Sha256::digest(&artifact_bytes));
    let expected = String::from_utf8_lossy(&sidecar_bytes).trim().to_string();
    if expected != actual {
        return Err(CiError::ChecksumMismatch { expected, actual });
    }
    debug!(sha256 = %actual, "checksum verified");

    std::fs::create_dir_all(workdir)
        .map_err(|e| CiError::io(format!("creating {}", workdir.display()), e))?;
    let local_path = workdir.join(&desc.filename);
    std::fs::write(&local_path, &artifact_bytes)
        .map_err(|e| CiError::io(format!("writing {}", local_path.display()), e))?;

    let unpack_dir = workdir.join("unpacked");
    {
        let kind = target.triple.archive_kind();
        let archive = local_path.clone();
        let dest = unpack_dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(kind, &archive, &dest))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))??;
    }

    let home_dir = unpack_dir.join(&desc.dirname);
    if !home_dir.is_dir() {
        return Err(CiError::Extract {
            archive: local_path,
            reason: format!("archive did not contain {}", desc.dirname),
        });
    }

    Ok(AcquiredTool {
        artifact: VerifiedArtifact {
            local_path,
            sha256: actual,
        },
        home_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HostInfo;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeIndex {
        files: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl ReleaseIndex for FakeIndex {
        async fn latest_tag(&self, _owner: &str, _repo: &str) -> CiResult<String> {
            unreachable!("acquisition never queries the tag")
        }

        async fn download(&self, url: &str) -> CiResult<Vec<u8>> {
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| CiError::download(url, "not found"))
        }
    }

    fn linux_target(version: &str) -> ReleaseTarget {
        ReleaseTarget {
            triple: PlatformTriple::resolve(&HostInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
            })
            .unwrap(),
            version: version.to_string(),
        }
    }

    fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn fake_release(target: &ReleaseTarget, sidecar: Option<&str>) -> FakeIndex {
        let desc = ArtifactDescriptor::new(target);
        let archive = tar_gz_bytes(&[(
            &format!("{}/sccache", desc.dirname),
            b"#!/bin/true".as_slice(),
        )]);
        let digest = hex::encode(Sha256::digest(&archive));
        let sidecar = match sidecar {
            Some(s) => s.to_string(),
            None => format!("{}\n", digest),
        };

        let mut files = HashMap::new();
        files.insert(desc.download_url.clone(), archive);
        files.insert(desc.checksum_url.clone(), sidecar.into_bytes());
        FakeIndex { files }
    }

    #[test]
    fn descriptor_linux_url_shape() {
        let desc = ArtifactDescriptor::new(&linux_target("v0.7.0"));
        assert_eq!(
            desc.filename,
            "sccache-v0.7.0-x86_64-unknown-linux-musl.tar.gz"
        );
        assert!(desc
            .download_url
            .ends_with("/v0.7.0/sccache-v0.7.0-x86_64-unknown-linux-musl.tar.gz"));
        assert_eq!(desc.checksum_url, format!("{}.sha256", desc.download_url));
    }

    #[test]
    fn descriptor_windows_uses_zip() {
        let target = ReleaseTarget {
            triple: PlatformTriple::resolve(&HostInfo {
                os: "windows".to_string(),
                arch: "x86_64".to_string(),
            })
            .unwrap(),
            version: "v0.8.1".to_string(),
        };
        let desc = ArtifactDescriptor::new(&target);
        assert_eq!(desc.filename, "sccache-v0.8.1-x86_64-pc-windows-msvc.zip");
    }

    #[tokio::test]
    async fn acquire_verifies_and_unpacks() {
        let target = linux_target("v0.7.0");
        let index = fake_release(&target, None);
        let workdir = TempDir::new().unwrap();

        let tool = acquire(&target, &index, workdir.path()).await.unwrap();

        assert_eq!(tool.artifact.sha256.len(), 64);
        assert!(tool.home_dir.join("sccache").is_file());
        assert!(tool.artifact.local_path.is_file());
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_side_effects() {
        let target = linux_target("v0.7.0");
        // Sidecar off by one character from the true digest
        let index = fake_release(
            &target,
            Some("0000000000000000000000000000000000000000000000000000000000000000"),
        );
        let workdir = TempDir::new().unwrap();

        let result = acquire(&target, &index, workdir.path()).await;
        assert!(matches!(result, Err(CiError::ChecksumMismatch { .. })));

        // Nothing written, nothing extracted
        assert_eq!(std::fs::read_dir(workdir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn sidecar_whitespace_is_trimmed() {
        let target = linux_target("v0.7.0");
        let desc = ArtifactDescriptor::new(&target);
        let mut index = fake_release(&target, None);
        let archive = index.files.get(&desc.download_url).unwrap().clone();
        let digest = hex::encode(Sha256::digest(&archive));
        index
            .files
            .insert(desc.checksum_url.clone(), format!("  {}  \n", digest).into_bytes());
        let workdir = TempDir::new().unwrap();

        assert!(acquire(&target, &index, workdir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_sidecar_aborts() {
        let target = linux_target("v0.7.0");
        let desc = ArtifactDescriptor::new(&target);
        let mut index = fake_release(&target, None);
        index.files.remove(&desc.checksum_url);
        let workdir = TempDir::new().unwrap();

        let result = acquire(&target, &index, workdir.path()).await;
        assert!(matches!(result, Err(CiError::Download { .. })));
    }
}
