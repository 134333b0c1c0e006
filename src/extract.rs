//! Archive extraction
//!
//! Unpacks release artifacts (`tar.gz` everywhere, `zip` on Windows)
//! into a destination directory, preserving unix mode bits. Extraction
//! failures are fatal to acquisition and never retried.

use crate::error::{CiError, CiResult};
use crate::platform::ArchiveKind;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tracing::debug;

/// Unpack `archive` into `dest` according to its format
pub fn extract_archive(kind: ArchiveKind, archive: &Path, dest: &Path) -> CiResult<()> {
    std::fs::create_dir_all(dest)
        .map_err(|e| CiError::io(format!("creating {}", dest.display()), e))?;

    match kind {
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
        ArchiveKind::Zip => extract_zip(archive, dest),
    }
}

/// Unpack a gzip-compressed tarball into `dest`
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> CiResult<()> {
    let file = File::open(archive).map_err(|e| extract_err(archive, e.to_string()))?;
    let decoder = GzDecoder::new(file);
    let mut tarball = Archive::new(decoder);

    tarball
        .unpack(dest)
        .map_err(|e| extract_err(archive, e.to_string()))?;

    debug!(archive = %archive.display(), dest = %dest.display(), "extracted tarball");
    Ok(())
}

/// Unpack a zip archive into `dest`
pub fn extract_zip(archive: &Path, dest: &Path) -> CiResult<()> {
    let file = File::open(archive).map_err(|e| extract_err(archive, e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extract_err(archive, e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| extract_err(archive, e.to_string()))?;

        // Entries with paths escaping the destination are skipped
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| extract_err(archive, e.to_string()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| extract_err(archive, e.to_string()))?;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| extract_err(archive, e.to_string()))?;
        std::fs::write(&outpath, &contents).map_err(|e| extract_err(archive, e.to_string()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(mode);
            std::fs::set_permissions(&outpath, perms)
                .map_err(|e| extract_err(archive, e.to_string()))?;
        }
    }

    debug!(archive = %archive.display(), dest = %dest.display(), "extracted zip");
    Ok(())
}

fn extract_err(archive: &Path, reason: String) -> CiError {
    CiError::Extract {
        archive: archive.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_tar_gz(dir: &Path, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join("fixture.tar.gz");
        let file = File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    fn make_zip(dir: &Path, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join("fixture.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);

        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn tar_gz_round_trip() {
        let dir = TempDir::new().unwrap();
        let archive = make_tar_gz(
            dir.path(),
            &[("sccache-v0.7.0-x86_64-unknown-linux-musl/sccache", b"elf")],
        );
        let dest = dir.path().join("out");

        extract_archive(ArchiveKind::TarGz, &archive, &dest).unwrap();

        let extracted = dest.join("sccache-v0.7.0-x86_64-unknown-linux-musl/sccache");
        assert_eq!(std::fs::read(extracted).unwrap(), b"elf");
    }

    #[test]
    fn zip_round_trip_preserves_mode() {
        let dir = TempDir::new().unwrap();
        let archive = make_zip(dir.path(), &[("tool/sccache.exe", b"mz")]);
        let dest = dir.path().join("out");

        extract_archive(ArchiveKind::Zip, &archive, &dest).unwrap();

        let extracted = dest.join("tool/sccache.exe");
        assert_eq!(std::fs::read(&extracted).unwrap(), b"mz");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&extracted).unwrap().permissions().mode();
            assert_ne!(mode & 0o111, 0);
        }
    }

    #[test]
    fn corrupt_tarball_is_fatal() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bogus.tar.gz");
        std::fs::write(&archive, b"this is not gzip").unwrap();

        let result = extract_tar_gz(&archive, &dir.path().join("out"));
        assert!(matches!(result, Err(CiError::Extract { .. })));
    }

    #[test]
    fn missing_archive_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = extract_zip(&dir.path().join("absent.zip"), &dir.path().join("out"));
        assert!(matches!(result, Err(CiError::Extract { .. })));
    }
}
