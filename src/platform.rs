//! Host platform resolution
//!
//! Maps the runner's OS/CPU pair onto the vendor's release triple.
//! Resolution is a pure function of an injected `HostInfo` so tests never
//! have to mock the process environment.

use crate::error::{CiError, CiResult};
use std::fmt;

/// Ambient host facts, captured once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    /// Capture the facts of the current process
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Operating systems with published sccache release binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Darwin,
    Windows,
    Linux,
}

/// CPU architectures with published sccache release binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    Armv7,
}

/// Archive format of a release artifact, a packaging detail independent
/// of the triple string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// File extension as it appears in release artifact names
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// A validated (os, arch) pair that renders as the release triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTriple {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformTriple {
    /// Resolve the release triple for a host.
    ///
    /// Any pair outside the supported table is `UnsupportedPlatform`;
    /// the unsupported identifiers are carried in the error, never
    /// interpolated into a triple string.
    pub fn resolve(host: &HostInfo) -> CiResult<Self> {
        let os = match host.os.as_str() {
            "macos" => Os::Darwin,
            "windows" => Os::Windows,
            "linux" => Os::Linux,
            _ => {
                return Err(CiError::UnsupportedPlatform {
                    os: host.os.clone(),
                    arch: host.arch.clone(),
                })
            }
        };

        let arch = match host.arch.as_str() {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Aarch64,
            "arm" => Arch::Armv7,
            _ => {
                return Err(CiError::UnsupportedPlatform {
                    os: host.os.clone(),
                    arch: host.arch.clone(),
                })
            }
        };

        // 32-bit arm is only published for linux
        if arch == Arch::Armv7 && os != Os::Linux {
            return Err(CiError::UnsupportedPlatform {
                os: host.os.clone(),
                arch: host.arch.clone(),
            });
        }

        Ok(Self { os, arch })
    }

    /// Archive format the vendor packages this OS with
    pub fn archive_kind(&self) -> ArchiveKind {
        match self.os {
            Os::Windows => ArchiveKind::Zip,
            _ => ArchiveKind::TarGz,
        }
    }

    fn arch_str(&self) -> &'static str {
        match self.arch {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Armv7 => "armv7",
        }
    }

    fn os_str(&self) -> &'static str {
        match (self.os, self.arch) {
            (Os::Darwin, _) => "apple-darwin",
            (Os::Windows, _) => "pc-windows-msvc",
            (Os::Linux, Arch::Armv7) => "unknown-linux-musleabi",
            (Os::Linux, _) => "unknown-linux-musl",
        }
    }

    /// Name of the sccache executable on this OS
    pub fn exe_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "sccache.exe",
            _ => "sccache",
        }
    }
}

impl fmt::Display for PlatformTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch_str(), self.os_str())
    }
}
