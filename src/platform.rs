//! Platform profile: memory units and thresholds per operating system
//!
//! `ru_maxrss` is reported in kilobytes on Linux and in bytes on macOS. The
//! profile carries that knowledge as data so the rusage adapter and the rule
//! engine can be exercised against any simulated platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 512 MiB expressed in kilobytes
pub const KILOBYTE_MEMORY_THRESHOLD: i64 = 512 * 1024;

/// 512 MiB expressed in bytes
pub const BYTE_MEMORY_THRESHOLD: i64 = 512 * 1024 * 1024;

/// Scale of the raw peak-memory value reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryUnit {
    Kilobytes,
    Bytes,
    /// Resource usage is not available on this platform
    #[default]
    Unknown,
}

impl MemoryUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryUnit::Kilobytes => "kilobytes",
            MemoryUnit::Bytes => "bytes",
            MemoryUnit::Unknown => "unknown",
        }
    }

    /// Absolute peak-memory threshold for the memory pressure rule.
    ///
    /// Zero means the rule never fires.
    pub fn memory_threshold(&self) -> i64 {
        match self {
            MemoryUnit::Kilobytes => KILOBYTE_MEMORY_THRESHOLD,
            MemoryUnit::Bytes => BYTE_MEMORY_THRESHOLD,
            MemoryUnit::Unknown => 0,
        }
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system identity plus the resource-usage conventions that go with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub os: String,
    pub arch: String,
    pub memory_unit: MemoryUnit,
    pub memory_threshold: i64,
}

impl PlatformProfile {
    /// Linux: `ru_maxrss` in kilobytes
    pub fn linux(arch: impl Into<String>) -> Self {
        Self::with_unit("linux", arch, MemoryUnit::Kilobytes)
    }

    /// macOS: `ru_maxrss` in bytes
    pub fn macos(arch: impl Into<String>) -> Self {
        Self::with_unit("macos", arch, MemoryUnit::Bytes)
    }

    /// Platform without resource usage support
    pub fn unsupported(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::with_unit(os, arch, MemoryUnit::Unknown)
    }

    fn with_unit(os: impl Into<String>, arch: impl Into<String>, unit: MemoryUnit) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            memory_unit: unit,
            memory_threshold: unit.memory_threshold(),
        }
    }

    /// Profile of the machine this binary runs on
    pub fn detect() -> Self {
        let arch = std::env::consts::ARCH;
        match std::env::consts::OS {
            "linux" | "android" => Self::linux(arch),
            "macos" | "ios" => Self::macos(arch),
            other => Self::unsupported(other, arch),
        }
    }

    /// Free-form `<os>/<arch>` tag recorded on every run
    pub fn tag(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }

    pub fn supports_usage(&self) -> bool {
        self.memory_unit != MemoryUnit::Unknown
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::detect()
    }
}
