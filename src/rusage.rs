//! Resource usage extraction for finished child processes
//!
//! The kernel hands back a `struct rusage` from `wait4(2)`. Adapters translate
//! it into milliseconds and a declared memory unit. A platform without rusage
//! support gets `UnsupportedAdapter`, which reports "no data" instead of zero.

use crate::platform::{MemoryUnit, PlatformProfile};

/// Plain copy of the fields we read out of `libc::rusage`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawUsage {
    pub user_sec: i64,
    pub user_usec: i64,
    pub sys_sec: i64,
    pub sys_usec: i64,
    pub max_rss: i64,
}

impl From<&libc::rusage> for RawUsage {
    fn from(ru: &libc::rusage) -> Self {
        Self {
            user_sec: ru.ru_utime.tv_sec as i64,
            user_usec: ru.ru_utime.tv_usec as i64,
            sys_sec: ru.ru_stime.tv_sec as i64,
            sys_usec: ru.ru_stime.tv_usec as i64,
            max_rss: ru.ru_maxrss as i64,
        }
    }
}

/// CPU time and peak memory of one finished child
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildUsage {
    pub user_ms: f64,
    pub sys_ms: f64,
    pub max_rss: i64,
    pub unit: MemoryUnit,
    /// `false` means the numbers above carry no information
    pub ok: bool,
}

impl ChildUsage {
    pub fn unknown() -> Self {
        Self {
            user_ms: 0.0,
            sys_ms: 0.0,
            max_rss: 0,
            unit: MemoryUnit::Unknown,
            ok: false,
        }
    }
}

/// Translates raw kernel accounting into normalized usage
pub trait UsageAdapter: Send + Sync {
    /// Unit of `ChildUsage::max_rss` produced by this adapter
    fn memory_unit(&self) -> MemoryUnit;

    /// `raw` is `None` when the wait call did not return accounting data
    fn extract(&self, raw: Option<&RawUsage>) -> ChildUsage;
}

/// `getrusage`-style accounting with a platform-specific `ru_maxrss` scale
#[derive(Debug, Clone, Copy)]
pub struct RusageAdapter {
    unit: MemoryUnit,
}

impl RusageAdapter {
    pub fn new(unit: MemoryUnit) -> Self {
        Self { unit }
    }
}

impl UsageAdapter for RusageAdapter {
    fn memory_unit(&self) -> MemoryUnit {
        self.unit
    }

    fn extract(&self, raw: Option<&RawUsage>) -> ChildUsage {
        let Some(raw) = raw else {
            return ChildUsage::unknown();
        };
        ChildUsage {
            user_ms: timeval_ms(raw.user_sec, raw.user_usec),
            sys_ms: timeval_ms(raw.sys_sec, raw.sys_usec),
            max_rss: raw.max_rss,
            unit: self.unit,
            ok: true,
        }
    }
}

/// Fallback for platforms where resource usage is unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedAdapter;

impl UsageAdapter for UnsupportedAdapter {
    fn memory_unit(&self) -> MemoryUnit {
        MemoryUnit::Unknown
    }

    fn extract(&self, _raw: Option<&RawUsage>) -> ChildUsage {
        ChildUsage::unknown()
    }
}

/// Pick the adapter matching a platform profile
pub fn adapter_for(profile: &PlatformProfile) -> Box<dyn UsageAdapter> {
    match profile.memory_unit {
        MemoryUnit::Unknown => Box::new(UnsupportedAdapter),
        unit => Box::new(RusageAdapter::new(unit)),
    }
}

fn timeval_ms(sec: i64, usec: i64) -> f64 {
    sec as f64 * 1000.0 + usec as f64 / 1000.0
}
