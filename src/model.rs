//! Run records and their analysis
//!
//! These types are the persisted JSON shape: `Record { version, run, analysis }`.

use crate::platform::MemoryUnit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Version tag written into every persisted record
pub const RECORD_VERSION: &str = "1.0";

/// One execution's raw measurements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub wall_ms: f64,
    pub user_ms: f64,
    pub sys_ms: f64,
    /// `(user_ms + sys_ms) / wall_ms`, 0 when wall is 0
    pub cpu_ratio: f64,
    #[serde(rename = "max_rss_raw")]
    pub max_rss: i64,
    #[serde(default)]
    pub max_rss_unit: MemoryUnit,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Aggregates over repeated executions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatSummary {
    pub count: usize,
    pub median_wall_ms: f64,
    pub p90_wall_ms: f64,
    pub median_cpu_ratio: f64,
    /// In execution order
    pub samples: Vec<Sample>,
}

/// Outcome of measuring one command invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub command: Vec<String>,
    pub cwd: String,
    pub platform: String,
    pub wall_ms: f64,
    pub user_ms: f64,
    pub sys_ms: f64,
    pub cpu_ratio: f64,
    pub max_rss_raw: i64,
    #[serde(default)]
    pub max_rss_unit: MemoryUnit,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_tail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatSummary>,
    /// Every sample in execution order, also for a single repetition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_samples: Vec<Sample>,
    /// Where the record was persisted; set by the store, never serialized
    #[serde(skip)]
    pub storage_path: Option<PathBuf>,
}

impl RunResult {
    /// Empty record with the given identity, mostly useful for fixtures
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: DateTime::<Utc>::default(),
            command: Vec::new(),
            cwd: String::new(),
            platform: String::new(),
            wall_ms: 0.0,
            user_ms: 0.0,
            sys_ms: 0.0,
            cpu_ratio: 0.0,
            max_rss_raw: 0,
            max_rss_unit: MemoryUnit::Unknown,
            exit_code: 0,
            signal: None,
            stderr_tail: String::new(),
            repeat: None,
            raw_samples: Vec::new(),
            storage_path: None,
        }
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Workload bucket derived from the CPU ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    WaitIoBound,
    Mixed,
    CpuBound,
    ParallelCpu,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::WaitIoBound => "WAIT_IO_BOUND",
            Classification::Mixed => "MIXED",
            Classification::CpuBound => "CPU_BOUND",
            Classification::ParallelCpu => "PARALLEL_CPU",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explanation severity, ordered `Info < Warn < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One fired rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    /// Numeric evidence that made the rule fire
    pub details: String,
    pub suggestions: Vec<String>,
}

impl Explanation {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            details: details.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }
}

/// Classification plus explanations, recomputable from the run alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub classification: Classification,
    /// In rule evaluation order
    pub explanations: Vec<Explanation>,
    pub notes: Vec<String>,
}

/// On-disk record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub version: String,
    pub run: RunResult,
    pub analysis: Analysis,
}

impl Record {
    pub fn new(run: RunResult, analysis: Analysis) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            run,
            analysis,
        }
    }
}
