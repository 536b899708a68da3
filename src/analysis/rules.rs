//! Rule table for run explanations
//!
//! Each rule is a pure function of a `RuleContext`. The analyzer evaluates
//! them in table order and concatenates whatever fires:
//!
//! 1. `BASELINE` - always, text chosen by classification
//! 2. `COMPARISON_BASE` - comparisons only, names both runs
//! 3. `MEMORY_GROWTH` - comparisons only, peak memory grew past the ratio
//! 4. `CPU_SHIFT` - comparisons only, CPU ratio rose past the delta
//! 5. `MEMORY_PRESSURE` - peak memory above the platform threshold
//! 6. `HIGH_SYS_TIME` - system time dominates wall clock

use crate::analysis::config::AnalysisConfig;
use crate::model::{Classification, Explanation, RunResult, Severity};

/// Inputs visible to every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The run being explained (run B in a comparison)
    pub subject: &'a RunResult,
    /// Run A when comparing
    pub baseline: Option<&'a RunResult>,
    pub classification: Classification,
    pub config: &'a AnalysisConfig,
    /// Raw peak-memory threshold; 0 disables memory pressure
    pub memory_threshold: i64,
}

/// One diagnostic rule
pub trait Rule: Send + Sync {
    /// Stable identifier carried by the explanation
    fn id(&self) -> &'static str;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation>;
}

/// Rules in evaluation order
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(Baseline),
        Box::new(ComparisonBase),
        Box::new(MemoryGrowth),
        Box::new(CpuShift),
        Box::new(MemoryPressure),
        Box::new(HighSysTime),
    ]
}

/// Always fires; describes the workload bucket
#[derive(Debug, Clone, Copy)]
pub struct Baseline;

impl Rule for Baseline {
    fn id(&self) -> &'static str {
        "BASELINE"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let (message, suggestions): (&str, [&str; 2]) = match ctx.classification {
            Classification::WaitIoBound => (
                "Likely waiting on I/O or sleeps",
                [
                    "Check if the command is expected to wait on I/O, network or locks",
                    "Look for sleeps, polling loops or serialized remote calls",
                ],
            ),
            Classification::Mixed => (
                "Mixed CPU and waiting",
                [
                    "Split the run into phases to see which one waits",
                    "Trim unnecessary work or add tracing if unsure",
                ],
            ),
            Classification::CpuBound => (
                "Mostly CPU-bound",
                [
                    "Profile hot functions; the command is limited by a single core",
                    "Consider parallelizing independent work",
                ],
            ),
            Classification::ParallelCpu => (
                "CPU time exceeds wall (parallel or multi-process)",
                [
                    "Work already spans several cores; check for contention or oversubscription",
                    "Compare against a run with fewer workers",
                ],
            ),
        };

        Some(
            Explanation::new(
                self.id(),
                Severity::Info,
                message,
                format!("cpu_ratio={:.2}", ctx.subject.cpu_ratio),
            )
            .with_suggestions(suggestions),
        )
    }
}

/// Records which two runs are compared
#[derive(Debug, Clone, Copy)]
pub struct ComparisonBase;

impl Rule for ComparisonBase {
    fn id(&self) -> &'static str {
        "COMPARISON_BASE"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let a = ctx.baseline?;
        Some(
            Explanation::new(
                self.id(),
                Severity::Info,
                "Comparing run B against run A",
                format!("A={} B={}", a.id, ctx.subject.id),
            )
            .with_suggestions([
                "Focus on regressions in wall time and memory first",
                "Re-run with tracing if differences are unexpected",
            ]),
        )
    }
}

/// Peak memory grew notably between runs
#[derive(Debug, Clone, Copy)]
pub struct MemoryGrowth;

impl Rule for MemoryGrowth {
    fn id(&self) -> &'static str {
        "MEMORY_GROWTH"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let a = ctx.baseline?;
        let b = ctx.subject;
        // zero is "no data", not "no memory"
        if a.max_rss_raw <= 0 || b.max_rss_raw <= 0 {
            return None;
        }
        let growth = (b.max_rss_raw - a.max_rss_raw) as f64 / a.max_rss_raw as f64;
        if growth <= ctx.config.memory_growth_ratio {
            return None;
        }

        Some(
            Explanation::new(
                self.id(),
                Severity::Warn,
                "Memory usage increased notably",
                format!(
                    "run_b max_rss {} vs run_a {} (+{:.0}%)",
                    b.max_rss_raw,
                    a.max_rss_raw,
                    growth * 100.0
                ),
            )
            .with_suggestions([
                "Check for new caches or data growth between runs",
                "Profile allocations or compare inputs to explain the jump",
            ]),
        )
    }
}

/// CPU ratio rose between runs
#[derive(Debug, Clone, Copy)]
pub struct CpuShift;

impl Rule for CpuShift {
    fn id(&self) -> &'static str {
        "CPU_SHIFT"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let a = ctx.baseline?;
        let b = ctx.subject;
        if a.cpu_ratio == 0.0 {
            return None;
        }
        let shift = b.cpu_ratio - a.cpu_ratio;
        if shift.is_nan() || shift <= ctx.config.cpu_shift_delta {
            return None;
        }

        Some(
            Explanation::new(
                self.id(),
                Severity::Info,
                "CPU utilization changed",
                format!("cpu_ratio a={:.2} b={:.2}", a.cpu_ratio, b.cpu_ratio),
            )
            .with_suggestions(["Confirm expected workload; if not, inspect CPU-heavy sections"]),
        )
    }
}

/// Peak memory above the platform threshold
#[derive(Debug, Clone, Copy)]
pub struct MemoryPressure;

impl Rule for MemoryPressure {
    fn id(&self) -> &'static str {
        "MEMORY_PRESSURE"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let threshold = ctx.memory_threshold;
        if threshold <= 0 || ctx.subject.max_rss_raw <= threshold {
            return None;
        }

        Some(
            Explanation::new(
                self.id(),
                Severity::Warn,
                "Memory usage seems high",
                format!(
                    "max_rss={} ({}) threshold={}",
                    ctx.subject.max_rss_raw, ctx.subject.max_rss_unit, threshold
                ),
            )
            .with_suggestions([
                "Inspect allocations or load size; reduce concurrency if unbounded",
                "Use a heap profiler for precise attribution",
            ]),
        )
    }
}

/// System CPU time is a large share of wall clock
#[derive(Debug, Clone, Copy)]
pub struct HighSysTime;

impl Rule for HighSysTime {
    fn id(&self) -> &'static str {
        "HIGH_SYS_TIME"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Explanation> {
        let run = ctx.subject;
        if run.wall_ms.is_nan() || run.wall_ms <= 0.0 {
            return None;
        }
        let ratio = run.sys_ms / run.wall_ms;
        if ratio.is_nan() || ratio <= ctx.config.high_sys_ratio {
            return None;
        }

        Some(
            Explanation::new(
                self.id(),
                Severity::Warn,
                "High system time relative to wall clock",
                format!(
                    "sys_ms={:.1} wall_ms={:.1} sys_ratio={:.2}",
                    run.sys_ms, run.wall_ms, ratio
                ),
            )
            .with_suggestions([
                "Inspect disk or network I/O, or frequent context switches",
                "Use strace/dtruss to see syscalls if precision is needed",
            ]),
        )
    }
}
