//! Percentile aggregation over repeated-run samples
//!
//! Linear interpolation between closest ranks: for percentile `p` the
//! fractional position `(p / 100) * (n - 1)` into the sorted values is blended
//! between its floor and ceiling neighbours.

use crate::model::{RepeatSummary, Sample};
use crate::platform::MemoryUnit;

/// Percentile of `values` (0..=100). Empty input returns 0.
///
/// The caller's slice is left untouched; a sorted copy is used.
///
/// # Example
/// ```
/// use why_is_this_slow::stats::percentile;
///
/// assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 25.0), 17.5);
/// ```
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 100.0 {
        return sorted[sorted.len() - 1];
    }

    let pos = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let weight = pos - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// 50th percentile
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Medians of the per-sample timing fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMedians {
    pub wall_ms: f64,
    pub p90_wall_ms: f64,
    pub user_ms: f64,
    pub sys_ms: f64,
    pub cpu_ratio: f64,
}

/// Aggregate samples field by field
pub fn summarize_samples(samples: &[Sample]) -> SampleMedians {
    let column = |f: fn(&Sample) -> f64| samples.iter().map(f).collect::<Vec<_>>();
    let wall = column(|s| s.wall_ms);

    SampleMedians {
        wall_ms: median(&wall),
        p90_wall_ms: percentile(&wall, 90.0),
        user_ms: median(&column(|s| s.user_ms)),
        sys_ms: median(&column(|s| s.sys_ms)),
        cpu_ratio: median(&column(|s| s.cpu_ratio)),
    }
}

/// Run-level fields that are carried over from samples rather than smoothed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleOutcome {
    /// Highest peak memory of any sample
    pub max_rss: i64,
    /// Unit of the sample holding `max_rss`, else the first known unit
    pub max_rss_unit: MemoryUnit,
    /// Exit code of the last sample that exited nonzero, else 0
    pub exit_code: i32,
    /// Signal recorded alongside `exit_code`
    pub signal: Option<String>,
}

/// Fold samples (in execution order) into their run-level outcome
pub fn fold_outcome(samples: &[Sample]) -> SampleOutcome {
    let mut outcome = SampleOutcome::default();
    for sample in samples {
        if sample.exit_code != 0 {
            outcome.exit_code = sample.exit_code;
            outcome.signal = sample.signal.clone();
        }
        if sample.max_rss > outcome.max_rss {
            outcome.max_rss = sample.max_rss;
            outcome.max_rss_unit = sample.max_rss_unit;
        } else if outcome.max_rss_unit == MemoryUnit::Unknown {
            outcome.max_rss_unit = sample.max_rss_unit;
        }
    }
    outcome
}

/// Build the repeat summary embedded in a repeated run
pub fn repeat_summary(medians: &SampleMedians, samples: Vec<Sample>) -> RepeatSummary {
    RepeatSummary {
        count: samples.len(),
        median_wall_ms: medians.wall_ms,
        p90_wall_ms: medians.p90_wall_ms,
        median_cpu_ratio: medians.cpu_ratio,
        samples,
    }
}
