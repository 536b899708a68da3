//! Workload classification and explainable diagnostics
//!
//! The analyzer is a pure, total function over run records: every input,
//! however degenerate, yields a valid `Analysis`. Malformed or zero-valued
//! fields make rules stay silent rather than fail.

mod config;
pub mod rules;

pub use config::AnalysisConfig;
pub use rules::{default_rules, Rule, RuleContext};

use crate::model::{Analysis, Classification, RunResult};
use crate::platform::PlatformProfile;

/// Bucket a CPU ratio using the default boundaries
///
/// # Example
/// ```
/// use why_is_this_slow::analysis::classify;
/// use why_is_this_slow::model::Classification;
///
/// assert_eq!(classify(0.1), Classification::WaitIoBound);
/// assert_eq!(classify(1.2), Classification::ParallelCpu);
/// ```
pub fn classify(cpu_ratio: f64) -> Classification {
    classify_with(cpu_ratio, &AnalysisConfig::default())
}

/// Bucket a CPU ratio. NaN carries no CPU information and lands in WAIT_IO_BOUND.
pub fn classify_with(cpu_ratio: f64, config: &AnalysisConfig) -> Classification {
    if cpu_ratio.is_nan() || cpu_ratio < config.wait_io_below {
        Classification::WaitIoBound
    } else if cpu_ratio < config.mixed_below {
        Classification::Mixed
    } else if cpu_ratio <= config.cpu_bound_max {
        Classification::CpuBound
    } else {
        Classification::ParallelCpu
    }
}

/// Evaluates the rule table against one run or a pair of runs
pub struct Analyzer {
    config: AnalysisConfig,
    platform: PlatformProfile,
    rules: Vec<Box<dyn Rule>>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, platform: PlatformProfile) -> Self {
        Self {
            config,
            platform,
            rules: default_rules(),
        }
    }

    /// Replace the rule table (evaluation order is the vector order)
    pub fn with_rules(mut self, rules: Vec<Box<dyn Rule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    /// Peak-memory threshold for a run, in the run's own memory unit
    ///
    /// The config override wins; otherwise the threshold follows the unit the
    /// run was recorded in, so a stored record keeps its meaning on any host.
    /// An `unknown` unit yields 0 and the memory pressure rule stays silent.
    pub fn memory_threshold(&self, run: &RunResult) -> i64 {
        self.config
            .memory_threshold
            .unwrap_or_else(|| run.max_rss_unit.memory_threshold())
    }

    pub fn classify(&self, cpu_ratio: f64) -> Classification {
        classify_with(cpu_ratio, &self.config)
    }

    /// Explain a single run
    pub fn analyze_run(&self, run: &RunResult) -> Analysis {
        self.evaluate(run, None)
    }

    /// Explain how run `b` differs from baseline run `a`
    ///
    /// The classification reported is always run B's.
    pub fn compare(&self, a: &RunResult, b: &RunResult) -> Analysis {
        self.evaluate(b, Some(a))
    }

    fn evaluate(&self, subject: &RunResult, baseline: Option<&RunResult>) -> Analysis {
        let classification = self.classify(subject.cpu_ratio);
        let ctx = RuleContext {
            subject,
            baseline,
            classification,
            config: &self.config,
            memory_threshold: self.memory_threshold(subject),
        };

        let explanations: Vec<_> = self.rules.iter().filter_map(|r| r.evaluate(&ctx)).collect();
        tracing::debug!(
            run = %subject.id,
            classification = %classification,
            fired = explanations.len(),
            "analysis complete"
        );

        Analysis {
            classification,
            explanations,
            notes: vec![self.memory_unit_note(subject)],
        }
    }

    fn memory_unit_note(&self, run: &RunResult) -> String {
        format!("max_rss unit for {}: {}", self.platform.os, run.max_rss_unit)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default(), PlatformProfile::detect())
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<_> = self.rules.iter().map(|r| r.id()).collect();
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .field("rules", &ids)
            .finish()
    }
}

/// Explain a run on the current platform with default thresholds
pub fn analyze_run(run: &RunResult) -> Analysis {
    Analyzer::default().analyze_run(run)
}

/// Compare two runs on the current platform with default thresholds
pub fn compare_analysis(a: &RunResult, b: &RunResult) -> Analysis {
    Analyzer::default().compare(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use crate::platform::MemoryUnit;

    fn linux() -> Analyzer {
        Analyzer::new(AnalysisConfig::default(), PlatformProfile::linux("x86_64"))
    }

    fn ids(analysis: &Analysis) -> Vec<&str> {
        analysis.explanations.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_classify_thresholds() {
        let cases = [
            (0.1, Classification::WaitIoBound),
            (0.5, Classification::Mixed),
            (0.9, Classification::CpuBound),
            (1.2, Classification::ParallelCpu),
        ];
        for (ratio, want) in cases {
            assert_eq!(classify(ratio), want, "ratio {}", ratio);
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(0.3499), Classification::WaitIoBound);
        assert_eq!(classify(0.35), Classification::Mixed);
        assert_eq!(classify(0.75), Classification::CpuBound);
        assert_eq!(classify(1.0), Classification::CpuBound);
        assert_eq!(classify(1.0001), Classification::ParallelCpu);
        assert_eq!(classify(f64::NEG_INFINITY), Classification::WaitIoBound);
        assert_eq!(classify(f64::INFINITY), Classification::ParallelCpu);
        assert_eq!(classify(f64::NAN), Classification::WaitIoBound);
    }

    #[test]
    fn test_all_zero_run_yields_baseline_only() {
        let analysis = linux().analyze_run(&RunResult::empty("zero"));
        assert_eq!(analysis.classification, Classification::WaitIoBound);
        assert_eq!(ids(&analysis), vec!["BASELINE"]);
        assert_eq!(analysis.notes, vec!["max_rss unit for linux: unknown".to_string()]);
    }

    #[test]
    fn test_single_run_rule_order() {
        let mut run = RunResult::empty("r");
        run.wall_ms = 1000.0;
        run.sys_ms = 400.0;
        run.user_ms = 100.0;
        run.cpu_ratio = 0.5;
        run.max_rss_raw = 600 * 1024;
        run.max_rss_unit = MemoryUnit::Kilobytes;

        let analysis = linux().analyze_run(&run);
        assert_eq!(analysis.classification, Classification::Mixed);
        assert_eq!(ids(&analysis), vec!["BASELINE", "MEMORY_PRESSURE", "HIGH_SYS_TIME"]);
        assert_eq!(analysis.notes[0], "max_rss unit for linux: kilobytes");
    }

    #[test]
    fn test_threshold_follows_recorded_unit() {
        let mut kb = RunResult::empty("kb");
        kb.max_rss_raw = 600 * 1024;
        kb.max_rss_unit = MemoryUnit::Kilobytes;

        let mut bytes = RunResult::empty("bytes");
        bytes.max_rss_raw = 100 * 1024 * 1024;
        bytes.max_rss_unit = MemoryUnit::Bytes;

        let on_macos = Analyzer::new(AnalysisConfig::default(), PlatformProfile::macos("aarch64"));
        assert!(ids(&linux().analyze_run(&kb)).contains(&"MEMORY_PRESSURE"));
        assert!(ids(&on_macos.analyze_run(&kb)).contains(&"MEMORY_PRESSURE"));
        assert!(!ids(&linux().analyze_run(&bytes)).contains(&"MEMORY_PRESSURE"));
        assert!(!ids(&on_macos.analyze_run(&bytes)).contains(&"MEMORY_PRESSURE"));
    }

    #[test]
    fn test_bytes_run_compared_on_linux_stays_quiet() {
        let mut a = RunResult::empty("a");
        a.max_rss_raw = 90 * 1024 * 1024;
        a.max_rss_unit = MemoryUnit::Bytes;
        let mut b = RunResult::empty("b");
        b.max_rss_raw = 100 * 1024 * 1024;
        b.max_rss_unit = MemoryUnit::Bytes;

        let analysis = linux().compare(&a, &b);
        assert!(!ids(&analysis).contains(&"MEMORY_PRESSURE"));

        b.max_rss_raw = 600 * 1024 * 1024;
        let analysis = linux().compare(&a, &b);
        let pressure = analysis
            .explanations
            .iter()
            .find(|e| e.id == "MEMORY_PRESSURE")
            .unwrap();
        assert_eq!(
            pressure.details,
            format!("max_rss={} (bytes) threshold={}", 600 * 1024 * 1024, 512 * 1024 * 1024)
        );
    }

    #[test]
    fn test_unknown_unit_never_under_pressure() {
        let mut run = RunResult::empty("r");
        run.max_rss_raw = i64::MAX;
        run.max_rss_unit = MemoryUnit::Unknown;
        assert_eq!(linux().memory_threshold(&run), 0);
        assert!(!ids(&linux().analyze_run(&run)).contains(&"MEMORY_PRESSURE"));
    }

    #[test]
    fn test_config_threshold_override() {
        let config = AnalysisConfig {
            memory_threshold: Some(10),
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config, PlatformProfile::unsupported("haiku", "x86_64"));
        let mut run = RunResult::empty("r");
        assert_eq!(analyzer.memory_threshold(&run), 10);
        run.max_rss_raw = 11;
        assert!(ids(&analyzer.analyze_run(&run)).contains(&"MEMORY_PRESSURE"));
    }

    #[test]
    fn test_compare_full_rule_order() {
        let mut a = RunResult::empty("a");
        a.max_rss_raw = 400 * 1024;
        a.cpu_ratio = 0.3;
        let mut b = RunResult::empty("b");
        b.max_rss_raw = 700 * 1024;
        b.max_rss_unit = MemoryUnit::Kilobytes;
        b.cpu_ratio = 0.9;
        b.wall_ms = 100.0;
        b.sys_ms = 60.0;

        let analysis = linux().compare(&a, &b);
        assert_eq!(analysis.classification, Classification::CpuBound);
        assert_eq!(
            ids(&analysis),
            vec![
                "BASELINE",
                "COMPARISON_BASE",
                "MEMORY_GROWTH",
                "CPU_SHIFT",
                "MEMORY_PRESSURE",
                "HIGH_SYS_TIME"
            ]
        );
        assert_eq!(analysis.explanations[1].details, "A=a B=b");
    }

    #[test]
    fn test_compare_classifies_run_b() {
        let mut a = RunResult::empty("a");
        a.cpu_ratio = 1.5;
        let mut b = RunResult::empty("b");
        b.cpu_ratio = 0.1;
        let analysis = linux().compare(&a, &b);
        assert_eq!(analysis.classification, Classification::WaitIoBound);
        assert_eq!(analysis.explanations[0].severity, Severity::Info);
    }

    #[test]
    fn test_custom_rule_table() {
        let analyzer = linux().with_rules(vec![Box::new(rules::HighSysTime)]);
        let analysis = analyzer.analyze_run(&RunResult::empty("r"));
        assert!(analysis.explanations.is_empty());
        assert_eq!(analysis.notes.len(), 1);
    }

    #[test]
    fn test_analysis_is_recomputable() {
        let mut run = RunResult::empty("r");
        run.wall_ms = 200.0;
        run.user_ms = 180.0;
        run.cpu_ratio = 0.9;
        let analyzer = linux();
        assert_eq!(analyzer.analyze_run(&run), analyzer.analyze_run(&run));
    }
}
