// Thresholds for the workload classifier and rule engine
//
// Defaults are the boundaries the explanations are written against; a
// `[analysis]` table in the TOML config may override any subset of them.

use serde::{Deserialize, Serialize};

/// Configuration for classification and rule firing
///
/// # Example
/// ```
/// use why_is_this_slow::analysis::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.wait_io_below, 0.35);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// CPU ratio below this is WAIT_IO_BOUND
    pub wait_io_below: f64,

    /// CPU ratio below this (and at or above `wait_io_below`) is MIXED
    pub mixed_below: f64,

    /// CPU ratio up to and including this is CPU_BOUND; above is PARALLEL_CPU
    pub cpu_bound_max: f64,

    /// `sys_ms / wall_ms` above this fires HIGH_SYS_TIME
    pub high_sys_ratio: f64,

    /// Relative peak-memory growth between runs above this fires MEMORY_GROWTH
    pub memory_growth_ratio: f64,

    /// Absolute CPU ratio increase between runs above this fires CPU_SHIFT
    pub cpu_shift_delta: f64,

    /// Overrides the platform's peak-memory threshold (raw units, 0 disables)
    pub memory_threshold: Option<i64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wait_io_below: 0.35,
            mixed_below: 0.75,
            cpu_bound_max: 1.0,
            high_sys_ratio: 0.25,
            memory_growth_ratio: 0.30,
            cpu_shift_delta: 0.15,
            memory_threshold: None,
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let ratios = [
            ("wait_io_below", self.wait_io_below),
            ("mixed_below", self.mixed_below),
            ("cpu_bound_max", self.cpu_bound_max),
            ("high_sys_ratio", self.high_sys_ratio),
            ("memory_growth_ratio", self.memory_growth_ratio),
            ("cpu_shift_delta", self.cpu_shift_delta),
        ];
        for (name, value) in ratios {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        if !(self.wait_io_below <= self.mixed_below && self.mixed_below <= self.cpu_bound_max) {
            return Err(format!(
                "classification boundaries must ascend: wait_io_below={} mixed_below={} cpu_bound_max={}",
                self.wait_io_below, self.mixed_below, self.cpu_bound_max
            ));
        }

        if let Some(threshold) = self.memory_threshold {
            if threshold < 0 {
                return Err(format!(
                    "memory_threshold must be non-negative, got {}",
                    threshold
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.mixed_below, 0.75);
        assert_eq!(config.cpu_bound_max, 1.0);
        assert_eq!(config.high_sys_ratio, 0.25);
        assert_eq!(config.memory_growth_ratio, 0.30);
        assert_eq!(config.cpu_shift_delta, 0.15);
        assert!(config.memory_threshold.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_descending_boundaries() {
        let config = AnalysisConfig {
            wait_io_below: 0.8,
            mixed_below: 0.5,
            ..AnalysisConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("ascend"));
    }

    #[test]
    fn test_rejects_negative_ratio() {
        let config = AnalysisConfig {
            high_sys_ratio: -0.1,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("high_sys_ratio"));
    }

    #[test]
    fn test_rejects_nan() {
        let config = AnalysisConfig {
            cpu_shift_delta: f64::NAN,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_memory_threshold() {
        let config = AnalysisConfig {
            memory_threshold: Some(-1),
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str("high_sys_ratio = 0.5").unwrap();
        assert_eq!(config.high_sys_ratio, 0.5);
        assert_eq!(config.wait_io_below, 0.35);
    }
}
