//! On-disk run records
//!
//! Every measured run is written to `<state>/runs/<id>.json` as an indented
//! `Record { version, run, analysis }`. `explain` and `compare` load them back.

use crate::model::{Analysis, Record, RunResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name used under the platform state directory
pub const APP_DIR: &str = "why-is-this-slow";

/// Errors that can occur while saving or loading records
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("run {id} not found at {}", .path.display())]
    NotFound { id: String, path: PathBuf },

    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid record at {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot determine a state directory: HOME is not set")]
    NoStateDir,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// File-per-run JSON store
#[derive(Debug, Clone)]
pub struct RunStore {
    base: PathBuf,
}

impl RunStore {
    /// Open (and create) a store rooted at `base`
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        let runs = base.join("runs");
        fs::create_dir_all(&runs).map_err(|source| StoreError::Io { path: runs, source })?;
        Ok(Self { base })
    }

    /// Open the store in the platform's default state directory
    pub fn open_default() -> Result<Self> {
        Self::open(default_base()?)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn run_path(&self, id: &str) -> PathBuf {
        self.base.join("runs").join(format!("{}.json", id))
    }

    /// Persist a run and its analysis; returns the file written
    pub fn save(&self, run: &RunResult, analysis: &Analysis) -> Result<PathBuf> {
        let record = Record::new(run.clone(), analysis.clone());
        let path = self.run_path(&run.id);
        let data = serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("saved run {} to {}", run.id, path.display());
        Ok(path)
    }

    /// Load a run by identifier, with `storage_path` filled in
    pub fn load(&self, id: &str) -> Result<(RunResult, Analysis)> {
        let path = self.run_path(id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    id: id.to_string(),
                    path,
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let record: Record = serde_json::from_slice(&data).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        if record.version != crate::model::RECORD_VERSION {
            tracing::warn!(
                "record {} has version {}, expected {}",
                id,
                record.version,
                crate::model::RECORD_VERSION
            );
        }

        let mut run = record.run;
        run.storage_path = Some(path);
        Ok((run, record.analysis))
    }
}

/// Platform state directory for the tool
///
/// Linux honours `$XDG_STATE_HOME`, falling back to `~/.local/state`; macOS
/// uses `~/Library/Application Support`; anything else `~/.why-is-this-slow`.
pub fn default_base() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from);

    match std::env::consts::OS {
        "linux" => {
            if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|x| !x.is_empty()) {
                return Ok(PathBuf::from(xdg).join(APP_DIR));
            }
            let home = home.ok_or(StoreError::NoStateDir)?;
            Ok(home.join(".local").join("state").join(APP_DIR))
        }
        "macos" => {
            let home = home.ok_or(StoreError::NoStateDir)?;
            Ok(home.join("Library").join("Application Support").join(APP_DIR))
        }
        _ => {
            let home = home.ok_or(StoreError::NoStateDir)?;
            Ok(home.join(format!(".{}", APP_DIR)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, Analyzer};
    use crate::model::{RepeatSummary, Sample};
    use crate::platform::{MemoryUnit, PlatformProfile};
    use tempfile::TempDir;

    fn sample_run() -> RunResult {
        let mut run = RunResult::empty("20240102T150405Z-0badf00d");
        run.command = vec!["sh".into(), "-c".into(), "exit 3".into()];
        run.cwd = "/tmp".into();
        run.platform = "linux/x86_64".into();
        run.wall_ms = 12.5;
        run.user_ms = 1.25;
        run.sys_ms = 0.5;
        run.cpu_ratio = 0.14;
        run.max_rss_raw = 3072;
        run.max_rss_unit = MemoryUnit::Kilobytes;
        run.exit_code = 3;
        run.stderr_tail = "boom\n".into();
        run.repeat = Some(RepeatSummary {
            count: 2,
            median_wall_ms: 12.5,
            p90_wall_ms: 13.0,
            median_cpu_ratio: 0.14,
            samples: vec![
                Sample {
                    wall_ms: 12.0,
                    exit_code: 3,
                    ..Sample::default()
                },
                Sample {
                    wall_ms: 13.0,
                    exit_code: 3,
                    signal: Some("SIGTERM".into()),
                    ..Sample::default()
                },
            ],
        });
        run
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        let analysis = Analyzer::new(AnalysisConfig::default(), PlatformProfile::linux("x86_64"))
            .analyze_run(&run);

        let path = store.save(&run, &analysis).unwrap();
        assert_eq!(path, dir.path().join("runs").join(format!("{}.json", run.id)));

        let (loaded, loaded_analysis) = store.load(&run.id).unwrap();
        assert_eq!(loaded.storage_path.as_deref(), Some(path.as_path()));
        let mut expected = run.clone();
        expected.storage_path = Some(path);
        assert_eq!(loaded, expected);
        assert_eq!(loaded_analysis, analysis);
    }

    #[test]
    fn test_record_shape_is_indented() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        let analysis = Analyzer::default().analyze_run(&run);
        let path = store.save(&run, &analysis).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("{\n  \"version\": \"1.0\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("run").is_some());
        assert!(value.get("analysis").is_some());
    }

    #[test]
    fn test_load_missing_run_includes_id_and_path() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let err = store.load("missing-id").unwrap_err();
        let path = dir.path().join("runs").join("missing-id.json");
        match &err {
            StoreError::NotFound { id, path: p } => {
                assert_eq!(id, "missing-id");
                assert_eq!(p, &path);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        let msg = err.to_string();
        assert!(msg.contains("missing-id"));
        assert!(msg.contains(&path.display().to_string()));
    }

    #[test]
    fn test_corrupt_record_is_json_error() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        std::fs::write(store.run_path("bad"), b"{ not json").unwrap();
        assert!(matches!(store.load("bad"), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_open_creates_runs_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("nested").join("state");
        let store = RunStore::open(&base).unwrap();
        assert!(base.join("runs").is_dir());
        assert_eq!(store.base(), base.as_path());
    }
}
