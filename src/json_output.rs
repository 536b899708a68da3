//! JSON output for `--json`
//!
//! Both `run`/`explain` and `compare` print the record shape
//! `{version, run, analysis}`; for comparisons `run` is `{a, b}`.

use crate::model::{Analysis, RunResult, RECORD_VERSION};
use serde::Serialize;
use std::io::Write;

/// Record framing around any run payload
#[derive(Debug, Serialize)]
pub struct JsonRecord<'a, R: Serialize> {
    pub version: &'static str,
    pub run: R,
    pub analysis: &'a Analysis,
}

/// The two runs of a comparison, A is the baseline
#[derive(Debug, Serialize)]
pub struct ComparedRuns<'a> {
    pub a: &'a RunResult,
    pub b: &'a RunResult,
}

impl<'a, R: Serialize> JsonRecord<'a, R> {
    pub fn new(run: R, analysis: &'a Analysis) -> Self {
        Self {
            version: RECORD_VERSION,
            run,
            analysis,
        }
    }

    /// Serialize to an indented JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write `{version, run, analysis}` followed by a newline
pub fn write_json<W: Write, R: Serialize>(
    out: &mut W,
    run: R,
    analysis: &Analysis,
) -> anyhow::Result<()> {
    let json = JsonRecord::new(run, analysis).to_json()?;
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Write a comparison as `{version, run: {a, b}, analysis}`
pub fn write_compare_json<W: Write>(
    out: &mut W,
    a: &RunResult,
    b: &RunResult,
    analysis: &Analysis,
) -> anyhow::Result<()> {
    write_json(out, ComparedRuns { a, b }, analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classification, Explanation, Record, Severity};

    fn analysis() -> Analysis {
        Analysis {
            classification: Classification::Mixed,
            explanations: vec![Explanation::new(
                "BASELINE",
                Severity::Info,
                "Mixed CPU and waiting",
                "cpu_ratio=0.50",
            )],
            notes: vec!["max_rss unit for linux: kilobytes".into()],
        }
    }

    #[test]
    fn test_single_run_matches_record_shape() {
        let mut run = RunResult::empty("20240102T150405Z-00c0ffee");
        run.wall_ms = 10.0;
        let analysis = analysis();

        let mut buf = Vec::new();
        write_json(&mut buf, &run, &analysis).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("}\n"));

        let record: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(record.version, "1.0");
        assert_eq!(record.run, run);
        assert_eq!(record.analysis, analysis);
    }

    #[test]
    fn test_compare_nests_runs() {
        let a = RunResult::empty("run-a");
        let b = RunResult::empty("run-b");
        let mut buf = Vec::new();
        write_compare_json(&mut buf, &a, &b, &analysis()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["run"]["a"]["id"], "run-a");
        assert_eq!(value["run"]["b"]["id"], "run-b");
        assert_eq!(value["analysis"]["classification"], "MIXED");
        assert_eq!(value["analysis"]["explanations"][0]["severity"], "info");
    }

    #[test]
    fn test_output_is_indented() {
        let run = RunResult::empty("x");
        let json = JsonRecord::new(&run, &analysis()).to_json().unwrap();
        assert!(json.contains("\n  \"run\": {"));
    }
}
