//! Human-readable summaries for the terminal

use crate::model::{Analysis, Explanation, RunResult, Severity};
use crate::platform::MemoryUnit;
use std::borrow::Cow;
use std::io::{self, Write};

/// Suggestions shown under the top insight
pub const MAX_SUGGESTIONS: usize = 4;

/// Highest-severity explanation, the earliest one winning ties
///
/// With nothing to show a synthetic `NONE` insight is returned.
pub fn top_explanation(explanations: &[Explanation]) -> Cow<'_, Explanation> {
    let mut best: Option<&Explanation> = None;
    for e in explanations {
        if best.map_or(true, |b| e.severity > b.severity) {
            best = Some(e);
        }
    }
    match best {
        Some(e) => Cow::Borrowed(e),
        None => Cow::Owned(
            Explanation::new("NONE", Severity::Info, "No explanations produced", "")
                .with_suggestions(["Re-run with --repeat for more signal"]),
        ),
    }
}

fn unit_label(unit: MemoryUnit) -> &'static str {
    match unit {
        MemoryUnit::Unknown => "units",
        other => other.as_str(),
    }
}

fn print_insight<W: Write>(out: &mut W, explanations: &[Explanation]) -> io::Result<()> {
    let top = top_explanation(explanations);
    writeln!(out, "Top insight: {} - {}", top.id, top.message)?;
    if !top.suggestions.is_empty() {
        writeln!(out, "Suggestions:")?;
        for s in top.suggestions.iter().take(MAX_SUGGESTIONS) {
            writeln!(out, "  - {}", s)?;
        }
    }
    Ok(())
}

/// Summary printed after `run` and by `explain`
pub fn print_run_summary<W: Write>(
    out: &mut W,
    run: &RunResult,
    analysis: &Analysis,
) -> io::Result<()> {
    writeln!(out, "Command: {}", run.command_line())?;
    if !run.cwd.is_empty() {
        writeln!(out, "CWD: {}", run.cwd)?;
    }

    match &run.repeat {
        Some(r) if r.count > 1 => writeln!(
            out,
            "Wall: median {:.1}ms p90 {:.1}ms (n={})",
            r.median_wall_ms, r.p90_wall_ms, r.count
        )?,
        _ => writeln!(out, "Wall: {:.1}ms", run.wall_ms)?,
    }

    writeln!(
        out,
        "CPU: user {:.1}ms sys {:.1}ms cpu_ratio {:.2}",
        run.user_ms, run.sys_ms, run.cpu_ratio
    )?;
    writeln!(
        out,
        "Max RSS: {} {} ({})",
        run.max_rss_raw,
        unit_label(run.max_rss_unit),
        run.platform
    )?;
    match &run.signal {
        Some(sig) => writeln!(out, "Exit: code={} signal={}", run.exit_code, sig)?,
        None => writeln!(out, "Exit: code={}", run.exit_code)?,
    }

    writeln!(out, "Classification: {}", analysis.classification)?;
    print_insight(out, &analysis.explanations)?;
    writeln!(out, "Run ID: {}", run.id)?;
    if let Some(path) = &run.storage_path {
        writeln!(out, "Stored at: {}", path.display())?;
    }
    Ok(())
}

/// Summary printed by `compare`
pub fn print_compare_summary<W: Write>(
    out: &mut W,
    a: &RunResult,
    b: &RunResult,
    analysis: &Analysis,
) -> io::Result<()> {
    writeln!(out, "Compare {} -> {}", a.id, b.id)?;
    writeln!(out, "A cmd: {}", a.command_line())?;
    writeln!(out, "B cmd: {}", b.command_line())?;
    for (label, run) in [("A", a), ("B", b)] {
        writeln!(
            out,
            "{}: wall {:.1}ms cpu_ratio {:.2} max_rss {} {} exit {}",
            label,
            run.wall_ms,
            run.cpu_ratio,
            run.max_rss_raw,
            unit_label(run.max_rss_unit),
            run.exit_code
        )?;
    }

    writeln!(out, "Classification (B): {}", analysis.classification)?;
    print_insight(out, &analysis.explanations)
}
