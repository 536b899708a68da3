//! Analyzer and aggregator overhead benchmark
//!
//! The rule engine runs once per `run` and `explain`; percentiles run once
//! per repeated measurement. Both should stay far below a millisecond so the
//! tool never shows up in its own numbers.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench analysis_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use why_is_this_slow::analysis::{AnalysisConfig, Analyzer};
use why_is_this_slow::model::{RunResult, Sample};
use why_is_this_slow::platform::{MemoryUnit, PlatformProfile};
use why_is_this_slow::stats::{percentile, summarize_samples};
use why_is_this_slow::tail::TailBuffer;

/// Create a run that fires every single-run rule
fn create_bench_run(id: &str, rss: i64, cpu_ratio: f64) -> RunResult {
    let mut run = RunResult::empty(id);
    run.command = vec!["cargo".into(), "build".into()];
    run.wall_ms = 1000.0;
    run.user_ms = 300.0;
    run.sys_ms = 400.0;
    run.cpu_ratio = cpu_ratio;
    run.max_rss_raw = rss;
    run.max_rss_unit = MemoryUnit::Kilobytes;
    run
}

fn create_bench_samples(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| Sample {
            wall_ms: 100.0 + (i * 37 % 101) as f64,
            user_ms: 50.0 + (i % 13) as f64,
            sys_ms: 5.0,
            cpu_ratio: 0.5,
            max_rss: 4096 + i as i64,
            max_rss_unit: MemoryUnit::Kilobytes,
            exit_code: 0,
            signal: None,
        })
        .collect()
}

fn bench_analyze_run(c: &mut Criterion) {
    let analyzer = Analyzer::new(AnalysisConfig::default(), PlatformProfile::linux("x86_64"));
    let run = create_bench_run("bench", 900 * 1024, 0.7);

    c.bench_function("analyze_run", |b| {
        b.iter(|| black_box(analyzer.analyze_run(black_box(&run))))
    });
}

fn bench_compare(c: &mut Criterion) {
    let analyzer = Analyzer::new(AnalysisConfig::default(), PlatformProfile::linux("x86_64"));
    let a = create_bench_run("a", 400 * 1024, 0.3);
    let b_run = create_bench_run("b", 900 * 1024, 0.9);

    c.bench_function("compare_analysis", |b| {
        b.iter(|| black_box(analyzer.compare(black_box(&a), black_box(&b_run))))
    });
}

fn bench_percentile_varying_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile_p90");

    for size in [5usize, 50, 500] {
        let values: Vec<f64> = (0..size).map(|i| (i * 7919 % 1000) as f64).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| black_box(percentile(black_box(values), 90.0)))
        });
    }

    group.finish();
}

fn bench_summarize_samples(c: &mut Criterion) {
    let samples = create_bench_samples(20);

    c.bench_function("summarize_samples_20", |b| {
        b.iter(|| black_box(summarize_samples(black_box(&samples))))
    });
}

fn bench_tail_push(c: &mut Criterion) {
    let tail = TailBuffer::new(64 * 1024);
    let line = [b'x'; 512];

    c.bench_function("tail_push_512b", |b| b.iter(|| tail.push(black_box(&line))));
}

criterion_group!(
    benches,
    bench_analyze_run,
    bench_compare,
    bench_percentile_varying_size,
    bench_summarize_samples,
    bench_tail_push
);
criterion_main!(benches);
