#![no_main]

use libfuzzer_sys::fuzz_target;
use why_is_this_slow::analysis::Analyzer;
use why_is_this_slow::model::Record;

fuzz_target!(|data: &[u8]| {
    // Stored records are untrusted input: parsing may fail, analysis must not panic
    if let Ok(record) = serde_json::from_slice::<Record>(data) {
        let analyzer = Analyzer::default();
        let analysis = analyzer.analyze_run(&record.run);
        assert!(!analysis.explanations.is_empty());
        let _ = analyzer.compare(&record.run, &record.run);
    }
});
