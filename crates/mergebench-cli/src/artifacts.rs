//! Per-run files for inspecting what each tool actually produced.
//!
//! Layout under the report directory, one folder per scenario:
//!
//! ```text
//! <scenario>/<strategy>.merged[.<ext>]   merged output of a completed run
//! <scenario>/<strategy>.stderr           diagnostics, when there were any
//! <scenario>/<strategy>.diff             unified diff expected -> merged, when they differ
//! ```

use mergebench_core::{Comparison, Corpus, StrategyRun};
use similar::TextDiff;
use std::path::Path;

/// Write the files for every run and return how many were written.
pub fn write_run_artifacts(dir: &Path, corpus: &Corpus, runs: &[StrategyRun]) -> anyhow::Result<usize> {
    let mut written = 0;

    for run in runs {
        let Some(scenario) = corpus.get(&run.scenario_name) else {
            continue;
        };
        let scenario_dir = dir.join(&scenario.name);
        std::fs::create_dir_all(&scenario_dir)?;
        let strategy = &run.strategy_name;

        if run.execution_status.completed() {
            let file = match &scenario.extension {
                Some(ext) => format!("{}.merged.{}", strategy, ext),
                None => format!("{}.merged", strategy),
            };
            std::fs::write(scenario_dir.join(file), &run.output_text)?;
            written += 1;
        }

        if !run.stderr_text.trim().is_empty() {
            std::fs::write(scenario_dir.join(format!("{}.stderr", strategy)), &run.stderr_text)?;
            written += 1;
        }

        if let (Comparison::Differ, Some(expected)) = (run.comparison, &scenario.expected_output) {
            let diff = unified_diff(expected, &run.output_text, strategy);
            std::fs::write(scenario_dir.join(format!("{}.diff", strategy)), diff)?;
            written += 1;
        }
    }

    tracing::info!(dir = %dir.display(), files = written, "Run artifacts written");
    Ok(written)
}

fn unified_diff(expected: &str, merged: &str, strategy: &str) -> String {
    TextDiff::from_lines(expected, merged)
        .unified_diff()
        .context_radius(3)
        .header("expected", strategy)
        .to_string()
}
