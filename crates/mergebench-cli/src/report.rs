use chrono::{DateTime, Utc};
use mergebench_core::{Classification, Verdict, WrongMergePolicy};
use mergebench_metrics::{Metric, MetricsReport};
use serde::Serialize;
use std::fmt::{self, Write};

/// Context printed alongside the numbers.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub scenarios: usize,
    pub scenarios_evaluated: usize,
    pub cancelled: bool,
    pub unavailable: Vec<String>,
    pub wrong_merge: WrongMergePolicy,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    run: &'a RunSummary,
    metrics: &'a MetricsReport,
    classifications: &'a [Classification],
}

pub fn print_json(
    run: &RunSummary,
    metrics: &MetricsReport,
    classifications: &[Classification],
) -> anyhow::Result<()> {
    let report = JsonReport {
        run,
        metrics,
        classifications,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn print_text(run: &RunSummary, metrics: &MetricsReport) -> anyhow::Result<()> {
    print!("{}", render_text(run, metrics)?);
    Ok(())
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

pub fn render_text(run: &RunSummary, metrics: &MetricsReport) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out, "Merge strategy evaluation")?;
    writeln!(out, "=========================")?;
    writeln!(out, "Source:      {}", run.source)?;
    if let Some(id) = &run.run_id {
        writeln!(out, "Run:         {}", id)?;
    }
    writeln!(out, "Generated:   {}", run.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(
        out,
        "Scenarios:   {} of {} evaluated",
        run.scenarios_evaluated, run.scenarios
    )?;
    if run.cancelled {
        writeln!(out, "Cancelled:   yes (partial results)")?;
    }
    if !run.unavailable.is_empty() {
        writeln!(out, "Unavailable: {}", run.unavailable.join(", "))?;
    }
    writeln!(out)?;

    for matrix in metrics.matrices.values() {
        writeln!(out, "{}", matrix.strategy)?;
        writeln!(out, "{}", "-".repeat(matrix.strategy.len()))?;
        writeln!(
            out,
            "  TP {:>4}   TN {:>4}   FP {:>4}   FN {:>4}   WRONG_MERGE {:>4}   error {:>4}",
            matrix.tp, matrix.tn, matrix.fp, matrix.fn_, matrix.wrong_merge, matrix.error
        )?;
        writeln!(
            out,
            "  precision {}   recall {}   coverage gap {}",
            percent(matrix.precision()),
            percent(matrix.recall()),
            percent(matrix.coverage_gap())
        )?;
        for verdict in Verdict::ALL {
            let names: Vec<&str> = matrix.scenarios_for(verdict).collect();
            if !names.is_empty() {
                writeln!(out, "  {:<12} {}", verdict.as_str(), names.join(", "))?;
            }
        }
        writeln!(out)?;
    }

    if !metrics.pairwise.is_empty() {
        writeln!(out, "Additional metrics (row strategy over column strategy)")?;
        writeln!(out, "------------------------------------------------------")?;
        for metric in Metric::ALL {
            write_pairwise_table(&mut out, metrics, metric)?;
        }
    }

    if !metrics.coverage_gaps.is_empty() {
        writeln!(out, "Not classified")?;
        writeln!(out, "--------------")?;
        for gap in &metrics.coverage_gaps {
            writeln!(out, "  {:<16} {:<40} {}", gap.strategy, gap.scenario, gap.status)?;
        }
        writeln!(out)?;
    }

    Ok(out)
}

fn write_pairwise_table(out: &mut String, metrics: &MetricsReport, metric: Metric) -> fmt::Result {
    let strategies: Vec<&String> = metrics.pairwise.keys().collect();
    let width = strategies.iter().map(|s| s.len()).max().unwrap_or(0).max(4);

    write!(out, "  {:<width$}", metric.as_str(), width = width)?;
    for b in &strategies {
        write!(out, "  {:>width$}", b, width = width)?;
    }
    writeln!(out)?;

    for a in &strategies {
        write!(out, "  {:<width$}", a, width = width)?;
        for b in &strategies {
            let cell = match metrics.additional(a, b) {
                Some(m) => m.get(metric).to_string(),
                None => "-".to_string(),
            };
            write!(out, "  {:>width$}", cell, width = width)?;
        }
        writeln!(out)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergebench_core::{Comparison, ExecutionStatus, ExpectedLabel};
    use mergebench_harness::classify::classify;

    fn classification(scenario: &str, strategy: &str, status: ExecutionStatus) -> Classification {
        classify(
            scenario,
            strategy,
            ExpectedLabel::Conflict,
            status,
            Comparison::NotComparable,
            WrongMergePolicy::Separate,
        )
    }

    fn summary() -> RunSummary {
        RunSummary {
            source: "corpus".into(),
            run_id: Some("run-1".into()),
            generated_at: Utc::now(),
            scenarios: 2,
            scenarios_evaluated: 2,
            cancelled: false,
            unavailable: vec!["mergiraf".into()],
            wrong_merge: WrongMergePolicy::Separate,
        }
    }

    #[test]
    fn text_report_lists_buckets_and_gaps() {
        let classifications = vec![
            classification("S1", "diff3", ExecutionStatus::Conflicts),
            classification("S1", "mergiraf", ExecutionStatus::Skipped),
            classification("S2", "diff3", ExecutionStatus::Failed),
            classification("S2", "mergiraf", ExecutionStatus::Skipped),
        ];
        let metrics = MetricsReport::compute(&classifications);
        let text = render_text(&summary(), &metrics).unwrap();

        assert!(text.contains("Unavailable: mergiraf"));
        assert!(text.contains("TP    1"));
        assert!(text.contains("precision 100.0%"));
        assert!(text.contains("recall 100.0%"));
        assert!(text.contains("coverage gap 50.0%"));
        assert!(text.contains("aTP"));
        assert!(text.contains("Not classified"));
        assert!(text.contains("SKIPPED"));
        assert!(!text.contains("Cancelled"));
    }

    #[test]
    fn undefined_ratios_print_as_not_available() {
        let classifications = vec![classification("S1", "diff3", ExecutionStatus::Skipped)];
        let metrics = MetricsReport::compute(&classifications);
        let mut run = summary();
        run.cancelled = true;
        let text = render_text(&run, &metrics).unwrap();

        assert!(text.contains("precision n/a"));
        assert!(text.contains("recall n/a"));
        assert!(text.contains("Cancelled:   yes"));
    }

    #[test]
    fn json_report_flattens_the_summary() {
        let metrics = MetricsReport::compute(&[]);
        let report = JsonReport {
            run: &summary(),
            metrics: &metrics,
            classifications: &[],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["source"], "corpus");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["wrong_merge"], "separate");
        assert_eq!(value["metrics"]["total_pairs"], 0);
    }
}
