//! Aggregation of classifications into comparable numbers.
//!
//! Works purely on [`Classification`] values: no I/O, and no knowledge of how
//! the classifications were produced, so recorded results and live harness
//! output go through the same code.

pub mod confusion;
pub mod pairwise;

pub use confusion::ConfusionMatrix;
pub use pairwise::{additional, AdditionalMetrics, Metric};

use mergebench_core::{Classification, ExecutionStatus, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;

/// A (scenario, strategy) pair that produced no classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CoverageGap {
    pub strategy: String,
    pub scenario: String,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Strategy name -> confusion matrix.
    pub matrices: BTreeMap<String, ConfusionMatrix>,
    /// `pairwise[a][b]` holds A's additional metrics over B, for every
    /// ordered pair of distinct strategies.
    pub pairwise: BTreeMap<String, BTreeMap<String, AdditionalMetrics>>,
    /// Failed and skipped pairs, sorted by strategy then scenario.
    pub coverage_gaps: Vec<CoverageGap>,
    pub total_pairs: usize,
}

impl MetricsReport {
    pub fn compute(classifications: &[Classification]) -> Self {
        let mut matrices: BTreeMap<String, ConfusionMatrix> = BTreeMap::new();
        let mut by_strategy: BTreeMap<String, BTreeMap<String, Verdict>> = BTreeMap::new();
        let mut coverage_gaps = Vec::new();

        for c in classifications {
            matrices
                .entry(c.strategy_name.clone())
                .or_insert_with(|| ConfusionMatrix::new(c.strategy_name.clone()))
                .record(c);
            by_strategy
                .entry(c.strategy_name.clone())
                .or_default()
                .insert(c.scenario_name.clone(), c.verdict);
            if c.verdict == Verdict::Error {
                coverage_gaps.push(CoverageGap {
                    strategy: c.strategy_name.clone(),
                    scenario: c.scenario_name.clone(),
                    status: c.execution_status,
                });
            }
        }
        coverage_gaps.sort();

        let mut pairwise: BTreeMap<String, BTreeMap<String, AdditionalMetrics>> = BTreeMap::new();
        for (a, verdicts_a) in &by_strategy {
            for (b, verdicts_b) in &by_strategy {
                if a == b {
                    continue;
                }
                let metrics = additional(verdicts_a, verdicts_b);
                if !metrics.is_empty() {
                    tracing::debug!(
                        strategy = %a,
                        over = %b,
                        a_tp = metrics.a_tp,
                        a_tn = metrics.a_tn,
                        a_fp = metrics.a_fp,
                        a_fn = metrics.a_fn,
                        "Divergence between strategies"
                    );
                }
                pairwise.entry(a.clone()).or_default().insert(b.clone(), metrics);
            }
        }

        Self {
            matrices,
            pairwise,
            coverage_gaps,
            total_pairs: classifications.len(),
        }
    }

    /// A's additional metrics over B.
    pub fn additional(&self, a: &str, b: &str) -> Option<&AdditionalMetrics> {
        self.pairwise.get(a).and_then(|row| row.get(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergebench_core::{Comparison, ExpectedLabel, WrongMergePolicy};
    use mergebench_harness::classify::classify;

    fn c(
        scenario: &str,
        strategy: &str,
        expected: ExpectedLabel,
        status: ExecutionStatus,
        comparison: Comparison,
    ) -> Classification {
        classify(scenario, strategy, expected, status, comparison, WrongMergePolicy::Separate)
    }

    fn sample() -> Vec<Classification> {
        use Comparison::*;
        use ExecutionStatus::*;
        let (conflict, clean) = (ExpectedLabel::Conflict, ExpectedLabel::Success);
        vec![
            c("S1", "X", conflict, Conflicts, NotComparable),
            c("S1", "Y", conflict, Success, NotComparable),
            c("S2", "X", clean, Success, Match),
            c("S2", "Y", clean, Success, Differ),
            c("S3", "X", clean, Failed, NotComparable),
            c("S3", "Y", clean, Conflicts, NotComparable),
        ]
    }

    #[test]
    fn conflict_scenario_end_to_end() {
        let report = MetricsReport::compute(&sample()[..2]);
        assert_eq!(report.additional("X", "Y").unwrap().a_tp, 1);
        assert_eq!(report.additional("Y", "X").unwrap().a_fn, 1);
        assert_eq!(report.additional("X", "Y").unwrap().a_fn, 0);
    }

    #[test]
    fn buckets_plus_errors_cover_every_pair() {
        let report = MetricsReport::compute(&sample());
        let counted: usize = report.matrices.values().map(|m| m.total()).sum();
        assert_eq!(counted, report.total_pairs);

        let y = &report.matrices["Y"];
        assert_eq!((y.tp, y.tn, y.fp, y.fn_, y.wrong_merge, y.error), (0, 0, 1, 1, 1, 0));
        assert_eq!(
            report.coverage_gaps,
            [CoverageGap {
                strategy: "X".into(),
                scenario: "S3".into(),
                status: ExecutionStatus::Failed,
            }]
        );
    }

    #[test]
    fn order_does_not_matter() {
        let forward = MetricsReport::compute(&sample());
        let mut reversed = sample();
        reversed.reverse();
        assert_eq!(MetricsReport::compute(&reversed), forward);

        let mut rotated = sample();
        rotated.rotate_left(3);
        assert_eq!(MetricsReport::compute(&rotated), forward);
    }

    #[test]
    fn unavailable_strategy_contributes_nothing_but_gaps() {
        let mut all = sample();
        for s in ["S1", "S2", "S3"] {
            all.push(c(
                s,
                "ghost",
                ExpectedLabel::Success,
                ExecutionStatus::Skipped,
                Comparison::NotComparable,
            ));
        }
        let report = MetricsReport::compute(&all);
        let ghost = &report.matrices["ghost"];

        assert_eq!(ghost.tp + ghost.tn + ghost.fp + ghost.fn_ + ghost.wrong_merge, 0);
        assert_eq!((ghost.error, ghost.skipped), (3, 3));
        assert_eq!(ghost.coverage_gap(), Some(1.0));
        assert!(report.additional("ghost", "X").unwrap().is_empty());
        assert_eq!(report.coverage_gaps.len(), 4);
    }

    #[test]
    fn every_ordered_pair_is_present() {
        let mut all = sample();
        all.push(c(
            "S1",
            "Z",
            ExpectedLabel::Conflict,
            ExecutionStatus::Conflicts,
            Comparison::NotComparable,
        ));
        let report = MetricsReport::compute(&all);
        for a in ["X", "Y", "Z"] {
            for b in ["X", "Y", "Z"] {
                assert_eq!(report.additional(a, b).is_some(), a != b, "{a} over {b}");
            }
        }
    }
}
