use mergebench_core::Verdict;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The four directional metrics, one per classified verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Metric {
    #[serde(rename = "aTP")]
    TruePositive,
    #[serde(rename = "aTN")]
    TrueNegative,
    #[serde(rename = "aFP")]
    FalsePositive,
    #[serde(rename = "aFN")]
    FalseNegative,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TruePositive,
        Metric::TrueNegative,
        Metric::FalsePositive,
        Metric::FalseNegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TruePositive => "aTP",
            Metric::TrueNegative => "aTN",
            Metric::FalsePositive => "aFP",
            Metric::FalseNegative => "aFN",
        }
    }

    /// WRONG_MERGE and error verdicts earn no metric.
    pub fn for_verdict(verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::TruePositive => Some(Metric::TruePositive),
            Verdict::TrueNegative => Some(Metric::TrueNegative),
            Verdict::FalsePositive => Some(Metric::FalsePositive),
            Verdict::FalseNegative => Some(Metric::FalseNegative),
            Verdict::WrongMerge | Verdict::Error => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often strategy A reached an outcome that strategy B did not, on the
/// same scenario. Directional: A over B is generally not B over A.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdditionalMetrics {
    /// A alone correctly flagged a needed conflict.
    #[serde(rename = "aTP")]
    pub a_tp: usize,
    /// A alone merged cleanly with the expected content.
    #[serde(rename = "aTN")]
    pub a_tn: usize,
    /// A alone raised a conflict nobody needed.
    #[serde(rename = "aFP")]
    pub a_fp: usize,
    /// A alone silently merged a real conflict.
    #[serde(rename = "aFN")]
    pub a_fn: usize,
    /// Scenario names per metric.
    pub scenarios: BTreeMap<Metric, BTreeSet<String>>,
}

impl AdditionalMetrics {
    pub fn get(&self, metric: Metric) -> usize {
        match metric {
            Metric::TruePositive => self.a_tp,
            Metric::TrueNegative => self.a_tn,
            Metric::FalsePositive => self.a_fp,
            Metric::FalseNegative => self.a_fn,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut usize {
        match metric {
            Metric::TruePositive => &mut self.a_tp,
            Metric::TrueNegative => &mut self.a_tn,
            Metric::FalsePositive => &mut self.a_fp,
            Metric::FalseNegative => &mut self.a_fn,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.a_tp + self.a_tn + self.a_fp + self.a_fn == 0
    }
}

/// Count, per scenario of A, the TP/TN/FP/FN verdicts that B did not share.
/// A scenario B has no verdict for counts as "B did not share it".
pub fn additional(
    a: &BTreeMap<String, Verdict>,
    b: &BTreeMap<String, Verdict>,
) -> AdditionalMetrics {
    let mut out = AdditionalMetrics::default();

    for (scenario, verdict_a) in a {
        if b.get(scenario) == Some(verdict_a) {
            continue;
        }
        let Some(metric) = Metric::for_verdict(*verdict_a) else {
            continue;
        };

        *out.slot(metric) += 1;
        out.scenarios
            .entry(metric)
            .or_default()
            .insert(scenario.clone());
    }

    out
}
