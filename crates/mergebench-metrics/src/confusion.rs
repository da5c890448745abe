use mergebench_core::{Classification, ExecutionStatus, Verdict};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-strategy tally of verdicts. Accumulation is a plain sum, so the order
/// classifications arrive in never changes the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub strategy: String,
    #[serde(rename = "TP")]
    pub tp: usize,
    #[serde(rename = "TN")]
    pub tn: usize,
    #[serde(rename = "FP")]
    pub fp: usize,
    #[serde(rename = "FN")]
    pub fn_: usize,
    #[serde(rename = "WRONG_MERGE")]
    pub wrong_merge: usize,
    pub error: usize,
    /// How many of `error` were SKIPPED rather than FAILED.
    pub skipped: usize,
    /// Scenario names per verdict, sorted.
    pub scenarios: BTreeMap<Verdict, BTreeSet<String>>,
}

impl ConfusionMatrix {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, classification: &Classification) {
        *self.slot(classification.verdict) += 1;
        if classification.execution_status == ExecutionStatus::Skipped {
            self.skipped += 1;
        }
        self.scenarios
            .entry(classification.verdict)
            .or_default()
            .insert(classification.scenario_name.clone());
    }

    fn slot(&mut self, verdict: Verdict) -> &mut usize {
        match verdict {
            Verdict::TruePositive => &mut self.tp,
            Verdict::TrueNegative => &mut self.tn,
            Verdict::FalsePositive => &mut self.fp,
            Verdict::FalseNegative => &mut self.fn_,
            Verdict::WrongMerge => &mut self.wrong_merge,
            Verdict::Error => &mut self.error,
        }
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::TruePositive => self.tp,
            Verdict::TrueNegative => self.tn,
            Verdict::FalsePositive => self.fp,
            Verdict::FalseNegative => self.fn_,
            Verdict::WrongMerge => self.wrong_merge,
            Verdict::Error => self.error,
        }
    }

    pub fn scenarios_for(&self, verdict: Verdict) -> impl Iterator<Item = &str> {
        self.scenarios
            .get(&verdict)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Every (scenario, strategy) pair seen, errors included.
    pub fn total(&self) -> usize {
        Verdict::ALL.iter().map(|v| self.count(*v)).sum()
    }

    /// TP / (TP + FP), undefined without any positive prediction.
    pub fn precision(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN), undefined without any expected conflict.
    pub fn recall(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Share of pairs that produced no classification (failed or skipped).
    pub fn coverage_gap(&self) -> Option<f64> {
        ratio(self.error, self.total())
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator != 0).then(|| numerator as f64 / denominator as f64)
}
