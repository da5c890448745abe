//! Ground-truth classification of strategy runs.
//!
//! "Positive" means "a conflict needs manual resolution". The result is a
//! pure function of (expected label, execution status, comparison) plus the
//! configured policy for clean merges whose text is not the expected one.

use mergebench_core::records::RecordFile;
use mergebench_core::{
    Classification, Comparison, CorpusError, EvalError, ExecutionStatus, ExpectedLabel, Scenario,
    StrategyRun, Verdict, WrongMergePolicy,
};
use std::collections::BTreeSet;

/// What the strategy claimed, or `None` when it never produced a merge.
pub fn predicted_label(status: ExecutionStatus) -> Option<ExpectedLabel> {
    match status {
        ExecutionStatus::Conflicts => Some(ExpectedLabel::Conflict),
        ExecutionStatus::Success => Some(ExpectedLabel::Success),
        ExecutionStatus::Failed | ExecutionStatus::Skipped => None,
    }
}

pub fn verdict(
    expected: ExpectedLabel,
    status: ExecutionStatus,
    comparison: Comparison,
    policy: WrongMergePolicy,
) -> Verdict {
    let Some(predicted) = predicted_label(status) else {
        return Verdict::Error;
    };

    match (expected, predicted) {
        (ExpectedLabel::Conflict, ExpectedLabel::Conflict) => Verdict::TruePositive,
        // Silently merged something that needed a human. Invisible to the user.
        (ExpectedLabel::Conflict, ExpectedLabel::Success) => Verdict::FalseNegative,
        (ExpectedLabel::Success, ExpectedLabel::Conflict) => Verdict::FalsePositive,
        (ExpectedLabel::Success, ExpectedLabel::Success) => match comparison {
            Comparison::Match | Comparison::NotComparable => Verdict::TrueNegative,
            Comparison::Differ => match policy {
                WrongMergePolicy::Separate => Verdict::WrongMerge,
                WrongMergePolicy::TrueNegative => Verdict::TrueNegative,
                WrongMergePolicy::FalsePositive => Verdict::FalsePositive,
            },
        },
    }
}

pub fn classify(
    scenario_name: &str,
    strategy_name: &str,
    expected: ExpectedLabel,
    status: ExecutionStatus,
    comparison: Comparison,
    policy: WrongMergePolicy,
) -> Classification {
    Classification {
        scenario_name: scenario_name.to_string(),
        strategy_name: strategy_name.to_string(),
        expected_label: expected,
        execution_status: status,
        comparison,
        predicted_label: predicted_label(status),
        verdict: verdict(expected, status, comparison, policy),
    }
}

/// Classify a harness run against its scenario.
pub fn classify_run(
    scenario: &Scenario,
    run: &StrategyRun,
    policy: WrongMergePolicy,
) -> Result<Classification, EvalError> {
    if run.scenario_name != scenario.name {
        return Err(EvalError::ClassificationAmbiguity {
            scenario: scenario.name.clone(),
            strategy: run.strategy_name.clone(),
            detail: format!("run belongs to scenario '{}'", run.scenario_name),
        });
    }
    if !run.execution_status.completed() && run.comparison != Comparison::NotComparable {
        return Err(EvalError::ClassificationAmbiguity {
            scenario: scenario.name.clone(),
            strategy: run.strategy_name.clone(),
            detail: format!(
                "{} run carries comparison {}",
                run.execution_status, run.comparison
            ),
        });
    }
    Ok(classify(
        &scenario.name,
        &run.strategy_name,
        scenario.expected_label,
        run.execution_status,
        run.comparison,
        policy,
    ))
}

/// Classify previously recorded results without running anything.
///
/// Every strategy mentioned anywhere in the file is evaluated on every
/// scenario; a scenario with no entry for a strategy counts as skipped.
pub fn classify_records(
    records: &RecordFile,
    policy: WrongMergePolicy,
) -> Result<Vec<Classification>, EvalError> {
    let strategies: BTreeSet<&str> = records
        .values()
        .flat_map(|r| r.runs.keys().map(String::as_str))
        .collect();

    let mut classifications = Vec::with_capacity(records.len() * strategies.len());
    for (scenario, record) in records {
        let raw = record
            .expected
            .as_deref()
            .ok_or_else(|| CorpusError::MissingLabel(scenario.clone()))?;
        let expected = ExpectedLabel::parse(raw).ok_or_else(|| CorpusError::InvalidLabel {
            scenario: scenario.clone(),
            value: raw.to_string(),
        })?;

        for strategy in &strategies {
            let (status, comparison) = match record.runs.get(*strategy) {
                Some(run) => run.decode(scenario, strategy)?,
                None => (ExecutionStatus::Skipped, Comparison::NotComparable),
            };
            classifications.push(classify(
                scenario, strategy, expected, status, comparison, policy,
            ));
        }
    }
    Ok(classifications)
}
