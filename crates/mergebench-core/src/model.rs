use serde::{Deserialize, Serialize};
use std::fmt;

/// Ground truth for a scenario: should a correct tool stop and ask for help?
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpectedLabel {
    Conflict,
    Success,
}

impl ExpectedLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedLabel::Conflict => "CONFLICT",
            ExpectedLabel::Success => "SUCCESS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CONFLICT" => Some(ExpectedLabel::Conflict),
            "SUCCESS" => Some(ExpectedLabel::Success),
            _ => None,
        }
    }
}

impl fmt::Display for ExpectedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single strategy invocation ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    /// Merge completed with no unresolved regions.
    Success,
    /// Merge completed but left conflict markup behind.
    Conflicts,
    /// Crash, timeout, or any exit that does not mean "conflicts".
    Failed,
    /// The backing mechanism could not be located.
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Conflicts => "CONFLICTS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Skipped => "SKIPPED",
        }
    }

    /// Parse a recorded execution string.
    ///
    /// Older result files annotate the exit code (`CONFLICTS (exit 1)`) and
    /// use `NO_OUTPUT` for a tool that never ran; both are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let head = value.split_whitespace().next().unwrap_or("");
        match head {
            "SUCCESS" if head.len() == value.trim().len() => Some(ExecutionStatus::Success),
            "CONFLICTS" => Some(ExecutionStatus::Conflicts),
            "FAILED" => Some(ExecutionStatus::Failed),
            "SKIPPED" | "NO_OUTPUT" if head.len() == value.trim().len() => {
                Some(ExecutionStatus::Skipped)
            }
            _ => None,
        }
    }

    /// Whether the strategy produced a merge result at all.
    pub fn completed(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Conflicts)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Textual equality of a strategy's output against the expected artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    Match,
    Differ,
    NotComparable,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Match => "MATCH",
            Comparison::Differ => "DIFFER",
            Comparison::NotComparable => "NOT_COMPARABLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "MATCH" => Some(Comparison::Match),
            "DIFFER" => Some(Comparison::Differ),
            "NOT_COMPARABLE" | "NO_OUTPUT" => Some(Comparison::NotComparable),
            _ => None,
        }
    }

    /// Compare `output` against `expected`. Only completed runs with an
    /// expected artifact are comparable.
    pub fn of(status: ExecutionStatus, output: &str, expected: Option<&str>) -> Self {
        match expected {
            Some(expected) if status.completed() => {
                if output == expected {
                    Comparison::Match
                } else {
                    Comparison::Differ
                }
            }
            _ => Comparison::NotComparable,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One three-way merge test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub ancestor: String,
    pub left: String,
    pub right: String,
    /// Expected merged artifact, used for content comparison.
    pub expected_output: Option<String>,
    pub expected_label: ExpectedLabel,
    /// File extension of the artifacts (without the dot). Structural tools
    /// select a grammar from it.
    pub extension: Option<String>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        ancestor: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
        expected_label: ExpectedLabel,
    ) -> Self {
        Self {
            name: name.into(),
            ancestor: ancestor.into(),
            left: left.into(),
            right: right.into(),
            expected_output: None,
            expected_label,
            extension: None,
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// What an adapter hands back from one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub status: ExecutionStatus,
    pub output_text: String,
    pub stderr_text: String,
}

impl MergeOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output_text: output.into(),
            stderr_text: String::new(),
        }
    }

    pub fn conflicts(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Conflicts,
            output_text: output.into(),
            stderr_text: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output_text: String::new(),
            stderr_text: stderr.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            output_text: String::new(),
            stderr_text: reason.into(),
        }
    }
}

/// The outcome of one strategy applied to one scenario. Never mutated after
/// the harness builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyRun {
    pub scenario_name: String,
    pub strategy_name: String,
    pub execution_status: ExecutionStatus,
    pub output_text: String,
    pub stderr_text: String,
    pub comparison: Comparison,
}

impl StrategyRun {
    pub fn from_output(scenario: &Scenario, strategy_name: &str, output: MergeOutput) -> Self {
        let comparison = Comparison::of(
            output.status,
            &output.output_text,
            scenario.expected_output.as_deref(),
        );
        Self {
            scenario_name: scenario.name.clone(),
            strategy_name: strategy_name.to_string(),
            execution_status: output.status,
            output_text: output.output_text,
            stderr_text: output.stderr_text,
            comparison,
        }
    }
}

/// Per-pair outcome after comparing a run against ground truth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    #[serde(rename = "TP")]
    TruePositive,
    #[serde(rename = "TN")]
    TrueNegative,
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "FN")]
    FalseNegative,
    /// Clean merge where none was needed, but the text is not what was expected.
    #[serde(rename = "WRONG_MERGE")]
    WrongMerge,
    /// The strategy failed or was skipped; kept out of the confusion matrix.
    #[serde(rename = "error")]
    Error,
}

impl Verdict {
    pub const ALL: [Verdict; 6] = [
        Verdict::TruePositive,
        Verdict::TrueNegative,
        Verdict::FalsePositive,
        Verdict::FalseNegative,
        Verdict::WrongMerge,
        Verdict::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::TruePositive => "TP",
            Verdict::TrueNegative => "TN",
            Verdict::FalsePositive => "FP",
            Verdict::FalseNegative => "FN",
            Verdict::WrongMerge => "WRONG_MERGE",
            Verdict::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived classification of a single (scenario, strategy) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub scenario_name: String,
    pub strategy_name: String,
    pub expected_label: ExpectedLabel,
    pub execution_status: ExecutionStatus,
    pub comparison: Comparison,
    /// `None` when the run failed or was skipped.
    pub predicted_label: Option<ExpectedLabel>,
    pub verdict: Verdict,
}
