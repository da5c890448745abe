//! The flat `scenarios.json` schema.
//!
//! The same file carries the curated ground truth (`expected`) and, once
//! populated, one `{execution, comparison}` entry per strategy. The harness
//! writes its results in this exact shape, so a results file can be fed back
//! into the metrics without re-running any tool.

use crate::error::{CorpusError, EvalError};
use crate::model::{Comparison, ExecutionStatus};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Name of the ground-truth file at the corpus root.
pub const LABEL_FILE: &str = "scenarios.json";

/// Scenario name -> record.
pub type RecordFile = BTreeMap<String, ScenarioRecord>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Strategy name -> recorded outcome.
    #[serde(flatten)]
    pub runs: BTreeMap<String, RecordedRun>,
}

/// Recorded outcome of one strategy. Kept as raw strings so a bad value is
/// reported with its scenario and strategy instead of a bare serde error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
}

impl RecordedRun {
    pub fn new(execution: ExecutionStatus, comparison: Comparison) -> Self {
        Self {
            execution: Some(execution.as_str().to_string()),
            comparison: Some(comparison.as_str().to_string()),
        }
    }

    /// Decode the recorded strings. A missing field means the tool never
    /// produced anything for this scenario.
    pub fn decode(
        &self,
        scenario: &str,
        strategy: &str,
    ) -> Result<(ExecutionStatus, Comparison), EvalError> {
        let ambiguity = |detail: String| EvalError::ClassificationAmbiguity {
            scenario: scenario.to_string(),
            strategy: strategy.to_string(),
            detail,
        };

        let status = match self.execution.as_deref() {
            None => ExecutionStatus::Skipped,
            Some(raw) => ExecutionStatus::parse(raw)
                .ok_or_else(|| ambiguity(format!("unknown execution status '{}'", raw)))?,
        };
        let comparison = match self.comparison.as_deref() {
            None => Comparison::NotComparable,
            Some(raw) => Comparison::parse(raw)
                .ok_or_else(|| ambiguity(format!("unknown comparison '{}'", raw)))?,
        };
        Ok((status, comparison))
    }
}

/// Read a `scenarios.json`. A scenario name that appears twice is an error
/// rather than last-one-wins.
pub fn read_records(path: &Path) -> Result<RecordFile, CorpusError> {
    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: RecordEntries =
        serde_json::from_str(&content).map_err(|source| CorpusError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = RecordFile::new();
    for (name, record) in entries.0 {
        if records.contains_key(&name) {
            return Err(CorpusError::DuplicateScenario(name));
        }
        records.insert(name, record);
    }
    Ok(records)
}

/// Top-level entries in file order, repeated keys included.
struct RecordEntries(Vec<(String, ScenarioRecord)>);

impl<'de> Deserialize<'de> for RecordEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RecordEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of scenario name to record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, ScenarioRecord>()? {
                    entries.push(entry);
                }
                Ok(RecordEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

pub fn write_records(path: &Path, records: &RecordFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(records)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_labels_and_recorded_runs() {
        let json = r#"{
            "S1": {
                "expected": "CONFLICT",
                "diff3": { "execution": "CONFLICTS (exit 1)", "comparison": "DIFFER" },
                "mergiraf": { "execution": "SUCCESS", "comparison": "MATCH" }
            },
            "S2": { "expected": "SUCCESS" }
        }"#;
        let records: RecordFile = serde_json::from_str(json).unwrap();

        let s1 = &records["S1"];
        assert_eq!(s1.expected.as_deref(), Some("CONFLICT"));
        assert_eq!(
            s1.runs["diff3"].decode("S1", "diff3").unwrap(),
            (ExecutionStatus::Conflicts, Comparison::Differ)
        );
        assert!(records["S2"].runs.is_empty());
    }

    #[test]
    fn missing_fields_decode_as_never_ran() {
        let run = RecordedRun::default();
        assert_eq!(
            run.decode("S", "t").unwrap(),
            (ExecutionStatus::Skipped, Comparison::NotComparable)
        );
    }

    #[test]
    fn unknown_status_is_an_ambiguity() {
        let run = RecordedRun {
            execution: Some("DRY_RUN".into()),
            comparison: Some("MATCH".into()),
        };
        let err = run.decode("S9", "mergiraf").unwrap_err();
        assert!(matches!(err, EvalError::ClassificationAmbiguity { .. }));
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABEL_FILE);

        let mut record = ScenarioRecord {
            expected: Some("SUCCESS".into()),
            ..Default::default()
        };
        record.runs.insert(
            "diff3".into(),
            RecordedRun::new(ExecutionStatus::Success, Comparison::Match),
        );
        let mut records = RecordFile::new();
        records.insert("S2".into(), record);

        write_records(&path, &records).unwrap();
        assert_eq!(read_records(&path).unwrap(), records);
    }

    #[test]
    fn repeated_scenario_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABEL_FILE);
        std::fs::write(
            &path,
            r#"{"s": {"expected": "CONFLICT"}, "t": {"expected": "SUCCESS"}, "s": {"expected": "SUCCESS"}}"#,
        )
        .unwrap();

        let err = read_records(&path).unwrap_err();
        assert!(matches!(err, CorpusError::DuplicateScenario(name) if name == "s"));
    }

    #[test]
    fn non_object_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABEL_FILE);
        std::fs::write(&path, r#"["s"]"#).unwrap();

        assert!(matches!(read_records(&path), Err(CorpusError::Json { .. })));
    }
}
