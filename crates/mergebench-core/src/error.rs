use std::path::PathBuf;

/// Malformed or incomplete scenario data. Fatal to the pass.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus directory not found: {0}")]
    NotFound(PathBuf),

    #[error("scenario '{scenario}' is missing its {role} artifact")]
    MissingArtifact { scenario: String, role: &'static str },

    #[error("scenario '{scenario}' has more than one {role} artifact: {first} and {second}")]
    DuplicateArtifact {
        scenario: String,
        role: &'static str,
        first: String,
        second: String,
    },

    #[error("scenario '{0}' has no ground-truth label")]
    MissingLabel(String),

    #[error("scenario '{scenario}' has invalid label '{value}' (expected CONFLICT or SUCCESS)")]
    InvalidLabel { scenario: String, value: String },

    #[error("label file names scenario '{0}' but no such scenario directory exists")]
    OrphanLabel(String),

    #[error("scenario directory name is not valid UTF-8: {0}")]
    InvalidName(PathBuf),

    #[error("duplicate scenario name '{0}'")]
    DuplicateScenario(String),

    #[error("label file {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can go wrong during an evaluation pass.
///
/// Only `Corpus` and `ClassificationAmbiguity` abort a pass. The other two are
/// folded into SKIPPED / FAILED runs by the harness and surface in the report.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("strategy '{strategy}' is unavailable: {reason}")]
    AdapterUnavailable { strategy: String, reason: String },

    #[error("strategy '{strategy}' failed on scenario '{scenario}': {reason}")]
    ExecutionFailure {
        scenario: String,
        strategy: String,
        reason: String,
    },

    #[error("cannot classify '{scenario}' for '{strategy}': {detail}")]
    ClassificationAmbiguity {
        scenario: String,
        strategy: String,
        detail: String,
    },
}
