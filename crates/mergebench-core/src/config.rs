use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategySpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            harness: HarnessSettings::default(),
            logging: LoggingSettings::default(),
            strategies: default_strategies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub wrong_merge: WrongMergePolicy,
    /// Parent for per-run scratch directories (system temp dir when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            jobs: default_jobs(),
            wrong_merge: WrongMergePolicy::default(),
            scratch_dir: None,
        }
    }
}

/// Where a clean merge with unexpected content lands.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WrongMergePolicy {
    /// Its own WRONG_MERGE bucket, outside TP/TN/FP/FN.
    #[default]
    Separate,
    /// No conflict was wrongly raised, so count it as TN.
    TrueNegative,
    /// The merge is not what was expected, so count it as FP.
    FalsePositive,
}

impl std::str::FromStr for WrongMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "separate" => Ok(WrongMergePolicy::Separate),
            "true-negative" => Ok(WrongMergePolicy::TrueNegative),
            "false-positive" => Ok(WrongMergePolicy::FalsePositive),
            other => Err(format!(
                "unknown policy '{}' (expected separate, true-negative or false-positive)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            filter: default_filter(),
        }
    }
}

/// How to locate and launch one command-line merge tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategySpec {
    pub name: String,
    /// Command lines tried in order; the first whose program resolves wins.
    /// `{base}`, `{left}` and `{right}` are replaced by file paths. Without
    /// any placeholder the three paths are appended as base, left, right.
    pub candidates: Vec<Vec<String>>,
    /// Inclusive exit-code range that means "merged, with conflicts".
    #[serde(default)]
    pub conflict_exits: Option<(i32, i32)>,
    /// Treat exit 0 with conflict markers in stdout as CONFLICTS.
    #[serde(default)]
    pub detect_markers: bool,
    /// Run once when no candidate resolves, then look again.
    #[serde(default)]
    pub build: Option<Vec<String>>,
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,
    /// Base directory for relative candidate paths and the build command.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>, candidates: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            candidates,
            conflict_exits: None,
            detect_markers: false,
            build: None,
            build_timeout_ms: default_build_timeout_ms(),
            working_dir: None,
        }
    }
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn default_strategies() -> Vec<StrategySpec> {
    // git merge-file exits with the number of conflicts (capped at 127) and
    // a negative status on error.
    let diff3 = StrategySpec {
        conflict_exits: Some((1, 127)),
        ..StrategySpec::new(
            "diff3",
            vec![command(&["git", "merge-file", "-p", "{left}", "{base}", "{right}"])],
        )
    };

    let mergiraf = StrategySpec {
        conflict_exits: Some((1, 1)),
        detect_markers: true,
        ..StrategySpec::new(
            "mergiraf",
            vec![
                command(&["target/debug/mergiraf", "merge"]),
                command(&["mergiraf", "merge"]),
            ],
        )
    };

    let mergiraf_semi = StrategySpec {
        conflict_exits: Some((1, 1)),
        detect_markers: true,
        ..StrategySpec::new(
            "mergiraf-semi",
            vec![command(&["mergiraf", "merge", "--semistructured=diff3"])],
        )
    };

    vec![diff3, mergiraf, mergiraf_semi]
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_jobs() -> usize {
    1
}
fn default_build_timeout_ms() -> u64 {
    600_000
}
fn default_filter() -> String {
    "info".into()
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
