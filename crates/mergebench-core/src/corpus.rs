use crate::error::CorpusError;
use crate::model::{ExpectedLabel, Scenario};
use crate::records::{read_records, RecordFile, LABEL_FILE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The validated, read-only set of scenarios for one evaluation pass.
/// Scenarios are kept sorted by name so every pass walks them in the same order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    scenarios: Vec<Scenario>,
}

impl Corpus {
    /// Build a corpus from in-memory scenarios.
    pub fn from_scenarios(mut scenarios: Vec<Scenario>) -> Result<Self, CorpusError> {
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(CorpusError::DuplicateScenario(scenario.name.clone()));
            }
        }
        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { scenarios })
    }

    /// Load a directory-per-scenario corpus with its `scenarios.json` labels.
    pub fn load(root: &Path) -> Result<Self, CorpusError> {
        if !root.is_dir() {
            return Err(CorpusError::NotFound(root.to_path_buf()));
        }

        let labels = read_records(&root.join(LABEL_FILE))?;
        let mut scenarios = Vec::new();

        for dir in scenario_dirs(root)? {
            let name = dir
                .file_name()
                .and_then(|f| f.to_str())
                .ok_or_else(|| CorpusError::InvalidName(dir.clone()))?
                .to_string();
            let expected_label = label_for(&labels, &name)?;
            scenarios.push(load_scenario(&dir, name, expected_label)?);
        }

        let names: HashSet<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        if let Some(orphan) = labels.keys().find(|k| !names.contains(k.as_str())) {
            return Err(CorpusError::OrphanLabel(orphan.clone()));
        }

        tracing::info!(root = %root.display(), scenarios = scenarios.len(), "Corpus loaded");
        Self::from_scenarios(scenarios)
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CorpusError + '_ {
    move |source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Non-hidden subdirectories of `root`, sorted.
fn scenario_dirs(root: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_error(root))? {
        let entry = entry.map_err(io_error(root))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn label_for(labels: &RecordFile, name: &str) -> Result<ExpectedLabel, CorpusError> {
    let raw = labels
        .get(name)
        .and_then(|r| r.expected.as_deref())
        .ok_or_else(|| CorpusError::MissingLabel(name.to_string()))?;
    ExpectedLabel::parse(raw).ok_or_else(|| CorpusError::InvalidLabel {
        scenario: name.to_string(),
        value: raw.to_string(),
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Base,
    Left,
    Right,
    Expected,
}

impl Role {
    fn from_stem(stem: &str) -> Option<Self> {
        match stem {
            "base" | "ancestor" => Some(Role::Base),
            "left" => Some(Role::Left),
            "right" => Some(Role::Right),
            "expected" => Some(Role::Expected),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Role::Base => "ancestor",
            Role::Left => "left",
            Role::Right => "right",
            Role::Expected => "expected",
        }
    }
}

#[derive(Default)]
struct Artifacts {
    base: Option<PathBuf>,
    left: Option<PathBuf>,
    right: Option<PathBuf>,
    expected: Option<PathBuf>,
}

impl Artifacts {
    fn slot(&mut self, role: Role) -> &mut Option<PathBuf> {
        match role {
            Role::Base => &mut self.base,
            Role::Left => &mut self.left,
            Role::Right => &mut self.right,
            Role::Expected => &mut self.expected,
        }
    }
}

fn load_scenario(
    dir: &Path,
    name: String,
    expected_label: ExpectedLabel,
) -> Result<Scenario, CorpusError> {
    let mut artifacts = Artifacts::default();

    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let stem = file_name.split('.').next().unwrap_or_default();
        let Some(role) = Role::from_stem(stem) else {
            continue;
        };

        let slot = artifacts.slot(role);
        if let Some(existing) = slot {
            let mut pair = [existing.display().to_string(), path.display().to_string()];
            pair.sort();
            let [first, second] = pair;
            return Err(CorpusError::DuplicateArtifact {
                scenario: name,
                role: role.label(),
                first,
                second,
            });
        }
        *slot = Some(path);
    }

    let required = |role: Role, path: Option<PathBuf>| {
        path.ok_or_else(|| CorpusError::MissingArtifact {
            scenario: name.clone(),
            role: role.label(),
        })
    };
    let base = required(Role::Base, artifacts.base)?;
    let left = required(Role::Left, artifacts.left)?;
    let right = required(Role::Right, artifacts.right)?;

    let read = |path: &Path| std::fs::read_to_string(path).map_err(io_error(path));
    let extension = base
        .file_name()
        .and_then(|f| f.to_str())
        .and_then(|f| f.split_once('.'))
        .map(|(_, ext)| ext.to_string());

    Ok(Scenario {
        ancestor: read(&base)?,
        left: read(&left)?,
        right: read(&right)?,
        expected_output: artifacts.expected.as_deref().map(read).transpose()?,
        expected_label,
        extension,
        name,
    })
}
