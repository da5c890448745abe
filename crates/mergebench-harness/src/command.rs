use mergebench_core::strategy::has_conflict_markers;
use mergebench_core::{ExecutionStatus, MergeOutput, MergeStrategy, Scenario, StrategySpec};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::sync::OnceCell;

/// A merge tool launched as a subprocess that takes three file paths and
/// prints the merged result on stdout.
///
/// Discovery walks the configured candidate command lines in order and, if
/// none resolves, runs the optional build command once and looks again. The
/// outcome is cached for the lifetime of the strategy.
pub struct CommandStrategy {
    spec: StrategySpec,
    timeout: Duration,
    scratch_root: Option<PathBuf>,
    resolved: OnceCell<Option<ResolvedCommand>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandStrategy {
    pub fn new(spec: StrategySpec, timeout: Duration) -> Self {
        Self {
            spec,
            timeout,
            scratch_root: None,
            resolved: OnceCell::new(),
        }
    }

    /// Stage inputs under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    pub fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    /// The program the strategy will launch, if discovery found one.
    pub async fn resolved_program(&self) -> Option<PathBuf> {
        self.resolve().await.map(|c| c.program.clone())
    }

    async fn resolve(&self) -> Option<&ResolvedCommand> {
        self.resolved
            .get_or_init(|| self.discover())
            .await
            .as_ref()
    }

    async fn discover(&self) -> Option<ResolvedCommand> {
        if let Some(found) = self.find_candidate() {
            return Some(found);
        }

        let build = self.spec.build.as_ref()?;
        match self.run_build(build).await {
            Ok(()) => self.find_candidate(),
            Err(e) => {
                tracing::warn!(strategy = %self.spec.name, error = %e, "Build command failed");
                None
            }
        }
    }

    fn find_candidate(&self) -> Option<ResolvedCommand> {
        let working_dir = self.spec.working_dir.as_deref();
        self.spec.candidates.iter().find_map(|candidate| {
            let (program, args) = candidate.split_first()?;
            let program = locate(program, working_dir)?;
            tracing::debug!(strategy = %self.spec.name, program = %program.display(), "Resolved candidate");
            Some(ResolvedCommand {
                program,
                args: args.to_vec(),
            })
        })
    }

    async fn run_build(&self, build: &[String]) -> Result<(), String> {
        let (program, args) = build
            .split_first()
            .ok_or_else(|| "empty build command".to_string())?;

        tracing::info!(strategy = %self.spec.name, command = %build.join(" "), "Building on demand");

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            command.current_dir(dir);
        }

        let limit = Duration::from_millis(self.spec.build_timeout_ms);
        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| format!("timed out after {} ms", self.spec.build_timeout_ms))?
            .map_err(|e| format!("failed to launch {}: {}", program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} ({})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    /// Map an exit code and captured streams to an execution status.
    fn interpret(&self, code: Option<i32>, stdout: String, stderr: String) -> MergeOutput {
        let in_conflict_range = |c: i32| {
            self.spec
                .conflict_exits
                .is_some_and(|(lo, hi)| (lo..=hi).contains(&c))
        };

        let status = match code {
            Some(0) if self.spec.detect_markers && has_conflict_markers(&stdout) => {
                ExecutionStatus::Conflicts
            }
            Some(0) => ExecutionStatus::Success,
            Some(c) if in_conflict_range(c) => ExecutionStatus::Conflicts,
            Some(c) => {
                return MergeOutput::failed(with_reason(stderr, format!("exited with code {}", c)));
            }
            None => {
                return MergeOutput::failed(with_reason(stderr, "terminated by signal".into()));
            }
        };

        MergeOutput {
            status,
            output_text: stdout,
            stderr_text: stderr,
        }
    }
}

fn with_reason(stderr: String, reason: String) -> String {
    if stderr.trim().is_empty() {
        reason
    } else {
        format!("{}\n{}", stderr.trim_end(), reason)
    }
}

#[async_trait::async_trait]
impl MergeStrategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn available(&self) -> bool {
        self.resolve().await.is_some()
    }

    async fn run(&self, scenario: &Scenario) -> MergeOutput {
        let Some(command) = self.resolve().await else {
            return MergeOutput::skipped(format!("{} could not be located", self.spec.name));
        };

        let scratch = match Scratch::stage(scenario, self.scratch_root.as_deref()).await {
            Ok(s) => s,
            Err(e) => return MergeOutput::failed(format!("failed to stage inputs: {}", e)),
        };

        let mut process = tokio::process::Command::new(&command.program);
        process
            .args(render_args(&command.args, &scratch))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            process.current_dir(dir);
        }

        let result = tokio::time::timeout(self.timeout, process.output()).await;
        scratch.close();

        match result {
            Err(_) => MergeOutput::failed(format!("timed out after {} ms", self.timeout.as_millis())),
            Ok(Err(e)) => MergeOutput::failed(format!(
                "failed to launch {}: {}",
                command.program.display(),
                e
            )),
            Ok(Ok(output)) => self.interpret(
                output.status.code(),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ),
        }
    }
}

/// Substitute `{base}`, `{left}` and `{right}`. Without any placeholder the
/// three paths are appended as base, left, right.
fn render_args(args: &[String], scratch: &Scratch) -> Vec<String> {
    let base = scratch.base.display().to_string();
    let left = scratch.left.display().to_string();
    let right = scratch.right.display().to_string();

    let templated = args
        .iter()
        .any(|a| a.contains("{base}") || a.contains("{left}") || a.contains("{right}"));

    if templated {
        args.iter()
            .map(|a| {
                a.replace("{base}", &base)
                    .replace("{left}", &left)
                    .replace("{right}", &right)
            })
            .collect()
    } else {
        let mut out = args.to_vec();
        out.extend([base, left, right]);
        out
    }
}

/// Resolve a program name to an executable path. Names containing a path
/// separator are checked directly (relative to `working_dir` when given);
/// bare names are looked up on `PATH`.
pub fn locate(program: &str, working_dir: Option<&Path>) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() > 1 {
        let full = match working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        return is_executable(&full).then_some(full);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Per-invocation copies of the three inputs. The scenario's own artifacts
/// are never handed to a tool. The directory is removed when the value is
/// dropped, including when the run future is cancelled or panics.
struct Scratch {
    dir: tempfile::TempDir,
    base: PathBuf,
    left: PathBuf,
    right: PathBuf,
}

impl Scratch {
    async fn stage(scenario: &Scenario, root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mergebench-");
        let dir = match root {
            Some(root) => {
                tokio::fs::create_dir_all(root).await?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let file = |stem: &str| match &scenario.extension {
            Some(ext) => dir.path().join(format!("{}.{}", stem, ext)),
            None => dir.path().join(stem),
        };
        let base = file("base");
        let left = file("left");
        let right = file("right");

        tokio::fs::write(&base, &scenario.ancestor).await?;
        tokio::fs::write(&left, &scenario.left).await?;
        tokio::fs::write(&right, &scenario.right).await?;

        Ok(Self {
            dir,
            base,
            left,
            right,
        })
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(dir = %path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergebench_core::ExpectedLabel;

    fn shell(name: &str, script: &str) -> StrategySpec {
        // sh -c '<script>' sh base left right
        StrategySpec::new(
            name,
            vec![vec!["sh".into(), "-c".into(), script.into(), "sh".into()]],
        )
    }

    fn scenario() -> Scenario {
        Scenario::new("S1", "a\n", "b\n", "c\n", ExpectedLabel::Conflict).with_extension("swift")
    }

    fn strategy(spec: StrategySpec) -> CommandStrategy {
        CommandStrategy::new(spec, Duration::from_secs(5))
    }

    #[test]
    fn interprets_exit_codes() {
        let s = strategy(StrategySpec {
            conflict_exits: Some((1, 127)),
            ..shell("t", "")
        });

        assert_eq!(s.interpret(Some(0), "m".into(), "".into()).status, ExecutionStatus::Success);
        let conflicts = s.interpret(Some(3), "<<<<<<< a\n".into(), "".into());
        assert_eq!(conflicts.status, ExecutionStatus::Conflicts);
        assert_eq!(conflicts.output_text, "<<<<<<< a\n");

        let failed = s.interpret(Some(255), "partial".into(), "bad input".into());
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert!(failed.output_text.is_empty());
        assert!(failed.stderr_text.contains("bad input"));
        assert!(failed.stderr_text.contains("255"));

        assert_eq!(s.interpret(None, "".into(), "".into()).status, ExecutionStatus::Failed);
    }

    #[test]
    fn markers_on_clean_exit_only_count_when_enabled() {
        let markers = "x\n<<<<<<< left\ny\n=======\nz\n>>>>>>> right\n".to_string();

        let plain = strategy(shell("t", ""));
        assert_eq!(
            plain.interpret(Some(0), markers.clone(), "".into()).status,
            ExecutionStatus::Success
        );
        assert_eq!(
            plain.interpret(Some(1), markers.clone(), "".into()).status,
            ExecutionStatus::Failed
        );

        let detecting = strategy(StrategySpec {
            detect_markers: true,
            ..shell("t", "")
        });
        assert_eq!(
            detecting.interpret(Some(0), markers, "".into()).status,
            ExecutionStatus::Conflicts
        );
    }

    #[test]
    fn renders_placeholders_or_appends_paths() {
        let scratch = Scratch {
            dir: tempfile::tempdir().unwrap(),
            base: PathBuf::from("/tmp/x/base.rs"),
            left: PathBuf::from("/tmp/x/left.rs"),
            right: PathBuf::from("/tmp/x/right.rs"),
        };

        let templated: Vec<String> = ["merge-file", "-p", "{left}", "{base}", "{right}"]
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(
            render_args(&templated, &scratch),
            ["merge-file", "-p", "/tmp/x/left.rs", "/tmp/x/base.rs", "/tmp/x/right.rs"]
        );

        let plain = vec!["merge".to_string()];
        assert_eq!(
            render_args(&plain, &scratch),
            ["merge", "/tmp/x/base.rs", "/tmp/x/left.rs", "/tmp/x/right.rs"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn locates_on_path_and_by_relative_path() {
        assert!(locate("sh", None).is_some());
        assert!(locate("definitely-not-a-merge-tool-xyz", None).is_none());

        let dir = tempfile::tempdir().unwrap();
        assert!(locate("bin/tool", Some(dir.path())).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_merge_passes_staged_files_in_order() {
        let s = strategy(shell("cat-left", "cat \"$2\"; case \"$1\" in *base.swift) exit 0;; esac; exit 9"));
        assert!(s.available().await);

        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Success, "{}", out.stderr_text);
        assert_eq!(out.output_text, "b\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn conflict_exit_keeps_output() {
        let s = strategy(StrategySpec {
            conflict_exits: Some((1, 1)),
            ..shell("conflicting", "printf '<<<<<<< l\\nb\\n=======\\nc\\n>>>>>>> r\\n'; exit 1")
        });

        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Conflicts);
        assert!(out.output_text.starts_with("<<<<<<<"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn crash_is_failed_with_diagnostic() {
        let s = strategy(StrategySpec {
            conflict_exits: Some((1, 1)),
            ..shell("crashy", "echo 'parse error' >&2; exit 2")
        });

        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Failed);
        assert!(out.stderr_text.contains("parse error"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_times_out() {
        let s = CommandStrategy::new(shell("sleepy", "sleep 10"), Duration::from_millis(200));

        let started = std::time::Instant::now();
        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Failed);
        assert!(out.stderr_text.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable_and_skips() {
        let s = strategy(StrategySpec::new(
            "ghost",
            vec![vec!["definitely-not-a-merge-tool-xyz".into(), "merge".into()]],
        ));
        assert!(!s.available().await);
        assert_eq!(s.run(&scenario()).await.status, ExecutionStatus::Skipped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn build_on_demand_makes_tool_available() {
        let dir = tempfile::tempdir().unwrap();
        let spec = StrategySpec {
            build: Some(vec![
                "sh".into(),
                "-c".into(),
                "mkdir -p bin && printf '#!/bin/sh\\ncat \"$2\"\\n' > bin/tool && chmod +x bin/tool".into(),
            ]),
            working_dir: Some(dir.path().to_path_buf()),
            ..StrategySpec::new("built", vec![vec!["bin/tool".into()]])
        };
        let s = strategy(spec);

        assert!(s.available().await);
        assert_eq!(
            s.resolved_program().await,
            Some(dir.path().join("bin/tool"))
        );
        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Success);
        assert_eq!(out.output_text, "b\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn source_scenario_is_untouched_and_scratch_removed() {
        let s = strategy(shell("mutator", "echo changed > \"$1\"; dirname \"$1\""));
        let before = scenario();
        let out = s.run(&before).await;
        assert_eq!(out.status, ExecutionStatus::Success);
        assert_eq!(before, scenario());

        let scratch_dir = PathBuf::from(out.output_text.trim());
        assert!(!scratch_dir.exists());
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scratch_is_removed_when_run_is_cancelled() {
        let root = tempfile::tempdir().unwrap();
        let s = CommandStrategy::new(shell("sleepy", "sleep 10"), Duration::from_secs(30))
            .with_scratch_root(Some(root.path().to_path_buf()));

        let cut_short = tokio::time::timeout(Duration::from_millis(300), s.run(&scenario())).await;
        assert!(cut_short.is_err());
        assert!(entries(root.path()).is_empty(), "{:?}", entries(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scratch_lives_under_configured_root() {
        let root = tempfile::tempdir().unwrap();
        let s = strategy(shell("where", "dirname \"$1\""))
            .with_scratch_root(Some(root.path().join("nested")));

        let out = s.run(&scenario()).await;
        assert_eq!(out.status, ExecutionStatus::Success, "{}", out.stderr_text);
        let used = PathBuf::from(out.output_text.trim());
        assert_eq!(used.parent(), Some(root.path().join("nested").as_path()));
        assert!(used
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("mergebench-"));
        assert!(entries(&root.path().join("nested")).is_empty());
    }
}
