pub mod classify;
pub mod command;
pub mod harness;

pub use command::CommandStrategy;
pub use harness::{Evaluation, Harness, HarnessOptions, OUTER_GRACE};

use mergebench_core::{MergeStrategy, Settings};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured command-line strategies, optionally restricted to
/// `only` (kept in configuration order). Unknown names in `only` are returned
/// as the error.
pub fn command_strategies(
    settings: &Settings,
    only: &[String],
) -> Result<Vec<Arc<dyn MergeStrategy>>, Vec<String>> {
    let unknown: Vec<String> = only
        .iter()
        .filter(|name| !settings.strategies.iter().any(|s| &s.name == *name))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }

    let timeout = Duration::from_millis(settings.harness.timeout_ms);
    Ok(settings
        .strategies
        .iter()
        .filter(|spec| only.is_empty() || only.contains(&spec.name))
        .map(|spec| {
            let strategy = CommandStrategy::new(spec.clone(), timeout)
                .with_scratch_root(settings.harness.scratch_dir.clone());
            Arc::new(strategy) as Arc<dyn MergeStrategy>
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_strategies_by_name() {
        let settings = Settings::default();

        let all = command_strategies(&settings, &[]).unwrap();
        let names: Vec<_> = all.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["diff3", "mergiraf", "mergiraf-semi"]);

        let only = command_strategies(&settings, &["mergiraf".into(), "diff3".into()]).unwrap();
        let names: Vec<_> = only.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["diff3", "mergiraf"]);

        let err = command_strategies(&settings, &["kdiff3".into()]).err().unwrap();
        assert_eq!(err, ["kdiff3"]);
    }
}
