use crate::classify::classify_run;
use mergebench_core::config::HarnessSettings;
use mergebench_core::records::{RecordFile, RecordedRun, ScenarioRecord};
use mergebench_core::{
    Classification, Corpus, EvalError, MergeOutput, MergeStrategy, Scenario, StrategyRun,
    WrongMergePolicy,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

/// Extra time the harness allows past `HarnessOptions::timeout`, so an
/// adapter's own timeout fires first and it can clean up after itself.
pub const OUTER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Per-invocation bound. The harness cuts a call off after this plus
    /// [`OUTER_GRACE`].
    pub timeout: Duration,
    /// Number of concurrent invocations; 1 is a sequential sweep.
    pub jobs: usize,
    pub wrong_merge: WrongMergePolicy,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self::from(&HarnessSettings::default())
    }
}

impl From<&HarnessSettings> for HarnessOptions {
    fn from(settings: &HarnessSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            jobs: settings.jobs.max(1),
            wrong_merge: settings.wrong_merge,
        }
    }
}

/// Everything one pass produced, in (scenario, strategy) registration order.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Identifies this pass in logs and reports.
    pub run_id: String,
    pub runs: Vec<StrategyRun>,
    pub classifications: Vec<Classification>,
    /// Strategies whose backing mechanism could not be located.
    pub unavailable: Vec<String>,
    /// Set when the pass stopped early at a scenario checkpoint.
    pub cancelled: bool,
    pub scenarios_evaluated: usize,
}

impl Evaluation {
    /// Results in the `scenarios.json` shape: the corpus labels plus one
    /// `{execution, comparison}` entry per run.
    pub fn to_records(&self, corpus: &Corpus) -> RecordFile {
        let mut records: RecordFile = corpus
            .scenarios()
            .iter()
            .map(|s| {
                let record = ScenarioRecord {
                    expected: Some(s.expected_label.as_str().to_string()),
                    ..Default::default()
                };
                (s.name.clone(), record)
            })
            .collect();

        for run in &self.runs {
            if let Some(record) = records.get_mut(&run.scenario_name) {
                record.runs.insert(
                    run.strategy_name.clone(),
                    RecordedRun::new(run.execution_status, run.comparison),
                );
            }
        }
        records
    }
}

/// Drives every (scenario, strategy) pair to a run and a classification.
pub struct Harness {
    strategies: Vec<Arc<dyn MergeStrategy>>,
    options: HarnessOptions,
}

impl Harness {
    /// Strategies run in the order given. A repeated name keeps the first.
    pub fn new(strategies: Vec<Arc<dyn MergeStrategy>>, options: HarnessOptions) -> Self {
        let mut seen = HashSet::new();
        let strategies = strategies
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.name().to_string());
                if !fresh {
                    tracing::warn!(strategy = %s.name(), "Duplicate strategy ignored");
                }
                fresh
            })
            .collect();
        Self {
            strategies,
            options,
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// The ordered (scenario, strategy) pairs a pass would execute.
    pub fn plan(&self, corpus: &Corpus) -> Vec<(String, String)> {
        corpus
            .scenarios()
            .iter()
            .flat_map(|scenario| {
                self.strategies
                    .iter()
                    .map(move |s| (scenario.name.clone(), s.name().to_string()))
            })
            .collect()
    }

    /// Run one evaluation pass.
    ///
    /// Unavailable strategies and failing invocations never abort the pass;
    /// they become SKIPPED and FAILED runs. A signal on `shutdown` stops the
    /// pass before the next scenario starts; runs already in flight finish.
    pub async fn evaluate(
        &self,
        corpus: &Corpus,
        shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<Evaluation, EvalError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("evaluate", run = %run_id);
        let mut evaluation = self.evaluate_pass(corpus, shutdown).instrument(span).await?;
        evaluation.run_id = run_id;
        Ok(evaluation)
    }

    async fn evaluate_pass(
        &self,
        corpus: &Corpus,
        mut shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<Evaluation, EvalError> {
        let unavailable = self.check_availability().await;
        let width = self.strategies.len();
        let permits = Arc::new(Semaphore::new(self.options.jobs.max(1)));

        let mut finished: Vec<(usize, StrategyRun)> = Vec::with_capacity(corpus.len() * width);
        let mut tasks = JoinSet::new();
        let mut spawned = Vec::new();
        let mut cancelled = false;
        let mut scenarios_evaluated = 0;

        for (row, scenario) in corpus.scenarios().iter().enumerate() {
            if shutdown.as_mut().is_some_and(shutdown_requested) {
                tracing::warn!(
                    remaining = corpus.len() - row,
                    "Evaluation cancelled, remaining scenarios not run"
                );
                cancelled = true;
                break;
            }
            scenarios_evaluated += 1;
            let shared = Arc::new(scenario.clone());

            for (col, strategy) in self.strategies.iter().enumerate() {
                let index = row * width + col;

                if unavailable.contains(strategy.name()) {
                    let output = MergeOutput::skipped(format!("{} is unavailable", strategy.name()));
                    finished.push((index, StrategyRun::from_output(scenario, strategy.name(), output)));
                    continue;
                }

                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let strategy = strategy.clone();
                let scenario = shared.clone();
                let timeout = self.options.timeout;
                tasks.spawn(async move {
                    let _permit = permit;
                    let output = invoke(strategy.as_ref(), &scenario, timeout).await;
                    (index, StrategyRun::from_output(&scenario, strategy.name(), output))
                });
                spawned.push(index);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, run)) => finished.push((index, run)),
                Err(e) => tracing::warn!(error = %e, "Adapter task aborted"),
            }
        }

        // A panicking adapter is just another failed invocation.
        let completed: HashSet<usize> = finished.iter().map(|(index, _)| *index).collect();
        for index in spawned.into_iter().filter(|i| !completed.contains(i)) {
            let scenario = &corpus.scenarios()[index / width];
            let strategy = self.strategies[index % width].name();
            let output = MergeOutput::failed("adapter task aborted before returning");
            finished.push((index, StrategyRun::from_output(scenario, strategy, output)));
        }

        finished.sort_by_key(|(index, _)| *index);

        let mut runs = Vec::with_capacity(finished.len());
        let mut classifications = Vec::with_capacity(finished.len());
        for (index, run) in finished {
            let scenario = &corpus.scenarios()[index / width];
            log_run(&run);
            classifications.push(classify_run(scenario, &run, self.options.wrong_merge)?);
            runs.push(run);
        }

        let unavailable: Vec<String> = self
            .strategy_names()
            .into_iter()
            .filter(|name| unavailable.contains(*name))
            .map(String::from)
            .collect();

        tracing::info!(
            scenarios = scenarios_evaluated,
            strategies = width,
            runs = runs.len(),
            cancelled,
            "Evaluation finished"
        );

        Ok(Evaluation {
            run_id: String::new(),
            runs,
            classifications,
            unavailable,
            cancelled,
            scenarios_evaluated,
        })
    }

    async fn check_availability(&self) -> HashSet<String> {
        let mut unavailable = HashSet::new();
        for strategy in &self.strategies {
            if strategy.available().await {
                tracing::info!(strategy = %strategy.name(), "Strategy available");
            } else {
                let e = EvalError::AdapterUnavailable {
                    strategy: strategy.name().to_string(),
                    reason: "backing mechanism not found".into(),
                };
                tracing::warn!(error = %e, "All runs of this strategy will be skipped");
                unavailable.insert(strategy.name().to_string());
            }
        }
        unavailable
    }
}

fn shutdown_requested(rx: &mut broadcast::Receiver<()>) -> bool {
    matches!(
        rx.try_recv(),
        Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_))
    )
}

async fn invoke(strategy: &dyn MergeStrategy, scenario: &Scenario, timeout: Duration) -> MergeOutput {
    let limit = timeout + OUTER_GRACE;
    match tokio::time::timeout(limit, strategy.run(scenario)).await {
        Ok(output) => output,
        Err(_) => MergeOutput::failed(format!("timed out after {} ms", limit.as_millis())),
    }
}

fn log_run(run: &StrategyRun) {
    match run.execution_status {
        mergebench_core::ExecutionStatus::Failed => {
            let e = EvalError::ExecutionFailure {
                scenario: run.scenario_name.clone(),
                strategy: run.strategy_name.clone(),
                reason: run.stderr_text.lines().last().unwrap_or("").to_string(),
            };
            tracing::warn!(error = %e, "Run failed");
        }
        status => tracing::debug!(
            scenario = %run.scenario_name,
            strategy = %run.strategy_name,
            status = %status,
            comparison = %run.comparison,
            "Run finished"
        ),
    }
}
