mod artifacts;
mod report;

use clap::{Parser, Subcommand};
use mergebench_core::config::Settings;
use mergebench_core::logging::init_logging;
use mergebench_core::records::{read_records, write_records};
use mergebench_core::{Corpus, WrongMergePolicy};
use mergebench_harness::classify::classify_records;
use mergebench_harness::{command_strategies, CommandStrategy, Harness, HarnessOptions};
use mergebench_metrics::MetricsReport;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "mergebench",
    about = "Score three-way merge tools against a labeled scenario corpus"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the settings file (defaults are used when it does not exist)
    #[arg(long, default_value = "mergebench.json")]
    config: PathBuf,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every strategy over every scenario and report the metrics
    Run {
        /// Corpus root (one directory per scenario plus scenarios.json)
        corpus: PathBuf,
        /// Only run these strategies (repeatable)
        #[arg(long = "strategy")]
        strategies: Vec<String>,
        /// Concurrent invocations
        #[arg(long)]
        jobs: Option<usize>,
        /// Per-invocation timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Bucketing of clean merges with unexpected content
        /// (separate, true-negative, false-positive)
        #[arg(long)]
        wrong_merge: Option<WrongMergePolicy>,
        /// Print the planned invocations without running anything
        #[arg(long)]
        dry_run: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Write the results in the scenarios.json schema
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write each run's merged output, stderr and diff against the
        /// expected artifact under this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Recompute metrics from a recorded results file
    Metrics {
        /// A scenarios.json with per-strategy execution/comparison entries
        results: PathBuf,
        #[arg(long)]
        wrong_merge: Option<WrongMergePolicy>,
        #[arg(long)]
        json: bool,
    },
    /// Show configured strategies and whether they can be located
    Strategies,
    /// Write a settings file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.config)?;

    let log_dir = cli.log_dir.as_deref().or(settings.logging.dir.as_deref());
    let _guard = init_logging(log_dir, &settings.logging.filter)?;

    match &cli.command {
        Commands::Run {
            corpus,
            strategies,
            jobs,
            timeout_ms,
            wrong_merge,
            dry_run,
            json,
            output,
            report_dir,
        } => {
            let mut settings = settings;
            if let Some(jobs) = jobs {
                settings.harness.jobs = *jobs;
            }
            if let Some(timeout_ms) = timeout_ms {
                settings.harness.timeout_ms = *timeout_ms;
            }
            if let Some(policy) = wrong_merge {
                settings.harness.wrong_merge = *policy;
            }
            let opts = RunOptions {
                dry_run: *dry_run,
                json: *json,
                output: output.as_deref(),
                report_dir: report_dir.as_deref(),
            };
            cmd_run(&settings, corpus, strategies, opts).await
        }
        Commands::Metrics {
            results,
            wrong_merge,
            json,
        } => {
            let policy = wrong_merge.unwrap_or(settings.harness.wrong_merge);
            cmd_metrics(results, policy, *json)
        }
        Commands::Strategies => cmd_strategies(&settings).await,
        Commands::Init { force } => cmd_init(&cli.config, *force),
    }
}

struct RunOptions<'a> {
    dry_run: bool,
    json: bool,
    output: Option<&'a Path>,
    report_dir: Option<&'a Path>,
}

async fn cmd_run(
    settings: &Settings,
    corpus_dir: &Path,
    only: &[String],
    opts: RunOptions<'_>,
) -> anyhow::Result<()> {
    let corpus = Corpus::load(corpus_dir)?;
    let strategies = command_strategies(settings, only)
        .map_err(|unknown| anyhow::anyhow!("Unknown strategy: {}", unknown.join(", ")))?;
    let harness = Harness::new(strategies, HarnessOptions::from(&settings.harness));

    if opts.dry_run {
        println!(
            "Would run {} strategies over {} scenarios:",
            harness.strategy_names().len(),
            corpus.len()
        );
        for (scenario, strategy) in harness.plan(&corpus) {
            println!("  {:<40} {}", scenario, strategy);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current scenario");
            let _ = shutdown_tx.send(());
        }
    });

    tracing::info!(
        corpus = %corpus_dir.display(),
        strategies = ?harness.strategy_names(),
        jobs = settings.harness.jobs,
        "Starting evaluation"
    );
    let evaluation = harness.evaluate(&corpus, Some(shutdown_rx)).await?;
    let metrics = MetricsReport::compute(&evaluation.classifications);

    if let Some(path) = opts.output {
        write_records(path, &evaluation.to_records(&corpus))?;
        tracing::info!(path = %path.display(), "Results written");
    }
    if let Some(dir) = opts.report_dir {
        artifacts::write_run_artifacts(dir, &corpus, &evaluation.runs)?;
    }

    let run = report::RunSummary {
        source: corpus_dir.display().to_string(),
        run_id: Some(evaluation.run_id.clone()),
        generated_at: chrono::Utc::now(),
        scenarios: corpus.len(),
        scenarios_evaluated: evaluation.scenarios_evaluated,
        cancelled: evaluation.cancelled,
        unavailable: evaluation.unavailable.clone(),
        wrong_merge: settings.harness.wrong_merge,
    };

    if opts.json {
        report::print_json(&run, &metrics, &evaluation.classifications)?;
    } else {
        report::print_text(&run, &metrics)?;
    }
    Ok(())
}

fn cmd_metrics(results: &Path, policy: WrongMergePolicy, json: bool) -> anyhow::Result<()> {
    let records = read_records(results)?;
    let classifications = classify_records(&records, policy)?;
    let metrics = MetricsReport::compute(&classifications);

    let run = report::RunSummary {
        source: results.display().to_string(),
        run_id: None,
        generated_at: chrono::Utc::now(),
        scenarios: records.len(),
        scenarios_evaluated: records.len(),
        cancelled: false,
        unavailable: Vec::new(),
        wrong_merge: policy,
    };

    if json {
        report::print_json(&run, &metrics, &classifications)?;
    } else {
        report::print_text(&run, &metrics)?;
    }
    Ok(())
}

async fn cmd_strategies(settings: &Settings) -> anyhow::Result<()> {
    println!("Configured strategies");
    println!("=====================");
    println!();

    let timeout = Duration::from_millis(settings.harness.timeout_ms);
    for spec in &settings.strategies {
        let strategy = CommandStrategy::new(spec.clone(), timeout);
        match strategy.resolved_program().await {
            Some(program) => println!("{:<16} available ({})", spec.name, program.display()),
            None => println!("{:<16} not found", spec.name),
        }
        for candidate in &spec.candidates {
            println!("  candidate: {}", candidate.join(" "));
        }
        if let Some(build) = &spec.build {
            println!("  build:     {}", build.join(" "));
        }
    }

    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Settings::default().save(path)?;
    println!("Default settings written to {}", path.display());
    Ok(())
}
