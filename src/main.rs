//! DecoPlanner regression corpus tooling
//!
//! Reconciles planner plan reports with their debug dumps into canonical test
//! cases, flattens them into a corpus, and replays the corpus through the
//! external calculation engines.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod cli;
mod config;
mod corpus;
mod error;
mod models;
mod parser;
mod reconcile;
mod report;
mod validation;

use cli::{Cli, Command, CorpusArgs, ReconcileArgs, ValidateArgs};
use config::{Config, ValidatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decoplan_corpus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli);

    match &cli.command {
        Command::Reconcile(args) => run_reconcile(&config, args),
        Command::Corpus(args) => run_corpus(&config, args),
        Command::Validate(args) => run_validate(&config, args).await,
    }
}

fn run_reconcile(config: &Config, args: &ReconcileArgs) -> anyhow::Result<()> {
    let (plan_path, debug_path) = match (&args.plan, &args.debug) {
        (Some(plan), Some(debug_dump)) => (plan.clone(), debug_dump.clone()),
        _ => {
            let pair = reconcile::discover(&args.staging_dir).with_context(|| {
                format!("no plan/debug pair in {}", args.staging_dir.display())
            })?;
            if pair.is_suspicious() {
                tracing::warn!(
                    plan = %pair.plan.display(),
                    debug = %pair.debug.display(),
                    skew_secs = pair.skew.as_secs(),
                    "plan and debug were written far apart and may not belong together"
                );
            }
            (pair.plan, pair.debug)
        }
    };

    tracing::info!(plan = %plan_path.display(), debug = %debug_path.display(), "reconciling");
    let outcome = reconcile::reconcile_files(&plan_path, &debug_path, &config.test_cases_dir)
        .with_context(|| format!("failed to reconcile {}", plan_path.display()))?;

    for warning in &outcome.relocated.warnings {
        tracing::warn!(
            path = %warning.path.display(),
            error = %warning.error,
            "source left behind after copy"
        );
    }
    tracing::info!(
        case = %outcome.reconciled.case.key.label(),
        plan = %outcome.relocated.plan_path.display(),
        debug = %outcome.relocated.debug_path.display(),
        "test case filed"
    );
    Ok(())
}

fn run_corpus(config: &Config, args: &CorpusArgs) -> anyhow::Result<()> {
    let cases = corpus::load_tree(&config.test_cases_dir).with_context(|| {
        format!("failed to load test cases from {}", config.test_cases_dir.display())
    })?;

    let results_path = args.results.clone().unwrap_or_else(|| config.results_json());
    let corroboration = corpus::Corroboration::load(&results_path)
        .with_context(|| format!("failed to read {}", results_path.display()))?;
    tracing::info!(prior_results = corroboration.len(), "loaded corroboration");

    let built = corpus::build(cases, &corroboration);
    corpus::write_corpus(&built, &config.output_dir).context("failed to write corpus")?;

    tracing::info!(
        total = built.rows.len(),
        validated = built.count(corpus::CorpusStatus::Validated),
        reference = built.count(corpus::CorpusStatus::Reference),
        captured = built.count(corpus::CorpusStatus::Captured),
        ready = built.count(corpus::CorpusStatus::Ready),
        "corpus rebuilt"
    );
    Ok(())
}

async fn run_validate(config: &Config, args: &ValidateArgs) -> anyhow::Result<()> {
    let corpus_path = args.corpus.clone().unwrap_or_else(|| config.corpus_json());
    let cases = corpus::load_cases(&corpus_path)
        .with_context(|| format!("failed to load corpus {}", corpus_path.display()))?;

    let validator = ValidatorConfig::from_args(args)
        .context("invalid engine configuration")?
        .into_validator();
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, cases = cases.len(), workers = validator.workers, "validation starting");

    let results = Arc::new(validator).run_all(cases).await;

    let summary = report::generate(&results);
    let paths = report::write_outputs(&summary, &results, &config.output_dir, run_id, Utc::now())
        .context("failed to write validation report")?;

    tracing::info!(
        %run_id,
        successful = summary.successes(),
        total = summary.total,
        errors = summary.errors.len(),
        report = %paths.markdown.display(),
        "validation complete"
    );
    Ok(())
}
