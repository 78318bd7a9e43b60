//! CLI argument parsing using Clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Build and validate the DecoPlanner regression-test corpus
#[derive(Parser, Debug)]
#[command(name = "decoplan-corpus")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  decoplan-corpus reconcile                     Reconcile the newest staged plan/debug pair
  decoplan-corpus reconcile --plan p.txt --debug d.txt
  decoplan-corpus corpus                        Rebuild corpus.csv and corpus.json
  decoplan-corpus validate --workers 2          Replay the corpus through the engines
")]
pub struct Cli {
    /// Root of the test-case tree (contains Open_Circuit/...)
    #[arg(long, global = true, env = "DECOPLAN_TEST_CASES_DIR", default_value = "test_cases")]
    pub test_cases_dir: PathBuf,

    /// Where corpus and validation outputs are written
    #[arg(long, global = true, env = "DECOPLAN_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile a plan report with its debug dump and file both as a test case
    Reconcile(ReconcileArgs),
    /// Rebuild the corpus from the test-case tree
    Corpus(CorpusArgs),
    /// Run every corpus case through the external engine and write a report
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Plan report (default: newest plan in the staging directory)
    #[arg(long, requires = "debug")]
    pub plan: Option<PathBuf>,

    /// Debug dump (default: newest decoplanner_debug_*.txt in the staging directory)
    #[arg(long, requires = "plan")]
    pub debug: Option<PathBuf>,

    /// Directory the planner writes its reports to
    #[arg(long, env = "DECOPLAN_STAGING_DIR", default_value = ".")]
    pub staging_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct CorpusArgs {
    /// Results of a previous validation run (default: <output-dir>/validation_results.json)
    #[arg(long)]
    pub results: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Corpus to validate (default: <output-dir>/corpus.json)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Command line of the Buhlmann engine
    #[arg(long, env = "DECOPLAN_BUHLMANN_ENGINE", default_value = "java PerfectAlignmentCLI")]
    pub buhlmann_engine: String,

    /// Command line of the VPM-B engine
    #[arg(long, env = "DECOPLAN_VPM_ENGINE", default_value = "java VPMAlignmentCLI")]
    pub vpm_engine: String,

    /// Working directory for engine processes
    #[arg(long, env = "DECOPLAN_ENGINE_DIR")]
    pub engine_dir: Option<PathBuf>,

    /// Hard limit per engine run, in seconds
    #[arg(long, env = "DECOPLAN_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Minimum delay between engine starts, in milliseconds
    #[arg(long, env = "DECOPLAN_THROTTLE_MS", default_value_t = 500)]
    pub throttle_ms: u64,

    /// Concurrent engine processes
    #[arg(long, env = "DECOPLAN_WORKERS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Second conservatism parameter passed to the VPM-B engine
    #[arg(long, env = "DECOPLAN_VPM_SECOND_PARAM", default_value_t = 85)]
    pub vpm_second_param: u8,
}
