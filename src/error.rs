//! Error types shared across the pipeline.
//!
//! Parsing never fails (missing data is reported as [`crate::parser::ParseIssue`]);
//! everything else that can go wrong for a single case lands in one of these.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::CaseInvariant;

/// Rejected gas mixture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GasError {
    #[error("gas {label}: percentages must be between 0 and 100")]
    PercentOutOfRange { label: String },
    #[error("gas {label}: O2 + He exceeds 100%")]
    ExceedsHundred { label: String },
    #[error("deco gas {label} has no switch depth")]
    MissingSwitchDepth { label: String },
}

/// Filesystem failure while relocating or persisting artifacts.
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal problem reconciling one plan/debug pair.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("plan report {report} is missing {field}")]
    MissingField { report: String, field: &'static str },
    #[error("no algorithm marker in {report}; cannot route to a test-case directory")]
    Unroutable { report: String },
    #[error("reconciled case {report} is inconsistent: {source}")]
    Invariant {
        report: String,
        #[source]
        source: CaseInvariant,
    },
    #[error("no {kind} file found in {dir}")]
    NothingStaged { kind: &'static str, dir: PathBuf },
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),
}

/// External engine invocation failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("engine exited with status {code}: {diagnostic}")]
    NonZeroExit { code: i32, diagnostic: String },
    #[error("failed to wait for engine: {0}")]
    Wait(#[source] std::io::Error),
}

impl EngineError {
    /// Diagnostic recorded against the case; the engine's own output when it has one.
    pub fn detail(&self) -> String {
        match self {
            Self::NonZeroExit { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure loading or persisting the corpus or validation results.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid command-line or environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("engine command for {algorithm} is empty")]
    EmptyEngineCommand { algorithm: crate::models::Algorithm },
}
