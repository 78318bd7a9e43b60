//! Corpus builder.
//!
//! Flattens canonical cases of both algorithms into one uniform table and
//! tags each row with how well it is corroborated.

mod loader;
mod persist;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, FileSystemError};
use crate::models::{bottom_spec, deco_spec, Algorithm, CaseKey, DiveTestCase};
use crate::reconcile::{is_debug_name, DETAILS_SUFFIX};
use crate::report::ResultsDocument;
use crate::validation::{ValidationResult, ValidationStatus, NO_GAS};

pub use loader::load_tree;
pub(crate) use persist::csv_field;
pub use persist::{load_cases, write_atomic, write_corpus, CORPUS_JSON};

/// Placeholder for accuracy that no run has established yet.
pub const ACCURACY_TBD: &str = "TBD";

/// How well a corpus row is corroborated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusStatus {
    /// A prior validation run matched (exact or close)
    Validated,
    /// A prior run exists but did not match; values are reference only
    Reference,
    /// The engine debug dump is stored with the case
    Captured,
    Ready,
}

impl CorpusStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Reference => "reference",
            Self::Captured => "captured",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for CorpusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the last validation run for one case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorOutcome {
    pub status: ValidationStatus,
    pub accuracy_pct: Option<f64>,
}

/// Prior validation outcomes keyed by case identity.
#[derive(Debug, Clone, Default)]
pub struct Corroboration {
    outcomes: HashMap<CaseKey, PriorOutcome>,
}

impl Corroboration {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let outcomes = results
            .iter()
            .map(|r| {
                (
                    r.case.key.clone(),
                    PriorOutcome {
                        status: r.status,
                        accuracy_pct: r.accuracy_pct,
                    },
                )
            })
            .collect();
        Self { outcomes }
    }

    /// Load the results of a previous `validate` run. A missing file means
    /// no corroboration.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no prior validation results");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| FileSystemError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ResultsDocument =
            serde_json::from_str(&text).map_err(|source| CorpusError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_results(&document.results))
    }

    pub fn outcome(&self, key: &CaseKey) -> Option<PriorOutcome> {
        self.outcomes.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

/// One row of `corpus.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusRow {
    pub algorithm: Algorithm,
    pub depth: u32,
    pub time: u32,
    pub bottom_gas: String,
    pub deco_gas: String,
    pub conservatism: String,
    pub expected_runtime: f64,
    pub expected_deco_time: f64,
    pub status: CorpusStatus,
    pub accuracy: String,
    pub notes: String,
}

/// The whole corpus, rows and full cases in the same order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub rows: Vec<CorpusRow>,
    pub cases: Vec<DiveTestCase>,
}

impl Corpus {
    pub fn count(&self, status: CorpusStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Build the corpus from canonical cases.
///
/// Rows are ordered by case key (Buhlmann before VPM-B, then depth, time and
/// conservatism). Cases sharing a key keep only the first one seen.
pub fn build(mut cases: Vec<DiveTestCase>, corroboration: &Corroboration) -> Corpus {
    cases.sort_by(|a, b| (a.algorithm(), &a.key).cmp(&(b.algorithm(), &b.key)));

    let mut seen = HashSet::new();
    cases.retain(|case| {
        let fresh = seen.insert(case.key.clone());
        if !fresh {
            tracing::warn!(case = %case.key, "duplicate case, keeping the first");
        }
        fresh
    });

    let rows = cases
        .iter()
        .map(|case| row_for(case, corroboration.outcome(&case.key)))
        .collect();
    Corpus { rows, cases }
}

fn row_for(case: &DiveTestCase, prior: Option<PriorOutcome>) -> CorpusRow {
    let status = match prior {
        Some(p) if p.status.is_success() => CorpusStatus::Validated,
        Some(_) => CorpusStatus::Reference,
        None if has_debug_dump(case) => CorpusStatus::Captured,
        None => CorpusStatus::Ready,
    };
    let accuracy = prior
        .and_then(|p| p.accuracy_pct)
        .map(|a| format!("{a:.1}%"))
        .unwrap_or_else(|| ACCURACY_TBD.to_string());
    let notes = match case.provenance.first() {
        Some(source) => format!("From {}", source.file_name),
        None => String::new(),
    };

    CorpusRow {
        algorithm: case.algorithm(),
        depth: case.depth_m(),
        time: case.bottom_time_min(),
        bottom_gas: bottom_spec(&case.gases).unwrap_or_else(|| NO_GAS.to_string()),
        deco_gas: deco_spec(&case.gases).unwrap_or_else(|| NO_GAS.to_string()),
        conservatism: case.conservatism().to_string(),
        expected_runtime: case.expected_runtime,
        expected_deco_time: case.expected_deco_time,
        status,
        accuracy,
        notes,
    }
}

fn has_debug_dump(case: &DiveTestCase) -> bool {
    case.provenance.iter().skip(1).any(|source| {
        source.file_name.ends_with(DETAILS_SUFFIX) || is_debug_name(&source.file_name)
    })
}
