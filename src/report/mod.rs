//! Report generator.
//!
//! [`generate`] is pure and deterministic; rendering and writing live in
//! [`render`].

mod render;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conservatism, LastStop};
use crate::validation::{ValidationResult, ValidationStatus};

pub use render::{write_outputs, RESULTS_JSON};

/// `validation_results.json`: one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<ValidationResult>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// One line of a per-profile table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub conservatism: Conservatism,
    pub last_stop: LastStop,
    pub expected_runtime: f64,
    pub actual_runtime: Option<f64>,
    pub difference: Option<f64>,
    pub accuracy_pct: Option<f64>,
    pub status: ValidationStatus,
}

/// All results sharing a depth and bottom time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    pub depth_m: u32,
    pub bottom_time_min: u32,
    /// Ordered by conservatism, least conservative first
    pub rows: Vec<ProfileRow>,
}

/// A failed case and its diagnostic, verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub label: String,
    pub status: ValidationStatus,
    pub detail: String,
}

/// Aggregated view of one validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total: usize,
    /// Every status is present, zero or not
    pub counts: BTreeMap<ValidationStatus, usize>,
    /// Exact plus close, as a percentage of the total
    pub success_rate: f64,
    /// `None` when no case produced a runtime
    pub accuracy: Option<AccuracyStats>,
    pub profiles: Vec<ProfileTable>,
    pub errors: Vec<ErrorEntry>,
}

impl Report {
    pub fn count(&self, status: ValidationStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn successes(&self) -> usize {
        self.count(ValidationStatus::Exact) + self.count(ValidationStatus::Close)
    }
}

/// Aggregate validation results.
pub fn generate(results: &[ValidationResult]) -> Report {
    let total = results.len();

    let mut counts: BTreeMap<ValidationStatus, usize> =
        ValidationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for result in results {
        *counts.entry(result.status).or_default() += 1;
    }
    let successes = results.iter().filter(|r| r.status.is_success()).count();
    let success_rate = if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64 * 100.0
    };

    let accuracies: Vec<f64> = results
        .iter()
        .filter(|r| !r.status.is_failure())
        .filter_map(|r| r.accuracy_pct)
        .collect();
    let accuracy = (!accuracies.is_empty()).then(|| AccuracyStats {
        average: accuracies.iter().sum::<f64>() / accuracies.len() as f64,
        min: accuracies.iter().copied().fold(f64::INFINITY, f64::min),
        max: accuracies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    });

    let mut grouped: BTreeMap<(u32, u32), Vec<ProfileRow>> = BTreeMap::new();
    for r in results {
        grouped
            .entry((r.case.depth_m(), r.case.bottom_time_min()))
            .or_default()
            .push(ProfileRow {
                conservatism: r.case.conservatism(),
                last_stop: r.case.last_stop(),
                expected_runtime: r.case.expected_runtime,
                actual_runtime: r.actual_runtime,
                difference: r.difference,
                accuracy_pct: r.accuracy_pct,
                status: r.status,
            });
    }
    let profiles = grouped
        .into_iter()
        .map(|((depth_m, bottom_time_min), mut rows)| {
            rows.sort_by_key(|row| (row.conservatism, row.last_stop));
            ProfileTable {
                depth_m,
                bottom_time_min,
                rows,
            }
        })
        .collect();

    let errors = results
        .iter()
        .filter(|r| r.status.is_failure())
        .map(|r| ErrorEntry {
            label: r.case.key.label(),
            status: r.status,
            detail: r
                .error_detail
                .clone()
                .unwrap_or_else(|| "Parse error".to_string()),
        })
        .collect();

    Report {
        total,
        counts,
        success_rate,
        accuracy,
        profiles,
        errors,
    }
}
