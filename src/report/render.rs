//! Markdown, CSV and JSON renderings of a validation run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Report, ResultsDocument};
use crate::corpus::{csv_field, write_atomic};
use crate::error::CorpusError;
use crate::models::{bottom_spec, deco_spec};
use crate::validation::{
    ValidationResult, ValidationStatus, CLOSE_TOLERANCE_MIN, EXACT_TOLERANCE_MIN, NO_GAS,
};

pub const VALIDATION_REPORT: &str = "VALIDATION_REPORT.md";
pub const RESULTS_CSV: &str = "validation_results.csv";
pub const RESULTS_JSON: &str = "validation_results.json";

pub const RESULTS_COLUMNS: [&str; 10] = [
    "depth",
    "time",
    "bottom_gas",
    "deco_gas",
    "conservatism",
    "expected_runtime",
    "actual_runtime",
    "difference",
    "accuracy",
    "status",
];

const PROFILE_HEADER: &str =
    "| Conservatism | Last Stop | Expected | Actual | Diff | Accuracy | Status |";
const PROFILE_RULE: &str =
    "|--------------|-----------|----------|--------|------|----------|--------|";

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Markdown summary of a run.
pub fn render_markdown(report: &Report, run_id: Uuid, generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        "# DecoPlanner Validation Report".to_string(),
        String::new(),
        format!("- Run: `{run_id}`"),
        format!("- Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        format!("- Total test cases: {}", report.total),
        format!(
            "- Exact matches (< {EXACT_TOLERANCE_MIN} min): {}",
            report.count(ValidationStatus::Exact)
        ),
        format!(
            "- Close matches (< {CLOSE_TOLERANCE_MIN:.1} min): {}",
            report.count(ValidationStatus::Close)
        ),
        format!("- Off: {}", report.count(ValidationStatus::Off)),
        format!("- Errors: {}", report.count(ValidationStatus::Error)),
        format!("- Parse errors: {}", report.count(ValidationStatus::ParseError)),
        format!("- Success rate: {:.1}%", report.success_rate),
        String::new(),
    ];

    if let Some(accuracy) = report.accuracy {
        lines.extend([
            "## Accuracy Analysis".to_string(),
            String::new(),
            format!("- Average accuracy: {:.2}%", accuracy.average),
            format!("- Best accuracy: {:.2}%", accuracy.max),
            format!("- Worst accuracy: {:.2}%", accuracy.min),
            String::new(),
        ]);
    }

    lines.push("## Results by Dive Profile".to_string());
    lines.push(String::new());
    for profile in &report.profiles {
        lines.extend([
            format!("### {}m/{}min", profile.depth_m, profile.bottom_time_min),
            String::new(),
            PROFILE_HEADER.to_string(),
            PROFILE_RULE.to_string(),
        ]);
        for row in &profile.rows {
            let measured = match (row.actual_runtime, row.difference, row.accuracy_pct) {
                (Some(actual), Some(diff), Some(accuracy)) => {
                    format!("{actual:.1} | {diff:+.2} | {accuracy:.1}%")
                }
                _ => "- | - | -".to_string(),
            };
            lines.push(format!(
                "| {} | {} | {:.1} | {measured} | {} |",
                row.conservatism,
                row.last_stop,
                row.expected_runtime,
                row.status.as_str().to_uppercase()
            ));
        }
        lines.push(String::new());
    }

    if !report.errors.is_empty() {
        lines.push("## Error Details".to_string());
        lines.push(String::new());
        for entry in &report.errors {
            lines.extend([
                format!("**{}** ({})", entry.label, entry.status),
                String::new(),
                "```text".to_string(),
                entry.detail.trim_end().to_string(),
                "```".to_string(),
                String::new(),
            ]);
        }
    }

    let mut md = lines.join("\n");
    md.push('\n');
    md
}

/// Per-case CSV; absent values are empty cells.
pub fn build_results_csv(results: &[ValidationResult]) -> String {
    fn opt(value: Option<f64>, precision: usize) -> String {
        value
            .map(|v| format!("{v:.precision$}"))
            .unwrap_or_default()
    }

    let mut out = String::new();
    out.push_str(&RESULTS_COLUMNS.join(","));
    out.push('\n');
    for r in results {
        let case = &r.case;
        let fields = [
            case.depth_m().to_string(),
            case.bottom_time_min().to_string(),
            bottom_spec(&case.gases).unwrap_or_else(|| NO_GAS.to_string()),
            deco_spec(&case.gases).unwrap_or_else(|| NO_GAS.to_string()),
            case.conservatism().to_string(),
            case.expected_runtime.to_string(),
            opt(r.actual_runtime, 2),
            opt(r.difference, 2),
            opt(r.accuracy_pct, 2),
            r.status.to_string(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Write the Markdown report, the CSV and the JSON results into `out_dir`.
pub fn write_outputs(
    report: &Report,
    results: &[ValidationResult],
    out_dir: &Path,
    run_id: Uuid,
    generated_at: DateTime<Utc>,
) -> Result<ReportPaths, CorpusError> {
    let paths = ReportPaths {
        markdown: out_dir.join(VALIDATION_REPORT),
        csv: out_dir.join(RESULTS_CSV),
        json: out_dir.join(RESULTS_JSON),
    };

    let document = ResultsDocument {
        run_id,
        generated_at,
        results: results.to_vec(),
    };
    let json = serde_json::to_string_pretty(&document).map_err(|source| CorpusError::Json {
        path: paths.json.clone(),
        source,
    })?;

    write_atomic(&paths.markdown, &render_markdown(report, run_id, generated_at))?;
    write_atomic(&paths.csv, &build_results_csv(results))?;
    write_atomic(&paths.json, &json)?;
    Ok(paths)
}
