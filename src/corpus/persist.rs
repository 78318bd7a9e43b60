//! Writing and reading the persisted corpus.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Corpus, CorpusRow};
use crate::error::{CorpusError, FileSystemError};
use crate::models::DiveTestCase;

pub const CORPUS_CSV: &str = "corpus.csv";
pub const CORPUS_JSON: &str = "corpus.json";

pub const CORPUS_COLUMNS: [&str; 11] = [
    "algorithm",
    "depth",
    "time",
    "bottom_gas",
    "deco_gas",
    "conservatism",
    "expected_runtime",
    "expected_deco_time",
    "status",
    "accuracy",
    "notes",
];

/// `corpus.json`: full cases including gases and schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub generated_at: DateTime<Utc>,
    pub cases: Vec<DiveTestCase>,
}

/// Where a corpus was written.
#[derive(Debug, Clone)]
pub struct CorpusPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Render rows as CSV with a header line.
pub fn build_corpus_csv(rows: &[CorpusRow]) -> String {
    let mut out = String::new();
    out.push_str(&CORPUS_COLUMNS.join(","));
    out.push('\n');
    for row in rows {
        let fields = [
            row.algorithm.to_string(),
            row.depth.to_string(),
            row.time.to_string(),
            row.bottom_gas.clone(),
            row.deco_gas.clone(),
            row.conservatism.clone(),
            row.expected_runtime.to_string(),
            row.expected_deco_time.to_string(),
            row.status.to_string(),
            row.accuracy.clone(),
            row.notes.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote a CSV field when it contains a separator, quote or newline.
pub(crate) fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write through a sibling temp file and rename, so readers never see a
/// half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), FileSystemError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| FileSystemError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).map_err(|source| FileSystemError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        FileSystemError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Replace `corpus.csv` and `corpus.json` in `out_dir`.
pub fn write_corpus(corpus: &Corpus, out_dir: &Path) -> Result<CorpusPaths, CorpusError> {
    let paths = CorpusPaths {
        csv: out_dir.join(CORPUS_CSV),
        json: out_dir.join(CORPUS_JSON),
    };

    let document = CorpusDocument {
        generated_at: Utc::now(),
        cases: corpus.cases.clone(),
    };
    let json = serde_json::to_string_pretty(&document).map_err(|source| CorpusError::Json {
        path: paths.json.clone(),
        source,
    })?;

    write_atomic(&paths.csv, &build_corpus_csv(&corpus.rows))?;
    write_atomic(&paths.json, &json)?;
    tracing::info!(
        rows = corpus.rows.len(),
        csv = %paths.csv.display(),
        json = %paths.json.display(),
        "corpus written"
    );
    Ok(paths)
}

/// Read the cases of a persisted `corpus.json`.
pub fn load_cases(path: &Path) -> Result<Vec<DiveTestCase>, CorpusError> {
    let text = fs::read_to_string(path).map_err(|source| FileSystemError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: CorpusDocument =
        serde_json::from_str(&text).map_err(|source| CorpusError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(document.cases)
}
