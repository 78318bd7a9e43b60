//! Report parser.
//!
//! Turns one raw text artifact (planner plan report, planner debug dump, or
//! engine stdout) into a [`RawReport`]. Parsing is total: anything missing is
//! simply absent from the result, and problems worth reporting are collected
//! as [`ParseIssue`]s instead of errors.

mod patterns;

use serde::Serialize;

use crate::models::{GasMixture, LastStop, Stop};

use patterns::{Section, FIELD_PATTERNS, LAST_STOP_PATTERNS};

/// Number of lines after the schedule header inspected for last-stop evidence.
pub const SCHEDULE_HEAD_LINES: usize = 20;

/// Scalar fields the parser knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Runtime,
    DecoTime,
    /// Stored as `low/high`
    GradientFactors,
    VpmConservatism,
    Depth,
    BottomTime,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Self::Runtime => "total runtime",
            Self::DecoTime => "total deco time",
            Self::GradientFactors => "gradient factors",
            Self::VpmConservatism => "VPM conservatism",
            Self::Depth => "depth",
            Self::BottomTime => "bottom time",
        }
    }
}

/// A last-stop phrase found in the text, with the depth it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastStopHint {
    pub phrase: &'static str,
    pub implies: LastStop,
    /// Zero-based line number of the first occurrence
    pub line: usize,
}

/// Non-fatal parse problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    /// No schedule header anywhere in the text
    NoScheduleSection,
    /// A gas line inside a gas section could not be turned into a mix
    UnreadableGas { line: usize, reason: String },
}

/// Structured view of one text report.
#[derive(Debug, Clone, Default)]
pub struct RawReport {
    /// Discovery order, one entry per field
    fields: Vec<(Field, String)>,
    /// Every last-stop phrase that matched, in discovery order
    pub last_stop_hints: Vec<LastStopHint>,
    /// `<depth>m for <duration> min` rows of all schedule sections
    pub schedule: Vec<Stop>,
    /// Schedule rows within the first lines after the first schedule header
    pub schedule_head: Vec<Stop>,
    /// Mixes from a `GASES` or `GAS CONFIGURATION` section
    pub gases: Vec<GasMixture>,
    /// Rows of a pipe-delimited engine schedule table
    pub table: Vec<Stop>,
    /// True when a `GAS CONFIGURATION` section is already present
    pub has_gas_configuration: bool,
    pub issues: Vec<ParseIssue>,
}

impl RawReport {
    /// Raw text value of a field.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| value.as_str())
    }

    /// Numeric value of a single-number field.
    pub fn number(&self, field: Field) -> Option<f64> {
        self.get(field)?.parse().ok()
    }

    /// Gradient factor pair, if present.
    pub fn gradient_factors(&self) -> Option<(u8, u8)> {
        let (low, high) = self.get(Field::GradientFactors)?.split_once('/')?;
        Some((low.parse().ok()?, high.parse().ok()?))
    }

    /// Schedule rows, falling back to the engine table when no
    /// `m for` section was found.
    pub fn stops(&self) -> &[Stop] {
        if self.schedule.is_empty() {
            &self.table
        } else {
            &self.schedule
        }
    }

    fn scan_fields(&mut self, line: &str) {
        for (field, regex) in FIELD_PATTERNS.iter() {
            if self.get(*field).is_some() {
                continue;
            }
            if let Some(caps) = regex.captures(line) {
                let value = match (caps.get(1), caps.get(2)) {
                    (Some(a), Some(b)) => format!("{}/{}", a.as_str(), b.as_str()),
                    (Some(a), None) => a.as_str().to_string(),
                    _ => continue,
                };
                self.fields.push((*field, value));
            }
        }
    }

    fn scan_last_stop(&mut self, line: &str, line_no: usize) {
        for (phrase, implies, regex) in LAST_STOP_PATTERNS.iter() {
            if regex.is_match(line) && !self.last_stop_hints.iter().any(|h| h.phrase == *phrase) {
                self.last_stop_hints.push(LastStopHint {
                    phrase: *phrase,
                    implies: *implies,
                    line: line_no,
                });
            }
        }
    }

    fn record_gas(&mut self, line_no: usize, parsed: Result<GasMixture, String>) {
        match parsed {
            Ok(gas) => self.gases.push(gas),
            Err(reason) => {
                tracing::debug!(line = line_no + 1, %reason, "skipping gas line");
                self.issues.push(ParseIssue::UnreadableGas {
                    line: line_no,
                    reason,
                });
            }
        }
    }
}

/// Parse one text report. Never fails.
pub fn parse(text: &str) -> RawReport {
    let mut report = RawReport::default();
    let mut section = Section::Preamble;
    let mut schedule_start: Option<usize> = None;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = patterns::section_header(line) {
            match header {
                Section::Schedule if schedule_start.is_none() => schedule_start = Some(line_no),
                Section::GasConfiguration => report.has_gas_configuration = true,
                _ => {}
            }
            section = header;
            continue;
        }

        report.scan_fields(line);
        report.scan_last_stop(line, line_no);
        if let Some(row) = patterns::parse_pipe_row(line) {
            report.table.push(row);
        }

        match section {
            Section::Schedule => {
                if let Some(stop) = patterns::parse_stop_line(line) {
                    report.schedule.push(stop);
                    let in_head = schedule_start
                        .is_some_and(|start| line_no - start <= SCHEDULE_HEAD_LINES);
                    if in_head {
                        report.schedule_head.push(stop);
                    }
                }
            }
            Section::Gases if line.starts_with("Gas") => {
                report.record_gas(line_no, patterns::parse_debug_gas(line));
            }
            Section::GasConfiguration if line.contains("Gas:") => {
                report.record_gas(line_no, patterns::parse_config_gas(line));
            }
            _ => {}
        }
    }

    if schedule_start.is_none() {
        report.issues.push(ParseIssue::NoScheduleSection);
    }
    report
}
