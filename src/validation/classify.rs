//! Tolerance classification of engine runtimes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Differences strictly below this are exact matches (minutes).
pub const EXACT_TOLERANCE_MIN: f64 = 0.1;
/// Differences strictly below this are close matches (minutes).
pub const CLOSE_TOLERANCE_MIN: f64 = 2.0;
/// Runtimes are reported to a tenth of a minute; this drops subtraction noise.
const DIFFERENCE_SCALE: f64 = 1e6;

/// Outcome of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Exact,
    Close,
    Off,
    Error,
    ParseError,
}

impl ValidationStatus {
    pub const ALL: [Self; 5] = [Self::Exact, Self::Close, Self::Off, Self::Error, Self::ParseError];

    /// Classify a runtime difference.
    pub fn from_difference(difference: f64) -> Self {
        let magnitude = difference.abs();
        if magnitude < EXACT_TOLERANCE_MIN {
            Self::Exact
        } else if magnitude < CLOSE_TOLERANCE_MIN {
            Self::Close
        } else {
            Self::Off
        }
    }

    /// Exact or close.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Exact | Self::Close)
    }

    /// The engine produced nothing comparable.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::ParseError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Close => "close",
            Self::Off => "off",
            Self::Error => "error",
            Self::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected-vs-actual comparison of a runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// `actual - expected`
    pub difference: f64,
    pub accuracy_pct: f64,
    pub status: ValidationStatus,
}

pub fn compare(expected: f64, actual: f64) -> Comparison {
    let difference = ((actual - expected) * DIFFERENCE_SCALE).round() / DIFFERENCE_SCALE;
    let accuracy_pct = if expected == 0.0 {
        0.0
    } else {
        (1.0 - difference.abs() / expected) * 100.0
    };
    Comparison {
        difference,
        accuracy_pct,
        status: ValidationStatus::from_difference(difference),
    }
}
