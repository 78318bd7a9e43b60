//! Last-stop depth resolution.
//!
//! The planner's debug label and its computed schedule have been seen to
//! disagree. An affirmative 6 m label is taken at its word; otherwise the
//! schedule head overrides whatever negative label is present. Rules are tried
//! in [`PRECEDENCE`] order and the first one that yields a decision wins.

use std::fmt;

use crate::models::{LastStop, Stop};
use crate::parser::RawReport;

/// How a last-stop decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastStopRule {
    /// Affirmative 6 m label in the debug dump
    ExplicitLabel,
    /// Shallow stop rows near the top of the debug schedule
    ScheduleEvidence,
    /// Nothing pointed at 6 m
    Default,
}

pub const PRECEDENCE: [LastStopRule; 3] = [
    LastStopRule::ExplicitLabel,
    LastStopRule::ScheduleEvidence,
    LastStopRule::Default,
];

/// Resolved last stop plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastStopDecision {
    pub last_stop: LastStop,
    pub rule: LastStopRule,
    pub evidence: Option<String>,
}

impl LastStopRule {
    fn apply(self, debug: &RawReport) -> Option<LastStopDecision> {
        match self {
            Self::ExplicitLabel => debug
                .last_stop_hints
                .iter()
                .find(|hint| hint.implies == LastStop::Six)
                .map(|hint| LastStopDecision {
                    last_stop: LastStop::Six,
                    rule: self,
                    evidence: Some(hint.phrase.to_string()),
                }),
            Self::ScheduleEvidence => {
                let stop = debug.schedule_head.iter().find(|s| shallow_stop(s).is_some())?;
                Some(LastStopDecision {
                    last_stop: shallow_stop(stop)?,
                    rule: self,
                    evidence: Some(format!("{:.0}m for {} min", stop.depth_m, stop.duration_min)),
                })
            }
            Self::Default => Some(LastStopDecision {
                last_stop: LastStop::Three,
                rule: self,
                evidence: None,
            }),
        }
    }
}

impl fmt::Display for LastStopDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.rule, &self.evidence) {
            (LastStopRule::ExplicitLabel, Some(phrase)) => write!(f, "label \"{phrase}\""),
            (LastStopRule::ScheduleEvidence, Some(row)) => write!(f, "schedule row \"{row}\""),
            _ => write!(f, "no 6m evidence, default {}", self.last_stop),
        }
    }
}

fn shallow_stop(stop: &Stop) -> Option<LastStop> {
    let depth = stop.depth_m.round();
    if (stop.depth_m - depth).abs() > 0.01 || depth < 0.0 {
        return None;
    }
    LastStop::from_depth(depth as u32)
}

/// Decide the last-stop depth from a debug report.
pub fn resolve(debug: &RawReport) -> LastStopDecision {
    PRECEDENCE
        .iter()
        .find_map(|rule| rule.apply(debug))
        .unwrap_or(LastStopDecision {
            last_stop: LastStop::Three,
            rule: LastStopRule::Default,
            evidence: None,
        })
}
