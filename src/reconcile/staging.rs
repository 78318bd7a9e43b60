//! Discovery of the newest plan/debug pair in the planner's output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;

use crate::error::{FileSystemError, ReconcileError};

/// Plan and debug written further apart than this probably come from different runs.
pub const MAX_PAIR_SKEW: Duration = Duration::from_secs(300);

/// File names containing any of these are planner utilities, not plan reports.
const EXCLUDED_NAME_PARTS: &[&str] = &[
    "debug",
    "log",
    "analysis",
    "capture",
    "complete",
    "final",
    "last",
    "all_",
    "vmp_",
    "vpm_",
    "error",
    "schedule_output",
    "stops_",
    "ccr_dive_plan",
    "ccr_20",
    "instructions",
];

static PLAN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+m\d+min").expect("plan name pattern"));

/// Newest plan report and debug dump found in a staging directory.
#[derive(Debug, Clone)]
pub struct StagedPair {
    pub plan: PathBuf,
    pub debug: PathBuf,
    /// Absolute difference of the two modification times
    pub skew: Duration,
}

impl StagedPair {
    pub fn is_suspicious(&self) -> bool {
        self.skew > MAX_PAIR_SKEW
    }
}

/// Whether a file name looks like a planner plan report.
pub fn is_plan_name(file_name: &str) -> bool {
    if !file_name.ends_with(".txt") {
        return false;
    }
    let lower = file_name.to_ascii_lowercase();
    if EXCLUDED_NAME_PARTS.iter().any(|part| lower.contains(part)) {
        return false;
    }
    PLAN_NAME_RE.is_match(file_name)
}

/// Whether a file name is a planner debug dump.
pub fn is_debug_name(file_name: &str) -> bool {
    file_name.starts_with("decoplanner_debug_") && file_name.ends_with(".txt")
}

/// Find the most recently modified plan and debug files.
pub fn discover(dir: &Path) -> Result<StagedPair, ReconcileError> {
    let entries = fs::read_dir(dir).map_err(|source| FileSystemError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut newest_plan: Option<(SystemTime, PathBuf)> = None;
    let mut newest_debug: Option<(SystemTime, PathBuf)> = None;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let slot = if is_debug_name(&name) {
            &mut newest_debug
        } else if is_plan_name(&name) {
            &mut newest_plan
        } else {
            continue;
        };
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            tracing::warn!(file = %name, "cannot read modification time, skipping");
            continue;
        };
        if slot.as_ref().map_or(true, |(t, _)| modified > *t) {
            *slot = Some((modified, entry.path()));
        }
    }

    let (plan_time, plan) = newest_plan.ok_or_else(|| ReconcileError::NothingStaged {
        kind: "plan",
        dir: dir.to_path_buf(),
    })?;
    let (debug_time, debug) = newest_debug.ok_or_else(|| ReconcileError::NothingStaged {
        kind: "debug",
        dir: dir.to_path_buf(),
    })?;

    let skew = plan_time
        .duration_since(debug_time)
        .or_else(|_| debug_time.duration_since(plan_time))
        .unwrap_or_default();

    Ok(StagedPair { plan, debug, skew })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_plan_name_filter() {
        assert!(is_plan_name("51m25min_21-35_EAN50_GF40_85.txt"));
        assert!(!is_plan_name("51m25min_21-35_EAN50_GF40_85_details.md"));
        assert!(!is_plan_name("decoplanner_debug_51m25min.txt"));
        assert!(!is_plan_name("LAST_VPM_CAPTURED.txt"));
        assert!(!is_plan_name("notes.txt"));
    }

    #[test]
    fn test_discover_picks_pair() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("51m25min_21-35_EAN50_VPM2.txt"), "plan").unwrap();
        fs::write(dir.path().join("decoplanner_debug_20250815.txt"), "debug").unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let pair = discover(dir.path()).unwrap();
        assert!(pair.plan.ends_with("51m25min_21-35_EAN50_VPM2.txt"));
        assert!(pair.debug.ends_with("decoplanner_debug_20250815.txt"));
        assert!(!pair.is_suspicious());
    }

    #[test]
    fn test_discover_without_debug() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("51m25min_VPM2.txt"), "plan").unwrap();

        let result = discover(dir.path());
        assert!(matches!(result, Err(ReconcileError::NothingStaged { kind: "debug", .. })));
    }
}
