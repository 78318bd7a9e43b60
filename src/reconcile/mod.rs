//! Metadata reconciler.
//!
//! Merges a planner plan report and its debug dump into one canonical
//! [`DiveTestCase`], decides the case's canonical name and category, amends
//! the plan text, and moves both artifacts into the test-case tree.

mod amend;
mod last_stop;
mod relocate;
mod staging;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FileSystemError, ReconcileError};
use crate::models::{
    from_name_token, insert_last_stop_tag, CaseKey, Conservatism, DiveTestCase, GasMixture,
    GasRole, LastStop, SourceArtifact,
};
use crate::parser::{self, Field, RawReport};

pub use amend::amend_plan;
pub use last_stop::LastStopDecision;
pub use relocate::{Relocated, Relocation};
pub use staging::{discover, is_debug_name};

/// Suffix of the debug dump stored next to a canonical plan.
pub const DETAILS_SUFFIX: &str = "_details.txt";

/// A text artifact together with its parse.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub file_name: String,
    pub text: String,
    pub raw: RawReport,
}

impl SourceReport {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let raw = parser::parse(&text);
        Self {
            file_name: file_name.into(),
            text,
            raw,
        }
    }

    pub fn read(path: &Path) -> Result<Self, FileSystemError> {
        let text = fs::read_to_string(path).map_err(|source| FileSystemError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, text))
    }

    /// File name without the `.txt` extension.
    pub fn stem(&self) -> &str {
        self.file_name
            .strip_suffix(".txt")
            .unwrap_or(&self.file_name)
    }
}

/// Outcome of reconciling one pair, before anything touches the disk.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub case: DiveTestCase,
    pub last_stop: LastStopDecision,
    /// Canonical plan file name
    pub plan_file_name: String,
    /// Debug dump name stored beside the plan
    pub debug_file_name: String,
    /// Plan text with last-stop and gas metadata added
    pub amended_plan: String,
}

impl Reconciled {
    /// Test-case directory the pair belongs in.
    pub fn destination(&self, test_cases_root: &Path) -> PathBuf {
        test_cases_root.join(self.case.algorithm().category_dir())
    }
}

/// Reconcile a plan report with its debug dump.
pub fn reconcile(
    plan: &SourceReport,
    debug_report: &SourceReport,
) -> Result<Reconciled, ReconcileError> {
    let missing = |field: Field| ReconcileError::MissingField {
        report: plan.file_name.clone(),
        field: field.name(),
    };

    let expected_runtime = plan
        .raw
        .number(Field::Runtime)
        .ok_or_else(|| missing(Field::Runtime))?;

    let name_key = CaseKey::parse_stem(plan.stem());
    let conservatism = name_key
        .as_ref()
        .map(|k| k.conservatism)
        .or_else(|| conservatism_from(&plan.raw))
        .or_else(|| conservatism_from(&debug_report.raw))
        .ok_or_else(|| ReconcileError::Unroutable {
            report: plan.file_name.clone(),
        })?;

    let depth_m = whole_number(&plan.raw, Field::Depth)
        .or(name_key.as_ref().map(|k| k.depth_m))
        .or_else(|| whole_number(&debug_report.raw, Field::Depth))
        .ok_or_else(|| missing(Field::Depth))?;
    let bottom_time_min = whole_number(&plan.raw, Field::BottomTime)
        .or(name_key.as_ref().map(|k| k.bottom_time_min))
        .or_else(|| whole_number(&debug_report.raw, Field::BottomTime))
        .ok_or_else(|| missing(Field::BottomTime))?;

    let decision = last_stop::resolve(&debug_report.raw);
    tracing::info!(
        plan = %plan.file_name,
        debug = %debug_report.file_name,
        last_stop = %decision.last_stop,
        reason = %decision,
        "resolved last stop"
    );

    let gas_label = name_key
        .as_ref()
        .map(|k| k.gas_label.clone())
        .unwrap_or_default();
    let gases = resolve_gases(plan, debug_report, &gas_label);

    let key = CaseKey {
        depth_m,
        bottom_time_min,
        conservatism,
        last_stop: decision.last_stop,
        gas_label: if gas_label.is_empty() {
            label_from_gases(&gases)
        } else {
            gas_label
        },
    };

    let canonical_stem = match name_key {
        Some(_) => key.file_stem(),
        None if decision.last_stop == LastStop::Six => insert_last_stop_tag(plan.stem()),
        None => plan.stem().to_string(),
    };

    let schedule = if plan.raw.schedule.is_empty() {
        debug_report.raw.schedule.clone()
    } else {
        plan.raw.schedule.clone()
    };

    let case = DiveTestCase {
        key,
        gases,
        expected_runtime,
        expected_deco_time: plan.raw.number(Field::DecoTime).unwrap_or(0.0),
        schedule,
        provenance: vec![
            SourceArtifact::new(&plan.file_name, &plan.text),
            SourceArtifact::new(&debug_report.file_name, &debug_report.text),
        ],
    };
    case.check().map_err(|source| ReconcileError::Invariant {
        report: plan.file_name.clone(),
        source,
    })?;

    let amended_plan = amend_plan(plan, &decision, &debug_report.file_name, &case.gases);

    Ok(Reconciled {
        case,
        last_stop: decision,
        plan_file_name: format!("{canonical_stem}.txt"),
        debug_file_name: format!("{canonical_stem}{DETAILS_SUFFIX}"),
        amended_plan,
    })
}

/// Result of reconciling and relocating a pair on disk.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub reconciled: Reconciled,
    pub relocated: Relocated,
}

/// Read, reconcile and relocate one plan/debug pair.
pub fn reconcile_files(
    plan_path: &Path,
    debug_path: &Path,
    test_cases_root: &Path,
) -> Result<ReconcileOutcome, ReconcileError> {
    let plan = SourceReport::read(plan_path)?;
    let debug_report = SourceReport::read(debug_path)?;
    for issue in plan.raw.issues.iter().chain(&debug_report.raw.issues) {
        tracing::debug!(?issue, "incomplete report");
    }

    let reconciled = reconcile(&plan, &debug_report)?;
    let staged = Relocation::stage(
        plan_path,
        debug_path,
        &reconciled.destination(test_cases_root),
        &reconciled.plan_file_name,
        &reconciled.debug_file_name,
        reconciled.amended_plan.clone(),
    );
    tracing::debug!(
        plan = %staged.plan_target().display(),
        debug = %staged.debug_target().display(),
        "relocation staged"
    );
    let relocated = staged.commit()?;

    Ok(ReconcileOutcome {
        reconciled,
        relocated,
    })
}

fn conservatism_from(raw: &RawReport) -> Option<Conservatism> {
    if let Some((low, high)) = raw.gradient_factors() {
        return Some(Conservatism::GradientFactors { low, high });
    }
    let level = raw.get(Field::VpmConservatism)?.parse().ok()?;
    Some(Conservatism::Vpm { level })
}

fn whole_number(raw: &RawReport, field: Field) -> Option<u32> {
    raw.get(field)?.parse().ok()
}

/// Debug gases first, then gases already in the plan, then the file name.
fn resolve_gases(
    plan: &SourceReport,
    debug_report: &SourceReport,
    gas_label: &str,
) -> Vec<GasMixture> {
    if !debug_report.raw.gases.is_empty() {
        return debug_report.raw.gases.clone();
    }
    if !plan.raw.gases.is_empty() {
        return plan.raw.gases.clone();
    }
    tracing::warn!(
        debug = %debug_report.file_name,
        "no gas section in debug report, using file name"
    );
    gases_from_label(gas_label)
}

/// `21-35_EAN50_O2` → bottom 21/35, deco EAN50 and O2.
pub fn gases_from_label(gas_label: &str) -> Vec<GasMixture> {
    gas_label
        .split('_')
        .filter(|t| !t.is_empty())
        .enumerate()
        .filter_map(|(i, token)| {
            let role = if i == 0 { GasRole::Bottom } else { GasRole::Deco };
            from_name_token(token, role)
        })
        .collect()
}

fn label_from_gases(gases: &[GasMixture]) -> String {
    gases
        .iter()
        .map(|g| g.label.replace('/', "-"))
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, CaseInvariant};
    use tempfile::tempdir;

    const PLAN: &str = "\
DecoPlanner Plan
Gradient Factors: 40/85
Total Runtime: 177.3 min
Total Deco Duration: 147.3 min

Decompression Schedule:
51m for 27 min
24m for 2 min
21m for 3 min
6m for 40 min
";

    const DEBUG: &str = "\
=== DECOPLANNER DEBUG LOG ===
=== SETTINGS ===
Last Stop 6m: false
=== GASES ===
Gas 0: 21/35 (O2=21.0%, He=35.0%, Type=1, Switch=0m)
Gas 1: EAN50 (O2=50.0%, He=0.0%, Type=2, Switch=21m)
=== DECOMPRESSION SCHEDULE ===
6m for 40 min
";

    #[test]
    fn test_reconcile_builds_canonical_case() {
        let plan = SourceReport::new("51m25min_21-35_EAN50_GF40_85.txt", PLAN);
        let debug_report = SourceReport::new("decoplanner_debug_1.txt", DEBUG);

        let reconciled = reconcile(&plan, &debug_report).unwrap();
        let case = &reconciled.case;

        assert_eq!(case.algorithm(), Algorithm::Buhlmann);
        assert_eq!((case.depth_m(), case.bottom_time_min()), (51, 25));
        assert_eq!(case.last_stop(), LastStop::Six);
        assert_eq!(case.gases.len(), 2);
        assert_eq!(case.expected_runtime, 177.3);
        assert_eq!(case.schedule.len(), 4);
        assert_eq!(case.provenance.len(), 2);
        assert_eq!(reconciled.plan_file_name, "51m25min_21-35_EAN50_6mlast_GF40_85.txt");
        assert_eq!(
            reconciled.debug_file_name,
            "51m25min_21-35_EAN50_6mlast_GF40_85_details.txt"
        );
        assert!(reconciled.amended_plan.contains("Last Stop: 6m"));
        assert!(reconciled.amended_plan.contains("=== GAS CONFIGURATION ==="));
    }

    #[test]
    fn test_reconcile_does_not_duplicate_tag() {
        let plan = SourceReport::new("51m25min_21-35_EAN50_6mlast_GF40_85.txt", PLAN);
        let debug_report = SourceReport::new("decoplanner_debug_1.txt", DEBUG);

        let reconciled = reconcile(&plan, &debug_report).unwrap();
        assert_eq!(reconciled.plan_file_name, "51m25min_21-35_EAN50_6mlast_GF40_85.txt");
    }

    #[test]
    fn test_missing_runtime_is_fatal() {
        let plan = SourceReport::new("51m25min_GF40_85.txt", "Gradient Factors: 40/85\n");
        let debug_report = SourceReport::new("decoplanner_debug_1.txt", DEBUG);

        let result = reconcile(&plan, &debug_report);
        assert!(matches!(
            result,
            Err(ReconcileError::MissingField { field: "total runtime", .. })
        ));
    }

    #[test]
    fn test_unroutable_without_marker() {
        let plan = SourceReport::new("51m25min_21-35.txt", "Total Runtime: 60 min\n");
        let debug_report = SourceReport::new("decoplanner_debug_1.txt", "=== GASES ===\n");

        let result = reconcile(&plan, &debug_report);
        assert!(matches!(result, Err(ReconcileError::Unroutable { .. })));
    }

    #[test]
    fn test_unparsed_name_gets_tag_appended() {
        let plan = SourceReport::new(
            "my dive.txt",
            "Depth: 40m\nBottom Time: 20 min\nVPM Conservatism: +2\nTotal Runtime: 60 min\n",
        );
        let debug_report = SourceReport::new(
            "decoplanner_debug_1.txt",
            "Last Stop: 6m\n=== GASES ===\nGas 0: 21/35 (O2=21.0%, He=35.0%, Type=1, Switch=0m)\n",
        );

        let reconciled = reconcile(&plan, &debug_report).unwrap();
        assert_eq!(reconciled.plan_file_name, "my dive_6mlast.txt");
        assert_eq!(reconciled.case.algorithm(), Algorithm::VpmB);
        assert_eq!(reconciled.case.depth_m(), 40);
    }

    #[test]
    fn test_case_without_any_gas_is_rejected() {
        let plan = SourceReport::new(
            "my dive.txt",
            "Depth: 40m\nBottom Time: 20 min\nVPM Conservatism: +2\nTotal Runtime: 60 min\n",
        );
        let debug_report = SourceReport::new("decoplanner_debug_1.txt", "Last Stop: 6m\n");

        let result = reconcile(&plan, &debug_report);
        assert!(matches!(
            result,
            Err(ReconcileError::Invariant {
                source: CaseInvariant::NoBottomGas,
                ..
            })
        ));
    }

    #[test]
    fn test_gases_from_label() {
        let gases = gases_from_label("8-85_EAN18_O2");
        assert_eq!(gases.len(), 3);
        assert_eq!(gases[0].role, GasRole::Bottom);
        assert_eq!(gases[2].switch_depth, Some(6));
    }

    #[test]
    fn test_reconcile_files_routes_by_algorithm() {
        let staging = tempdir().unwrap();
        let root = staging.path().join("test_cases");
        let plan_path = staging.path().join("51m25min_21-35_EAN50_VPM2.txt");
        let debug_path = staging.path().join("decoplanner_debug_1.txt");
        fs::write(&plan_path, PLAN.replace("Gradient Factors: 40/85", "VPM Conservatism: +2"))
            .unwrap();
        fs::write(&debug_path, DEBUG).unwrap();

        let outcome = reconcile_files(&plan_path, &debug_path, &root).unwrap();

        let dir = root.join("Open_Circuit/VPM");
        assert_eq!(outcome.relocated.plan_path, dir.join("51m25min_21-35_EAN50_6mlast_VPM2.txt"));
        assert!(outcome.relocated.debug_path.exists());
        assert!(outcome.relocated.warnings.is_empty());
        assert!(!plan_path.exists());
        assert!(!debug_path.exists());
    }
}
