//! Loading canonical cases back out of the test-case tree.

use std::fs;
use std::path::Path;

use crate::error::{CorpusError, FileSystemError};
use crate::models::{Algorithm, CaseKey, DiveTestCase, SourceArtifact};
use crate::parser::Field;
use crate::reconcile::{gases_from_label, SourceReport, DETAILS_SUFFIX};

/// Load every canonical plan under `<root>/Open_Circuit/{Buhlmann,VPM}`.
///
/// Files whose names or contents do not describe a case, or that cannot be
/// read, are skipped with a warning. A missing category directory is not an
/// error.
pub fn load_tree(test_cases_root: &Path) -> Result<Vec<DiveTestCase>, CorpusError> {
    let mut cases = Vec::new();
    for algorithm in [Algorithm::Buhlmann, Algorithm::VpmB] {
        let dir = test_cases_root.join(algorithm.category_dir());
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "no test-case directory");
            continue;
        }
        let loaded = load_dir(&dir, algorithm)?;
        tracing::info!(%algorithm, count = loaded.len(), "loaded test cases");
        cases.extend(loaded);
    }
    Ok(cases)
}

fn load_dir(dir: &Path, algorithm: Algorithm) -> Result<Vec<DiveTestCase>, CorpusError> {
    let entries = fs::read_dir(dir).map_err(|source| FileSystemError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.ends_with(".txt") && !n.ends_with(DETAILS_SUFFIX))
        })
        .collect();
    paths.sort();

    let mut cases = Vec::new();
    for path in paths {
        match load_case(&path) {
            Ok(Some(case)) if case.algorithm() == algorithm => cases.push(case),
            Ok(Some(case)) => tracing::warn!(
                file = %path.display(),
                expected = %algorithm,
                found = %case.algorithm(),
                "case filed under the wrong algorithm, skipping"
            ),
            Ok(None) => {}
            Err(err) => tracing::warn!(
                file = %path.display(),
                error = %err,
                "unreadable case file, skipping"
            ),
        }
    }
    Ok(cases)
}

/// Load one canonical plan and its `_details.txt` companion, if any.
fn load_case(path: &Path) -> Result<Option<DiveTestCase>, CorpusError> {
    let plan = SourceReport::read(path)?;
    let Some(key) = CaseKey::parse_stem(plan.stem()) else {
        tracing::warn!(file = %plan.file_name, "not a canonical case name, skipping");
        return Ok(None);
    };
    let Some(expected_runtime) = plan.raw.number(Field::Runtime) else {
        tracing::warn!(file = %plan.file_name, "no total runtime, skipping");
        return Ok(None);
    };

    let details_path = path.with_file_name(format!("{}{DETAILS_SUFFIX}", plan.stem()));
    let details = if details_path.is_file() {
        match SourceReport::read(&details_path) {
            Ok(details) => Some(details),
            Err(err) => {
                tracing::warn!(file = %details_path.display(), error = %err, "unreadable details");
                None
            }
        }
    } else {
        None
    };

    let gases = if plan.raw.gases.is_empty() {
        details
            .as_ref()
            .map(|d| d.raw.gases.clone())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| gases_from_label(&key.gas_label))
    } else {
        plan.raw.gases.clone()
    };
    let schedule = match &details {
        Some(d) if plan.raw.schedule.is_empty() => d.raw.schedule.clone(),
        _ => plan.raw.schedule.clone(),
    };

    let mut provenance = vec![SourceArtifact::new(&plan.file_name, &plan.text)];
    if let Some(d) = &details {
        provenance.push(SourceArtifact::new(&d.file_name, &d.text));
    }

    let case = DiveTestCase {
        key,
        gases,
        expected_runtime,
        expected_deco_time: plan.raw.number(Field::DecoTime).unwrap_or(0.0),
        schedule,
        provenance,
    };
    if let Err(err) = case.check() {
        tracing::warn!(file = %plan.file_name, error = %err, "inconsistent case, skipping");
        return Ok(None);
    }
    Ok(Some(case))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LastStop;
    use tempfile::tempdir;

    const PLAN: &str = "\
Gradient Factors: 40/85
Last Stop: 6m
Total Runtime: 177.3 min
Total Deco Duration: 147.3 min

=== GAS CONFIGURATION ===
Bottom Gas: 21/35 (21% O2, 35% He, 44% N2)
Deco Gas: EAN50 (50% O2, 0% He, 50% N2) @ 21m switch depth

Decompression Schedule:
21m for 3 min
6m for 40 min
";

    #[test]
    fn test_load_tree() {
        let root = tempdir().unwrap();
        let buhlmann = root.path().join("Open_Circuit/Buhlmann");
        fs::create_dir_all(&buhlmann).unwrap();
        fs::write(buhlmann.join("51m25min_21-35_EAN50_6mlast_GF40_85.txt"), PLAN).unwrap();
        fs::write(
            buhlmann.join("51m25min_21-35_EAN50_6mlast_GF40_85_details.txt"),
            "=== DECOMPRESSION SCHEDULE ===\n6m for 40 min\n",
        )
        .unwrap();
        fs::write(buhlmann.join("scratch notes.txt"), "Total Runtime: 1 min\n").unwrap();

        let cases = load_tree(root.path()).unwrap();

        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.last_stop(), LastStop::Six);
        assert_eq!(case.gases.len(), 2);
        assert_eq!(case.schedule.len(), 2);
        assert_eq!(case.provenance.len(), 2);
        assert!(case.provenance[1].file_name.ends_with(DETAILS_SUFFIX));
    }

    #[test]
    fn test_wrong_category_is_skipped() {
        let root = tempdir().unwrap();
        let vpm = root.path().join("Open_Circuit/VPM");
        fs::create_dir_all(&vpm).unwrap();
        fs::write(vpm.join("51m25min_21-35_GF40_85.txt"), PLAN).unwrap();

        assert!(load_tree(root.path()).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let root = tempdir().unwrap();
        let buhlmann = root.path().join("Open_Circuit/Buhlmann");
        fs::create_dir_all(&buhlmann).unwrap();
        fs::write(buhlmann.join("45m30min_21-35_GF30_70.txt"), b"\xff\xfe").unwrap();
        fs::write(buhlmann.join("51m25min_21-35_EAN50_6mlast_GF40_85.txt"), PLAN).unwrap();
        fs::write(
            buhlmann.join("51m25min_21-35_EAN50_6mlast_GF40_85_details.txt"),
            b"\xff\xfe",
        )
        .unwrap();

        let cases = load_tree(root.path()).unwrap();

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].provenance.len(), 1);
        assert_eq!(cases[0].schedule.len(), 2);
    }

    #[test]
    fn test_empty_tree() {
        let root = tempdir().unwrap();
        assert!(load_tree(root.path()).unwrap().is_empty());
    }
}
