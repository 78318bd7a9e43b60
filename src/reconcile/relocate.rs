//! Two-phase relocation of a reconciled plan/debug pair.
//!
//! [`Relocation::stage`] only plans the move; [`Relocation::commit`] writes
//! both targets and removes the sources afterwards. The debug dump is staged
//! next to its target first and the plan is replaced atomically, so a failure
//! before both are in place leaves the sources and any earlier targets as they
//! were. A failed removal after a good copy is reported in
//! [`Relocated::warnings`] and does not fail the commit.

use std::fs;
use std::path::{Path, PathBuf};

use crate::corpus::write_atomic;
use crate::error::FileSystemError;

/// Source file that could not be removed after a successful copy.
#[derive(Debug)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Committed relocation.
#[derive(Debug)]
pub struct Relocated {
    pub plan_path: PathBuf,
    pub debug_path: PathBuf,
    pub warnings: Vec<CleanupWarning>,
}

/// A planned, not yet executed, move of one pair.
#[derive(Debug, Clone)]
pub struct Relocation {
    plan_source: PathBuf,
    debug_source: PathBuf,
    dest_dir: PathBuf,
    plan_target: PathBuf,
    debug_target: PathBuf,
    plan_content: String,
}

impl Relocation {
    /// Stage the move: the plan is written with `plan_content` (the amended
    /// text), the debug dump is copied byte for byte.
    pub fn stage(
        plan_source: &Path,
        debug_source: &Path,
        dest_dir: &Path,
        plan_file_name: &str,
        debug_file_name: &str,
        plan_content: String,
    ) -> Self {
        Self {
            plan_source: plan_source.to_path_buf(),
            debug_source: debug_source.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
            plan_target: dest_dir.join(plan_file_name),
            debug_target: dest_dir.join(debug_file_name),
            plan_content,
        }
    }

    pub fn plan_target(&self) -> &Path {
        &self.plan_target
    }

    pub fn debug_target(&self) -> &Path {
        &self.debug_target
    }

    /// Copy both artifacts, then remove the sources.
    pub fn commit(self) -> Result<Relocated, FileSystemError> {
        fs::create_dir_all(&self.dest_dir).map_err(|source| FileSystemError::CreateDir {
            path: self.dest_dir.clone(),
            source,
        })?;

        let plan_existed = self.plan_target.exists();
        let debug_pending = if same_file(&self.debug_source, &self.debug_target) {
            None
        } else {
            let pending = pending_path(&self.debug_target);
            if let Err(source) = fs::copy(&self.debug_source, &pending) {
                let _ = fs::remove_file(&pending);
                return Err(FileSystemError::Copy {
                    from: self.debug_source.clone(),
                    to: self.debug_target.clone(),
                    source,
                });
            }
            Some(pending)
        };

        if let Err(err) = write_atomic(&self.plan_target, &self.plan_content) {
            if let Some(pending) = &debug_pending {
                let _ = fs::remove_file(pending);
            }
            return Err(err);
        }

        if let Some(pending) = &debug_pending {
            if let Err(source) = fs::rename(pending, &self.debug_target) {
                let _ = fs::remove_file(pending);
                // The plan is already in place; only take back one we created.
                if !plan_existed {
                    let _ = fs::remove_file(&self.plan_target);
                }
                return Err(FileSystemError::Copy {
                    from: self.debug_source.clone(),
                    to: self.debug_target.clone(),
                    source,
                });
            }
        }

        tracing::info!(
            plan = %self.plan_target.display(),
            debug = %self.debug_target.display(),
            "copied pair into test cases"
        );

        let mut warnings = Vec::new();
        for (source, target) in [
            (&self.plan_source, &self.plan_target),
            (&self.debug_source, &self.debug_target),
        ] {
            if same_file(source, target) {
                continue;
            }
            match fs::remove_file(source) {
                Ok(()) => tracing::debug!(path = %source.display(), "cleaned up source"),
                Err(error) => {
                    tracing::warn!(path = %source.display(), %error, "could not remove source");
                    warnings.push(CleanupWarning {
                        path: source.clone(),
                        error,
                    });
                }
            }
        }

        Ok(Relocated {
            plan_path: self.plan_target,
            debug_path: self.debug_target,
            warnings,
        })
    }
}

/// Sibling of `target` that holds a copy until it is renamed into place.
fn pending_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_commit_moves_both_files() {
        let staging = tempdir().unwrap();
        let plan = staging.path().join("plan.txt");
        let debug = staging.path().join("decoplanner_debug_1.txt");
        fs::write(&plan, "original plan").unwrap();
        fs::write(&debug, "debug dump").unwrap();
        let dest = staging.path().join("test_cases/Open_Circuit/VPM");

        let relocated = Relocation::stage(
            &plan,
            &debug,
            &dest,
            "51m25min_VPM2.txt",
            "51m25min_VPM2_details.txt",
            "amended plan".to_string(),
        )
        .commit()
        .unwrap();

        assert!(relocated.warnings.is_empty());
        assert_eq!(fs::read_to_string(&relocated.plan_path).unwrap(), "amended plan");
        assert_eq!(fs::read_to_string(&relocated.debug_path).unwrap(), "debug dump");
        assert!(!plan.exists());
        assert!(!debug.exists());
    }

    #[test]
    fn test_failed_copy_keeps_sources() {
        let staging = tempdir().unwrap();
        let plan = staging.path().join("plan.txt");
        fs::write(&plan, "original plan").unwrap();
        let missing_debug = staging.path().join("missing.txt");
        let dest = staging.path().join("out");

        let staged = Relocation::stage(
            &plan,
            &missing_debug,
            &dest,
            "p.txt",
            "d.txt",
            "amended".to_string(),
        );
        let plan_target = staged.plan_target().to_path_buf();
        let result = staged.commit();

        assert!(matches!(result, Err(FileSystemError::Copy { .. })));
        assert!(plan.exists());
        assert!(!plan_target.exists());
    }

    #[test]
    fn test_relocating_in_place_keeps_targets() {
        let dir = tempdir().unwrap();
        let plan = dir.path().join("p.txt");
        let debug = dir.path().join("d.txt");
        fs::write(&plan, "plan").unwrap();
        fs::write(&debug, "debug").unwrap();

        let relocated =
            Relocation::stage(&plan, &debug, dir.path(), "p.txt", "d_details.txt", "plan2".into())
                .commit()
                .unwrap();

        assert!(plan.exists());
        assert_eq!(fs::read_to_string(&plan).unwrap(), "plan2");
        assert!(!debug.exists());
        assert!(relocated.debug_path.exists());
    }

    #[test]
    fn test_failed_copy_keeps_existing_targets() {
        let staging = tempdir().unwrap();
        let plan = staging.path().join("plan.txt");
        fs::write(&plan, "new plan").unwrap();
        let dest = staging.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("p.txt"), "filed plan").unwrap();

        let result = Relocation::stage(
            &plan,
            &staging.path().join("missing.txt"),
            &dest,
            "p.txt",
            "d.txt",
            "amended".to_string(),
        )
        .commit();

        assert!(matches!(result, Err(FileSystemError::Copy { .. })));
        assert_eq!(fs::read_to_string(dest.join("p.txt")).unwrap(), "filed plan");
        assert!(!dest.join("d.txt").exists());
        assert!(!dest.join("d.txt.partial").exists());
        assert!(plan.exists());
    }

    #[test]
    fn test_failed_plan_write_keeps_existing_debug_target() {
        let staging = tempdir().unwrap();
        let plan = staging.path().join("plan.txt");
        let debug = staging.path().join("decoplanner_debug_1.txt");
        fs::write(&plan, "new plan").unwrap();
        fs::write(&debug, "new dump").unwrap();
        let dest = staging.path().join("out");
        // A directory where the plan should go makes the final rename fail.
        fs::create_dir_all(dest.join("p.txt")).unwrap();
        fs::write(dest.join("d.txt"), "filed dump").unwrap();

        let result =
            Relocation::stage(&plan, &debug, &dest, "p.txt", "d.txt", "amended".to_string())
                .commit();

        assert!(matches!(result, Err(FileSystemError::Write { .. })));
        assert_eq!(fs::read_to_string(dest.join("d.txt")).unwrap(), "filed dump");
        assert!(!dest.join("d.txt.partial").exists());
        assert!(plan.exists());
        assert!(debug.exists());
    }

    #[test]
    fn test_removal_failure_is_warning() {
        let staging = tempdir().unwrap();
        let gone_plan = staging.path().join("plan.txt");
        let debug = staging.path().join("decoplanner_debug_1.txt");
        fs::write(&debug, "debug dump").unwrap();
        let dest = staging.path().join("out");

        let relocated = Relocation::stage(
            &gone_plan,
            &debug,
            &dest,
            "p.txt",
            "d.txt",
            "amended".to_string(),
        )
        .commit()
        .unwrap();

        assert_eq!(relocated.warnings.len(), 1);
        assert_eq!(relocated.warnings[0].path, gone_plan);
        assert_eq!(fs::read_to_string(&relocated.plan_path).unwrap(), "amended");
        assert_eq!(fs::read_to_string(&relocated.debug_path).unwrap(), "debug dump");
        assert!(!debug.exists());
    }
}
