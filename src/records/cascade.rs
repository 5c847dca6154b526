//! Removals that span several ledgers.
//!
//! Each function takes every ledger it touches by mutable reference and
//! applies all updates before returning. The returned outcome tells the
//! caller which ledgers changed so it can persist them in the fixed order
//! catalog, membership, metadata, progress.

use super::catalog::Catalog;
use super::enrollment::EnrollmentLedger;
use super::progress::ProgressLedger;

/// Which ledgers a cascade modified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub catalog: bool,
    pub membership: bool,
    pub meta: bool,
    pub progress: bool,
}

impl CascadeOutcome {
    pub fn changed(&self) -> bool {
        self.catalog || self.membership || self.meta || self.progress
    }
}

/// Remove a course and everything that references it.
///
/// Enrollments and progress are cleaned even if the catalog no longer holds
/// the course, so stale references left by earlier sessions disappear too.
pub fn delete_course(
    catalog: &mut Catalog,
    enrollments: &mut EnrollmentLedger,
    progress: &mut ProgressLedger,
    course_id: &str,
) -> CascadeOutcome {
    let catalog_changed = catalog.remove(course_id);
    let (membership, meta) = enrollments.drop_course(course_id);
    let progress_changed = progress.drop_course(course_id);

    CascadeOutcome {
        catalog: catalog_changed,
        membership,
        meta,
        progress: progress_changed,
    }
}

/// Remove one enrollment together with its progress.
///
/// Nothing happens if the user was not enrolled.
pub fn unenroll(
    enrollments: &mut EnrollmentLedger,
    progress: &mut ProgressLedger,
    user_id: &str,
    course_id: &str,
) -> CascadeOutcome {
    if !enrollments.unenroll(user_id, course_id) {
        return CascadeOutcome::default();
    }

    CascadeOutcome {
        catalog: false,
        membership: true,
        meta: true,
        progress: progress.remove(user_id, course_id),
    }
}
