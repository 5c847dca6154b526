//! Learning Records Engine
//!
//! Owns the catalog, the enrollment ledger and the progress ledger, keeps them
//! consistent with each other, and writes every change through to a durable
//! key-value store.
//!
//! Provides:
//! - Course CRUD with cascade cleanup
//! - Idempotent enrollment with registration dates
//! - Module completion, assignment submission and grading
//! - Derived progress, pass/fail and upcoming-task queries
//!
//! Execution is single-threaded and synchronous: each mutator finishes its
//! in-memory update and its storage writes before returning.

pub mod catalog;
pub mod enrollment;
pub mod progress;
pub mod derive;
pub mod cascade;
pub mod seed;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::storage::{write_json, KeyValueStore, StoreError};

pub use catalog::{Catalog, Course, CourseDraft, Module, VideoSource};
pub use cascade::CascadeOutcome;
pub use derive::UpcomingTask;
pub use enrollment::{EnrollmentLedger, EnrollmentMeta};
pub use progress::{ProgressLedger, ProgressRecord, ScoreInput, Submission, MAX_ASSIGNMENT_SCORE};

/// The engine object. One per session, passed by reference to callers.
pub struct LearningRecords<S: KeyValueStore> {
    store: S,
    catalog: Catalog,
    enrollments: EnrollmentLedger,
    progress: ProgressLedger,
}

impl<S: KeyValueStore> LearningRecords<S> {
    /// Load the ledgers from `store`, seeding whatever is missing or stale
    pub fn open(mut store: S) -> Result<Self, StoreError> {
        let seeded = seed::load(&mut store, enrollment::local_midnight())?;
        info!(
            "Loaded {} courses, {} enrolled users",
            seeded.catalog.courses().len(),
            seeded.enrollments.membership().len()
        );

        Ok(Self {
            store,
            catalog: seeded.catalog,
            enrollments: seeded.enrollments,
            progress: seeded.progress,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // --- Persistence ---

    fn persist_courses(&mut self) -> Result<(), StoreError> {
        write_json(&mut self.store, seed::COURSES_KEY, &self.catalog).map_err(|e| {
            warn!("Failed to persist courses: {}", e);
            e
        })
    }

    fn persist_membership(&mut self) -> Result<(), StoreError> {
        write_json(
            &mut self.store,
            seed::ENROLLMENTS_KEY,
            self.enrollments.membership(),
        )
        .map_err(|e| {
            warn!("Failed to persist enrollments: {}", e);
            e
        })
    }

    fn persist_meta(&mut self) -> Result<(), StoreError> {
        write_json(
            &mut self.store,
            seed::ENROLLMENT_META_KEY,
            self.enrollments.meta(),
        )
        .map_err(|e| {
            warn!("Failed to persist enrollment metadata: {}", e);
            e
        })
    }

    fn persist_progress(&mut self) -> Result<(), StoreError> {
        write_json(&mut self.store, seed::PROGRESS_KEY, &self.progress).map_err(|e| {
            warn!("Failed to persist progress: {}", e);
            e
        })
    }

    /// Write the ledgers a cascade touched, always in the same order
    fn persist_outcome(&mut self, outcome: CascadeOutcome) -> Result<(), StoreError> {
        if outcome.catalog {
            self.persist_courses()?;
        }
        if outcome.membership {
            self.persist_membership()?;
        }
        if outcome.meta {
            self.persist_meta()?;
        }
        if outcome.progress {
            self.persist_progress()?;
        }
        Ok(())
    }

    // --- Catalog ---

    pub fn courses(&self) -> &[Course] {
        self.catalog.courses()
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.catalog.get(course_id)
    }

    /// Module count of a course, 0 when the course is unknown
    pub fn module_count(&self, course_id: &str) -> usize {
        self.catalog.module_count(course_id)
    }

    /// Create a course under a fresh id and return it
    pub fn add_course(&mut self, draft: CourseDraft) -> Result<Course, StoreError> {
        let course = self.catalog.insert(draft).clone();
        info!("Created course {} ({})", course.id, course.title);
        self.persist_courses()?;
        Ok(course)
    }

    /// Replace a course by id. Unknown ids are ignored (returns false).
    pub fn update_course(&mut self, course: Course) -> Result<bool, StoreError> {
        let id = course.id.clone();
        if !self.catalog.replace(course) {
            debug!("Ignoring update of unknown course {}", id);
            return Ok(false);
        }
        self.persist_courses()?;
        Ok(true)
    }

    /// Delete a course and every enrollment and progress record pointing at it
    pub fn delete_course(&mut self, course_id: &str) -> Result<bool, StoreError> {
        let outcome = cascade::delete_course(
            &mut self.catalog,
            &mut self.enrollments,
            &mut self.progress,
            course_id,
        );
        if outcome.changed() {
            info!("Deleted course {} ({:?})", course_id, outcome);
        }
        self.persist_outcome(outcome)?;
        Ok(outcome.catalog)
    }

    // --- Enrollment ---

    /// Enroll a user now. Returns false if already enrolled.
    pub fn enroll(&mut self, user_id: &str, course_id: &str) -> Result<bool, StoreError> {
        self.enroll_at(user_id, course_id, Utc::now())
    }

    /// Enroll with an explicit registration date
    pub fn enroll_at(
        &mut self,
        user_id: &str,
        course_id: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if !self.enrollments.enroll(user_id, course_id, registered_at) {
            return Ok(false);
        }
        self.persist_membership()?;
        self.persist_meta()?;
        Ok(true)
    }

    /// Remove an enrollment and discard its progress
    pub fn unenroll(&mut self, user_id: &str, course_id: &str) -> Result<bool, StoreError> {
        let outcome = cascade::unenroll(
            &mut self.enrollments,
            &mut self.progress,
            user_id,
            course_id,
        );
        self.persist_outcome(outcome)?;
        Ok(outcome.membership)
    }

    pub fn is_enrolled(&self, user_id: &str, course_id: &str) -> bool {
        self.enrollments.is_enrolled(user_id, course_id)
    }

    /// Enrolled courses of a user, in catalog order
    pub fn enrolled_courses(&self, user_id: &str) -> Vec<&Course> {
        let ids = self.enrollments.courses_of(user_id);
        self.catalog
            .courses()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .collect()
    }

    pub fn course_students(&self, course_id: &str) -> Vec<String> {
        self.enrollments.students_of(course_id)
    }

    /// Registration date, or now when none is recorded
    pub fn enrollment_date(&self, user_id: &str, course_id: &str) -> DateTime<Utc> {
        self.enrollments
            .registered_at(user_id, course_id)
            .unwrap_or_else(Utc::now)
    }

    /// Drop enrollments of users that no longer exist.
    ///
    /// Storage is only rewritten when something was removed.
    pub fn prune_invalid_enrollments<I, T>(&mut self, valid_user_ids: I) -> Result<bool, StoreError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let owned: Vec<T> = valid_user_ids.into_iter().collect();
        let valid: HashSet<&str> = owned.iter().map(|id| id.as_ref()).collect();

        if !self.enrollments.retain_users(&valid) {
            return Ok(false);
        }

        info!("Pruned enrollments of removed users");
        self.persist_membership()?;
        self.persist_meta()?;
        Ok(true)
    }

    // --- Progress ---

    pub fn mark_module_completed(
        &mut self,
        user_id: &str,
        course_id: &str,
        module_id: &str,
    ) -> Result<bool, StoreError> {
        if !self.progress.mark_module_completed(user_id, course_id, module_id) {
            return Ok(false);
        }
        self.persist_progress()?;
        Ok(true)
    }

    /// Record a submission and clear any previous grade
    pub fn submit_assignment(
        &mut self,
        user_id: &str,
        course_id: &str,
        submission: impl Into<Submission>,
    ) -> Result<(), StoreError> {
        self.progress.submit(user_id, course_id, submission.into());
        self.persist_progress()
    }

    pub fn mark_assignment_submitted(
        &mut self,
        user_id: &str,
        course_id: &str,
    ) -> Result<bool, StoreError> {
        if !self.progress.mark_submitted(user_id, course_id) {
            return Ok(false);
        }
        self.persist_progress()?;
        Ok(true)
    }

    /// Grade a submitted assignment. The score is coerced and clamped to
    /// [0, 25]. Returns false when there is nothing to grade.
    pub fn grade_assignment(
        &mut self,
        user_id: &str,
        course_id: &str,
        score: impl Into<ScoreInput>,
    ) -> Result<bool, StoreError> {
        if !self.progress.grade(user_id, course_id, &score.into()) {
            debug!("Nothing submitted by {} in {}, grade ignored", user_id, course_id);
            return Ok(false);
        }
        self.persist_progress()?;
        Ok(true)
    }

    pub fn completed_modules(&self, user_id: &str, course_id: &str) -> &[String] {
        self.progress.completed_modules(user_id, course_id)
    }

    pub fn is_assignment_submitted(&self, user_id: &str, course_id: &str) -> bool {
        self.progress.is_submitted(user_id, course_id)
    }

    /// `None` means "not graded", which is distinct from a score of 0
    pub fn assignment_score(&self, user_id: &str, course_id: &str) -> Option<f64> {
        self.progress.score(user_id, course_id)
    }

    pub fn is_assignment_graded(&self, user_id: &str, course_id: &str) -> bool {
        self.assignment_score(user_id, course_id).is_some()
    }

    /// Full record, defaulted when the user has no progress yet
    pub fn assignment_details(&self, user_id: &str, course_id: &str) -> ProgressRecord {
        self.progress
            .get(user_id, course_id)
            .cloned()
            .unwrap_or_default()
    }

    // --- Derived metrics ---

    pub fn course_progress(&self, user_id: &str, course_id: &str, total_modules: usize) -> f64 {
        derive::course_progress(self.progress.get(user_id, course_id), total_modules)
    }

    pub fn has_completed_course_components(
        &self,
        user_id: &str,
        course_id: &str,
        total_modules: usize,
    ) -> bool {
        derive::has_completed_course_components(self.progress.get(user_id, course_id), total_modules)
    }

    pub fn is_course_passed(&self, user_id: &str, course_id: &str, total_modules: usize) -> bool {
        derive::is_course_passed(self.progress.get(user_id, course_id), total_modules)
    }

    /// Pending assignments of a user, soonest due first
    pub fn upcoming_tasks(&self, user_id: &str) -> Vec<UpcomingTask> {
        derive::upcoming_tasks(
            user_id,
            &self.enrolled_courses(user_id),
            &self.enrollments,
            &self.progress,
            Utc::now(),
        )
    }
}
