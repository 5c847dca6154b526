//! Derived metrics: progress percentage, pass/fail, upcoming tasks
//!
//! Everything here is a pure read over ledger state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::catalog::Course;
use super::enrollment::EnrollmentLedger;
use super::progress::{ProgressLedger, ProgressRecord};

/// Points contributed by completing every module
pub const MODULE_WEIGHT: f64 = 75.0;

/// Minimum progress required to pass a course
pub const PASS_THRESHOLD: f64 = 90.0;

/// Days between registration and the assignment due date
pub const ASSIGNMENT_WINDOW_DAYS: i64 = 7;

/// Progress of a record in a course of `total_modules` modules.
///
/// Modules contribute up to 75 points in proportion; the assignment adds its
/// raw score out of 25. A course without modules is graded on the assignment
/// alone.
pub fn course_progress(record: Option<&ProgressRecord>, total_modules: usize) -> f64 {
    let score = record.and_then(|r| r.assignment_score).unwrap_or(0.0);
    if total_modules == 0 {
        return score;
    }

    let completed = record.map(|r| r.completed_modules.len()).unwrap_or(0);
    let modules_progress = completed as f64 / total_modules as f64 * MODULE_WEIGHT;

    // f64::round rounds halves away from zero: 57.5 -> 58
    (modules_progress + score).round().min(100.0)
}

/// Every module done and the assignment graded
pub fn has_completed_course_components(record: Option<&ProgressRecord>, total_modules: usize) -> bool {
    let Some(record) = record else {
        return false;
    };
    record.completed_modules.len() >= total_modules && record.is_graded()
}

pub fn is_course_passed(record: Option<&ProgressRecord>, total_modules: usize) -> bool {
    has_completed_course_components(record, total_modules)
        && course_progress(record, total_modules) >= PASS_THRESHOLD
}

/// One pending assignment on a student's dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingTask {
    pub id: String,
    pub course_id: String,
    pub assignment_title: String,
    pub course_title: String,
    pub due_date: DateTime<Utc>,
    pub is_submitted: bool,
}

/// Pending assignments of a user, soonest first.
///
/// `enrolled` must be the user's enrolled courses in catalog order; the task
/// title uses the 1-based position in that list. Enrollments without a usable
/// registration date are treated as registered at `now`.
pub fn upcoming_tasks(
    user_id: &str,
    enrolled: &[&Course],
    enrollments: &EnrollmentLedger,
    progress: &ProgressLedger,
    now: DateTime<Utc>,
) -> Vec<UpcomingTask> {
    let mut tasks: Vec<UpcomingTask> = enrolled
        .iter()
        .enumerate()
        .map(|(index, course)| {
            let registered = enrollments.registered_at(user_id, &course.id).unwrap_or(now);
            UpcomingTask {
                id: format!("{}-assignment", course.id),
                course_id: course.id.clone(),
                assignment_title: format!("Assignment {}", index + 1),
                course_title: course.title.clone(),
                due_date: registered + Duration::days(ASSIGNMENT_WINDOW_DAYS),
                is_submitted: progress.is_submitted(user_id, &course.id),
            }
        })
        .filter(|task| !task.is_submitted)
        .collect();

    tasks.sort_by_key(|task| task.due_date);
    tasks
}
