//! Integration tests for the learning records engine:
//! - Enrollment, progress and grading rules
//! - Course deletion cascades
//! - Stored-shape migration and persistence across sessions

use chrono::{Duration, Utc};
use course_engine::records::seed::{COURSES_KEY, PROGRESS_KEY};
use course_engine::records::{CourseDraft, LearningRecords, Module, ProgressRecord};
use course_engine::storage::{KeyValueStore, MemoryStore, SqliteStore};
use course_engine::UserDirectory;
use tempfile::tempdir;

fn module(id: &str) -> Module {
    Module {
        id: id.to_string(),
        title: format!("Module {}", id),
        content: String::new(),
        video_source: None,
        video_url: String::new(),
    }
}

fn draft(title: &str, modules: usize) -> CourseDraft {
    CourseDraft {
        title: title.to_string(),
        description: "A course".to_string(),
        instructor: "Jane Doe".to_string(),
        modules: (1..=modules).map(|i| module(&format!("m{}", i))).collect(),
    }
}

fn engine() -> LearningRecords<MemoryStore> {
    LearningRecords::open(MemoryStore::new()).unwrap()
}

// =====================================================================
// ENROLLMENT
// =====================================================================

#[test]
fn test_enroll_twice_is_idempotent() {
    let mut records = engine();
    assert!(records.enroll("u9", "c1").unwrap());
    let first = records.enrollment_date("u9", "c1");

    assert!(!records.enroll("u9", "c1").unwrap());
    assert_eq!(records.enrollment_date("u9", "c1"), first);
    assert_eq!(records.course_students("c1"), vec!["u2".to_string(), "u9".to_string()]);
}

#[test]
fn test_unenroll_discards_progress() {
    let mut records = engine();
    records.mark_module_completed("u2", "c1", "m1").unwrap();
    records.submit_assignment("u2", "c1", "essay.pdf").unwrap();

    assert!(records.unenroll("u2", "c1").unwrap());
    assert!(!records.is_enrolled("u2", "c1"));
    assert!(records.completed_modules("u2", "c1").is_empty());
    assert!(!records.is_assignment_submitted("u2", "c1"));

    assert!(!records.unenroll("u2", "c1").unwrap());
}

#[test]
fn test_prune_removes_unknown_users() {
    let mut store = MemoryStore::new();
    let mut directory = UserDirectory::load(&mut store, &[]).unwrap();
    directory.remove_user(&mut store, "u2").unwrap();

    let mut records = LearningRecords::open(store).unwrap();
    assert!(records.prune_invalid_enrollments(directory.valid_ids()).unwrap());
    assert!(records.enrolled_courses("u2").is_empty());
    assert!(!records.prune_invalid_enrollments(directory.valid_ids()).unwrap());
}

#[test]
fn test_unreadable_user_entry_does_not_cost_enrollments() {
    let mut store = MemoryStore::new();
    store
        .set(
            "usersDb",
            r#"[
                {"id":"u1","name":"Jane Educator","email":"educator@course.com","role":"educator"},
                {"id":"u2","name":"Alex Student","email":"student@course.com","role":"student"},
                {"id":"u66","name":"Root","email":"root@course.com","role":"admin"},
                {"id":"u77","name":"Riley","email":"riley@course.com","role":"student"}
            ]"#,
        )
        .unwrap();
    let directory = UserDirectory::load(&mut store, &[]).unwrap();
    assert!(directory.find("u77").is_some());

    let mut records = LearningRecords::open(store).unwrap();
    records.enroll("u77", "c1").unwrap();
    records.enroll("u66", "c2").unwrap();

    assert!(!records.prune_invalid_enrollments(directory.valid_ids()).unwrap());
    assert!(records.is_enrolled("u77", "c1"));
    assert!(records.is_enrolled("u66", "c2"));
}

// =====================================================================
// PROGRESS AND GRADING
// =====================================================================

#[test]
fn test_module_completion_is_idempotent() {
    let mut records = engine();
    for _ in 0..3 {
        records.mark_module_completed("u2", "c1", "m2").unwrap();
    }
    assert_eq!(records.completed_modules("u2", "c1"), ["m2".to_string()]);
}

#[test]
fn test_scores_are_clamped() {
    let mut records = engine();
    records.submit_assignment("u2", "c1", "essay.pdf").unwrap();

    records.grade_assignment("u2", "c1", -5).unwrap();
    assert_eq!(records.assignment_score("u2", "c1"), Some(0.0));

    records.grade_assignment("u2", "c1", 999).unwrap();
    assert_eq!(records.assignment_score("u2", "c1"), Some(25.0));

    records.grade_assignment("u2", "c1", "abc").unwrap();
    assert_eq!(records.assignment_score("u2", "c1"), Some(0.0));

    records.grade_assignment("u2", "c1", " 17.5 ").unwrap();
    assert_eq!(records.assignment_score("u2", "c1"), Some(17.5));

    records.grade_assignment("u2", "c1", f64::NAN).unwrap();
    assert_eq!(records.assignment_score("u2", "c1"), Some(0.0));
}

#[test]
fn test_grade_requires_submission() {
    let mut records = engine();
    assert!(!records.grade_assignment("u2", "c2", 20).unwrap());
    assert_eq!(records.assignment_score("u2", "c2"), None);
    assert!(!records.is_assignment_graded("u2", "c2"));

    records.mark_assignment_submitted("u2", "c2").unwrap();
    assert!(records.grade_assignment("u2", "c2", 20).unwrap());
    assert!(records.is_assignment_graded("u2", "c2"));
}

#[test]
fn test_resubmission_clears_grade() {
    let mut records = engine();
    records.submit_assignment("u2", "c1", "draft.pdf").unwrap();
    records.grade_assignment("u2", "c1", 18).unwrap();
    assert!(records.is_assignment_graded("u2", "c1"));

    records.submit_assignment("u2", "c1", "final.pdf").unwrap();
    assert!(!records.is_assignment_graded("u2", "c1"));
    assert_eq!(records.assignment_score("u2", "c1"), None);
    assert_eq!(records.assignment_details("u2", "c1").assignment_file_name, "final.pdf");
}

#[test]
fn test_progress_formula() {
    let mut records = engine();
    let course = records.add_course(draft("Four modules", 4)).unwrap();
    records.enroll("u2", &course.id).unwrap();
    records.mark_module_completed("u2", &course.id, "m1").unwrap();
    records.mark_module_completed("u2", &course.id, "m2").unwrap();
    records.submit_assignment("u2", &course.id, "work.zip").unwrap();
    records.grade_assignment("u2", &course.id, 20).unwrap();

    assert_eq!(records.course_progress("u2", &course.id, 4), 58.0);
    assert!(!records.has_completed_course_components("u2", &course.id, 4));
}

#[test]
fn test_pass_gate_without_modules() {
    let mut records = engine();
    let course = records.add_course(draft("Assignment only", 0)).unwrap();
    records.enroll("u2", &course.id).unwrap();
    records.submit_assignment("u2", &course.id, "work.zip").unwrap();
    records.grade_assignment("u2", &course.id, 25).unwrap();

    assert_eq!(records.course_progress("u2", &course.id, 0), 25.0);
    assert!(records.has_completed_course_components("u2", &course.id, 0));
    assert!(!records.is_course_passed("u2", &course.id, 0));
}

#[test]
fn test_full_completion_passes() {
    let mut records = engine();
    for module in ["m1", "m2", "m3"] {
        records.mark_module_completed("u2", "c1", module).unwrap();
    }
    records.submit_assignment("u2", "c1", "final.pdf").unwrap();
    records.grade_assignment("u2", "c1", 15).unwrap();

    assert_eq!(records.course_progress("u2", "c1", 3), 90.0);
    assert!(records.is_course_passed("u2", "c1", 3));
}

#[test]
fn test_upcoming_tasks_ordering() {
    let mut records = engine();
    let now = Utc::now();
    let three_days_ago = now - Duration::days(3);
    let one_day_ago = now - Duration::days(1);
    records.enroll_at("u9", "c1", one_day_ago).unwrap();
    records.enroll_at("u9", "c2", three_days_ago).unwrap();

    let tasks = records.upcoming_tasks("u9");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].course_id, "c2");
    assert_eq!(tasks[0].due_date, three_days_ago + Duration::days(7));
    assert_eq!(tasks[0].assignment_title, "Assignment 2");
    assert_eq!(tasks[1].course_id, "c1");
    assert_eq!(tasks[1].due_date, one_day_ago + Duration::days(7));

    records.submit_assignment("u9", "c2", "done.txt").unwrap();
    let tasks = records.upcoming_tasks("u9");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].course_id, "c1");
}

// =====================================================================
// CASCADES
// =====================================================================

#[test]
fn test_delete_course_cascades() {
    let mut records = engine();
    records.enroll("u3", "c2").unwrap();
    records.mark_module_completed("u2", "c2", "m1").unwrap();
    records.mark_module_completed("u3", "c2", "m1").unwrap();

    assert!(records.delete_course("c2").unwrap());
    assert!(records.course("c2").is_none());
    for user in ["u2", "u3"] {
        assert!(records.enrolled_courses(user).iter().all(|c| c.id != "c2"));
        assert!(!records.is_enrolled(user, "c2"));
        assert!(records.completed_modules(user, "c2").is_empty());
    }
    assert!(records.course_students("c2").is_empty());

    assert!(!records.delete_course("c2").unwrap());
}

#[test]
fn test_update_course_keeps_progress() {
    let mut records = engine();
    records.mark_module_completed("u2", "c1", "m1").unwrap();

    let mut course = records.course("c1").unwrap().clone();
    course.title = "React, revised".to_string();
    course.modules.push(module("m4"));
    assert!(records.update_course(course).unwrap());

    assert_eq!(records.module_count("c1"), 4);
    assert_eq!(records.completed_modules("u2", "c1"), ["m1".to_string()]);
    assert_eq!(records.course_progress("u2", "c1", 4), 19.0);

    let mut unknown = records.course("c1").unwrap().clone();
    unknown.id = "nope".to_string();
    assert!(!records.update_course(unknown).unwrap());
}

// =====================================================================
// STORAGE
// =====================================================================

#[test]
fn test_legacy_progress_shape_is_normalized() {
    let mut store = MemoryStore::new();
    store.set(PROGRESS_KEY, r#"{"u2":{"c1":["m1","m2"]}}"#).unwrap();

    let records = LearningRecords::open(store).unwrap();
    assert_eq!(
        records.assignment_details("u2", "c1"),
        ProgressRecord {
            completed_modules: vec!["m1".to_string(), "m2".to_string()],
            ..ProgressRecord::default()
        }
    );
    assert!(!records.is_assignment_submitted("u2", "c1"));
    assert_eq!(records.assignment_score("u2", "c1"), None);
}

#[test]
fn test_corrupt_catalog_is_reseeded() {
    let mut store = LearningRecords::open(MemoryStore::new()).unwrap().into_store();
    store.set(COURSES_KEY, "{not json").unwrap();

    let records = LearningRecords::open(store).unwrap();
    assert_eq!(records.courses().len(), 3);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.db");

    let course_id = {
        let mut records = LearningRecords::open(SqliteStore::open(&path).unwrap()).unwrap();
        let course = records.add_course(draft("Persistent", 2)).unwrap();
        records.enroll("u9", &course.id).unwrap();
        records.mark_module_completed("u9", &course.id, "m1").unwrap();
        records.submit_assignment("u9", &course.id, "notes.txt").unwrap();
        records.grade_assignment("u9", &course.id, 21).unwrap();
        records.delete_course("c3").unwrap();
        course.id
    };

    let records = LearningRecords::open(SqliteStore::open(&path).unwrap()).unwrap();
    assert_eq!(records.courses().len(), 3);
    assert!(records.course("c3").is_none());
    assert_eq!(records.course(&course_id).unwrap().title, "Persistent");
    assert!(records.is_enrolled("u9", &course_id));
    assert_eq!(records.completed_modules("u9", &course_id), ["m1".to_string()]);
    assert_eq!(records.assignment_score("u9", &course_id), Some(21.0));
    assert_eq!(records.course_progress("u9", &course_id, 2), 59.0);
    assert!(!records.is_enrolled("u2", "c3"));
}
