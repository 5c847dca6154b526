//! Seeding and migration of the ledgers from the durable store
//!
//! Versioned keys (`courses`, `enrollments`) are reused only when their stored
//! version marker matches the current one; otherwise they are replaced by the
//! built-in defaults. Unversioned keys (`enrollmentMeta`, `courseProgress`)
//! are kept indefinitely once written.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use super::catalog::{Catalog, Course, Module};
use super::enrollment::{synthetic_meta, EnrollmentLedger, EnrollmentMetaMap, Membership};
use super::progress::ProgressLedger;
use crate::storage::{read_json, write_json, KeyValueStore, StoreError};

pub const COURSES_KEY: &str = "courses";
pub const COURSES_VERSION_KEY: &str = "coursesSeedVersion";
pub const ENROLLMENTS_KEY: &str = "enrollments";
pub const ENROLLMENTS_VERSION_KEY: &str = "enrollmentsSeedVersion";
pub const ENROLLMENT_META_KEY: &str = "enrollmentMeta";
pub const PROGRESS_KEY: &str = "courseProgress";

pub const COURSE_SEED_VERSION: &str = "2026-02-fullstack-v1";
pub const ENROLLMENT_SEED_VERSION: &str = "2026-02-fullstack-v1";

/// Ledgers as loaded at startup
#[derive(Debug, Clone)]
pub struct Seeded {
    pub catalog: Catalog,
    pub enrollments: EnrollmentLedger,
    pub progress: ProgressLedger,
}

/// Load every ledger, seeding or migrating keys as needed.
///
/// `today` anchors synthetic registration dates for enrollments that have none.
pub fn load<S>(store: &mut S, today: DateTime<Utc>) -> Result<Seeded, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let catalog = Catalog::new(load_versioned(
        store,
        COURSES_KEY,
        COURSES_VERSION_KEY,
        COURSE_SEED_VERSION,
        default_courses,
    )?);

    let membership: Membership = load_versioned(
        store,
        ENROLLMENTS_KEY,
        ENROLLMENTS_VERSION_KEY,
        ENROLLMENT_SEED_VERSION,
        default_enrollments,
    )?;

    let meta: EnrollmentMetaMap = match read_json(store, ENROLLMENT_META_KEY)? {
        Some(meta) => meta,
        None => {
            info!("No enrollment metadata stored, deriving it from enrollments");
            let meta = synthetic_meta(&membership, today);
            write_json(store, ENROLLMENT_META_KEY, &meta)?;
            meta
        }
    };

    let progress: ProgressLedger = match read_json(store, PROGRESS_KEY)? {
        Some(progress) => progress,
        None => {
            let progress = ProgressLedger::default();
            write_json(store, PROGRESS_KEY, &progress)?;
            progress
        }
    };

    let mut enrollments = EnrollmentLedger::from_parts(membership, meta);
    if enrollments.reconcile(today) {
        warn!("Enrollment metadata was out of step with enrollments, repaired");
        write_json(store, ENROLLMENT_META_KEY, enrollments.meta())?;
    }

    Ok(Seeded {
        catalog,
        enrollments,
        progress,
    })
}

fn load_versioned<T, S>(
    store: &mut S,
    key: &str,
    version_key: &str,
    version: &str,
    default: impl FnOnce() -> T,
) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let stored_version = store.get(version_key)?;
    if stored_version.as_deref() == Some(version) {
        if let Some(value) = read_json(store, key)? {
            return Ok(value);
        }
    }

    info!(
        "Seeding '{}' with built-in defaults (stored version {:?}, current {})",
        key, stored_version, version
    );
    let value = default();
    write_json(store, key, &value)?;
    store.set(version_key, version)?;
    Ok(value)
}

/// Default enrollments: the demo student takes every seeded course
pub fn default_enrollments() -> Membership {
    let mut membership = Membership::new();
    membership.insert(
        "u2".to_string(),
        vec!["c1".to_string(), "c2".to_string(), "c3".to_string()],
    );
    membership
}

fn youtube_module(id: &str, title: &str, content: &str, video_id: &str) -> Module {
    Module {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        video_source: None,
        video_url: format!("https://www.youtube.com/embed/{}", video_id),
    }
}

/// Built-in catalog
pub fn default_courses() -> Vec<Course> {
    vec![
        Course {
            id: "c1".to_string(),
            title: "React Frontend Essentials".to_string(),
            description: "Build modern UIs with React, JSX, state, and reusable components."
                .to_string(),
            instructor: "Jane Doe".to_string(),
            modules: vec![
                youtube_module(
                    "m1",
                    "Getting Started with React",
                    "Learn how to set up your React development environment",
                    "SqcY0GlETPk",
                ),
                youtube_module(
                    "m2",
                    "React Components and JSX",
                    "Understanding components and JSX syntax",
                    "RGKi6LSPDLU",
                ),
                youtube_module(
                    "m3",
                    "State and Props",
                    "Learn about React state management and props",
                    "4pO-HcG2igk",
                ),
            ],
        },
        Course {
            id: "c2".to_string(),
            title: "Modern JavaScript for Web Apps".to_string(),
            description: "Master JavaScript fundamentals, async programming, and DOM workflows."
                .to_string(),
            instructor: "John Smith".to_string(),
            modules: vec![
                youtube_module(
                    "m1",
                    "JavaScript Fundamentals",
                    "Variables, functions, arrays, objects, and ES6 syntax.",
                    "PkZNo7MFNFg",
                ),
                youtube_module(
                    "m2",
                    "Asynchronous JavaScript",
                    "Understand promises, async/await, and API calls.",
                    "PoRJizFvM7s",
                ),
                youtube_module(
                    "m3",
                    "DOM and Browser APIs",
                    "Work with events, forms, and dynamic page updates.",
                    "0ik6X4DJKCc",
                ),
            ],
        },
        Course {
            id: "c3".to_string(),
            title: "Node.js & Express Full-Stack APIs".to_string(),
            description:
                "Create backend APIs, connect databases, and power full-stack applications."
                    .to_string(),
            instructor: "Jane Doe".to_string(),
            modules: vec![
                youtube_module(
                    "m1",
                    "Node.js Runtime Basics",
                    "Understand Node.js architecture and package management.",
                    "TlB_eWDSMt4",
                ),
                youtube_module(
                    "m2",
                    "Build REST APIs with Express",
                    "Create routes, controllers, and middleware in Express.",
                    "l8WPWK9mS5M",
                ),
                youtube_module(
                    "m3",
                    "MongoDB Integration",
                    "Persist data and model resources with MongoDB and Mongoose.",
                    "ExcRbA7fy_A",
                ),
            ],
        },
    ]
}
