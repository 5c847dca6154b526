//! Course Engine - Learning Records Library
//!
//! Keeps a course catalog, who is enrolled where, and how far each student
//! got, and writes all of it through to a key-value store.
//!
//! # Example
//!
//! ```
//! use course_engine::records::LearningRecords;
//! use course_engine::storage::MemoryStore;
//!
//! let mut records = LearningRecords::open(MemoryStore::new()).unwrap();
//! records.enroll("u2", "c1").unwrap();
//! records.mark_module_completed("u2", "c1", "m1").unwrap();
//! assert_eq!(records.course_progress("u2", "c1", 3), 25.0);
//! ```

pub mod types;
pub mod storage;
pub mod identity;
pub mod records;
pub mod artifact;
pub mod video;
pub mod config;
pub mod cli;

pub use config::Config;
pub use identity::{IdentityError, UserDirectory};
pub use records::{Course, CourseDraft, LearningRecords, Module, ProgressRecord, UpcomingTask};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use types::{Role, User};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Learning Records Engine", NAME, VERSION)
}
