//! Progress Ledger - per-user, per-course learning state
//!
//! Records may be stored either in the full object shape or in the legacy
//! shape (a bare array of completed module ids). Both are normalized into
//! `ProgressRecord` when deserialized; nothing past that point sees the raw
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Highest score an assignment can receive
pub const MAX_ASSIGNMENT_SCORE: f64 = 25.0;

/// Learning state of one user in one course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ProgressRecord {
    pub completed_modules: Vec<String>,
    pub assignment_submitted: bool,
    pub assignment_file_name: String,
    pub assignment_file_type: String,
    /// Opaque blob reference, usually a `data:` URL
    pub assignment_file_data_url: String,
    /// Present only once graded
    pub assignment_score: Option<f64>,
}

impl ProgressRecord {
    /// Build the canonical record from any stored shape
    pub fn normalize(value: Value) -> Self {
        match value {
            Value::Array(items) => Self {
                completed_modules: module_ids(items),
                ..Self::default()
            },
            Value::Object(mut fields) => Self {
                completed_modules: match fields.remove("completedModules") {
                    Some(Value::Array(items)) => module_ids(items),
                    _ => Vec::new(),
                },
                assignment_submitted: fields
                    .remove("assignmentSubmitted")
                    .is_some_and(|v| truthy(&v)),
                assignment_file_name: text(fields.remove("assignmentFileName")),
                assignment_file_type: text(fields.remove("assignmentFileType")),
                assignment_file_data_url: text(fields.remove("assignmentFileDataUrl")),
                assignment_score: fields
                    .remove("assignmentScore")
                    .and_then(|v| v.as_f64())
                    .filter(|score| score.is_finite()),
            },
            _ => Self::default(),
        }
    }

    pub fn is_graded(&self) -> bool {
        self.assignment_score.is_some()
    }
}

impl From<Value> for ProgressRecord {
    fn from(value: Value) -> Self {
        Self::normalize(value)
    }
}

fn module_ids(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// What a student hands in
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Only a file name; type and blob keep their previous values
    FileName(String),
    /// A read file. Empty fields fall back to the previous values.
    File {
        name: String,
        file_type: String,
        data_url: String,
    },
}

impl From<&str> for Submission {
    fn from(name: &str) -> Self {
        Submission::FileName(name.to_string())
    }
}

impl From<String> for Submission {
    fn from(name: String) -> Self {
        Submission::FileName(name)
    }
}

/// A grade as entered, before coercion
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreInput {
    Number(f64),
    Text(String),
}

impl ScoreInput {
    /// Numeric value of the input. Anything that is not a number becomes 0.
    ///
    /// Text is trimmed and read as a decimal float, or as an unsigned
    /// `0x`/`0o`/`0b` integer literal. Signed radix literals are not numbers.
    pub fn coerce(&self) -> f64 {
        let raw = match self {
            ScoreInput::Number(n) => *n,
            ScoreInput::Text(s) => parse_score_text(s.trim()),
        };
        if raw.is_nan() {
            0.0
        } else {
            raw
        }
    }

    /// Coerced value clamped into the valid score range
    pub fn clamped(&self) -> f64 {
        self.coerce().clamp(0.0, MAX_ASSIGNMENT_SCORE)
    }
}

fn parse_score_text(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let radix = match text.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    match radix {
        Some(radix) => u64::from_str_radix(&text[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(0.0),
        None => text.parse::<f64>().unwrap_or(0.0),
    }
}

impl From<f64> for ScoreInput {
    fn from(n: f64) -> Self {
        ScoreInput::Number(n)
    }
}

impl From<i32> for ScoreInput {
    fn from(n: i32) -> Self {
        ScoreInput::Number(f64::from(n))
    }
}

impl From<u32> for ScoreInput {
    fn from(n: u32) -> Self {
        ScoreInput::Number(f64::from(n))
    }
}

impl From<&str> for ScoreInput {
    fn from(s: &str) -> Self {
        ScoreInput::Text(s.to_string())
    }
}

impl From<String> for ScoreInput {
    fn from(s: String) -> Self {
        ScoreInput::Text(s)
    }
}

/// userId -> courseId -> record, stored as nested JSON objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressLedger {
    records: BTreeMap<String, BTreeMap<String, ProgressRecord>>,
}

impl ProgressLedger {
    pub fn get(&self, user_id: &str, course_id: &str) -> Option<&ProgressRecord> {
        self.records.get(user_id).and_then(|r| r.get(course_id))
    }

    /// Existing record or a freshly defaulted one
    fn entry(&mut self, user_id: &str, course_id: &str) -> &mut ProgressRecord {
        self.records
            .entry(user_id.to_string())
            .or_default()
            .entry(course_id.to_string())
            .or_default()
    }

    pub fn completed_modules(&self, user_id: &str, course_id: &str) -> &[String] {
        self.get(user_id, course_id)
            .map(|r| r.completed_modules.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_submitted(&self, user_id: &str, course_id: &str) -> bool {
        self.get(user_id, course_id)
            .is_some_and(|r| r.assignment_submitted)
    }

    pub fn score(&self, user_id: &str, course_id: &str) -> Option<f64> {
        self.get(user_id, course_id).and_then(|r| r.assignment_score)
    }

    /// Add a module to the completed set. Completion is never undone.
    pub fn mark_module_completed(&mut self, user_id: &str, course_id: &str, module_id: &str) -> bool {
        if self
            .completed_modules(user_id, course_id)
            .iter()
            .any(|m| m == module_id)
        {
            return false;
        }

        self.entry(user_id, course_id)
            .completed_modules
            .push(module_id.to_string());
        debug!("{} completed module {} of {}", user_id, module_id, course_id);
        true
    }

    /// Record a submission. Any previous grade is discarded.
    pub fn submit(&mut self, user_id: &str, course_id: &str, submission: Submission) {
        let record = self.entry(user_id, course_id);

        match submission {
            Submission::FileName(name) => {
                record.assignment_file_name = name;
            }
            Submission::File {
                name,
                file_type,
                data_url,
            } => {
                if !name.is_empty() {
                    record.assignment_file_name = name;
                }
                if !file_type.is_empty() {
                    record.assignment_file_type = file_type;
                }
                if !data_url.is_empty() {
                    record.assignment_file_data_url = data_url;
                }
            }
        }

        record.assignment_submitted = true;
        record.assignment_score = None;
        debug!("{} submitted the assignment of {}", user_id, course_id);
    }

    /// Set the submitted flag without an artifact
    pub fn mark_submitted(&mut self, user_id: &str, course_id: &str) -> bool {
        if self.is_submitted(user_id, course_id) {
            return false;
        }
        self.entry(user_id, course_id).assignment_submitted = true;
        true
    }

    /// Store a grade. Refused (false) when nothing was submitted.
    pub fn grade(&mut self, user_id: &str, course_id: &str, score: &ScoreInput) -> bool {
        if !self.is_submitted(user_id, course_id) {
            return false;
        }
        let bounded = score.clamped();
        self.entry(user_id, course_id).assignment_score = Some(bounded);
        debug!("Graded {} in {}: {}", user_id, course_id, bounded);
        true
    }

    pub fn remove(&mut self, user_id: &str, course_id: &str) -> bool {
        self.records
            .get_mut(user_id)
            .is_some_and(|r| r.remove(course_id).is_some())
    }

    /// Delete the course's record for every user
    pub fn drop_course(&mut self, course_id: &str) -> bool {
        let mut changed = false;
        for user_records in self.records.values_mut() {
            changed |= user_records.remove(course_id).is_some();
        }
        changed
    }
}
