//! Shared types used across modules
//!
//! Users are owned by the identity directory; the records engine only
//! references them by id.

use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Role of a user within the course system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Educator,
    Student,
}

impl Role {
    /// Parse from the stored role string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "educator" => Some(Role::Educator),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Educator => write!(f, "educator"),
            Role::Student => write!(f, "student"),
        }
    }
}
