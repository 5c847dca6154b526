//! User directory
//!
//! Holds the registry of users the records engine refers to by id. Persisted
//! as a JSON array under `usersDb`. Credentials and sessions are handled
//! elsewhere; nothing secret is stored here.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::storage::{write_json, KeyValueStore, StoreError};
use crate::types::{Role, User};

pub const USERS_KEY: &str = "usersDb";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("email already exists: {0}")]
    DuplicateEmail(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Users shipped with a fresh install
pub fn default_users() -> Vec<User> {
    vec![
        User {
            id: "u1".to_string(),
            name: "Jane Educator".to_string(),
            email: "educator@course.com".to_string(),
            role: Role::Educator,
        },
        User {
            id: "u2".to_string(),
            name: "Alex Student".to_string(),
            email: "student@course.com".to_string(),
            role: Role::Student,
        },
    ]
}

/// In-memory copy of the user registry
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<User>,
    /// Stored entries that did not decode as a `User`
    unreadable: Vec<Value>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum StoredEntry<'a> {
    User(&'a User),
    Raw(&'a Value),
}

impl UserDirectory {
    /// Load the registry, seeding defaults only when nothing is stored yet.
    ///
    /// Entries are decoded one by one. An entry that does not decode is kept
    /// as-is in storage and skipped here. A stored value that is not a JSON
    /// array is an error and is left untouched.
    ///
    /// Users whose email is in `blocked_emails` are dropped; the stored copy is
    /// only rewritten when that removed someone.
    pub fn load<S>(store: &mut S, blocked_emails: &[String]) -> Result<Self, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let is_blocked = |user: &User| {
            blocked_emails
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(&user.email))
        };

        let Some(raw) = store.get(USERS_KEY)? else {
            let directory = Self {
                users: default_users().into_iter().filter(|u| !is_blocked(u)).collect(),
                unreadable: Vec::new(),
            };
            directory.persist(store)?;
            return Ok(directory);
        };

        let entries: Vec<Value> = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
            key: USERS_KEY.to_string(),
            source,
        })?;

        let mut users = Vec::with_capacity(entries.len());
        let mut unreadable = Vec::new();
        for entry in entries {
            match serde_json::from_value::<User>(entry.clone()) {
                Ok(user) => users.push(user),
                Err(e) => {
                    warn!("Skipping unreadable user entry in '{}': {}", USERS_KEY, e);
                    unreadable.push(entry);
                }
            }
        }

        let before = users.len();
        users.retain(|u| !is_blocked(u));
        let directory = Self { users, unreadable };
        if directory.users.len() != before {
            info!(
                "Removed {} blocked users from the directory",
                before - directory.users.len()
            );
            directory.persist(store)?;
        }
        Ok(directory)
    }

    /// Write the registry back, unreadable entries included
    fn persist<S>(&self, store: &mut S) -> Result<(), StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let entries: Vec<StoredEntry<'_>> = self
            .users
            .iter()
            .map(StoredEntry::User)
            .chain(self.unreadable.iter().map(StoredEntry::Raw))
            .collect();
        write_json(store, USERS_KEY, &entries)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn find(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn student_count(&self) -> usize {
        self.users.iter().filter(|u| u.role == Role::Student).count()
    }

    /// Ids of every known user, for enrollment pruning.
    ///
    /// Unreadable entries that still carry an id count as known, so their
    /// enrollments survive until the entry is repaired or removed.
    pub fn valid_ids(&self) -> Vec<String> {
        self.users
            .iter()
            .map(|u| u.id.clone())
            .chain(
                self.unreadable
                    .iter()
                    .filter_map(|entry| entry.get("id").and_then(Value::as_str))
                    .map(str::to_string),
            )
            .collect()
    }

    /// Add a new student
    pub fn register_student<S>(
        &mut self,
        store: &mut S,
        name: &str,
        email: &str,
    ) -> Result<User, IdentityError>
    where
        S: KeyValueStore + ?Sized,
    {
        let email = email.trim();
        if !EMAIL_PATTERN.is_match(email) {
            return Err(IdentityError::InvalidEmail(email.to_string()));
        }
        if self.find_by_email(email).is_some() {
            return Err(IdentityError::DuplicateEmail(email.to_string()));
        }

        let mut stamp = Utc::now().timestamp_millis();
        while self.find(&format!("u{}", stamp)).is_some() {
            stamp += 1;
        }

        let user = User {
            id: format!("u{}", stamp),
            name: name.trim().to_string(),
            email: email.to_string(),
            role: Role::Student,
        };
        self.users.push(user.clone());
        self.persist(store)?;
        info!("Registered student {} <{}>", user.id, user.email);
        Ok(user)
    }

    /// Remove a user. Their enrollments become invalid and are pruned later.
    pub fn remove_user<S>(&mut self, store: &mut S, id: &str) -> Result<bool, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.users.len() == before {
            return Ok(false);
        }
        self.persist(store)?;
        Ok(true)
    }
}
