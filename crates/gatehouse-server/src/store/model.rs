use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted session state. Values are JSON-encoded so callers can read
/// them back as whatever type they were written with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub data: BTreeMap<String, String>,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// An identity as seen by handlers and stored in the session. Never
/// carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
    /// Stored filename of the current profile picture.
    pub avatar: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
}

/// Lookup form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
