//! User persistence.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

/// A stored user. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    password_hash: String,
}

/// Validated fields for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A uniqueness or integrity rule rejected the write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} violates constraint '{constraint}'")]
pub struct ConstraintViolation {
    pub field: String,
    pub constraint: String,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub trait UserStore: Send + Sync {
    fn create(&self, user: NewUser) -> Result<User, UserStoreError>;
    fn find(&self, id: u64) -> Option<User>;
    fn find_by_email(&self, email: &str) -> Option<User>;
    /// The user whose credentials match, if any.
    fn check_credentials(&self, email: &str, password: &str) -> Option<User>;
    /// Returns false when the user does not exist.
    fn mark_email_verified(&self, id: u64, at: DateTime<Utc>) -> bool;
}

/// Work factors bcrypt accepts.
pub const MIN_PASSWORD_COST: u32 = 4;
pub const MAX_PASSWORD_COST: u32 = 31;

/// Process-local user table. Emails are unique case-insensitively and
/// passwords are stored as bcrypt hashes.
pub struct InMemoryUsers {
    users: DashMap<u64, User>,
    emails: DashMap<String, u64>,
    next_id: AtomicU64,
    cost: u32,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(cost: u32) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            next_id: AtomicU64::new(0),
            cost,
        }
    }
}

impl Default for InMemoryUsers {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for InMemoryUsers {
    fn create(&self, user: NewUser) -> Result<User, UserStoreError> {
        // Hash before taking the email slot's lock.
        let password_hash = bcrypt::hash(&user.password, self.cost)?;

        let email_key = user.email.to_lowercase();
        let id = match self.emails.entry(email_key) {
            Entry::Occupied(_) => {
                return Err(ConstraintViolation {
                    field: "email".to_string(),
                    constraint: "unique".to_string(),
                }
                .into())
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(id);
                id
            }
        };

        let stored = User {
            id,
            password_hash,
            name: user.name,
            email: user.email,
            email_verified_at: None,
        };
        self.users.insert(id, stored.clone());
        Ok(stored)
    }

    fn find(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&email.to_lowercase())?;
        self.find(id)
    }

    fn check_credentials(&self, email: &str, password: &str) -> Option<User> {
        let user = self.find_by_email(email)?;
        match bcrypt::verify(password, &user.password_hash) {
            Ok(true) => Some(user),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "Stored password hash is unreadable");
                None
            }
        }
    }

    fn mark_email_verified(&self, id: u64, at: DateTime<Utc>) -> bool {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.email_verified_at.get_or_insert(at);
                true
            }
            None => false,
        }
    }
}
