//! Collaborators the pipeline and controllers depend on.
//!
//! # Data Flow
//! ```text
//! Request headers
//!     → sessions.rs (cookie → Session{user_id, csrf_token})
//!     → users.rs (user_id → Principal)
//!     → Guards / controllers
//!
//! Controllers
//!     → users.rs, posts.rs (persistence)
//!     → views.rs (rendering)
//!     → sheets.rs (documentation pages)
//!     → notifier.rs (verification links)
//! ```
//!
//! # Design Decisions
//! - Each collaborator is a trait object so deployments can swap backends
//! - In-memory implementations back the default server and the tests
//! - The pipeline only consumes pass/fail outcomes from collaborators

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::lifecycle::StartupError;

pub mod notifier;
pub mod posts;
pub mod sessions;
pub mod sheets;
pub mod users;
pub mod views;

pub use notifier::{LogNotifier, VerificationNotifier};
pub use posts::{InMemoryPosts, Post, PostRepository};
pub use sessions::{InMemorySessions, Session, SessionStore};
pub use sheets::{InMemorySheets, Sheet, SheetRepository};
pub use users::{
    ConstraintViolation, InMemoryUsers, NewUser, User, UserStore, UserStoreError,
    MAX_PASSWORD_COST, MIN_PASSWORD_COST,
};
pub use views::{HtmlRenderer, RenderError, ViewRenderer};

/// The authenticated user as seen by guards and controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn has_verified_email(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            email_verified_at: user.email_verified_at,
        }
    }
}

/// The full set of collaborators handed to the server.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub posts: Arc<dyn PostRepository>,
    pub sheets: Arc<dyn SheetRepository>,
    pub views: Arc<dyn ViewRenderer>,
    pub notifier: Arc<dyn VerificationNotifier>,
}

impl Services {
    /// In-memory collaborators with no documentation pages.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUsers::new()),
            sessions: Arc::new(InMemorySessions::new()),
            posts: Arc::new(InMemoryPosts::new()),
            sheets: Arc::new(InMemorySheets::default()),
            views: Arc::new(HtmlRenderer),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// In-memory collaborators using the configured session cookie, session
    /// lifetime, password cost and docs directory.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let sheets = match &config.docs.directory {
            Some(dir) => InMemorySheets::from_directory(dir).map_err(|source| StartupError::Docs {
                path: dir.clone(),
                source,
            })?,
            None => InMemorySheets::default(),
        };

        Ok(Self {
            users: Arc::new(InMemoryUsers::with_cost(config.auth.password_cost)),
            sessions: Arc::new(
                InMemorySessions::with_cookie(&config.auth.session_cookie).with_lifetime(
                    Duration::from_secs(config.auth.session_lifetime_minutes * 60),
                ),
            ),
            sheets: Arc::new(sheets),
            ..Self::in_memory()
        })
    }

    /// Resolve the principal bound to a session, if any.
    pub fn principal(&self, session: Option<&Session>) -> Option<Principal> {
        let user_id = session?.user_id?;
        self.users.find(user_id).map(|u| Principal::from(&u))
    }
}
