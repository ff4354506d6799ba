//! Cookie-identified sessions.
//!
//! Sessions expire after a period without requests. Expired entries are
//! refused on lookup and dropped by [`SessionStore::prune_expired`].

use std::time::Duration;

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// Idle lifetime used when none is configured.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(120 * 60);

/// Server-side session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<u64>,
    pub csrf_token: String,
}

pub trait SessionStore: Send + Sync {
    /// Name of the cookie carrying the session id.
    fn cookie_name(&self) -> &str;
    /// The session referenced by the request cookies, if it exists.
    fn current(&self, headers: &HeaderMap) -> Option<Session>;
    /// Start a fresh guest session.
    fn start(&self) -> Session;
    /// Bind a user to a new session id, replacing `session_id`.
    fn login(&self, session_id: &str, user_id: u64) -> Session;
    fn logout(&self, session_id: &str);
    /// Drop sessions idle past their lifetime. Returns how many were removed.
    fn prune_expired(&self) -> usize;
}

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// Process-local session table.
pub struct InMemorySessions {
    cookie: String,
    lifetime: Duration,
    sessions: DashMap<String, Entry>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::with_cookie("web_guard_session")
    }

    pub fn with_cookie(cookie: &str) -> Self {
        Self {
            cookie: cookie.to_string(),
            lifetime: DEFAULT_LIFETIME,
            sessions: DashMap::new(),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) >= self.lifetime
    }

    fn insert(&self, session: Session) -> Session {
        self.sessions.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        session
    }

    fn fresh(user_id: Option<u64>) -> Session {
        Session {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            csrf_token: Uuid::new_v4().simple().to_string(),
        }
    }
}

impl Default for InMemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessions {
    fn cookie_name(&self) -> &str {
        &self.cookie
    }

    fn current(&self, headers: &HeaderMap) -> Option<Session> {
        let id = cookie_value(headers, &self.cookie)?;
        let now = Instant::now();

        let mut entry = self.sessions.get_mut(id)?;
        if self.expired(&entry, now) {
            // Release the shard lock before removing.
            drop(entry);
            self.sessions.remove_if(id, |_, e| self.expired(e, now));
            return None;
        }
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    fn start(&self) -> Session {
        self.insert(Self::fresh(None))
    }

    fn login(&self, session_id: &str, user_id: u64) -> Session {
        // New id on privilege change.
        self.sessions.remove(session_id);
        self.insert(Self::fresh(Some(user_id)))
    }

    fn logout(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, e| !self.expired(e, now));
        before.saturating_sub(self.sessions.len())
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(name: &str, id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, id)
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}
