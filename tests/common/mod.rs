//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use web_guard::config::AppConfig;
use web_guard::http::AppState;
use web_guard::services::{
    InMemoryUsers, NewUser, Session, User, VerificationNotifier, MIN_PASSWORD_COST,
};
use web_guard::{HttpServer, Services};

/// Notifier that keeps every issued link.
#[derive(Default)]
pub struct RecordingNotifier {
    links: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn links(&self) -> Vec<String> {
        self.links.lock().unwrap().clone()
    }
}

impl VerificationNotifier for RecordingNotifier {
    fn notify(&self, _user: &User, url: &str) {
        self.links.lock().unwrap().push(url.to_string());
    }
}

pub struct TestApp {
    pub server: HttpServer,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_services(config, Services::in_memory())
    }

    /// Minimum bcrypt cost keeps registration and login fast.
    pub fn fast_users() -> Arc<InMemoryUsers> {
        Arc::new(InMemoryUsers::with_cost(MIN_PASSWORD_COST))
    }

    pub fn with_services(config: AppConfig, services: Services) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            users: Self::fast_users(),
            notifier: notifier.clone(),
            ..services
        };
        let server = HttpServer::new(config, services).expect("valid test config");
        Self { server, notifier }
    }

    pub fn state(&self) -> &AppState {
        self.server.state()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.server.router().oneshot(request).await.unwrap()
    }

    /// Create a user, optionally with a verified email.
    pub fn user(&self, email: &str, verified: bool) -> User {
        let services = &self.state().services;
        let user = services
            .users
            .create(NewUser {
                name: "Ada".into(),
                email: email.into(),
                password: "correct horse".into(),
            })
            .unwrap();
        if verified {
            services.users.mark_email_verified(user.id, Utc::now());
        }
        services.users.find(user.id).unwrap()
    }

    pub fn guest_session(&self) -> Session {
        self.state().services.sessions.start()
    }

    /// A session logged in as `user`.
    pub fn login(&self, user: &User) -> Session {
        let sessions = &self.state().services.sessions;
        let guest = sessions.start();
        sessions.login(&guest.id, user.id)
    }

    pub fn cookie(&self, session: &Session) -> String {
        format!(
            "{}={}",
            self.state().services.sessions.cookie_name(),
            session.id
        )
    }

    /// Request carrying the session cookie and its CSRF header.
    pub fn request(&self, method: &str, uri: &str, session: Option<&Session>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder
                .header("cookie", self.cookie(session))
                .header("x-csrf-token", session.csrf_token.as_str());
        }
        builder
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Session id from a `Set-Cookie` header, if the response set one.
pub fn set_cookie_session(response: &Response<Body>, cookie_name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == cookie_name)
        .map(|(_, v)| v.to_string())
}
