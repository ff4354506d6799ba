//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes with their guard specifications
//! - Look up the most specific route for a method and path
//! - Report explicit no-match / method-mismatch outcomes
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted by specificity once; first match wins
//! - O(n) scan (acceptable for typical route counts)
//! - HEAD is served by GET routes

use axum::http::Method;
use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::guards::{GuardSpec, GuardSpecError};
use crate::routing::matcher::{Params, PatternError, RoutePattern};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{route}': {source}")]
    Pattern {
        route: String,
        #[source]
        source: PatternError,
    },
    #[error("route '{route}': {source}")]
    Guard {
        route: String,
        #[source]
        source: GuardSpecError,
    },
    #[error("route '{route}': invalid method '{method}'")]
    Method { route: String, method: String },
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub method: Method,
    pub pattern: RoutePattern,
    pub guards: GuardSpec,
}

impl Route {
    pub fn compile(config: &RouteConfig) -> Result<Self, RouteError> {
        let pattern = RoutePattern::parse(&config.pattern).map_err(|source| RouteError::Pattern {
            route: config.name.clone(),
            source,
        })?;
        let guards = GuardSpec::parse(&config.guards).map_err(|source| RouteError::Guard {
            route: config.name.clone(),
            source,
        })?;
        let method = config
            .method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|_| RouteError::Method {
                route: config.name.clone(),
                method: config.method.clone(),
            })?;

        Ok(Self {
            name: config.name.clone(),
            method,
            pattern,
            guards,
        })
    }

    fn accepts(&self, method: &Method) -> bool {
        self.method == method || (method == Method::HEAD && self.method == Method::GET)
    }
}

/// Result of a lookup.
#[derive(Debug)]
pub enum Resolution<'a> {
    Matched { route: &'a Route, params: Params },
    /// The path exists under other methods.
    MethodNotAllowed,
    NotFound,
}

/// The route guard table.
#[derive(Debug, Clone, Default)]
pub struct GuardTable {
    routes: Vec<Route>,
}

impl GuardTable {
    pub fn from_config<'a>(
        routes: impl IntoIterator<Item = &'a RouteConfig>,
    ) -> Result<Self, RouteError> {
        let mut routes = routes
            .into_iter()
            .map(Route::compile)
            .collect::<Result<Vec<_>, _>>()?;
        routes.sort_by(|a, b| a.pattern.specificity_cmp(&b.pattern));
        Ok(Self { routes })
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_> {
        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.accepts(method) {
                return Resolution::Matched { route, params };
            }
            path_matched = true;
        }

        if path_matched {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }
}
