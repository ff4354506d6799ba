//! Per-route guard specifications and their evaluation.
//!
//! Guards run in a fixed order regardless of how they are listed in the
//! route table: auth, signed, verified, throttle. The first failure ends
//! evaluation.

use std::fmt;
use std::time::Duration;

use axum::http::Uri;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::AppError;
use crate::security::rate_limit::{RateLimitStatus, RateLimiter};
use crate::security::signature::UrlSigner;
use crate::services::Principal;

/// Attempts allowed per window for a throttled route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_attempts: u32,
    pub per_minutes: u32,
}

impl RateLimit {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.per_minutes) * 60)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "throttle:{},{}", self.max_attempts, self.per_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardSpecError {
    #[error("unknown guard '{0}'")]
    Unknown(String),
    #[error("malformed throttle '{0}', expected throttle:<max>,<minutes>")]
    MalformedThrottle(String),
    #[error("throttle values must be positive: '{0}'")]
    ZeroThrottle(String),
    #[error("guard '{0}' listed more than once")]
    Duplicate(String),
}

/// The guard requirements of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardSpec {
    pub requires_auth: bool,
    pub requires_signed_url: bool,
    pub requires_verified_email: bool,
    pub rate_limit: Option<RateLimit>,
}

impl GuardSpec {
    /// Parse middleware-style guard names.
    pub fn parse<S: AsRef<str>>(guards: &[S]) -> Result<Self, GuardSpecError> {
        let mut spec = Self::default();
        for guard in guards {
            let guard = guard.as_ref().trim();
            let duplicate = || GuardSpecError::Duplicate(guard.to_string());
            match guard {
                "auth" if spec.requires_auth => return Err(duplicate()),
                "auth" => spec.requires_auth = true,
                "signed" if spec.requires_signed_url => return Err(duplicate()),
                "signed" => spec.requires_signed_url = true,
                "verified" if spec.requires_verified_email => return Err(duplicate()),
                "verified" => spec.requires_verified_email = true,
                _ => match guard.strip_prefix("throttle:") {
                    Some(_) if spec.rate_limit.is_some() => return Err(duplicate()),
                    Some(args) => spec.rate_limit = Some(parse_throttle(guard, args)?),
                    None => return Err(GuardSpecError::Unknown(guard.to_string())),
                },
            }
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Guard names in evaluation order, for listings and logs.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.requires_auth {
            names.push("auth".to_string());
        }
        if self.requires_signed_url {
            names.push("signed".to_string());
        }
        if self.requires_verified_email {
            names.push("verified".to_string());
        }
        if let Some(limit) = self.rate_limit {
            names.push(limit.to_string());
        }
        names
    }
}

fn parse_throttle(guard: &str, args: &str) -> Result<RateLimit, GuardSpecError> {
    let malformed = || GuardSpecError::MalformedThrottle(guard.to_string());
    let (max, minutes) = args.split_once(',').ok_or_else(malformed)?;
    let max_attempts: u32 = max.trim().parse().map_err(|_| malformed())?;
    let per_minutes: u32 = minutes.trim().parse().map_err(|_| malformed())?;
    if max_attempts == 0 || per_minutes == 0 {
        return Err(GuardSpecError::ZeroThrottle(guard.to_string()));
    }
    Ok(RateLimit {
        max_attempts,
        per_minutes,
    })
}

/// Everything guard evaluation reads from the request.
pub struct GuardInput<'a> {
    pub route: &'a str,
    pub uri: &'a Uri,
    pub principal: Option<&'a Principal>,
    /// Client address, used as throttle key for guests.
    pub client: &'a str,
    pub now: DateTime<Utc>,
}

/// Shared services the guards consult.
pub struct GuardContext<'a> {
    pub signer: &'a UrlSigner,
    pub limiter: &'a RateLimiter,
}

/// Outcome of a passing evaluation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GuardPass {
    pub rate_limit: Option<RateLimitStatus>,
}

/// Evaluate a route's guards in order, stopping at the first failure.
pub fn evaluate(
    spec: &GuardSpec,
    input: &GuardInput<'_>,
    ctx: &GuardContext<'_>,
) -> Result<GuardPass, AppError> {
    if spec.requires_auth && input.principal.is_none() {
        return Err(AppError::Unauthenticated);
    }

    if spec.requires_signed_url {
        ctx.signer.verify(input.uri, input.now)?;
    }

    if spec.requires_verified_email {
        match input.principal {
            Some(p) if p.has_verified_email() => {}
            _ => return Err(AppError::Unverified),
        }
    }

    let rate_limit = match spec.rate_limit {
        Some(limit) => {
            let key = match input.principal {
                Some(p) => format!("user:{}", p.id),
                None => format!("ip:{}", input.client),
            };
            Some(ctx.limiter.hit(&key, input.route, limit)?)
        }
        None => None,
    };

    Ok(GuardPass { rate_limit })
}
