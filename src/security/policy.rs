//! Resource authorization policies.
//!
//! A policy is a predicate over the principal and a loaded resource,
//! registered per resource type and ability. Controllers call
//! [`Policies::authorize`] once they hold the resource.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::error::AppError;
use crate::services::{Post, Principal};

type Predicate = Box<dyn Fn(&Principal, &dyn Any) -> bool + Send + Sync>;

/// Registry of per-resource predicates.
#[derive(Default)]
pub struct Policies {
    rules: HashMap<(TypeId, &'static str), Predicate>,
}

impl std::fmt::Debug for Policies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policies")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Policies {
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's stock rules.
    pub fn standard() -> Self {
        let mut policies = Self::new();
        policies.register::<Post>("update", |user, post| user.id == post.user_id);
        policies
    }

    /// Register `predicate` for `ability` on resource type `R`, replacing any
    /// previous rule.
    pub fn register<R: Any>(
        &mut self,
        ability: &'static str,
        predicate: fn(&Principal, &R) -> bool,
    ) {
        self.rules.insert(
            (TypeId::of::<R>(), ability),
            Box::new(move |principal: &Principal, resource: &dyn Any| {
                resource
                    .downcast_ref::<R>()
                    .is_some_and(|r| predicate(principal, r))
            }),
        );
    }

    /// Evaluate the rule; abilities without a rule are denied.
    pub fn allows<R: Any>(
        &self,
        principal: &Principal,
        ability: &'static str,
        resource: &R,
    ) -> bool {
        self.rules
            .get(&(TypeId::of::<R>(), ability))
            .is_some_and(|rule| rule(principal, resource as &dyn Any))
    }

    pub fn authorize<R: Any>(
        &self,
        principal: &Principal,
        ability: &'static str,
        resource: &R,
    ) -> Result<(), AppError> {
        if self.allows(principal, ability, resource) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}
