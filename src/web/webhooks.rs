//! Third-party callbacks. These routes are CSRF exempt through configuration.

use axum::body::Bytes;
use axum::Json;
use serde_json::{json, Value};

pub async fn stripe_charge(body: Bytes) -> Json<Value> {
    tracing::info!(bytes = body.len(), "Stripe charge callback received");
    Json(json!({ "received": true }))
}
