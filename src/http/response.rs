//! Response header policy wrapper.
//!
//! # Responsibilities
//! - Run the inner service, then apply the header policy to its response
//! - Leave status and body untouched
//!
//! # Design Decisions
//! - The nonce is read from the request before the inner call; the request
//!   itself is forwarded unchanged
//! - Inner errors propagate unmodified; no response exists to decorate

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;
use tower::{Layer, Service};

use crate::security::{CspNonce, HeaderPolicy};

#[derive(Clone)]
pub struct HeaderPolicyLayer {
    policy: Arc<HeaderPolicy>,
}

impl HeaderPolicyLayer {
    pub fn new(policy: Arc<HeaderPolicy>) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for HeaderPolicyLayer {
    type Service = HeaderPolicyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HeaderPolicyService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HeaderPolicyService<S> {
    inner: S,
    policy: Arc<HeaderPolicy>,
}

impl<S, B> Service<Request> for HeaderPolicyService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let nonce = req.extensions().get::<CspNonce>().cloned();
        let policy = self.policy.clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            let mut response = future.await?;
            policy.apply(response.headers_mut(), nonce.as_ref());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::header::{CONTENT_SECURITY_POLICY, SERVER};
    use axum::http::StatusCode;
    use tower::{service_fn, ServiceExt};

    use crate::config::HeaderPolicyConfig;

    fn layer(script_nonce: bool) -> HeaderPolicyLayer {
        let config = HeaderPolicyConfig {
            script_nonce,
            ..HeaderPolicyConfig::default()
        };
        HeaderPolicyLayer::new(Arc::new(HeaderPolicy::from_config(&config).unwrap()))
    }

    #[tokio::test]
    async fn test_applies_policy_and_keeps_status() {
        let inner = service_fn(|_req: Request| async {
            let response = Response::builder()
                .status(StatusCode::CREATED)
                .header("x-powered-by", "PHP/8.3")
                .header(SERVER, "nginx")
                .body(Body::from("created"))
                .unwrap();
            Ok::<_, Infallible>(response)
        });

        let response = layer(false)
            .layer(inner)
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("x-powered-by").is_none());
        assert_eq!(response.headers().get(SERVER).unwrap(), "");
        assert!(response
            .headers()
            .get(CONTENT_SECURITY_POLICY)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("script-src 'self';"));
    }

    #[tokio::test]
    async fn test_nonce_from_request_and_request_untouched() {
        let inner = service_fn(|req: Request| async move {
            // The nonce assigned upstream arrives unchanged.
            let seen = req.extensions().get::<CspNonce>().cloned();
            assert_eq!(seen, Some(CspNonce::from("abc123")));
            Ok::<_, Infallible>(Response::new(Body::empty()))
        });

        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(CspNonce::from("abc123"));
        let response = layer(true).layer(inner).oneshot(req).await.unwrap();

        let csp = response.headers().get(CONTENT_SECURITY_POLICY).unwrap();
        assert!(csp.to_str().unwrap().contains("'nonce-abc123'"));
    }

    #[derive(Debug, PartialEq)]
    struct Boom;

    #[tokio::test]
    async fn test_inner_error_propagates_unmodified() {
        let inner = service_fn(|_req: Request| async { Err::<Response, _>(Boom) });
        let result = layer(false)
            .layer(inner)
            .oneshot(Request::new(Body::empty()))
            .await;
        assert_eq!(result.unwrap_err(), Boom);
    }
}
