//! Signed URLs.
//!
//! A signed URL carries a hex HMAC-SHA256 `signature` query parameter
//! computed over the relative URL (path and query, with `signature`
//! removed) and, optionally, an `expires` unix timestamp covered by the
//! same signature.

use axum::http::Uri;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PARAM: &str = "signature";
const EXPIRES_PARAM: &str = "expires";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature")]
    Missing,
    #[error("malformed signature")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
    #[error("signed URL has expired")]
    Expired,
}

/// Signs and verifies relative URLs with the application key.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// A signer with a fresh 256-bit key, valid for this process only.
    pub fn random() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    /// Sign `path` with `params`, optionally expiring at `expires_at`.
    ///
    /// Parameters are emitted in sorted order, followed by `expires`.
    pub fn sign(
        &self,
        path: &str,
        params: &[(&str, &str)],
        expires_at: Option<DateTime<Utc>>,
    ) -> String {
        let mut sorted: Vec<(&str, &str)> = params.to_vec();
        sorted.sort();

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &sorted {
            query.append_pair(k, v);
        }
        if let Some(at) = expires_at {
            query.append_pair(EXPIRES_PARAM, &at.timestamp().to_string());
        }
        let query = query.finish();

        let unsigned = if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        };

        let mut mac = self.mac();
        mac.update(unsigned.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let separator = if query.is_empty() { '?' } else { '&' };
        format!("{}{}{}={}", unsigned, separator, SIGNATURE_PARAM, signature)
    }

    /// Sign a URL that expires `ttl` from `now`.
    pub fn temporary(
        &self,
        path: &str,
        params: &[(&str, &str)],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> String {
        self.sign(path, params, Some(now + ttl))
    }

    /// Check the signature and expiry of a request URI.
    pub fn verify(&self, uri: &Uri, now: DateTime<Utc>) -> Result<(), SignatureError> {
        let query = uri.query().unwrap_or("");

        let mut signature = None;
        let mut expires = None;
        let mut kept = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            if k == SIGNATURE_PARAM {
                signature = Some(v.into_owned());
                continue;
            }
            if k == EXPIRES_PARAM {
                expires = Some(v.to_string());
            }
            kept.append_pair(&k, &v);
        }
        let kept = kept.finish();

        let signature = signature.ok_or(SignatureError::Missing)?;
        let signature = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;

        let unsigned = if kept.is_empty() {
            uri.path().to_string()
        } else {
            format!("{}?{}", uri.path(), kept)
        };

        let mut mac = self.mac();
        mac.update(unsigned.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::Mismatch)?;

        if let Some(expires) = expires {
            let expires: i64 = expires.parse().map_err(|_| SignatureError::Malformed)?;
            if now.timestamp() > expires {
                return Err(SignatureError::Expired);
            }
        }

        Ok(())
    }
}
