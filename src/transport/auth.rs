//! Master-key request signing.
//!
//! Every request is authorized with an HMAC-SHA256 signature over the verb,
//! resource type, resource link and request date:
//!
//! ```text
//! {verb}\n{resourceType}\n{resourceLink}\n{date}\n\n
//! ```
//!
//! The verb, resource type and date are lowercased; the link keeps its
//! case. The base64 signature is wrapped as `type=master&ver=1.0&sig=...`
//! and URL-encoded into the `authorization` header.
//!
//! # Example
//!
//! ```rust
//! use cosmosdb::transport::auth::{authorization_token, string_to_sign};
//! use cosmosdb::AccountKey;
//!
//! let key = AccountKey::new("c2VjcmV0LWtleQ==").unwrap();
//! let date = "Thu, 27 Apr 2017 00:51:12 GMT";
//!
//! assert_eq!(
//!     string_to_sign("GET", "dbs", "dbs/ToDoList", date),
//!     "get\ndbs\ndbs/ToDoList\nthu, 27 apr 2017 00:51:12 gmt\n\n"
//! );
//!
//! let token = authorization_token(&key, "GET", "dbs", "dbs/ToDoList", date).unwrap();
//! assert!(token.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AccountKey;
use crate::transport::TransportError;

type HmacSha256 = Hmac<Sha256>;

/// Formats a timestamp the way `x-ms-date` expects (RFC 1123).
#[must_use]
pub fn rfc1123_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Builds the canonical payload that is signed.
#[must_use]
pub fn string_to_sign(verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    )
}

/// Computes the base64 HMAC-SHA256 signature of `payload`.
///
/// # Errors
///
/// Returns a `401` [`TransportError`] if the key cannot be used as an HMAC
/// key.
pub fn compute_signature(key: &AccountKey, payload: &str) -> Result<String, TransportError> {
    let mut mac = HmacSha256::new_from_slice(key.decoded())
        .map_err(|e| TransportError::new(401, format!("Unusable account key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Computes the URL-encoded `authorization` header value of a request.
///
/// # Errors
///
/// Returns a `401` [`TransportError`] if the key cannot be used as an HMAC
/// key.
pub fn authorization_token(
    key: &AccountKey,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, TransportError> {
    let payload = string_to_sign(verb, resource_type, resource_link, date);
    let signature = compute_signature(key, &payload)?;
    let token = format!("type=master&ver=1.0&sig={signature}");
    Ok(urlencoding::encode(&token).into_owned())
}
