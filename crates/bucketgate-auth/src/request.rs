//! Normalized request model
//!
//! An inbound HTTP call is reduced to an [`S3Request`]: which access key is
//! calling, which bucket it touches, and whether the operation reads or
//! writes. The struct is immutable once built and lives for one request.

use http::{HeaderMap, Method};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Kind of access an operation performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    /// GET/HEAD/OPTIONS
    Read,
    /// Create, update, or delete
    Write,
}

impl AccessType {
    /// Infer the access type from the HTTP method
    #[must_use]
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Self::Read,
            _ => Self::Write,
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Normalized description of one inbound object-storage call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Request {
    /// Access key id extracted from the request's authorization material;
    /// empty when the request carried none (rejected downstream)
    pub access_key_id: String,
    /// Short-lived session token, if present
    pub session_token: Option<String>,
    /// Bucket the request is scoped to; `None` for service-level operations
    /// such as list-all-buckets
    pub bucket: Option<String>,
    /// Whether the operation reads or writes
    pub access_type: AccessType,
}

impl S3Request {
    /// Build the normalized request from the raw HTTP parts
    #[must_use]
    pub fn from_http(method: &Method, path: &str, headers: &HeaderMap) -> Self {
        let (access_key_id, session_token) = extract_credentials(headers);
        Self {
            access_key_id: access_key_id.unwrap_or_default(),
            session_token,
            bucket: bucket_from_path(path),
            access_type: AccessType::from_method(method),
        }
    }
}

impl fmt::Display for S3Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.access_key_id.is_empty() {
            "<anonymous>"
        } else {
            &self.access_key_id
        };
        let bucket = self.bucket.as_deref().unwrap_or("<service>");
        write!(
            f,
            "S3Request(accessKey={}, bucket={}, access={})",
            key, bucket, self.access_type
        )
    }
}

/// Extract the first path segment as the bucket name
fn bucket_from_path(path: &str) -> Option<String> {
    let segment = path.trim_start_matches('/').split('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

fn sigv4_credential_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"AWS4-HMAC-SHA256\s+Credential=([^/,\s]+)/").expect("valid regex")
    })
}

/// Pull the access key id and session token out of the request headers
///
/// Supports SigV4 (`Authorization: AWS4-HMAC-SHA256 Credential=AKID/...`)
/// and the legacy SigV2 form (`Authorization: AWS AKID:signature`). Missing
/// or malformed material yields `None` rather than an error; the identity
/// validator treats it as an invalid credential.
#[must_use]
pub fn extract_credentials(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let session_token = headers
        .get("x-amz-security-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let auth = match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) => v,
        None => return (None, session_token),
    };

    let access_key_id = if auth.starts_with("AWS4-HMAC-SHA256") {
        sigv4_credential_re()
            .captures(auth)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    } else if let Some(rest) = auth.strip_prefix("AWS ") {
        rest.split(':').next().map(str::to_string)
    } else {
        None
    };

    (access_key_id, session_token)
}
