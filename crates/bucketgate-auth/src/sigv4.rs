//! SigV4 re-verification
//!
//! After the token service has vouched for an identity, the gateway can
//! re-derive the AWS Signature V4 over the inbound request with the
//! federated secret key and compare it against the `Authorization` header.
//! This catches callers that hold a valid access key id but not the matching
//! secret.

use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use http::{HeaderMap, Method, Uri};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;

type HmacSha256 = Hmac<Sha256>;

/// Maximum tolerated clock skew between client and gateway
const MAX_SKEW_MINUTES: i64 = 15;

/// Signature verification failure
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing or non-SigV4 authorization header")]
    NotSigV4,
    #[error("invalid authorization header format")]
    MalformedHeader,
    #[error("missing x-amz-date or date header")]
    MissingDate,
    #[error("invalid date format")]
    InvalidDate,
    #[error("request time too skewed")]
    TimeSkewed,
    #[error("missing signed header: {0}")]
    MissingSignedHeader(String),
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies SigV4 signatures against a known secret key
pub struct SigV4Verifier {
    region: String,
}

impl SigV4Verifier {
    /// Create a verifier for the given region
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Re-derive the request signature and compare it in constant time
    pub fn verify(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        secret_key: &str,
    ) -> Result<(), SignatureError> {
        let (signed_headers, provided_signature) = parse_authorization(headers)?;

        let date_str = request_date(headers)?;
        let date = parse_amz_date(&date_str)?;
        let skew = Utc::now().signed_duration_since(date);
        if skew.num_minutes().abs() > MAX_SKEW_MINUTES {
            return Err(SignatureError::TimeSkewed);
        }

        let canonical = canonical_request(method, uri, headers, &signed_headers)?;
        let date_stamp = date.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            date_str,
            scope,
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let signing_key = derive_signing_key(secret_key, &date_stamp, &self.region);
        let calculated = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        if constant_time_eq(&calculated, &provided_signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn authorization_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"AWS4-HMAC-SHA256\s+Credential=[^,]+,\s*SignedHeaders=([^,]+),\s*Signature=([0-9a-f]+)",
        )
        .expect("valid regex")
    })
}

/// Pull the signed-header list and signature out of the Authorization header
fn parse_authorization(headers: &HeaderMap) -> Result<(Vec<String>, String), SignatureError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("AWS4-HMAC-SHA256"))
        .ok_or(SignatureError::NotSigV4)?;

    let captures = authorization_re()
        .captures(auth)
        .ok_or(SignatureError::MalformedHeader)?;

    let signed_headers = captures[1]
        .split(';')
        .map(str::to_lowercase)
        .collect::<Vec<_>>();
    Ok((signed_headers, captures[2].to_string()))
}

fn request_date(headers: &HeaderMap) -> Result<String, SignatureError> {
    headers
        .get("x-amz-date")
        .or_else(|| headers.get("date"))
        .ok_or(SignatureError::MissingDate)?
        .to_str()
        .map(str::to_string)
        .map_err(|_| SignatureError::InvalidDate)
}

fn parse_amz_date(date_str: &str) -> Result<DateTime<Utc>, SignatureError> {
    NaiveDateTime::parse_from_str(date_str, "%Y%m%dT%H%M%SZ")
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .map_err(|_| SignatureError::InvalidDate)
}

fn canonical_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    signed_headers: &[String],
) -> Result<String, SignatureError> {
    let path = uri.path();
    let canonical_uri = if path.is_empty() { "/" } else { path };
    let canonical_query = canonical_query_string(uri.query().unwrap_or(""));

    let mut header_map: BTreeMap<&str, String> = BTreeMap::new();
    for name in signed_headers {
        let value = headers
            .get(name.as_str())
            .ok_or_else(|| SignatureError::MissingSignedHeader(name.clone()))?
            .to_str()
            .map_err(|_| SignatureError::MalformedHeader)?
            .trim()
            .to_string();
        header_map.insert(name.as_str(), value);
    }

    let canonical_headers: String = header_map
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();

    let payload_hash = headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("UNSIGNED-PAYLOAD");

    Ok(format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.as_str(),
        canonical_uri,
        canonical_query,
        canonical_headers,
        signed_headers.join(";"),
        payload_hash
    ))
}

fn canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter_map(|param| {
            let mut parts = param.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            // The wire form is already percent-encoded; decode first, then
            // re-encode with the AWS rules to get the canonical form.
            Some((
                aws_uri_encode(&url_decode(key)),
                aws_uri_encode(&url_decode(value)),
            ))
        })
        .collect();
    params.sort();

    params
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn url_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte as char);
                    continue;
                }
            }
            // Malformed escape, keep it as-is
            out.push('%');
            out.push_str(&hex);
        } else if c == '+' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// AWS-style percent encoding (unreserved characters pass through)
fn aws_uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison to avoid timing side channels
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
