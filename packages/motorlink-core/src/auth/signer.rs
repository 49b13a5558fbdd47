//! AWS Signature Version 4 request signing.
//!
//! The credential broker hands back short-lived credentials; the data API
//! requires every call to be signed with them. This module computes the
//! canonical request, string to sign, and signature per the SigV4
//! specification:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Only `host`, `x-amz-content-sha256`, `x-amz-date`, and
//! `x-amz-security-token` are signed; the brand headers (correlation id
//! included) stay unsigned so they never perturb the signature.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// The set of characters that must be percent-encoded in URI path segments.
///
/// Per the SigV4 spec, all characters except unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) must be encoded. Forward slashes in
/// the path are preserved.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Short-lived credentials derived from the federated identity broker.
///
/// Owned exclusively by the signer after the exchange; never persisted.
/// `expiration` (epoch seconds) is surfaced for diagnostics but nothing
/// refreshes on it: a new authentication run is the only refresh path.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedCredentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: Option<f64>,
}

/// A capability object that signs outgoing requests with derived
/// credentials, scoped to one region and service.
///
/// Created once per successful authentication. Signing is deterministic for
/// a fixed timestamp; production signers use the current time per call.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: FederatedCredentials,
    region: String,
    service: String,
    fixed_time: Option<DateTime<Utc>>,
}

impl RequestSigner {
    pub fn new(
        credentials: FederatedCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
            fixed_time: None,
        }
    }

    /// Pin the signing timestamp. Intended for tests.
    #[must_use]
    pub fn with_fixed_time(mut self, time: DateTime<Utc>) -> Self {
        self.fixed_time = Some(time);
        self
    }

    /// The credentials this signer is bound to.
    pub fn credentials(&self) -> &FederatedCredentials {
        &self.credentials
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Compute the signature headers for one request.
    ///
    /// Returns the headers to attach: `x-amz-date`, `x-amz-content-sha256`,
    /// `x-amz-security-token`, and `authorization`. The `host` header is
    /// signed using the URL's authority, matching what the HTTP client will
    /// send on the wire.
    pub fn sign(&self, method: &str, url: &Url, payload: &[u8]) -> Vec<(String, String)> {
        let now = self.fixed_time.unwrap_or_else(Utc::now);
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let host = match (url.host_str().unwrap_or_default(), url.port()) {
            (h, Some(port)) => format!("{h}:{port}"),
            (h, None) => h.to_string(),
        };
        let payload_hash = hash_payload(payload);

        let headers = [
            ("host", host.as_str()),
            ("x-amz-content-sha256", payload_hash.as_str()),
            ("x-amz-date", amz_date.as_str()),
            ("x-amz-security-token", self.credentials.session_token.as_str()),
        ];
        let signed_headers: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();

        let canonical = build_canonical_request(
            method,
            url.path(),
            url.query().unwrap_or(""),
            &headers,
            &signed_headers,
            &payload_hash,
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = build_string_to_sign(&amz_date, &scope, &canonical);
        let key = derive_signing_key(&self.credentials.secret_key, &date, &self.region, &self.service);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            self.credentials.access_key_id,
            signed_headers.join(";"),
        );

        vec![
            ("x-amz-date".to_string(), amz_date),
            ("x-amz-content-sha256".to_string(), payload_hash),
            (
                "x-amz-security-token".to_string(),
                self.credentials.session_token.clone(),
            ),
            ("authorization".to_string(), authorization),
        ]
    }
}

/// Hex-encoded SHA-256 digest of the request payload.
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Build the full canonical request string from its components.
///
/// `headers` must already be lowercase-named and sorted; the data API
/// signer passes a fixed, sorted header set.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(uri);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}", value.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let signed_headers_str = signed_headers.join(";");

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Forward slashes are preserved and empty paths normalize to `/`. Segments
/// are decoded first so an already-encoded path is not double-encoded.
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string by sorting parameters by key, then by
/// value for duplicate keys. Raw values are preserved as-is; the signature
/// must be computed over exactly the encoding that goes on the wire.
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the string to sign from the timestamp, credential scope, and
/// canonical request hash.
#[must_use]
pub fn build_string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{hashed}")
}

/// Derive the signing key through the AWS4 HMAC chain:
/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`.
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
