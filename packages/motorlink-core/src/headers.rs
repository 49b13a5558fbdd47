//! The fixed header set the cloud API expects on every call.
//!
//! The provider checks these byte-for-byte (names and defaults), so they
//! live in one place. A fresh correlation id is generated per request.

use crate::config::BrandProfile;
use uuid::Uuid;

/// Generate a per-request correlation id: the first 16 hex characters of a
/// v4 UUID, uppercased, as the provider expects.
pub(crate) fn new_correlation_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    hex[..16].to_string()
}

/// The client-identity header set attached to federated-exchange and data
/// API calls.
pub(crate) fn client_headers(
    profile: &BrandProfile,
    correlation_id: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("x-clientapp-name", "CWP".to_string()),
        ("x-clientapp-version", "1.0".to_string()),
        ("clientrequestid", correlation_id.to_string()),
        ("x-api-key", profile.api_key.clone()),
        ("locale", profile.locale.clone()),
        ("x-originator-type", "web".to_string()),
        ("content-type", "application/json".to_string()),
    ]
}
