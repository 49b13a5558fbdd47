//! Error types for the authentication pipeline and signed data access.
//!
//! Every pipeline stage fails fast: the first error aborts the run and is
//! reported with the stage it happened in, the status code, and a truncated
//! response body for diagnosis. No failure is swallowed.

use thiserror::Error;

/// Maximum number of response-body bytes kept in an error.
const BODY_SNIPPET_LEN: usize = 300;

/// The stage of the pipeline a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Bootstrap,
    Login,
    TokenIssuance,
    FederatedExchange,
    CredentialDerivation,
    DataAccess,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Bootstrap => "bootstrap",
            Stage::Login => "login",
            Stage::TokenIssuance => "token issuance",
            Stage::FederatedExchange => "federated exchange",
            Stage::CredentialDerivation => "credential derivation",
            Stage::DataAccess => "data access",
        };
        write!(f, "{name}")
    }
}

/// Failure taxonomy for the login pipeline and the data endpoints.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity provider's bootstrap endpoint was not reachable or not
    /// configured for the expected API key.
    #[error("identity provider unavailable (status {status}): {body}")]
    ProviderUnavailable { status: i64, body: String },

    /// The login endpoint rejected the supplied credentials, or its response
    /// was missing the account UID / session token.
    #[error("login rejected (status {status}): {body}")]
    InvalidCredentials { status: i64, body: String },

    /// The session token could not be exchanged for an identity token.
    #[error("token issuance failed (status {status}): {body}")]
    TokenIssuance { status: i64, body: String },

    /// The federated-identity broker did not return both a federation token
    /// and an identity reference.
    #[error("federated exchange failed (HTTP {status}): {body}")]
    Federation { status: u16, body: String },

    /// The credential service refused to derive short-lived credentials.
    #[error("credential exchange failed (HTTP {status}): {body}")]
    CredentialExchange { status: u16, body: String },

    /// A data endpoint returned a non-2xx response after authentication.
    #[error("upstream error (HTTP {status}) for {url}: {body}")]
    Upstream { status: u16, url: String, body: String },

    /// A network-level failure at any stage (connect, timeout, body read).
    #[error("transport failure during {stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// The pipeline stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Error::ProviderUnavailable { .. } => Stage::Bootstrap,
            Error::InvalidCredentials { .. } => Stage::Login,
            Error::TokenIssuance { .. } => Stage::TokenIssuance,
            Error::Federation { .. } => Stage::FederatedExchange,
            Error::CredentialExchange { .. } => Stage::CredentialDerivation,
            Error::Upstream { .. } => Stage::DataAccess,
            Error::Transport { stage, .. } => *stage,
        }
    }

    pub(crate) fn transport(stage: Stage) -> impl FnOnce(reqwest::Error) -> Error {
        move |source| Error::Transport { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Keep only the leading bytes of a response body for error reporting.
pub(crate) fn body_snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_snippet_keeps_short_bodies_intact() {
        assert_eq!(body_snippet("{\"ok\":true}"), "{\"ok\":true}");
    }

    #[test]
    fn body_snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let snippet = body_snippet(&long);
        assert!(snippet.len() < 400);
        assert!(snippet.ends_with('…'));
    }

    #[test]
    fn body_snippet_respects_char_boundaries() {
        let long = "ü".repeat(400);
        let snippet = body_snippet(&long);
        assert!(snippet.chars().all(|c| c == 'ü' || c == '…'));
    }

    #[test]
    fn errors_report_their_stage() {
        let err = Error::Federation {
            status: 200,
            body: String::new(),
        };
        assert_eq!(err.stage(), Stage::FederatedExchange);
        assert_eq!(err.stage().to_string(), "federated exchange");
    }
}
