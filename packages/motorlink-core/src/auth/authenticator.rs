//! The five-stage login pipeline.
//!
//! Converts a username/password pair into a signed-request capability:
//!
//! 1. Bootstrap - verify the identity provider is up and configured for our
//!    API key.
//! 2. Login - exchange credentials for an account UID and a short-lived
//!    session token.
//! 3. Token issuance - exchange the session token for a signed identity
//!    token (JWT).
//! 4. Federated exchange - present the identity token to the federation
//!    broker for a federation token and an identity reference.
//! 5. Credential derivation - derive short-lived signing credentials from
//!    the broker's credential service.
//!
//! Each stage consumes the previous stage's output; the first failure
//! aborts the run. The provider checks parameter names, header names, and
//! content types byte-for-byte, so the payload shapes here are part of the
//! protocol, not a style choice.

use serde::Deserialize;
use std::collections::HashMap;

use crate::auth::signer::{FederatedCredentials, RequestSigner};
use crate::config::{BrandProfile, ClientOptions};
use crate::error::{Error, Result, Stage, body_snippet};
use crate::headers::{client_headers, new_correlation_id};
use crate::trace::{ObserverHandle, default_observer};

/// Service name the derived credentials are scoped to.
pub const SIGNING_SERVICE: &str = "execute-api";

/// Session validity window requested at login, in seconds.
const SESSION_EXPIRATION_SECS: &str = "300";

/// Field-inclusion list for the login call.
const LOGIN_INCLUDE: &str = "profile,data,emails,subscriptions,preferences";

/// Requested claim fields for the identity token.
const JWT_FIELDS: &str =
    "profile.firstName,profile.lastName,profile.email,country,locale,data.disclaimerCodeGSDP";

/// Login-map provider name the credential broker expects.
const IDENTITY_PROVIDER_NAME: &str = "cognito-identity.amazonaws.com";

/// Operation target header for the credential derivation call.
const CREDENTIALS_TARGET: &str = "AWSCognitoIdentityService.GetCredentialsForIdentity";

/// Account credentials. Supplied once, held in memory only, and consumed by
/// a single [`Authenticator`] run.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A successful authentication: the account id plus the request-signing
/// capability for subsequent data calls.
#[derive(Debug, Clone)]
pub struct Session {
    account_id: String,
    signer: RequestSigner,
}

impl Session {
    pub(crate) fn new(account_id: String, signer: RequestSigner) -> Self {
        Self { account_id, signer }
    }

    /// The account UID returned by the login stage.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The signer bound to the derived credentials.
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }
}

/// Executes the login chain against one brand profile.
///
/// One instance per login attempt: `authenticate` consumes the
/// authenticator, so no stage output can be reused across runs.
pub struct Authenticator {
    http: reqwest::Client,
    profile: BrandProfile,
    credentials: Credentials,
    observer: ObserverHandle,
}

impl Authenticator {
    pub fn new(profile: BrandProfile, credentials: Credentials) -> Result<Self> {
        Self::with_options(profile, credentials, ClientOptions::default())
    }

    pub fn with_options(
        profile: BrandProfile,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(Error::transport(Stage::Bootstrap))?;
        Ok(Self {
            http,
            profile,
            credentials,
            observer: default_observer(),
        })
    }

    /// Replace the default tracing observer with a custom one.
    #[must_use]
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }

    /// Run the full pipeline and yield a [`Session`].
    ///
    /// Fails fast: the first stage error aborts the run and no partial
    /// state is exposed.
    pub async fn authenticate(self) -> Result<Session> {
        if self.credentials.username.trim().is_empty() || self.credentials.password.is_empty() {
            return Err(Error::InvalidCredentials {
                status: 0,
                body: "username or password is empty".to_string(),
            });
        }

        self.bootstrap().await?;
        let login = self.login().await?;
        let id_token = self.issue_token(&login.login_token).await?;
        let federation = self.federated_exchange(&id_token).await?;
        let credentials = self.derive_credentials(&federation).await?;

        tracing::info!(account_id = %login.uid, "authentication complete");

        let signer = RequestSigner::new(credentials, self.profile.region.clone(), SIGNING_SERVICE);
        Ok(Session {
            account_id: login.uid,
            signer,
        })
    }

    /// Stage 1: verify the provider is reachable and configured for our key.
    ///
    /// The provider signals success with a body-level `statusCode` of 200,
    /// distinct from the HTTP status.
    async fn bootstrap(&self) -> Result<()> {
        let url = format!("{}/accounts.webSdkBootstrap", self.profile.login_url);
        let (status, body) = self
            .provider_get(Stage::Bootstrap, &url, &[("apiKey", self.profile.login_api_key.as_str())])
            .await?;

        if !status.is_success() {
            return Err(Error::ProviderUnavailable {
                status: i64::from(status.as_u16()),
                body: body_snippet(&body),
            });
        }

        let envelope: ProviderEnvelope = serde_json::from_str(&body).unwrap_or_default();
        if envelope.status_code != 200 {
            return Err(Error::ProviderUnavailable {
                status: envelope.status_code,
                body: body_snippet(&body),
            });
        }

        tracing::debug!("bootstrap ok");
        Ok(())
    }

    /// Stage 2: submit credentials plus the fixed client descriptor set.
    async fn login(&self) -> Result<LoginOutcome> {
        let url = format!("{}/accounts.login", self.profile.login_url);
        let mut params = vec![
            ("loginID", self.credentials.username.clone()),
            ("password", self.credentials.password.clone()),
            ("sessionExpiration", SESSION_EXPIRATION_SECS.to_string()),
            ("include", LOGIN_INCLUDE.to_string()),
        ];
        params.extend(self.default_login_params());

        let (status, body) = self.provider_post(Stage::Login, &url, &params).await?;

        let parsed: LoginResponse = serde_json::from_str(&body).unwrap_or_default();
        if !status.is_success() || parsed.envelope.status_code != 200 {
            return Err(Error::InvalidCredentials {
                status: effective_status(status, parsed.envelope.status_code),
                body: body_snippet(&body),
            });
        }

        let (uid, login_token) = match (parsed.uid, parsed.session_info.and_then(|s| s.login_token))
        {
            (Some(uid), Some(token)) if !uid.is_empty() && !token.is_empty() => (uid, token),
            _ => {
                return Err(Error::InvalidCredentials {
                    status: parsed.envelope.status_code,
                    body: body_snippet(&body),
                });
            }
        };

        tracing::debug!(%uid, "login ok");
        Ok(LoginOutcome { uid, login_token })
    }

    /// Stage 3: exchange the session token for a signed identity token.
    async fn issue_token(&self, login_token: &str) -> Result<String> {
        let url = format!("{}/accounts.getJWT", self.profile.login_url);
        let mut params = vec![
            ("login_token", login_token.to_string()),
            ("fields", JWT_FIELDS.to_string()),
        ];
        params.extend(self.default_login_params());

        let (status, body) = self
            .provider_post(Stage::TokenIssuance, &url, &params)
            .await?;

        let parsed: JwtResponse = serde_json::from_str(&body).unwrap_or_default();
        if !status.is_success() || parsed.envelope.status_code != 200 {
            return Err(Error::TokenIssuance {
                status: effective_status(status, parsed.envelope.status_code),
                body: body_snippet(&body),
            });
        }

        match parsed.id_token {
            Some(token) if !token.is_empty() => {
                tracing::debug!("identity token issued");
                Ok(token)
            }
            _ => Err(Error::TokenIssuance {
                status: parsed.envelope.status_code,
                body: body_snippet(&body),
            }),
        }
    }

    /// Stage 4: present the identity token to the federation broker.
    ///
    /// Both `Token` and `IdentityId` must be present; otherwise credential
    /// derivation is not attempted.
    async fn federated_exchange(&self, id_token: &str) -> Result<FederationOutcome> {
        let url = &self.profile.token_url;
        let correlation_id = new_correlation_id();

        self.observer.on_request("POST", url, Some(&correlation_id));
        let mut request = self.http.post(url);
        for (name, value) in client_headers(&self.profile, &correlation_id) {
            request = request.header(name, value);
        }
        let response = request
            .json(&serde_json::json!({ "gigya_token": id_token }))
            .send()
            .await
            .map_err(Error::transport(Stage::FederatedExchange))?;

        let status = response.status();
        self.observer.on_response("POST", url, status.as_u16());
        let body = response
            .text()
            .await
            .map_err(Error::transport(Stage::FederatedExchange))?;

        if !status.is_success() {
            return Err(Error::Federation {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let parsed: FederationResponse = serde_json::from_str(&body).unwrap_or_default();
        match (parsed.token, parsed.identity_id) {
            (Some(token), Some(identity_id)) if !token.is_empty() && !identity_id.is_empty() => {
                tracing::debug!(%identity_id, "federated exchange ok");
                Ok(FederationOutcome { token, identity_id })
            }
            _ => Err(Error::Federation {
                status: status.as_u16(),
                body: body_snippet(&body),
            }),
        }
    }

    /// Stage 5: derive short-lived signing credentials from the broker's
    /// credential service.
    async fn derive_credentials(
        &self,
        federation: &FederationOutcome,
    ) -> Result<FederatedCredentials> {
        let url = &self.profile.credential_url;
        let logins: HashMap<&str, &str> =
            HashMap::from([(IDENTITY_PROVIDER_NAME, federation.token.as_str())]);

        self.observer.on_request("POST", url, None);
        let response = self
            .http
            .post(url)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", CREDENTIALS_TARGET)
            .json(&serde_json::json!({
                "IdentityId": federation.identity_id,
                "Logins": logins,
            }))
            .send()
            .await
            .map_err(Error::transport(Stage::CredentialDerivation))?;

        let status = response.status();
        self.observer.on_response("POST", url, status.as_u16());
        let body = response
            .text()
            .await
            .map_err(Error::transport(Stage::CredentialDerivation))?;

        if !status.is_success() {
            return Err(Error::CredentialExchange {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let parsed: CredentialsResponse = serde_json::from_str(&body).unwrap_or_default();
        match parsed.credentials {
            Some(c) => {
                tracing::debug!("credentials derived");
                Ok(FederatedCredentials {
                    access_key_id: c.access_key_id,
                    secret_key: c.secret_key,
                    session_token: c.session_token,
                    expiration: c.expiration,
                })
            }
            None => Err(Error::CredentialExchange {
                status: status.as_u16(),
                body: body_snippet(&body),
            }),
        }
    }

    /// The fixed client descriptor set every identity-provider call carries.
    fn default_login_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("targetEnv", "jssdk".to_string()),
            ("loginMode", "standard".to_string()),
            ("sdk", "js_latest".to_string()),
            ("authMode", "cookie".to_string()),
            ("sdkBuild", "12234".to_string()),
            ("format", "json".to_string()),
            ("APIKey", self.profile.login_api_key.clone()),
        ]
    }

    async fn provider_get(
        &self,
        stage: Stage,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<(reqwest::StatusCode, String)> {
        self.observer.on_request("GET", url, None);
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(Error::transport(stage))?;
        let status = response.status();
        self.observer.on_response("GET", url, status.as_u16());
        let body = response.text().await.map_err(Error::transport(stage))?;
        Ok((status, body))
    }

    /// POST to an identity-provider endpoint. The provider takes its inputs
    /// as query parameters even on POST.
    async fn provider_post(
        &self,
        stage: Stage,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<(reqwest::StatusCode, String)> {
        self.observer.on_request("POST", url, None);
        let response = self
            .http
            .post(url)
            .query(params)
            .send()
            .await
            .map_err(Error::transport(stage))?;
        let status = response.status();
        self.observer.on_response("POST", url, status.as_u16());
        let body = response.text().await.map_err(Error::transport(stage))?;
        Ok((status, body))
    }
}

/// Body-level status when present, HTTP status otherwise.
fn effective_status(http: reqwest::StatusCode, body_status: i64) -> i64 {
    if body_status != 0 {
        body_status
    } else {
        i64::from(http.as_u16())
    }
}

struct LoginOutcome {
    uid: String,
    login_token: String,
}

struct FederationOutcome {
    token: String,
    identity_id: String,
}

#[derive(Debug, Deserialize, Default)]
struct ProviderEnvelope {
    #[serde(rename = "statusCode", default)]
    status_code: i64,
}

#[derive(Debug, Deserialize, Default)]
struct LoginResponse {
    #[serde(flatten)]
    envelope: ProviderEnvelope,
    #[serde(rename = "UID")]
    uid: Option<String>,
    #[serde(rename = "sessionInfo")]
    session_info: Option<SessionInfo>,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    login_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct JwtResponse {
    #[serde(flatten)]
    envelope: ProviderEnvelope,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FederationResponse {
    #[serde(rename = "Token")]
    token: Option<String>,
    #[serde(rename = "IdentityId")]
    identity_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CredentialsResponse {
    #[serde(rename = "Credentials")]
    credentials: Option<RawCredentials>,
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "SecretKey")]
    secret_key: String,
    #[serde(rename = "SessionToken")]
    session_token: String,
    #[serde(rename = "Expiration")]
    expiration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    fn profile_for(server: &MockServer) -> BrandProfile {
        let base = server.base_url();
        BrandProfile {
            login_url: base.clone(),
            token_url: format!("{base}/v2/cognito/identity/token"),
            api_url: base.clone(),
            credential_url: format!("{base}/credentials"),
            login_api_key: "login-key".to_string(),
            api_key: "api-key".to_string(),
            region: "eu-west-1".to_string(),
            locale: "de_de".to_string(),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "driver@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn mock_bootstrap_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/accounts.webSdkBootstrap")
                .query_param("apiKey", "login-key");
            then.status(200).json_body(serde_json::json!({"statusCode": 200}));
        })
    }

    fn mock_login_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/accounts.login")
                .query_param("loginID", "driver@example.com")
                .query_param("password", "hunter2")
                .query_param("sessionExpiration", "300")
                .query_param("targetEnv", "jssdk")
                .query_param("APIKey", "login-key");
            then.status(200).json_body(serde_json::json!({
                "statusCode": 200,
                "UID": "U1",
                "sessionInfo": {"login_token": "LT1"}
            }));
        })
    }

    fn mock_jwt_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/accounts.getJWT")
                .query_param("login_token", "LT1");
            then.status(200)
                .json_body(serde_json::json!({"statusCode": 200, "id_token": "T1"}));
        })
    }

    fn mock_federation_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/v2/cognito/identity/token")
                .header("x-api-key", "api-key")
                .json_body(serde_json::json!({"gigya_token": "T1"}));
            then.status(200)
                .json_body(serde_json::json!({"Token": "TOK", "IdentityId": "ID1"}));
        })
    }

    fn mock_credentials_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/credentials")
                .header("x-amz-target", CREDENTIALS_TARGET)
                .json_body(serde_json::json!({
                    "IdentityId": "ID1",
                    "Logins": {"cognito-identity.amazonaws.com": "TOK"}
                }));
            then.status(200).json_body(serde_json::json!({
                "IdentityId": "ID1",
                "Credentials": {
                    "AccessKeyId": "AK",
                    "SecretKey": "SK",
                    "SessionToken": "ST",
                    "Expiration": 1716500000.0
                }
            }));
        })
    }

    #[tokio::test]
    async fn full_pipeline_yields_account_id_and_bound_signer() {
        let server = MockServer::start_async().await;
        let bootstrap = mock_bootstrap_ok(&server);
        let login = mock_login_ok(&server);
        let jwt = mock_jwt_ok(&server);
        let federation = mock_federation_ok(&server);
        let creds = mock_credentials_ok(&server);

        let session = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap();

        bootstrap.assert();
        login.assert();
        jwt.assert();
        federation.assert();
        creds.assert();

        assert_eq!(session.account_id(), "U1");
        let bound = session.signer().credentials();
        assert_eq!(bound.access_key_id, "AK");
        assert_eq!(bound.secret_key, "SK");
        assert_eq!(bound.session_token, "ST");
        assert_eq!(session.signer().region(), "eu-west-1");
        assert_eq!(session.signer().service(), SIGNING_SERVICE);
    }

    #[tokio::test]
    async fn invalid_credentials_fail_at_the_login_stage() {
        let server = MockServer::start_async().await;
        mock_bootstrap_ok(&server);
        let login = server.mock(|when, then| {
            when.method(POST).path("/accounts.login");
            then.status(200).json_body(serde_json::json!({
                "statusCode": 403042,
                "errorMessage": "invalid loginID or password"
            }));
        });
        let jwt = server.mock(|when, then| {
            when.method(POST).path("/accounts.getJWT");
            then.status(200);
        });

        let err = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap_err();

        login.assert();
        assert_eq!(jwt.hits(), 0);
        match err {
            Error::InvalidCredentials { status, ref body } => {
                assert_eq!(status, 403042);
                assert!(body.contains("invalid loginID or password"));
            }
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
        assert_eq!(err.stage(), Stage::Login);
    }

    #[tokio::test]
    async fn empty_credentials_fail_without_network_calls() {
        let server = MockServer::start_async().await;
        let bootstrap = mock_bootstrap_ok(&server);

        let err = Authenticator::new(
            profile_for(&server),
            Credentials {
                username: String::new(),
                password: "x".to_string(),
            },
        )
        .unwrap()
        .authenticate()
        .await
        .unwrap_err();

        assert_eq!(bootstrap.hits(), 0);
        assert!(matches!(err, Error::InvalidCredentials { .. }));
    }

    #[tokio::test]
    async fn bootstrap_body_status_is_checked_separately_from_http_status() {
        let server = MockServer::start_async().await;
        // HTTP 200 but the provider reports a body-level failure.
        server.mock(|when, then| {
            when.method(GET).path("/accounts.webSdkBootstrap");
            then.status(200)
                .json_body(serde_json::json!({"statusCode": 500, "statusReason": "Error"}));
        });

        let err = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap_err();

        match err {
            Error::ProviderUnavailable { status, .. } => assert_eq!(status, 500),
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_federation_fields_stop_before_credential_derivation() {
        let server = MockServer::start_async().await;
        mock_bootstrap_ok(&server);
        mock_login_ok(&server);
        mock_jwt_ok(&server);
        server.mock(|when, then| {
            when.method(POST).path("/v2/cognito/identity/token");
            then.status(200).json_body(serde_json::json!({"IdentityId": "ID1"}));
        });
        let creds = server.mock(|when, then| {
            when.method(POST).path("/credentials");
            then.status(200);
        });

        let err = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap_err();

        assert_eq!(creds.hits(), 0);
        assert!(matches!(err, Error::Federation { status: 200, .. }));
    }

    #[tokio::test]
    async fn credential_stage_401_is_not_misattributed_to_federation() {
        let server = MockServer::start_async().await;
        mock_bootstrap_ok(&server);
        mock_login_ok(&server);
        mock_jwt_ok(&server);
        mock_federation_ok(&server);
        server.mock(|when, then| {
            when.method(POST).path("/credentials");
            then.status(401)
                .json_body(serde_json::json!({"__type": "NotAuthorizedException"}));
        });

        let err = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap_err();

        match err {
            Error::CredentialExchange { status, ref body } => {
                assert_eq!(status, 401);
                assert!(body.contains("NotAuthorizedException"));
            }
            other => panic!("expected CredentialExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_issuance_failure_is_reported_as_such() {
        let server = MockServer::start_async().await;
        mock_bootstrap_ok(&server);
        mock_login_ok(&server);
        server.mock(|when, then| {
            when.method(POST).path("/accounts.getJWT");
            then.status(200)
                .json_body(serde_json::json!({"statusCode": 403, "errorMessage": "expired"}));
        });

        let err = Authenticator::new(profile_for(&server), credentials())
            .unwrap()
            .authenticate()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenIssuance { status: 403, .. }));
    }
}
