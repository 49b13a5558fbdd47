//! Signed data access: vehicle listing and per-vehicle status.
//!
//! A [`VehicleClient`] can only be built from a [`Session`], so data calls
//! are impossible before authentication has completed. Every request
//! carries the fixed client-identity header set, a fresh correlation id,
//! and the signer's signature headers. A single failed call surfaces
//! immediately; there are no retries.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Session;
use crate::config::{BrandProfile, ClientOptions};
use crate::error::{Error, Result, Stage, body_snippet};
use crate::headers::{client_headers, new_correlation_id};
use crate::trace::{ObserverHandle, default_observer};

/// Read access to the vehicle data API for one authenticated account.
pub struct VehicleClient {
    http: reqwest::Client,
    profile: BrandProfile,
    session: Session,
    observer: ObserverHandle,
}

impl VehicleClient {
    pub fn new(profile: BrandProfile, session: Session) -> Result<Self> {
        Self::with_options(profile, session, ClientOptions::default())
    }

    pub fn with_options(
        profile: BrandProfile,
        session: Session,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(Error::transport(Stage::DataAccess))?;
        Ok(Self {
            http,
            profile,
            session,
            observer: default_observer(),
        })
    }

    /// Replace the default tracing observer with a custom one.
    #[must_use]
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }

    /// The account this client reads for.
    pub fn account_id(&self) -> &str {
        self.session.account_id()
    }

    /// Fetch the account's vehicle list.
    pub async fn list_vehicles(&self) -> Result<VehicleList> {
        let url = self.endpoint(&format!(
            "/v4/accounts/{}/vehicles?stage=ALL",
            self.session.account_id()
        ))?;
        let body = self.signed_get(url).await?;
        let list: VehicleList = serde_json::from_str(&body).map_err(|_| Error::Upstream {
            status: 200,
            url: "vehicle list".to_string(),
            body: body_snippet(&body),
        })?;
        tracing::info!(count = list.vehicles.len(), "fetched vehicle list");
        Ok(list)
    }

    /// Fetch one vehicle's status document.
    ///
    /// Sections the provider omits (battery data on non-EVs, for example)
    /// come back as `None`; partial data is not a failure.
    pub async fn vehicle_status(&self, vin: &str) -> Result<VehicleStatus> {
        let url = self.endpoint(&format!(
            "/v2/accounts/{}/vehicles/{vin}/status",
            self.session.account_id()
        ))?;
        let body = self.signed_get(url).await?;
        let status: VehicleStatus = serde_json::from_str(&body).map_err(|_| Error::Upstream {
            status: 200,
            url: format!("status for {vin}"),
            body: body_snippet(&body),
        })?;
        tracing::info!(%vin, "fetched vehicle status");
        Ok(status)
    }

    fn endpoint(&self, path_and_query: &str) -> Result<Url> {
        Url::parse(&format!("{}{path_and_query}", self.profile.api_url)).map_err(|e| {
            Error::Upstream {
                status: 0,
                url: path_and_query.to_string(),
                body: e.to_string(),
            }
        })
    }

    /// Issue one signed GET. The URL is used verbatim so the signature is
    /// computed over exactly what goes on the wire.
    async fn signed_get(&self, url: Url) -> Result<String> {
        let correlation_id = new_correlation_id();
        self.observer
            .on_request("GET", url.as_str(), Some(&correlation_id));

        let mut request = self.http.get(url.clone());
        for (name, value) in client_headers(&self.profile, &correlation_id) {
            request = request.header(name, value);
        }
        for (name, value) in self.session.signer().sign("GET", &url, b"") {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(Error::transport(Stage::DataAccess))?;
        let status = response.status();
        self.observer
            .on_response("GET", url.as_str(), status.as_u16());
        let body = response
            .text()
            .await
            .map_err(Error::transport(Stage::DataAccess))?;

        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                url: url.to_string(),
                body: body_snippet(&body),
            });
        }
        Ok(body)
    }
}

/// The account's vehicles as returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VehicleList {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

/// One vehicle summary. Only the VIN is guaranteed; everything else is
/// whatever the provider chose to include.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(
        rename = "modelDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub model_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A per-vehicle status document. The provider omits whole sections
/// depending on the vehicle (no `evInfo` on combustion models), so every
/// section is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VehicleStatus {
    #[serde(
        rename = "vehicleInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle_info: Option<serde_json::Value>,
    #[serde(rename = "evInfo", default, skip_serializing_if = "Option::is_none")]
    pub ev_info: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
