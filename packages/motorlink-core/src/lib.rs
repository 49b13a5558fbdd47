//! Motorlink Core Library
//!
//! This crate provides the client pipeline for a vehicle manufacturer's
//! cloud telematics API:
//! - Authentication (identity-provider login, token issuance, federated
//!   credential exchange)
//! - SigV4 request signing with the derived credentials
//! - Signed data access (vehicle listing, per-vehicle status)
//! - Brand/endpoint configuration (env, config file, built-in profiles)
//!
//! There is no token caching or refresh: an [`Authenticator`] is consumed
//! by one login attempt, and a new one is needed per run.
//!
//! # Example
//!
//! ```no_run
//! use motorlink_core::{Authenticator, BrandProfile, Credentials, VehicleClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), motorlink_core::Error> {
//!     let profile = BrandProfile::builtin("jeep-eu").unwrap();
//!
//!     let session = Authenticator::new(
//!         profile.clone(),
//!         Credentials {
//!             username: "driver@example.com".into(),
//!             password: "secret".into(),
//!         },
//!     )?
//!     .authenticate()
//!     .await?;
//!
//!     let client = VehicleClient::new(profile, session)?;
//!     for vehicle in client.list_vehicles().await?.vehicles {
//!         println!("{}", vehicle.vin);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
mod headers;
pub mod trace;

// Re-export commonly used types
pub use api::{Vehicle, VehicleClient, VehicleList, VehicleStatus};
pub use auth::{Authenticator, Credentials, FederatedCredentials, RequestSigner, Session};
pub use config::{BrandProfile, ClientOptions, ConfigSource};
pub use error::{Error, Result, Stage};
pub use trace::{RequestObserver, TracingObserver};
