//! Authentication: the login pipeline and SigV4 request signing.

mod authenticator;
mod signer;

pub use authenticator::{Authenticator, Credentials, SIGNING_SERVICE, Session};
pub use signer::{FederatedCredentials, RequestSigner};
