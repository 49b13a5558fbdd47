//! Request-tracing hook.
//!
//! Instead of mutating global logging state or patching the transport, the
//! authenticator and the vehicle client accept an observer that is called
//! around every outgoing request. The default observer forwards to
//! `tracing` at debug level.

use std::sync::Arc;

/// Observer called on every outgoing request and its response.
///
/// Implementations must be cheap: they run inline on the request path.
pub trait RequestObserver: Send + Sync {
    /// Called just before a request is sent. `correlation_id` is present
    /// for data API calls (which carry one per call) and absent for
    /// identity-provider calls.
    fn on_request(&self, method: &str, url: &str, correlation_id: Option<&str>);

    /// Called once the response status is known.
    fn on_response(&self, method: &str, url: &str, status: u16);
}

/// Default observer: forwards request/response pairs to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn on_request(&self, method: &str, url: &str, correlation_id: Option<&str>) {
        match correlation_id {
            Some(id) => tracing::debug!(%method, %url, correlation_id = %id, "sending request"),
            None => tracing::debug!(%method, %url, "sending request"),
        }
    }

    fn on_response(&self, method: &str, url: &str, status: u16) {
        tracing::debug!(%method, %url, %status, "received response");
    }
}

/// Shared observer handle used by the authenticator and the vehicle client.
pub type ObserverHandle = Arc<dyn RequestObserver>;

pub(crate) fn default_observer() -> ObserverHandle {
    Arc::new(TracingObserver)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::RequestObserver;
    use std::sync::Mutex;

    /// Test observer that records every correlation id it sees.
    #[derive(Debug, Default)]
    pub struct Recording {
        pub requests: Mutex<Vec<(String, String, Option<String>)>>,
        pub responses: Mutex<Vec<(String, u16)>>,
    }

    impl RequestObserver for Recording {
        fn on_request(&self, method: &str, url: &str, correlation_id: Option<&str>) {
            self.requests.lock().unwrap().push((
                method.to_string(),
                url.to_string(),
                correlation_id.map(str::to_string),
            ));
        }

        fn on_response(&self, _method: &str, url: &str, status: u16) {
            self.responses.lock().unwrap().push((url.to_string(), status));
        }
    }
}
