use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::Error;
use crate::machine::StateMachine;
use crate::steps::Step1;
use crate::transport::{HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT};
use crate::worker::{ThreadWorker, Worker};

/// Entry point for building requests.
///
/// Cheap to clone; clones share the transport and worker.
///
/// # Example
///
/// ```ignore
/// use alchemy_http::AlchemyHttp;
///
/// let http = AlchemyHttp::new_default_instance()?;
///
/// // Blocking
/// let user: User = http
///     .go()
///     .url("https://api.example.com/users/123")?
///     .get()
///     .expecting::<User>()?
///     .execute()?;
///
/// // Callback-based
/// http.go()
///     .url("https://api.example.com/users")?
///     .post()
///     .body(&new_user)?
///     .header("Authorization", "Bearer token")?
///     .expecting::<User>()?
///     .on_success(|user| { println!("created {}", user.id); Ok(()) })
///     .on_failure(|e| eprintln!("failed: {e}"))
///     .execute()?;
/// ```
#[derive(Debug, Clone)]
pub struct AlchemyHttp {
    default_headers: HashMap<String, String>,
    machine: StateMachine,
}

impl AlchemyHttp {
    pub fn builder() -> AlchemyHttpBuilder {
        AlchemyHttpBuilder::default()
    }

    /// Reqwest transport, one thread per async request, and JSON headers.
    pub fn new_default_instance() -> Result<Self, Error> {
        Self::builder()
            .using_default_header("Accept", "application/json, text/plain")?
            .using_default_header("Content-Type", "application/json")?
            .build()
    }

    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// A copy of this client that also sends `key: value` on every request.
    pub fn using_default_header(&self, key: &str, value: &str) -> Result<Self, Error> {
        if key.trim().is_empty() {
            return Err(Error::illegal("Key is empty"));
        }
        let mut headers = self.default_headers.clone();
        headers.insert(key.to_string(), value.to_string());
        Ok(Self {
            default_headers: headers,
            machine: self.machine.clone(),
        })
    }

    /// Start a new request, seeded with the default headers.
    pub fn go(&self) -> Step1 {
        Step1::new(self.machine.clone(), self.default_headers.clone())
    }
}

/// Configuration for an [`AlchemyHttp`] client.
#[derive(Default)]
pub struct AlchemyHttpBuilder {
    transport: Option<Arc<dyn HttpTransport>>,
    worker: Option<Arc<dyn Worker>>,
    timeout: Option<Duration>,
    default_headers: HashMap<String, String>,
}

impl AlchemyHttpBuilder {
    pub fn using_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where asynchronous requests run. Defaults to [`ThreadWorker`].
    pub fn using_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Timeout for the default reqwest transport. Ignored with a custom transport.
    pub fn using_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        if timeout.is_zero() {
            return Err(Error::illegal("timeout must be positive"));
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    pub fn using_default_header(mut self, key: &str, value: &str) -> Result<Self, Error> {
        if key.trim().is_empty() {
            return Err(Error::illegal("Key is empty"));
        }
        self.default_headers.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    pub fn build(self) -> Result<AlchemyHttp, Error> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
                debug!(?timeout, "creating reqwest transport");
                Arc::new(ReqwestTransport::new(timeout).map_err(Error::Configuration)?)
            }
        };
        let worker = self
            .worker
            .unwrap_or_else(|| Arc::new(ThreadWorker::named("alchemy-http")));

        Ok(AlchemyHttp {
            default_headers: self.default_headers,
            machine: StateMachine::new(transport, worker),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockResponse, MockTransport};
    use crate::worker::InlineWorker;

    fn client(transport: &MockTransport) -> AlchemyHttp {
        AlchemyHttp::builder()
            .using_transport(Arc::new(transport.clone()))
            .using_worker(Arc::new(InlineWorker))
            .build()
            .unwrap()
    }

    #[test]
    fn default_instance_has_json_headers() {
        let http = AlchemyHttp::new_default_instance().unwrap();
        assert_eq!(
            http.default_headers().get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert!(http.default_headers().contains_key("Accept"));
    }

    #[test]
    fn using_default_header_returns_a_new_client() {
        let transport = MockTransport::new();
        let original = client(&transport);
        let extended = original.using_default_header("X-Api-Key", "secret").unwrap();

        assert!(original.default_headers().is_empty());
        assert_eq!(extended.default_headers()["X-Api-Key"], "secret");
        assert!(original
            .using_default_header("", "v")
            .unwrap_err()
            .is_illegal_argument());
    }

    #[test]
    fn default_headers_seed_every_request() {
        let transport = MockTransport::new().with_default_response(MockResponse::empty(200));
        let http = client(&transport)
            .using_default_header("X-Trace", "abc")
            .unwrap();

        http.go()
            .url("http://localhost/ping")
            .unwrap()
            .get()
            .header("X-Extra", "1")
            .unwrap()
            .execute()
            .unwrap();

        let sent = &transport.recorded_requests()[0];
        assert!(sent.headers.contains(&("X-Trace".to_string(), "abc".to_string())));
        assert!(sent.headers.contains(&("X-Extra".to_string(), "1".to_string())));
    }

    #[test]
    fn builder_validates_arguments() {
        assert!(AlchemyHttp::builder()
            .using_timeout(Duration::ZERO)
            .is_err());
        assert!(AlchemyHttp::builder()
            .using_default_header(" ", "v")
            .is_err());
        assert!(AlchemyHttp::builder()
            .using_timeout(Duration::from_secs(3))
            .unwrap()
            .build()
            .is_ok());
    }
}
