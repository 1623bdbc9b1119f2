//! Wire transport abstraction.
//!
//! The library never opens sockets itself. A [`HttpTransport`] performs one
//! blocking round trip and hands back the status, headers and an unread body
//! stream. Tests swap in a scripted transport instead of the network.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::BoxError;

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: http::Method,
    /// Target URL, query parameters already applied.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Response returned by the transport.
///
/// The body is a stream that may be read exactly once. Dropping it releases
/// the underlying connection.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    /// Build a response around an in-memory body.
    pub fn from_bytes(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: Box::new(std::io::Cursor::new(body)),
        }
    }

    /// Value of the `Content-Type` header, matched case-insensitively.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Trait for performing the actual network round trip.
///
/// Implementations are shared between concurrent executions and must be
/// safe to call from several threads at once.
pub trait HttpTransport: Send + Sync {
    /// Send the request and wait for the response.
    ///
    /// `Ok(None)` means the transport produced no response at all; the
    /// caller treats that as a failure.
    fn send(&self, request: &TransportRequest) -> Result<Option<TransportResponse>, BoxError>;
}

/// Production transport using reqwest's blocking client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, BoxError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, BoxError> {
        Self::new(DEFAULT_TIMEOUT)
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &TransportRequest) -> Result<Option<TransportResponse>, BoxError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str())?;
            let header_value = HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);

        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.clone());
        }

        let response = req_builder.send()?;

        let status = response.status().as_u16();
        let mut resp_headers = Vec::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.push((name.to_string(), v.to_string()));
            }
        }

        Ok(Some(TransportResponse {
            status,
            headers: resp_headers,
            body: Box::new(response),
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockResponse, MockTransport};
    use super::*;

    fn request(path: &str) -> TransportRequest {
        TransportRequest {
            method: http::Method::GET,
            url: Url::parse(&format!("http://localhost{path}")).unwrap(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn content_type_lookup_ignores_case() {
        let response = TransportResponse::from_bytes(
            200,
            vec![("content-type".to_string(), "text/plain".to_string())],
            b"hi".to_vec(),
        );
        assert_eq!(response.content_type(), Some("text/plain"));

        let bare = TransportResponse::from_bytes(204, Vec::new(), Vec::new());
        assert_eq!(bare.content_type(), None);
    }

    #[test]
    fn mock_transport_returns_configured_response() {
        let transport = MockTransport::new()
            .with_response("/users", MockResponse::json(200, serde_json::json!([])));

        let mut response = transport.send(&request("/users")).unwrap().unwrap();
        assert_eq!(response.status, 200);

        let mut text = String::new();
        response.body.read_to_string(&mut text).unwrap();
        assert_eq!(text, "[]");
        assert!(transport.body_drained());
    }

    #[test]
    fn mock_transport_returns_404_when_no_match() {
        let transport = MockTransport::new();
        let response = transport.send(&request("/missing")).unwrap().unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn mock_transport_fails_when_configured() {
        let transport = MockTransport::new().fail_with("Network error");
        let err = transport.send(&request("/any")).unwrap_err();
        assert_eq!(err.to_string(), "Network error");
    }

    #[test]
    fn mock_transport_records_requests() {
        let transport = MockTransport::new().respond_with_nothing();
        assert!(transport.send(&request("/first")).unwrap().is_none());
        assert!(transport.send(&request("/second")).unwrap().is_none());

        let recorded = transport.recorded_requests();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].url.path(), "/second");
    }

    #[test]
    fn reqwest_transport_creation() {
        assert!(ReqwestTransport::with_default_timeout().is_ok());
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
