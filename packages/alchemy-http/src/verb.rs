//! Per-method execution of a single request against a transport.

use std::collections::HashMap;
use std::io::Read;

use tracing::{debug, error, warn};

use crate::error::AlchemyHttpError;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use crate::types::{HttpRequest, HttpResponse, Method};

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Execution strategy for one HTTP method.
///
/// Verbs are stateless and can be shared freely between threads. They only
/// differ in how the transport request is built; reading and decoding the
/// response is the same for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::GET => Verb::Get,
            Method::POST => Verb::Post,
            Method::PUT => Verb::Put,
            Method::DELETE => Verb::Delete,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }

    fn carries_body(&self) -> bool {
        !matches!(self, Verb::Get)
    }

    /// Perform the round trip and wrap the result in a response envelope.
    pub fn execute(
        &self,
        transport: &dyn HttpTransport,
        request: &HttpRequest,
    ) -> Result<HttpResponse, AlchemyHttpError> {
        let summary = request.summary();
        let transport_request = self.map_request(request)?;

        debug!(request = %summary, "sending request");
        let response = match transport.send(&transport_request) {
            Ok(Some(response)) => response,
            Ok(None) => {
                error!(request = %summary, "transport returned no response");
                return Err(AlchemyHttpError::MissingResponse { request: summary });
            }
            Err(source) => {
                error!(request = %summary, error = %source, "failed to execute request");
                return Err(AlchemyHttpError::Transport {
                    request: summary,
                    source,
                });
            }
        };

        let status = response.status;
        let headers = merge_headers(&response.headers);
        let body = extract_body(&summary, response)?;

        debug!(request = %summary, status, "received response");
        HttpResponse::new(status, headers, body).map_err(|_| {
            error!(request = %summary, status, "transport returned an invalid status");
            AlchemyHttpError::InvalidStatus {
                request: summary,
                status,
            }
        })
    }

    fn map_request(&self, request: &HttpRequest) -> Result<TransportRequest, AlchemyHttpError> {
        let mut headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.sort();

        let body = match request.body() {
            Some(body) if self.carries_body() => {
                let bytes = serde_json::to_vec(body).map_err(|source| AlchemyHttpError::Json {
                    context: format!("encoding body for {}", request.summary()),
                    source,
                })?;
                if !headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                {
                    headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
                }
                Some(bytes)
            }
            _ => None,
        };

        Ok(TransportRequest {
            method: self.method().into(),
            url: request.url_with_query(),
            headers,
            body,
        })
    }
}

/// Fold repeated headers into one comma-separated value per name.
fn merge_headers(headers: &[(String, String)]) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        merged
            .entry(name.clone())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Text,
    Undeclared,
}

fn classify(content_type: Option<&str>) -> Option<BodyKind> {
    let Some(content_type) = content_type else {
        return Some(BodyKind::Undeclared);
    };
    let lowered = content_type.to_ascii_lowercase();
    if lowered.contains(JSON_CONTENT_TYPE) {
        Some(BodyKind::Json)
    } else if lowered.contains(TEXT_CONTENT_TYPE) {
        Some(BodyKind::Text)
    } else {
        None
    }
}

/// Drains and releases the body stream when dropped, on every exit path.
struct DrainOnDrop(Box<dyn Read + Send>);

impl Drop for DrainOnDrop {
    fn drop(&mut self) {
        if let Err(e) = std::io::copy(&mut self.0, &mut std::io::sink()) {
            warn!(error = %e, "failed to drain response body");
        }
    }
}

fn extract_body(
    summary: &str,
    response: TransportResponse,
) -> Result<serde_json::Value, AlchemyHttpError> {
    let content_type = response.content_type().map(str::to_owned);
    let mut stream = DrainOnDrop(response.body);

    let Some(kind) = classify(content_type.as_deref()) else {
        let content_type = content_type.unwrap_or_default();
        error!(request = %summary, %content_type, "unsupported response content type");
        return Err(AlchemyHttpError::ContentType { content_type });
    };

    let mut raw = Vec::new();
    stream.0.read_to_end(&mut raw).map_err(|e| {
        error!(request = %summary, error = %e, "failed to read response body");
        AlchemyHttpError::Io(e)
    })?;

    if raw.is_empty() {
        return Ok(serde_json::Value::Null);
    }

    match kind {
        BodyKind::Json => serde_json::from_slice(&raw).map_err(|source| {
            error!(request = %summary, error = %source, "could not parse response as JSON");
            AlchemyHttpError::Json {
                context: format!("parsing response of {summary}"),
                source,
            }
        }),
        BodyKind::Text => Ok(serde_json::Value::String(
            String::from_utf8_lossy(&raw).into_owned(),
        )),
        BodyKind::Undeclared => Err(AlchemyHttpError::ContentType {
            content_type: "<missing>".to_string(),
        }),
    }
}
