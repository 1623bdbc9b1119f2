use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::{AlchemyHttpError, Error};

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

/// A fully specified HTTP request.
///
/// Produced by the request steps and never modified afterwards. Every step
/// that changes something hands back a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) query: HashMap<String, String>,
    pub(crate) body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub(crate) fn new(url: Url, method: Method) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            query: HashMap::new(),
            body: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn has_query_params(&self) -> bool {
        !self.query.is_empty()
    }

    /// The target URL with the query parameters appended.
    ///
    /// Parameters are appended in name order so the result is stable.
    pub fn url_with_query(&self) -> Url {
        let mut url = self.url.clone();
        if self.query.is_empty() {
            return url;
        }

        let mut params: Vec<(&String, &String)> = self.query.iter().collect();
        params.sort();
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Short `METHOD url` form used in logs and error messages.
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.url_with_query())
    }
}

/// Immutable response envelope produced by one execution.
///
/// The body is kept as a canonical JSON value. Every accessor decodes from
/// that value again, so repeated calls give equal results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHttpResponse")]
pub struct HttpResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: serde_json::Value,
}

/// Wire form of [`HttpResponse`], checked by [`HttpResponse::new`] on the way in.
#[derive(Deserialize)]
struct RawHttpResponse {
    status: u16,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: serde_json::Value,
}

impl TryFrom<RawHttpResponse> for HttpResponse {
    type Error = Error;

    fn try_from(raw: RawHttpResponse) -> Result<Self, Self::Error> {
        HttpResponse::new(raw.status, raw.headers, raw.body)
    }
}

impl HttpResponse {
    /// Create an envelope. The status must be a valid HTTP status (100-599).
    pub fn new(
        status: u16,
        headers: HashMap<String, String>,
        body: serde_json::Value,
    ) -> Result<Self, Error> {
        if !(100..=599).contains(&status) {
            return Err(Error::illegal(format!("invalid HTTP status code: {status}")));
        }
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// The body as text.
    ///
    /// A JSON string is returned without quotes, an absent body as an empty
    /// string, and anything else as compact JSON.
    pub fn body_as_string(&self) -> String {
        match &self.body {
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// A copy of the structured body.
    pub fn body_as_json(&self) -> serde_json::Value {
        self.body.clone()
    }

    /// Deserialize the body into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, AlchemyHttpError> {
        serde_json::from_value(self.body.clone()).map_err(|source| AlchemyHttpError::Json {
            context: format!("decoding body as {}", std::any::type_name::<T>()),
            source,
        })
    }

    /// Deserialize a JSON array body into a list of `T`.
    pub fn body_as_list<T: DeserializeOwned>(&self) -> Result<Vec<T>, AlchemyHttpError> {
        self.body_as::<Vec<T>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: i64,
    }

    fn response(body: serde_json::Value) -> HttpResponse {
        HttpResponse::new(200, HashMap::new(), body).unwrap()
    }

    #[test]
    fn method_maps_to_http_method() {
        assert_eq!(http::Method::from(Method::GET), http::Method::GET);
        assert_eq!(http::Method::from(Method::DELETE), http::Method::DELETE);
        assert_eq!(Method::PUT.to_string(), "PUT");
    }

    #[test]
    fn url_with_query_appends_sorted_params() {
        let mut request = HttpRequest::new(Url::parse("http://localhost/search").unwrap(), Method::GET);
        request.query.insert("q".to_string(), "rust lang".to_string());
        request.query.insert("page".to_string(), "2".to_string());

        assert!(request.has_query_params());
        assert_eq!(
            request.url_with_query().as_str(),
            "http://localhost/search?page=2&q=rust+lang"
        );
        assert_eq!(request.summary(), "GET http://localhost/search?page=2&q=rust+lang");
    }

    #[test]
    fn url_without_query_is_unchanged() {
        let request = HttpRequest::new(Url::parse("http://localhost/a").unwrap(), Method::POST);
        assert!(!request.has_query_params());
        assert!(!request.has_body());
        assert_eq!(request.url_with_query().as_str(), "http://localhost/a");
    }

    #[test]
    fn rejects_invalid_status_codes() {
        assert!(HttpResponse::new(99, HashMap::new(), json!(null)).is_err());
        assert!(HttpResponse::new(600, HashMap::new(), json!(null)).is_err());
        assert!(HttpResponse::new(100, HashMap::new(), json!(null)).is_ok());
        assert!(HttpResponse::new(599, HashMap::new(), json!(null)).is_ok());
    }

    #[test]
    fn deserializing_checks_status() {
        let err = serde_json::from_str::<HttpResponse>(r#"{"status":999,"headers":{},"body":null}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid HTTP status code: 999"));

        let resp: HttpResponse =
            serde_json::from_str(r#"{"status":201,"headers":{"a":"b"},"body":[1]}"#).unwrap();
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.body_as_json(), json!([1]));
        let copied: HttpResponse =
            serde_json::from_value(serde_json::to_value(&resp).unwrap()).unwrap();
        assert_eq!(copied, resp);
    }

    #[test]
    fn status_classes() {
        let ok = response(json!(null));
        assert!(ok.is_success());

        let missing = HttpResponse::new(404, HashMap::new(), json!(null)).unwrap();
        assert!(missing.is_client_error());
        assert!(!missing.is_success());

        let broken = HttpResponse::new(502, HashMap::new(), json!(null)).unwrap();
        assert!(broken.is_server_error());
    }

    #[test]
    fn body_accessors_are_consistent() {
        let resp = response(json!({"a": 1}));

        assert_eq!(resp.body_as_string(), r#"{"a":1}"#);
        assert_eq!(resp.body_as_json(), json!({"a": 1}));

        let first: Sample = resp.body_as().unwrap();
        let second: Sample = resp.body_as().unwrap();
        assert_eq!(first, Sample { a: 1 });
        assert_eq!(first, second);

        let reparsed: Sample = serde_json::from_str(&resp.body_as_string()).unwrap();
        assert_eq!(reparsed, first);
    }

    #[test]
    fn string_body_is_unquoted() {
        let resp = response(json!("hello"));
        assert_eq!(resp.body_as_string(), "hello");
        assert_eq!(resp.body_as::<String>().unwrap(), "hello");
    }

    #[test]
    fn null_body_reads_as_empty_string() {
        assert_eq!(response(json!(null)).body_as_string(), "");
    }

    #[test]
    fn body_as_list() {
        let resp = response(json!([{"a": 1}, {"a": 2}]));
        let list: Vec<Sample> = resp.body_as_list().unwrap();
        assert_eq!(list, vec![Sample { a: 1 }, Sample { a: 2 }]);
    }

    #[test]
    fn body_as_wrong_type_is_json_error() {
        let resp = response(json!({"b": "x"}));
        let err = resp.body_as::<Sample>().unwrap_err();
        assert!(err.is_json());
    }
}
