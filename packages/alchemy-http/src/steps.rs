//! The fluent request steps.
//!
//! Each step is its own type and only offers the transitions that are legal
//! from there, so an incomplete request cannot be executed:
//!
//! ```text
//! Step1 --url--> Step2 --get--> Step3
//!                      --post/put/delete--> BodyStep --body/nothing--> Step3
//! Step3 --execute / execute_as--> result                    (sync)
//! Step3 --expecting::<T>--> Step4<T> --execute--> T         (sync)
//! Step3 --on_success--> Step5<HttpResponse>
//! Step4<T> --on_success--> Step5<T> --on_failure--> Step6<T> --execute--> ()   (async)
//! ```
//!
//! Arguments are validated when they are supplied, not when the request
//! runs.

use std::collections::HashMap;
use std::fmt::Display;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{AlchemyHttpError, BoxError, Error};
use crate::machine::{check_response_type, OnFailure, OnSuccess, StateMachine};
use crate::types::{HttpRequest, HttpResponse, Method};

fn parse_url(url: &str) -> Result<Url, Error> {
    if url.trim().is_empty() {
        return Err(Error::illegal("URL is empty"));
    }
    let parsed = Url::parse(url).map_err(|e| Error::illegal(format!("invalid URL {url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::illegal(format!("unsupported URL scheme: {}", parsed.scheme())));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::illegal(format!("URL has no host: {url}")));
    }
    Ok(parsed)
}

/// First step: choose where the request goes.
#[derive(Debug)]
pub struct Step1 {
    machine: StateMachine,
    headers: HashMap<String, String>,
}

impl Step1 {
    pub(crate) fn new(machine: StateMachine, headers: HashMap<String, String>) -> Self {
        Self { machine, headers }
    }

    pub fn url(self, url: &str) -> Result<Step2, Error> {
        let url = parse_url(url)?;
        Ok(Step2 {
            machine: self.machine,
            url,
            headers: self.headers,
        })
    }

    /// Download the raw bytes at `url` with a plain GET.
    pub fn download(&self, url: &str) -> Result<Vec<u8>, Error> {
        let url = parse_url(url)?;
        self.machine.download(&url)
    }
}

/// Second step: choose the HTTP method.
#[derive(Debug)]
pub struct Step2 {
    machine: StateMachine,
    url: Url,
    headers: HashMap<String, String>,
}

impl Step2 {
    fn request(self, method: Method) -> (StateMachine, HttpRequest) {
        let mut request = HttpRequest::new(self.url, method);
        request.headers = self.headers;
        (self.machine, request)
    }

    pub fn get(self) -> Step3 {
        let (machine, request) = self.request(Method::GET);
        Step3 { machine, request }
    }

    pub fn post(self) -> BodyStep {
        let (machine, request) = self.request(Method::POST);
        BodyStep { machine, request }
    }

    pub fn put(self) -> BodyStep {
        let (machine, request) = self.request(Method::PUT);
        BodyStep { machine, request }
    }

    pub fn delete(self) -> BodyStep {
        let (machine, request) = self.request(Method::DELETE);
        BodyStep { machine, request }
    }
}

/// Body selection for methods that may carry one.
#[derive(Debug)]
pub struct BodyStep {
    machine: StateMachine,
    request: HttpRequest,
}

impl BodyStep {
    /// Send no body.
    pub fn nothing(self) -> Step3 {
        Step3 {
            machine: self.machine,
            request: self.request,
        }
    }

    /// Send a JSON document given as text. It must parse.
    pub fn body_json(self, json: &str) -> Result<Step3, Error> {
        if json.trim().is_empty() {
            return Err(Error::illegal("JSON body is empty"));
        }
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::illegal(format!("body is not valid JSON: {e}")))?;
        Ok(self.with_body(value))
    }

    /// Send any serializable value as JSON.
    pub fn body<B: Serialize + ?Sized>(self, body: &B) -> Result<Step3, Error> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::illegal(format!("body cannot be serialized: {e}")))?;
        Ok(self.with_body(value))
    }

    fn with_body(mut self, value: serde_json::Value) -> Step3 {
        self.request.body = Some(value);
        self.nothing()
    }
}

/// Third step: headers and query parameters, then execution.
#[derive(Debug)]
pub struct Step3 {
    machine: StateMachine,
    request: HttpRequest,
}

impl Step3 {
    /// Set a header, replacing any earlier value for the same name.
    pub fn header(mut self, key: &str, value: &str) -> Result<Self, Error> {
        if key.trim().is_empty() {
            return Err(Error::illegal("header name is empty"));
        }
        self.request.headers.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    /// Set a query parameter. Numbers and booleans are formatted with `Display`.
    pub fn query_param(mut self, name: &str, value: impl Display) -> Result<Self, Error> {
        let value = value.to_string();
        if name.trim().is_empty() || value.is_empty() {
            return Err(Error::illegal("query parameter name or value is empty"));
        }
        self.request.query.insert(name.to_string(), value);
        Ok(self)
    }

    /// Set the `Accept` header from one or more media types.
    pub fn accept(self, media_types: &[&str]) -> Result<Self, Error> {
        if media_types.is_empty() || media_types.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::illegal("media types must be non-empty"));
        }
        let mut unique: Vec<&str> = Vec::with_capacity(media_types.len());
        for &media_type in media_types {
            if !unique.contains(&media_type) {
                unique.push(media_type);
            }
        }
        let accept = unique.join(",");
        self.header("Accept", &accept)
    }

    /// The request as staged so far.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Finish building without executing.
    pub fn build(self) -> HttpRequest {
        self.request
    }

    /// Execute synchronously and return the response envelope.
    pub fn execute(self) -> Result<HttpResponse, Error> {
        self.machine.execute_sync(&self.request)
    }

    /// Execute synchronously and convert the body into `T`.
    pub fn execute_as<T: DeserializeOwned + 'static>(self) -> Result<T, Error> {
        self.machine.execute_sync_as(&self.request)
    }

    /// Declare the response type for the following steps.
    pub fn expecting<T: DeserializeOwned + Send + 'static>(self) -> Result<Step4<T>, Error> {
        check_response_type::<T>()?;
        Ok(Step4 {
            machine: self.machine,
            request: self.request,
            _response: PhantomData,
        })
    }

    /// Go asynchronous and receive the raw response envelope.
    pub fn on_success<F>(self, callback: F) -> Step5<HttpResponse>
    where
        F: FnOnce(HttpResponse) -> Result<(), BoxError> + Send + 'static,
    {
        Step5 {
            machine: self.machine,
            request: self.request,
            on_success: Box::new(callback),
        }
    }
}

/// A request with a declared response type.
#[derive(Debug)]
pub struct Step4<T> {
    machine: StateMachine,
    request: HttpRequest,
    _response: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + Send + 'static> Step4<T> {
    /// Execute synchronously.
    pub fn execute(self) -> Result<T, Error> {
        self.machine.execute_sync_as(&self.request)
    }

    pub fn on_success<F>(self, callback: F) -> Step5<T>
    where
        F: FnOnce(T) -> Result<(), BoxError> + Send + 'static,
    {
        Step5 {
            machine: self.machine,
            request: self.request,
            on_success: Box::new(callback),
        }
    }
}

/// Waiting for the failure callback.
pub struct Step5<T> {
    machine: StateMachine,
    request: HttpRequest,
    on_success: OnSuccess<T>,
}

impl<T: DeserializeOwned + Send + 'static> Step5<T> {
    pub fn on_failure<F>(self, callback: F) -> Step6<T>
    where
        F: FnOnce(AlchemyHttpError) + Send + 'static,
    {
        Step6 {
            machine: self.machine,
            request: self.request,
            on_success: self.on_success,
            on_failure: Box::new(callback),
        }
    }
}

/// Fully specified asynchronous request.
pub struct Step6<T> {
    machine: StateMachine,
    request: HttpRequest,
    on_success: OnSuccess<T>,
    on_failure: OnFailure,
}

impl<T: DeserializeOwned + Send + 'static> Step6<T> {
    /// Schedule the request and return without waiting for it.
    pub fn execute(self) -> Result<(), Error> {
        self.machine
            .execute_async(self.request, self.on_success, self.on_failure)
    }
}
