//! Synchronous and asynchronous execution of built requests.
//!
//! Both paths share [`StateMachine::run`]: the verb performs the round trip,
//! unsuccessful statuses become [`AlchemyHttpError::Http`], and the envelope is
//! converted into whatever the caller asked for. The asynchronous path runs
//! the same pipeline on a [`Worker`] and reports through exactly one of its two
//! callbacks.

use std::any::{Any, TypeId};
use std::fmt;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{AlchemyHttpError, BoxError, Error};
use crate::transport::{HttpTransport, TransportRequest};
use crate::types::{HttpRequest, HttpResponse};
use crate::verb::Verb;
use crate::worker::Worker;

/// Called with the converted result of a successful execution.
///
/// Returning an error hands it to the failure callback instead.
pub type OnSuccess<T> = Box<dyn FnOnce(T) -> Result<(), BoxError> + Send + 'static>;

/// Called with the reason an execution failed.
pub type OnFailure = Box<dyn FnOnce(AlchemyHttpError) + Send + 'static>;

/// Executes requests against a shared transport and worker.
#[derive(Clone)]
pub struct StateMachine {
    transport: Arc<dyn HttpTransport>,
    worker: Arc<dyn Worker>,
}

impl StateMachine {
    pub fn new(transport: Arc<dyn HttpTransport>, worker: Arc<dyn Worker>) -> Self {
        Self { transport, worker }
    }

    /// Execute and return the raw response envelope.
    pub fn execute_sync(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        self.execute_sync_as::<HttpResponse>(request)
    }

    /// Execute and convert the response body into `T`.
    ///
    /// `T = HttpResponse` returns the envelope and `T = String` the body text.
    /// `()` is rejected because there is nothing to convert into.
    pub fn execute_sync_as<T>(&self, request: &HttpRequest) -> Result<T, Error>
    where
        T: DeserializeOwned + 'static,
    {
        check_response_type::<T>()?;
        Ok(Self::run(self.transport.as_ref(), request)?)
    }

    /// Schedule the request on the worker and return immediately.
    ///
    /// Argument problems are reported here, before anything is scheduled.
    /// Everything that goes wrong afterwards reaches `on_failure`, including
    /// a worker that refuses the task and a transport or decoder that panics.
    pub fn execute_async<T>(
        &self,
        request: HttpRequest,
        on_success: OnSuccess<T>,
        on_failure: OnFailure,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        check_response_type::<T>()?;

        let summary = request.summary();
        let callbacks = Arc::new(Mutex::new(Some((on_success, on_failure))));
        let scheduled = callbacks.clone();
        let transport = self.transport.clone();

        debug!(request = %summary, "scheduling asynchronous request");
        let submitted = self.worker.submit(Box::new(move || {
            let Some((on_success, on_failure)) = take(&scheduled) else {
                return;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                Self::run::<T>(transport.as_ref(), &request)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(request = %request.summary(), panic = %message, "request panicked");
                Err(AlchemyHttpError::Transport {
                    request: request.summary(),
                    source: message.into(),
                })
            });
            deliver(outcome, on_success, on_failure);
        }));

        if let Err(source) = submitted {
            error!(request = %summary, error = %source, "worker rejected request");
            if let Some((on_success, on_failure)) = take(&callbacks) {
                deliver(Err(AlchemyHttpError::Scheduling { source }), on_success, on_failure);
            }
        }
        Ok(())
    }

    /// Fetch the raw bytes at `url`, whatever their content type.
    pub fn download(&self, url: &url::Url) -> Result<Vec<u8>, Error> {
        let summary = format!("GET {url}");
        let request = TransportRequest {
            method: http::Method::GET,
            url: url.clone(),
            headers: Vec::new(),
            body: None,
        };

        let response = match self.transport.send(&request) {
            Ok(Some(response)) => response,
            Ok(None) => return Err(AlchemyHttpError::MissingResponse { request: summary }.into()),
            Err(source) => {
                error!(request = %summary, error = %source, "download failed");
                return Err(AlchemyHttpError::Transport {
                    request: summary,
                    source,
                }
                .into());
            }
        };

        let status = response.status;
        let mut body = response.body;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).map_err(AlchemyHttpError::Io)?;

        if !(200..300).contains(&status) {
            return Err(AlchemyHttpError::Http {
                status,
                body: serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            }
            .into());
        }
        Ok(bytes)
    }

    fn run<T>(transport: &dyn HttpTransport, request: &HttpRequest) -> Result<T, AlchemyHttpError>
    where
        T: DeserializeOwned + 'static,
    {
        let verb = Verb::for_method(request.method());
        let response = verb.execute(transport, request)?;

        if !response.is_success() {
            debug!(request = %request.summary(), status = response.status(), "unsuccessful status");
            return Err(AlchemyHttpError::Http {
                status: response.status(),
                body: response.body_as_json(),
            });
        }

        convert(response)
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine").finish_non_exhaustive()
    }
}

/// Reject response types that cannot hold a result.
pub(crate) fn check_response_type<T: 'static>() -> Result<(), Error> {
    if TypeId::of::<T>() == TypeId::of::<()>() {
        return Err(Error::illegal("() is not a valid response type"));
    }
    Ok(())
}

fn convert<T>(response: HttpResponse) -> Result<T, AlchemyHttpError>
where
    T: DeserializeOwned + 'static,
{
    let target = TypeId::of::<T>();
    let source = if target == TypeId::of::<HttpResponse>() {
        serde_json::to_value(&response).map_err(|source| AlchemyHttpError::Json {
            context: "copying response envelope".to_string(),
            source,
        })?
    } else if target == TypeId::of::<String>() {
        serde_json::Value::String(response.body_as_string())
    } else {
        return response.body_as::<T>();
    };

    serde_json::from_value(source).map_err(|source| AlchemyHttpError::Json {
        context: format!("converting response into {}", std::any::type_name::<T>()),
        source,
    })
}

fn deliver<T>(outcome: Result<T, AlchemyHttpError>, on_success: OnSuccess<T>, on_failure: OnFailure) {
    let failure = match outcome {
        Ok(value) => match panic::catch_unwind(AssertUnwindSafe(move || on_success(value))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => AlchemyHttpError::Callback {
                message: e.to_string(),
                source: Some(e),
            },
            Err(payload) => AlchemyHttpError::Callback {
                message: panic_message(payload.as_ref()),
                source: None,
            },
        },
        Err(e) => e,
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || on_failure(failure))) {
        error!(panic = %panic_message(payload.as_ref()), "failure callback panicked");
    }
}

type Callbacks<T> = (OnSuccess<T>, OnFailure);

fn take<T>(slot: &Mutex<Option<Callbacks<T>>>) -> Option<Callbacks<T>> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
