//! # alchemy-http
//!
//! Fluent HTTP requests, executed synchronously or through callbacks.
//!
//! A request is staged one step at a time. Each step is a separate type that
//! only exposes the next legal operations, so a request cannot be executed
//! before it is complete:
//!
//! ```ignore
//! use alchemy_http::AlchemyHttp;
//!
//! let http = AlchemyHttp::new_default_instance()?;
//!
//! let user: User = http
//!     .go()
//!     .url("https://api.example.com/users/123")?
//!     .get()
//!     .header("Authorization", "Bearer token")?
//!     .expecting::<User>()?
//!     .execute()?;
//! ```
//!
//! ## Execution
//!
//! Blocking calls return `Result<T, Error>`. Asynchronous calls hand the
//! request to a [`Worker`] and return at once; exactly one of the success or
//! failure callbacks runs later. A failing or panicking success callback is
//! reported to the failure callback.
//!
//! ## Transport
//!
//! Network I/O goes through the [`HttpTransport`] trait. [`ReqwestTransport`]
//! is the default; anything that can perform a blocking round trip can be
//! plugged in with [`AlchemyHttpBuilder::using_transport`].
//!
//! ## Errors
//!
//! Bad arguments fail with [`Error::IllegalArgument`] at the call that
//! supplied them. Everything that goes wrong during execution is an
//! [`AlchemyHttpError`]: transport failures, unsupported content types, JSON
//! problems and non-2xx statuses.

pub mod error;
pub mod machine;
pub mod steps;
pub mod transport;
pub mod types;
pub mod verb;
pub mod worker;

mod client;

pub use client::{AlchemyHttp, AlchemyHttpBuilder};
pub use error::{AlchemyHttpError, BoxError, Error};
pub use machine::{OnFailure, OnSuccess, StateMachine};
pub use steps::{BodyStep, Step1, Step2, Step3, Step4, Step5, Step6};
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
pub use types::{HttpRequest, HttpResponse, Method};
pub use verb::Verb;
#[cfg(feature = "async")]
pub use worker::TokioWorker;
pub use worker::{InlineWorker, Task, ThreadWorker, Worker};
