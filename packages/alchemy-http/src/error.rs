/// Boxed error produced by a transport or a user callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by every fallible public call.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing input, reported at the call that supplied it.
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// The client could not be set up, e.g. the transport failed to build.
    #[error("Configuration error: {0}")]
    Configuration(#[source] BoxError),

    #[error(transparent)]
    Execution(#[from] AlchemyHttpError),
}

impl Error {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        Error::IllegalArgument(message.into())
    }

    /// The execution failure, if this is not an argument error.
    pub fn execution(&self) -> Option<&AlchemyHttpError> {
        match self {
            Error::Execution(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, Error::IllegalArgument(_))
    }
}

/// Umbrella error for everything that can go wrong while executing a request.
///
/// Synchronous callers receive it inside [`Error::Execution`]; asynchronous
/// callers receive it through their failure callback.
#[derive(thiserror::Error, Debug)]
pub enum AlchemyHttpError {
    #[error("Transport failed for {request}: {source}")]
    Transport {
        request: String,
        #[source]
        source: BoxError,
    },

    #[error("Unsupported content type: {content_type}")]
    ContentType { content_type: String },

    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: serde_json::Value,
    },

    #[error("No response received for {request}")]
    MissingResponse { request: String },

    #[error("Invalid HTTP status {status} received for {request}")]
    InvalidStatus { request: String, status: u16 },

    #[error("Request could not be scheduled: {source}")]
    Scheduling {
        #[source]
        source: BoxError,
    },

    #[error("Failed to read response body: {0}")]
    Io(#[from] std::io::Error),

    #[error("Success callback failed: {message}")]
    Callback {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl AlchemyHttpError {
    /// Status code of an unsuccessful response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AlchemyHttpError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, AlchemyHttpError::Http { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AlchemyHttpError::Transport { .. })
    }

    pub fn is_json(&self) -> bool {
        matches!(self, AlchemyHttpError::Json { .. })
    }
}
