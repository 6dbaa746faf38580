//! Error taxonomy
//!
//! Boot-time errors abort startup before any listener is bound. Request-time
//! errors are classified once at the dispatch boundary and converted into a
//! response; they never escape the connection task.

use chrono::Local;
use hyper::{Method, StatusCode};
use serde_json::{json, Value};
use std::error::Error as StdError;
use std::fmt::Display;
use thiserror::Error;

use crate::container::Role;
use crate::storage::StorageError;

/// Message used for every 500 response; internal details stay in the error log.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal server error occurred. Please try again later.";

/// Errors raised while wiring the module graph or building the route table
#[derive(Debug, Error)]
pub enum BootError {
    #[error("{type_name} must be marked as a {expected} to be registered here")]
    MissingRole {
        type_name: &'static str,
        expected: Role,
    },

    #[error(
        "Dependency not found for {dependency} (required by {requester}). \
         Ensure all required dependencies are properly configured."
    )]
    MissingDependency {
        dependency: &'static str,
        requester: &'static str,
    },

    #[error("Cyclic module import detected: {module} imports itself through {path}")]
    CyclicImport { module: String, path: String },

    #[error("Module {name} is declared twice with different contents")]
    DuplicateModule { name: String },

    #[error("Route {verb} {path} is already registered")]
    DuplicateRoute { verb: Method, path: String },

    #[error("Invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while binding request data to handler parameters.
///
/// All of them are client errors: the request did not match what the route
/// declared it accepts.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Unsupported Content-Type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnsupportedContentType(Option<String>),

    #[error("multipart/form-data boundary not found")]
    MissingBoundary,

    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("missing path parameter '{0}'")]
    MissingPathParam(String),

    #[error("cannot convert '{value}' to {expected} for '{name}'")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unsupported field type: {0}")]
    UnsupportedParameterType(String),

    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Deserialize(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
}

impl BindError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl serde::de::Error for BindError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Deserialize(msg.to_string())
    }
}

/// Application-level error carrying a status and a structured payload.
///
/// The payload is written to the wire verbatim.
#[derive(Debug, Clone, Error)]
#[error("HTTP {status}: {details}")]
pub struct HttpError {
    status: StatusCode,
    details: Value,
}

impl HttpError {
    pub const fn new(status: StatusCode, details: Value) -> Self {
        Self { status, details }
    }

    /// Build an error whose payload is the standard `{status, timestamp, message}` envelope
    pub fn with_message(status: StatusCode, message: impl AsRef<str>) -> Self {
        Self::new(status, error_envelope(status, message.as_ref()))
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        Self::with_message(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl AsRef<str>) -> Self {
        Self::with_message(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl AsRef<str>) -> Self {
        Self::with_message(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl AsRef<str>) -> Self {
        Self::with_message(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn details(&self) -> &Value {
        &self.details
    }
}

/// Error type returned by route handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{0}")]
    Unhandled(#[source] Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    pub fn unhandled<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Unhandled(err.into())
    }

    /// Classify a handler failure.
    ///
    /// An unhandled error is unwrapped along its `source()` chain; the first
    /// `HttpError` found is surfaced as-is, otherwise the failure is opaque.
    pub fn classify(self) -> DispatchError {
        match self {
            Self::Http(err) => DispatchError::Http(err),
            Self::Unhandled(err) => {
                let mut cause = Some(&*err as &(dyn StdError + 'static));
                while let Some(current) = cause {
                    if let Some(http) = current.downcast_ref::<HttpError>() {
                        return DispatchError::Http(http.clone());
                    }
                    cause = current.source();
                }
                DispatchError::Unhandled(err.to_string())
            }
        }
    }
}

/// Missing rows become 404 and unique-constraint collisions 409; other
/// storage failures stay opaque.
impl From<StorageError> for HandlerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::Http(HttpError::not_found(err.to_string())),
            StorageError::UniqueViolation { .. } => {
                Self::Http(HttpError::conflict(err.to_string()))
            }
            other => Self::unhandled(other),
        }
    }
}

/// Outcome of a failed dispatch, ready to be rendered
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid request: {0}")]
    Bind(#[from] BindError),

    #[error(transparent)]
    Http(HttpError),

    #[error("Controller instance not found in application context: {0}")]
    ControllerMissing(&'static str),

    #[error("{0}")]
    Unhandled(String),

    #[error("handler panicked")]
    Panicked,
}

impl DispatchError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Bind(err) => err.status(),
            Self::Http(err) => err.status(),
            Self::ControllerMissing(_) | Self::Unhandled(_) | Self::Panicked => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON payload sent to the client. Internal failures never leak their message.
    pub fn payload(&self) -> Value {
        match self {
            Self::Http(err) => err.details().clone(),
            Self::Bind(err) => error_envelope(self.status(), &format!("Invalid request: {err}")),
            Self::ControllerMissing(_) | Self::Unhandled(_) | Self::Panicked => {
                error_envelope(self.status(), INTERNAL_ERROR_MESSAGE)
            }
        }
    }
}

/// Standard error envelope: `{status, timestamp, message}`
pub fn error_envelope(status: StatusCode, message: &str) -> Value {
    json!({
        "status": status.as_u16(),
        "timestamp": Local::now().to_rfc3339(),
        "message": message,
    })
}
