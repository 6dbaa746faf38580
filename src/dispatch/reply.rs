//! Handler results
//!
//! Whatever a handler returns is normalised into a [`Reply`] through the
//! [`Responder`] trait before the front end serialises it.

use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;

/// Normalised handler result
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Raw text, written verbatim
    Text(String),
    /// Structured value, serialised as JSON
    Json(Value),
    /// Redirect target; becomes a `Location` header
    Redirect(String),
    /// No body
    Empty,
}

impl Reply {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect(url.into())
    }

    /// Redirect target carried by the result, either explicitly or as a `url` key
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Redirect(url) => Some(url),
            Self::Json(value) => value.get("url").and_then(Value::as_str),
            Self::Text(_) | Self::Empty => None,
        }
    }
}

/// Conversion of a handler's return value into a [`Reply`]
pub trait Responder: Send + 'static {
    fn into_reply(self) -> Result<Reply, HandlerError>;
}

impl Responder for Reply {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(self)
    }
}

impl Responder for String {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::Text(self))
    }
}

impl Responder for &'static str {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::Text(self.to_string()))
    }
}

impl Responder for Value {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::Json(self))
    }
}

impl Responder for () {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::Empty)
    }
}

impl<R: Responder> Responder for Option<R> {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        self.map_or(Ok(Reply::Empty), R::into_reply)
    }
}

/// Serialise any `Serialize` value as a JSON reply
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send + 'static> Responder for Json<T> {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        serde_json::to_value(self.0)
            .map(Reply::Json)
            .map_err(HandlerError::unhandled)
    }
}
