//! Parameter binding plan
//!
//! Each declared handler parameter becomes a [`ParamBinding`]: where the value
//! comes from and a type-erased closure producing it from the request.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::body::{decode, parse_body};
use super::fields::from_fields;
use super::query::parse_query;
use super::RequestData;
use crate::error::{BindError, HandlerError};

/// A bound argument waiting to be taken by the handler
pub type BoundValue = Box<dyn Any + Send>;

type BindFn = Arc<dyn Fn(&RequestData) -> Result<BoundValue, BindError> + Send + Sync>;

/// Where a parameter value is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// Segment following `/<name>/` in the request path
    Path(String),
    /// The whole query string, mapped onto a DTO
    Query,
    /// The request body, mapped onto a DTO
    Body,
}

/// One entry of a handler's binding plan
#[derive(Clone)]
pub struct ParamBinding {
    source: ParamSource,
    target: &'static str,
    bind: BindFn,
}

impl ParamBinding {
    pub fn path<T: PathScalar>(name: &str) -> Self {
        let key = name.to_string();
        Self {
            source: ParamSource::Path(key.clone()),
            target: type_name::<T>(),
            bind: Arc::new(move |request: &RequestData| {
                let raw = extract_path_param(&request.path, &key)
                    .ok_or_else(|| BindError::MissingPathParam(key.clone()))?;
                Ok(Box::new(T::parse_scalar(&key, raw)?) as BoundValue)
            }),
        }
    }

    pub fn query<T: DeserializeOwned + Send + 'static>() -> Self {
        Self {
            source: ParamSource::Query,
            target: type_name::<T>(),
            bind: Arc::new(|request: &RequestData| {
                let fields = parse_query(request.query.as_deref());
                Ok(Box::new(from_fields::<T>(fields)?) as BoundValue)
            }),
        }
    }

    pub fn body<T: DeserializeOwned + Send + 'static>() -> Self {
        Self {
            source: ParamSource::Body,
            target: type_name::<T>(),
            bind: Arc::new(|request: &RequestData| {
                let parsed = parse_body(request.content_type(), &request.body)?;
                Ok(Box::new(decode::<T>(parsed)?) as BoundValue)
            }),
        }
    }

    pub const fn source(&self) -> &ParamSource {
        &self.source
    }

    /// Name of the destination type
    pub const fn target(&self) -> &'static str {
        self.target
    }

    pub(crate) fn bind(&self, request: &RequestData) -> Result<BoundValue, BindError> {
        (self.bind)(request)
    }
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Value of the segment following `/<name>/`; the first occurrence wins.
/// The segment is returned as it appears in the request path.
pub fn extract_path_param<'a>(path: &'a str, name: &str) -> Option<&'a str> {
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segment == name {
            match segments.peek() {
                Some(value) if !value.is_empty() => return Some(*value),
                _ => {}
            }
        }
    }
    None
}

/// Scalar types a path parameter can be bound to
pub trait PathScalar: Sized + Send + 'static {
    fn parse_scalar(name: &str, raw: &str) -> Result<Self, BindError>;
}

impl PathScalar for String {
    fn parse_scalar(_name: &str, raw: &str) -> Result<Self, BindError> {
        Ok(raw.to_string())
    }
}

impl PathScalar for bool {
    fn parse_scalar(_name: &str, raw: &str) -> Result<Self, BindError> {
        Ok(raw.eq_ignore_ascii_case("true"))
    }
}

macro_rules! path_scalar_from_str {
    ($($ty:ty),*) => {
        $(
            impl PathScalar for $ty {
                fn parse_scalar(name: &str, raw: &str) -> Result<Self, BindError> {
                    raw.parse::<$ty>().map_err(|_| BindError::InvalidValue {
                        name: name.to_string(),
                        value: raw.to_string(),
                        expected: stringify!($ty),
                    })
                }
            }
        )*
    };
}

path_scalar_from_str!(i32, i64, u32, u64, f32, f64);

/// Bound arguments, handed to the handler in declaration order
pub struct Args {
    values: std::vec::IntoIter<BoundValue>,
}

impl Args {
    pub(crate) fn new(values: Vec<BoundValue>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    /// Take the next argument. A type mismatch means the route's binding plan
    /// and its handler disagree, which is reported as an internal error.
    pub fn take<T: 'static>(&mut self) -> Result<T, HandlerError> {
        let value = self.values.next().ok_or_else(|| {
            HandlerError::unhandled(format!("no bound argument left for {}", type_name::<T>()))
        })?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            HandlerError::unhandled(format!("bound argument is not a {}", type_name::<T>()))
        })
    }

    /// Number of arguments not yet taken
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("remaining", &self.remaining())
            .finish()
    }
}
