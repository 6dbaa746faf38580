//! Route table entries

use std::any::TypeId;
use std::fmt;

use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, StatusCode};

use crate::dispatch::{Invoker, ParamBinding};

/// Redirect target attached to a route or a trie node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectDescriptor {
    target: String,
    status: StatusCode,
}

impl RedirectDescriptor {
    /// Temporary redirect (302)
    pub fn new(target: impl Into<String>) -> Self {
        Self::with_status(target, StatusCode::FOUND)
    }

    pub fn with_status(target: impl Into<String>, status: StatusCode) -> Self {
        Self {
            target: target.into(),
            status,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// Everything the dispatcher needs to serve one route
pub struct HandlerDescriptor {
    pub(crate) verb: Method,
    pub(crate) path: String,
    pub(crate) controller: TypeId,
    pub(crate) controller_name: &'static str,
    pub(crate) status: StatusCode,
    pub(crate) redirect: Option<RedirectDescriptor>,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) params: Vec<ParamBinding>,
    pub(crate) invoker: Invoker,
}

impl HandlerDescriptor {
    pub const fn verb(&self) -> &Method {
        &self.verb
    }

    /// Full path template, base path included
    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn controller_name(&self) -> &'static str {
        self.controller_name
    }

    /// Status sent for a successful result
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn redirect(&self) -> Option<&RedirectDescriptor> {
        self.redirect.as_ref()
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    pub fn params(&self) -> &[ParamBinding] {
        &self.params
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("controller", &self.controller_name)
            .field("status", &self.status)
            .field("redirect", &self.redirect)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
