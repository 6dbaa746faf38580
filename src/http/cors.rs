//! CORS policy module
//!
//! Computes the `Access-Control-*` response headers for a request carrying an
//! `Origin` header. Origin rules support exact strings and `*` wildcard
//! patterns such as `https://*.example.com`.

use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};

/// Verbs advertised when no explicit list is configured
pub const DEFAULT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::POST,
    Method::DELETE,
];

/// One entry of an origin list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginMatcher {
    Exact(String),
    Pattern(String),
}

impl OriginMatcher {
    /// Entries containing `*` are patterns, others are exact
    pub fn parse(value: &str) -> Self {
        if value.contains('*') {
            Self::Pattern(value.to_string())
        } else {
            Self::Exact(value.to_string())
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == origin,
            Self::Pattern(pattern) => match_wildcard(pattern, origin),
        }
    }
}

/// Which origins may access the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    /// `true` allows every origin, `false` none
    Any(bool),
    Exact(String),
    Pattern(String),
    List(Vec<OriginMatcher>),
}

impl OriginRule {
    /// Checked in order: allow-all flag, exact string, pattern, list membership
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any(allowed) => *allowed,
            Self::Exact(exact) => exact == origin,
            Self::Pattern(pattern) => match_wildcard(pattern, origin),
            Self::List(matchers) => matchers.iter().any(|m| m.matches(origin)),
        }
    }
}

/// Cross-origin resource sharing policy
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: OriginRule,
    methods: Vec<Method>,
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
    credentials: bool,
    max_age: Option<u64>,
    preflight_status: StatusCode,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(OriginRule::Any(true))
    }
}

impl CorsPolicy {
    pub fn new(origin: OriginRule) -> Self {
        Self {
            origin,
            methods: DEFAULT_METHODS.to_vec(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: None,
            preflight_status: StatusCode::NO_CONTENT,
        }
    }

    #[must_use]
    pub fn methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// Headers allowed in the actual request. Empty means "echo what the preflight asks for".
    #[must_use]
    pub fn allowed_headers(mut self, headers: Vec<String>) -> Self {
        self.allowed_headers = headers;
        self
    }

    #[must_use]
    pub fn exposed_headers(mut self, headers: Vec<String>) -> Self {
        self.exposed_headers = headers;
        self
    }

    #[must_use]
    pub const fn credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub const fn max_age(mut self, seconds: Option<u64>) -> Self {
        self.max_age = seconds;
        self
    }

    #[must_use]
    pub const fn preflight_status(mut self, status: StatusCode) -> Self {
        self.preflight_status = status;
        self
    }

    pub const fn origin_rule(&self) -> &OriginRule {
        &self.origin
    }

    pub const fn status(&self) -> StatusCode {
        self.preflight_status
    }

    /// Value of the `Allow` header of a preflight response
    pub fn allow_header(&self) -> String {
        join_methods(&self.methods)
    }

    /// `Access-Control-Allow-Origin` value for a request origin, if allowed.
    ///
    /// Allow-all without credentials answers `*`; otherwise the origin is echoed.
    pub fn allowed_origin(&self, origin: &str) -> Option<String> {
        if !self.origin.allows(origin) {
            return None;
        }
        if self.origin == OriginRule::Any(true) && !self.credentials {
            Some("*".to_string())
        } else {
            Some(origin.to_string())
        }
    }

    /// CORS headers for a response. Empty when the request has no `Origin` or
    /// the origin is not allowed.
    pub fn headers(
        &self,
        origin: Option<&str>,
        requested_headers: Option<&str>,
        preflight: bool,
    ) -> Vec<(HeaderName, HeaderValue)> {
        let Some(allowed) = origin.and_then(|o| self.allowed_origin(o)) else {
            return Vec::new();
        };

        let mut headers = Vec::new();
        let echoed = allowed != "*";
        push(&mut headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, &allowed);
        if echoed {
            push(&mut headers, header::VARY, "Origin");
        }
        if self.credentials {
            push(&mut headers, header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
        }
        if !self.exposed_headers.is_empty() {
            push(
                &mut headers,
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                &self.exposed_headers.join(", "),
            );
        }

        if preflight {
            push(
                &mut headers,
                header::ACCESS_CONTROL_ALLOW_METHODS,
                &join_methods(&self.methods),
            );
            if self.allowed_headers.is_empty() {
                if let Some(requested) = requested_headers {
                    push(&mut headers, header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
                }
            } else {
                push(
                    &mut headers,
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    &self.allowed_headers.join(", "),
                );
            }
            if let Some(max_age) = self.max_age {
                push(
                    &mut headers,
                    header::ACCESS_CONTROL_MAX_AGE,
                    &max_age.to_string(),
                );
            }
        }
        headers
    }
}

/// Comma-separated list of verbs
pub fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn push(headers: &mut Vec<(HeaderName, HeaderValue)>, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => headers.push((name, value)),
        Err(_) => crate::logger::log_warning(&format!("Skipping invalid {name} value: {value}")),
    }
}

/// Match a value against a pattern where `*` stands for any run of characters
///
/// - `https://*.example.com` matches `https://api.example.com`
/// - `http://localhost:*` matches `http://localhost:3000`
pub fn match_wildcard(pattern: &str, value: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return pattern == value;
    };
    let Some(mut rest) = value.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No `*` at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
