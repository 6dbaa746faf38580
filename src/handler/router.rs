//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: CORS, preflight, body-size guard,
//! route lookup, dispatch and the access log line.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_LENGTH, ORIGIN, SERVER,
};
use hyper::{Method, Request, Response, StatusCode};

use crate::app::Application;
use crate::dispatch::{self, DispatchOutcome, Reply, RequestData};
use crate::error::{BindError, DispatchError};
use crate::http::{self, cors};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    app: Arc<Application>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(ToString::to_string);
    let is_head = method == Method::HEAD;
    let preflight = method == Method::OPTIONS;

    // 1. CORS headers, computed up front so every outcome carries them
    let cors_headers = app.cors().map_or_else(Vec::new, |policy| {
        policy.headers(
            header_str(&parts.headers, &ORIGIN),
            header_str(&parts.headers, &ACCESS_CONTROL_REQUEST_HEADERS),
            preflight,
        )
    });

    // 2. Preflight never reaches the router
    let (mut response, error) = if preflight {
        (preflight_response(&app), None)
    } else {
        let request = RequestData {
            method: if is_head { Method::GET } else { method.clone() },
            path: path.clone(),
            query: query.clone(),
            headers: parts.headers,
            body: Bytes::new(),
        };
        route_request(&app, request, body).await
    };

    http::append_headers(&mut response, &cors_headers);
    if let Ok(server) = HeaderValue::from_str(&app.config().http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    let body_bytes = if is_head {
        *response.body_mut() = Full::new(Bytes::new());
        0
    } else {
        response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    };

    let logging = &app.config().logging;
    if logging.access_log {
        let mut entry = AccessLogEntry::new(remote_addr.to_string(), method.to_string(), path);
        entry.query = query;
        entry.status = response.status().as_u16();
        entry.body_bytes = body_bytes;
        entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry.error = error;
        logger::log_access(&entry, &logging.access_log_format);
    }

    Ok(response)
}

/// Answer an OPTIONS request with the allowed verbs
fn preflight_response(app: &Application) -> Response<Full<Bytes>> {
    match app.cors() {
        Some(policy) => http::build_options_response(policy.status(), &policy.allow_header()),
        None => http::build_options_response(
            StatusCode::NO_CONTENT,
            &cors::join_methods(&cors::DEFAULT_METHODS),
        ),
    }
}

/// Route request to its handler, falling back to redirect rules and 404.
///
/// Returns the response and, for failures, a description for the access log.
async fn route_request<B>(
    app: &Application,
    mut request: RequestData,
    body: B,
) -> (Response<Full<Bytes>>, Option<String>)
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let max_body_size = app.config().http.max_body_size;
    if let Some(resp) = check_body_size(&request.headers, max_body_size) {
        return (resp, Some(format!("request body exceeds {max_body_size} bytes")));
    }

    let Some(handler) = app.trie().lookup(&request.method, &request.path) else {
        if let Some(redirect) = app.trie().find_redirect(&request.method, &request.path) {
            let resp = http::build_redirect_response(redirect.status(), redirect.target());
            return (resp, None);
        }
        return (http::build_404_response(), Some("Not Found".to_string()));
    };

    request.body = match read_body(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(err) => return render_error(&DispatchError::Bind(err)),
    };

    match dispatch::dispatch(app.context(), handler, &request).await {
        Ok(outcome) => (render_outcome(outcome), None),
        Err(err) => render_error(&err),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(max_body_size))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Buffer the request body, enforcing the size limit while reading
async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, BindError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let capped = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, capped).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BindError::PayloadTooLarge { limit })
        }
        Err(err) => Err(BindError::BodyRead(err.to_string())),
    }
}

fn render_outcome(outcome: DispatchOutcome) -> Response<Full<Bytes>> {
    let DispatchOutcome {
        status,
        reply,
        headers,
    } = outcome;

    let mut response = match reply {
        Reply::Text(text) => http::build_text_response(status, text),
        Reply::Json(value) => http::build_json_response(status, &value),
        Reply::Redirect(target) => http::build_redirect_response(status, &target),
        Reply::Empty => http::build_empty_response(status),
    };
    http::append_headers(&mut response, &headers);
    response
}

fn render_error(err: &DispatchError) -> (Response<Full<Bytes>>, Option<String>) {
    let status = err.status();
    if status.is_server_error() {
        logger::log_error(&format!("Request failed: {err}"));
    }
    (
        http::build_json_response(status, &err.payload()),
        Some(err.to_string()),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &hyper::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
