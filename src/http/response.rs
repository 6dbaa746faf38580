//! HTTP response building module
//!
//! Provides builders for the responses the front end emits, decoupled from
//! routing and dispatch.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde_json::Value;

/// Plain-text body of every 404
pub const NOT_FOUND_MESSAGE: &str =
    "The requested page could not be found. Please check the URL and try again.";

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
}

/// Build 413 Payload Too Large response
pub fn build_413_response(limit: u64) -> Response<Full<Bytes>> {
    let payload = crate::error::error_envelope(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Invalid request: request body exceeds {limit} bytes"),
    );
    build_json_response(StatusCode::PAYLOAD_TOO_LARGE, &payload)
}

/// Build a `text/plain` response
pub fn build_text_response(status: StatusCode, text: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(text)))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build a pretty-printed `application/json` response
pub fn build_json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec_pretty(value) {
        Ok(body) => body,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize {status} response: {e}"));
            return fallback(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build a redirect response carrying a `Location` header
pub fn build_redirect_response(status: StatusCode, target: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Location", target)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("Redirecting to {target}"))))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build a response without body
pub fn build_empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build an OPTIONS preflight response advertising the allowed verbs
pub fn build_options_response(status: StatusCode, allow: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Allow", allow)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Append extra headers (route-declared or CORS) to a built response
pub fn append_headers(response: &mut Response<Full<Bytes>>, headers: &[(HeaderName, HeaderValue)]) {
    let target = response.headers_mut();
    for (name, value) in headers {
        target.append(name.clone(), value.clone());
    }
}

fn fallback(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_404_is_plain_text() {
        let response = build_404_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(response).await, NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_json_is_pretty_printed() {
        let response = build_json_response(StatusCode::CREATED, &json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_string(response).await, "{\n  \"id\": 1\n}");
    }

    #[tokio::test]
    async fn test_redirect_response() {
        let response = build_redirect_response(StatusCode::MOVED_PERMANENTLY, "/new");
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/new");
        assert_eq!(body_string(response).await, "Redirecting to /new");
    }

    #[test]
    fn test_invalid_location_falls_back() {
        let response = build_redirect_response(StatusCode::FOUND, "/bad\nheader");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(response.headers().get("location").is_none());
    }

    #[test]
    fn test_options_response() {
        let response = build_options_response(StatusCode::NO_CONTENT, "GET, POST");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["allow"], "GET, POST");
    }

    #[tokio::test]
    async fn test_413_envelope() {
        let response = build_413_response(16);
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let value: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(value["status"], 413);
    }
}
