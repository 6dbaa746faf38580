//! Request dispatcher
//!
//! Binds request data to a matched handler's parameters, invokes the handler
//! on its controller instance and returns the result together with the
//! response metadata declared on the route.
//!
//! Failures are classified here, once: binding problems are client errors,
//! typed HTTP errors keep their status and payload, anything else (including
//! a panic inside the handler) is an internal error.

mod body;
mod fields;
mod multipart;
mod params;
mod query;
mod reply;

pub use body::{decode, parse_body, ContentKind, ParsedBody};
pub use fields::{from_fields, from_value, FieldMap, FieldValue};
pub use multipart::{boundary, parse_multipart};
pub use params::{extract_path_param, Args, BoundValue, ParamBinding, ParamSource, PathScalar};
pub use query::{parse_pairs, parse_query};
pub use reply::{Json, Reply, Responder};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, StatusCode};

use crate::container::{ApplicationContext, Instance};
use crate::error::{DispatchError, HandlerError};
use crate::routing::HandlerDescriptor;

/// Type-erased handler: controller instance + bound arguments to a reply
pub type Invoker = Arc<
    dyn Fn(Instance, Args) -> BoxFuture<'static, Result<Reply, HandlerError>> + Send + Sync,
>;

/// Buffered request, as seen by parameter bindings
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestData {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Successful dispatch result
#[derive(Debug)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    pub reply: Reply,
    /// Static headers declared on the route
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

/// Bind, invoke and shape the result of one matched route
pub async fn dispatch(
    context: &ApplicationContext,
    handler: &HandlerDescriptor,
    request: &RequestData,
) -> Result<DispatchOutcome, DispatchError> {
    let instance = context
        .instance(handler.controller)
        .ok_or(DispatchError::ControllerMissing(handler.controller_name))?;

    let values = handler
        .params
        .iter()
        .map(|param| param.bind(request))
        .collect::<Result<Vec<_>, _>>()?;

    let invoker = Arc::clone(&handler.invoker);
    let args = Args::new(values);
    let reply = AssertUnwindSafe(async move { invoker(instance, args).await })
        .catch_unwind()
        .await
        .map_err(|_| DispatchError::Panicked)?
        .map_err(HandlerError::classify)?;

    let headers = handler.headers.clone();
    if let Some(redirect) = &handler.redirect {
        let target = reply
            .redirect_target()
            .unwrap_or_else(|| redirect.target())
            .to_string();
        return Ok(DispatchOutcome {
            status: redirect.status(),
            reply: Reply::Redirect(target),
            headers,
        });
    }

    let status = match reply {
        Reply::Redirect(_) => StatusCode::FOUND,
        _ => handler.status,
    };
    Ok(DispatchOutcome {
        status,
        reply,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{resolve, Controller, Injectable, Injector, ModuleDescriptor, Role};
    use crate::error::{BindError, BootError, HttpError};
    use crate::routing::{build_route_trie, RouteDef, RouteTrie};
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Deserialize)]
    struct Greeting {
        name: String,
    }

    struct Hello {
        punctuation: &'static str,
    }

    impl Hello {
        async fn greet(self: Arc<Self>, mut args: Args) -> Result<String, HandlerError> {
            let id: i64 = args.take()?;
            let greeting: Greeting = args.take()?;
            Ok(format!("hello {} #{id}{}", greeting.name, self.punctuation))
        }
    }

    impl Injectable for Hello {
        const ROLE: Role = Role::Controller;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self { punctuation: "!" })
        }
    }

    impl Controller for Hello {
        fn base_path() -> &'static str {
            "/hello"
        }

        fn routes() -> Vec<RouteDef<Self>> {
            vec![
                RouteDef::post("/id/*")
                    .path::<i64>("id")
                    .body::<Greeting>()
                    .status(201)
                    .header("X-Greeter", "rivet")
                    .handle(Self::greet),
                RouteDef::get("/moved")
                    .redirect("/hello/new")
                    .handle(|_this: Arc<Self>, _args: Args| async { Ok::<_, HandlerError>(()) }),
                RouteDef::get("/moved-elsewhere")
                    .redirect_with("/hello/new", 301)
                    .handle(|_this: Arc<Self>, _args: Args| async {
                        Ok::<_, HandlerError>(json!({"url": "/hello/elsewhere"}))
                    }),
                RouteDef::get("/runtime-redirect").handle(|_this: Arc<Self>, _args: Args| async {
                    Ok::<_, HandlerError>(Reply::redirect("/hello/runtime"))
                }),
                RouteDef::get("/conflict").handle(|_this: Arc<Self>, _args: Args| async {
                    Err::<Value, HandlerError>(HttpError::conflict("taken").into())
                }),
                RouteDef::get("/panic").handle(|_this: Arc<Self>, _args: Args| async {
                    if true {
                        panic!("boom");
                    }
                    Ok::<_, HandlerError>(())
                }),
            ]
        }
    }

    fn boot() -> (ApplicationContext, RouteTrie<HandlerDescriptor>) {
        let resolution = resolve(&ModuleDescriptor::new("Hello").controller::<Hello>()).unwrap();
        let trie = build_route_trie(resolution.controllers).unwrap();
        (resolution.context, trie)
    }

    fn request(method: Method, path: &str, content_type: Option<&str>, body: &str) -> RequestData {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        }
        RequestData {
            method,
            path: path.to_string(),
            query: None,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    async fn run(request: &RequestData) -> Result<DispatchOutcome, DispatchError> {
        let (context, trie) = boot();
        let handler = trie.lookup(&request.method, &request.path).unwrap();
        dispatch(&context, handler, request).await
    }

    #[tokio::test]
    async fn test_binds_in_declaration_order() {
        let req = request(
            Method::POST,
            "/hello/id/42",
            Some("application/json"),
            r#"{"name":"rivet"}"#,
        );
        let outcome = run(&req).await.unwrap();

        assert_eq!(outcome.status, StatusCode::CREATED);
        assert_eq!(outcome.reply, Reply::Text("hello rivet #42!".to_string()));
        assert_eq!(outcome.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_bind_failure_is_client_error() {
        let req = request(Method::POST, "/hello/id/42", Some("application/xml"), "<x/>");
        let err = run(&req).await.unwrap_err();
        assert!(matches!(err, DispatchError::Bind(BindError::UnsupportedContentType(_))));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let req = request(Method::POST, "/hello/id/abc", Some("application/json"), "{}");
        let err = run(&req).await.unwrap_err();
        assert!(matches!(err, DispatchError::Bind(BindError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_static_redirect() {
        let outcome = run(&request(Method::GET, "/hello/moved", None, "")).await.unwrap();
        assert_eq!(outcome.status, StatusCode::FOUND);
        assert_eq!(outcome.reply, Reply::Redirect("/hello/new".to_string()));
    }

    #[tokio::test]
    async fn test_handler_overrides_redirect_target() {
        let outcome = run(&request(Method::GET, "/hello/moved-elsewhere", None, ""))
            .await
            .unwrap();
        assert_eq!(outcome.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(outcome.reply, Reply::Redirect("/hello/elsewhere".to_string()));
    }

    #[tokio::test]
    async fn test_runtime_redirect_defaults_to_found() {
        let outcome = run(&request(Method::GET, "/hello/runtime-redirect", None, ""))
            .await
            .unwrap();
        assert_eq!(outcome.status, StatusCode::FOUND);
        assert_eq!(outcome.reply.redirect_target(), Some("/hello/runtime"));
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let err = run(&request(Method::GET, "/hello/conflict", None, ""))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.payload()["message"], "taken");
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let err = run(&request(Method::GET, "/hello/panic", None, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Panicked));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_controller_instance() {
        let (_, trie) = boot();
        let handler = trie.lookup(&Method::GET, "/hello/moved").unwrap();
        let req = request(Method::GET, "/hello/moved", None, "");

        let err = dispatch(&ApplicationContext::new(), handler, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ControllerMissing(_)));
    }
}
