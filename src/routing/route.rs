//! Declarative route definitions
//!
//! A controller lists its routes as [`RouteDef`] values: verb, path, success
//! status, optional redirect, static headers, the ordered parameter-binding
//! plan and the handler itself. Everything is checked by the compiler except
//! status codes and header values, which the table builder validates at boot.

use std::any::{type_name, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use hyper::Method;
use serde::de::DeserializeOwned;

use crate::container::{Controller, Instance};
use crate::dispatch::{Args, Invoker, ParamBinding, PathScalar, Responder};
use crate::error::HandlerError;

/// One route of controller `C`
pub struct RouteDef<C> {
    meta: RouteMeta,
    _controller: PhantomData<fn() -> C>,
}

/// Type-erased route definition, consumed by the table builder
pub struct RouteMeta {
    pub(crate) verb: Method,
    pub(crate) path: String,
    pub(crate) status: u16,
    pub(crate) redirect: Option<(String, u16)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) params: Vec<ParamBinding>,
    pub(crate) invoker: Option<Invoker>,
}

impl<C: Controller> RouteDef<C> {
    pub fn new(verb: Method, path: impl Into<String>) -> Self {
        Self {
            meta: RouteMeta {
                verb,
                path: path.into(),
                status: 200,
                redirect: None,
                headers: Vec::new(),
                params: Vec::new(),
                invoker: None,
            },
            _controller: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Status code sent when the handler succeeds
    #[must_use]
    pub fn status(mut self, code: u16) -> Self {
        self.meta.status = code;
        self
    }

    /// Respond with a 302 redirect. The handler may still return its own target.
    #[must_use]
    pub fn redirect(self, url: impl Into<String>) -> Self {
        self.redirect_with(url, 302)
    }

    #[must_use]
    pub fn redirect_with(mut self, url: impl Into<String>, code: u16) -> Self {
        self.meta.redirect = Some((url.into(), code));
        self
    }

    /// Static header added to every successful response of this route
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.headers.push((name.into(), value.into()));
        self
    }

    /// Bind the segment following `/<name>/` in the request path
    #[must_use]
    pub fn path<T: PathScalar>(mut self, name: &str) -> Self {
        self.meta.params.push(ParamBinding::path::<T>(name));
        self
    }

    /// Bind the query string into a DTO
    #[must_use]
    pub fn query<T: DeserializeOwned + Send + 'static>(mut self) -> Self {
        self.meta.params.push(ParamBinding::query::<T>());
        self
    }

    /// Bind the request body into a DTO, according to its Content-Type
    #[must_use]
    pub fn body<T: DeserializeOwned + Send + 'static>(mut self) -> Self {
        self.meta.params.push(ParamBinding::body::<T>());
        self
    }

    /// Handler invoked with the controller instance and the bound arguments,
    /// in the order the bindings were declared
    #[must_use]
    pub fn handle<F, Fut, R>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Responder,
    {
        let invoker: Invoker = Arc::new(move |instance: Instance, args: Args| {
            match instance.downcast::<C>() {
                Ok(controller) => handler(controller, args)
                    .map(|result| result.and_then(R::into_reply))
                    .boxed(),
                Err(_) => futures::future::ready(Err(HandlerError::unhandled(format!(
                    "instance is not a {}",
                    type_name::<C>()
                ))))
                .boxed(),
            }
        });
        self.meta.invoker = Some(invoker);
        self
    }

    pub(crate) fn into_meta(self) -> RouteMeta {
        self.meta
    }
}

impl<C> fmt::Debug for RouteDef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.meta.fmt(f)
    }
}

impl fmt::Debug for RouteMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMeta")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("status", &self.status)
            .field("redirect", &self.redirect)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("has_handler", &self.invoker.is_some())
            .finish()
    }
}

/// Routes declared by one controller type
#[derive(Debug)]
pub struct ControllerRoutes {
    pub(crate) controller: TypeId,
    pub(crate) name: &'static str,
    pub(crate) base_path: &'static str,
    pub(crate) routes: Vec<RouteMeta>,
}

impl ControllerRoutes {
    pub fn of<C: Controller>() -> Self {
        Self {
            controller: TypeId::of::<C>(),
            name: type_name::<C>(),
            base_path: C::base_path(),
            routes: C::routes().into_iter().map(RouteDef::into_meta).collect(),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
