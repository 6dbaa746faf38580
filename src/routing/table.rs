//! Route table builder
//!
//! Turns the route declarations of every registered controller into
//! [`HandlerDescriptor`]s and registers them into a [`RouteTrie`].

use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, StatusCode};

use super::descriptor::{HandlerDescriptor, RedirectDescriptor};
use super::route::{ControllerRoutes, RouteMeta};
use super::trie::{segments, RouteTrie};
use crate::error::BootError;
use crate::logger;

/// Build the route trie from controller declarations
pub fn build_route_trie(
    controllers: Vec<ControllerRoutes>,
) -> Result<RouteTrie<HandlerDescriptor>, BootError> {
    let mut trie = RouteTrie::new();
    for controller in controllers {
        let ControllerRoutes {
            controller: id,
            name,
            base_path,
            routes,
        } = controller;

        for meta in routes {
            let descriptor = describe(id, name, base_path, meta)?;
            logger::log_mapped_route(descriptor.verb.as_str(), &descriptor.path);
            trie.register(descriptor.verb.clone(), &descriptor.path.clone(), descriptor)?;
        }
    }
    Ok(trie)
}

/// Register a static redirect rule, consulted when no handler matches
pub fn add_redirect_rule(
    trie: &mut RouteTrie<HandlerDescriptor>,
    verb: &str,
    from: &str,
    to: &str,
    status: u16,
) -> Result<(), BootError> {
    let verb = Method::from_bytes(verb.to_ascii_uppercase().as_bytes()).map_err(|e| {
        BootError::InvalidRoute {
            path: from.to_string(),
            reason: format!("invalid method '{verb}': {e}"),
        }
    })?;
    let status = redirect_status(from, status)?;
    logger::log_mapped_redirect(verb.as_str(), from, to, status.as_u16());
    trie.register_redirect(verb, from, RedirectDescriptor::with_status(to, status))
}

/// Join a controller base path and a route path into a normalised template
pub fn join_path(base: &str, path: &str) -> String {
    let joined: Vec<&str> = segments(base).into_iter().chain(segments(path)).collect();
    format!("/{}", joined.join("/"))
}

fn describe(
    controller: std::any::TypeId,
    controller_name: &'static str,
    base_path: &str,
    meta: RouteMeta,
) -> Result<HandlerDescriptor, BootError> {
    let path = join_path(base_path, &meta.path);
    let invalid = |reason: String| BootError::InvalidRoute {
        path: path.clone(),
        reason,
    };

    let invoker = meta
        .invoker
        .ok_or_else(|| invalid(format!("no handler declared in {controller_name}")))?;
    let status = StatusCode::from_u16(meta.status)
        .map_err(|_| invalid(format!("invalid status code {}", meta.status)))?;
    let redirect = match meta.redirect {
        Some((target, code)) => Some(RedirectDescriptor::with_status(
            target,
            redirect_status(&path, code)?,
        )),
        None => None,
    };
    let headers = meta
        .headers
        .into_iter()
        .map(|(name, value)| {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| invalid(format!("invalid header name '{name}'")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| invalid(format!("invalid value for header '{name}'")))?;
            Ok((header_name, header_value))
        })
        .collect::<Result<Vec<_>, BootError>>()?;

    Ok(HandlerDescriptor {
        verb: meta.verb,
        path,
        controller,
        controller_name,
        status,
        redirect,
        headers,
        params: meta.params,
        invoker,
    })
}

fn redirect_status(path: &str, code: u16) -> Result<StatusCode, BootError> {
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_redirection() => Ok(status),
        _ => Err(BootError::InvalidRoute {
            path: path.to_string(),
            reason: format!("{code} is not a redirect status"),
        }),
    }
}
