//! Routing module
//!
//! Provides verb-scoped path routing:
//! - Trie keyed by path segment, with `*` wildcard segments
//! - Declarative per-controller route definitions
//! - Route table construction and static redirect rules

mod descriptor;
mod route;
mod table;
mod trie;

pub use descriptor::{HandlerDescriptor, RedirectDescriptor};
pub use route::{ControllerRoutes, RouteDef, RouteMeta};
pub use table::{add_redirect_rule, build_route_trie, join_path};
pub use trie::RouteTrie;
