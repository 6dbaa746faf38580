//! Component declarations
//!
//! Types opt into the container by implementing [`Injectable`]. The role
//! marker replaces annotation scanning: a module checks it before wiring.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::context::Injector;
use crate::error::BootError;
use crate::routing::RouteDef;

/// Role marker carried by every injectable type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Business logic singleton, may be listed as a module provider
    Service,
    /// HTTP-bound singleton, may be listed as a module controller
    Controller,
    /// Carries no marker; cannot be registered by a module
    Plain,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => f.write_str("service"),
            Self::Controller => f.write_str("controller"),
            Self::Plain => f.write_str("plain component"),
        }
    }
}

/// A singleton the container knows how to build and wire.
///
/// `construct` is the injecting constructor: every dependency it asks the
/// [`Injector`] for must already be registered. `inject` runs once every
/// module has been processed, so it may look up instances registered later.
pub trait Injectable: Any + Send + Sync + Sized {
    const ROLE: Role;

    fn construct(injector: &Injector<'_>) -> Result<Self, BootError>;

    fn inject(&self, _injector: &Injector<'_>) -> Result<(), BootError> {
        Ok(())
    }

    /// Register the capabilities (trait objects) this instance can be looked up as
    fn exports(_this: &Arc<Self>, _exports: &mut Exports) {}
}

/// An injectable exposing HTTP handlers
pub trait Controller: Injectable {
    /// Prefix prepended to every route path of this controller
    fn base_path() -> &'static str {
        ""
    }

    fn routes() -> Vec<RouteDef<Self>>;
}

/// Capabilities exported by one instance
#[derive(Default)]
pub struct Exports {
    entries: Vec<Capability>,
}

impl Exports {
    /// Make the instance resolvable as `C`, typically a `dyn Trait`
    pub fn export<C>(&mut self, capability: Arc<C>)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.entries.push(Capability {
            id: TypeId::of::<C>(),
            name: type_name::<C>(),
            value: Box::new(capability),
        });
    }

    pub(crate) fn into_entries(self) -> Vec<Capability> {
        self.entries
    }
}

/// A type-erased `Arc<C>` keyed by `TypeId::of::<C>()`
pub(crate) struct Capability {
    pub id: TypeId,
    pub name: &'static str,
    pub value: Box<dyn Any + Send + Sync>,
}

impl Capability {
    pub fn downcast<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        self.value.downcast_ref::<Arc<C>>().cloned()
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).finish()
    }
}
