//! Module declarations
//!
//! A module lists the modules it imports, the services it provides and the
//! controllers it exposes. Declarations are plain data built once in `main`.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use super::component::{Capability, Controller, Exports, Injectable, Role};
use super::context::{ApplicationContext, Injector};
use crate::error::BootError;
use crate::routing::ControllerRoutes;

type RegisterFn =
    Box<dyn Fn(&mut ApplicationContext) -> Result<bool, BootError> + Send + Sync>;

/// One provider or controller entry of a module
pub struct ComponentDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) role: Role,
    register: RegisterFn,
    pub(crate) routes: Option<fn() -> ControllerRoutes>,
}

impl ComponentDescriptor {
    fn constructed<T: Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            role: T::ROLE,
            register: Box::new(|context: &mut ApplicationContext| {
                let instance = {
                    let injector = Injector::new(context, type_name::<T>());
                    Arc::new(T::construct(&injector)?)
                };
                Ok(insert_with_exports(context, instance))
            }),
            routes: None,
        }
    }

    fn prebuilt<T: Injectable>(instance: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            role: T::ROLE,
            register: Box::new(move |context: &mut ApplicationContext| {
                Ok(insert_with_exports(context, Arc::clone(&instance)))
            }),
            routes: None,
        }
    }

    /// Build the instance and register it. Returns false if the type was already present.
    pub(crate) fn register(&self, context: &mut ApplicationContext) -> Result<bool, BootError> {
        if context.contains(self.type_id) {
            return Ok(false);
        }
        (self.register)(context)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn insert_with_exports<T: Injectable>(context: &mut ApplicationContext, instance: Arc<T>) -> bool {
    let mut exports = Exports::default();
    T::exports(&instance, &mut exports);
    let capabilities: Vec<Capability> = exports.into_entries();
    context.insert(instance, capabilities)
}

fn controller_routes<C: Controller>() -> ControllerRoutes {
    ControllerRoutes::of::<C>()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleSignature {
    imports: Vec<String>,
    components: Vec<TypeId>,
}

/// Declarative module: imports, providers and controllers
#[derive(Debug)]
pub struct ModuleDescriptor {
    name: String,
    pub(crate) imports: Vec<ModuleDescriptor>,
    pub(crate) providers: Vec<ComponentDescriptor>,
    pub(crate) controllers: Vec<ComponentDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            imports: Vec::new(),
            providers: Vec::new(),
            controllers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn import(mut self, module: Self) -> Self {
        self.imports.push(module);
        self
    }

    /// Declare a provider built by the container through its injecting constructor
    #[must_use]
    pub fn provider<T: Injectable>(mut self) -> Self {
        self.providers.push(ComponentDescriptor::constructed::<T>());
        self
    }

    /// Declare a provider whose instance is built up front (e.g. from configuration)
    #[must_use]
    pub fn value<T: Injectable>(mut self, instance: T) -> Self {
        self.providers
            .push(ComponentDescriptor::prebuilt(Arc::new(instance)));
        self
    }

    #[must_use]
    pub fn controller<C: Controller>(mut self) -> Self {
        let mut descriptor = ComponentDescriptor::constructed::<C>();
        descriptor.routes = Some(controller_routes::<C>);
        self.controllers.push(descriptor);
        self
    }

    /// What the module declares: imported module names, then provider and
    /// controller types in declaration order. Two declarations sharing a name
    /// must agree on it.
    pub(crate) fn signature(&self) -> ModuleSignature {
        ModuleSignature {
            imports: self.imports.iter().map(|m| m.name.clone()).collect(),
            components: self
                .providers
                .iter()
                .chain(&self.controllers)
                .map(|c| c.type_id)
                .collect(),
        }
    }

    /// Check role markers of every declared component
    pub(crate) fn validate(&self) -> Result<(), BootError> {
        let providers = self.providers.iter().map(|p| (p, Role::Service));
        let controllers = self.controllers.iter().map(|c| (c, Role::Controller));
        for (component, expected) in providers.chain(controllers) {
            if component.role != expected {
                return Err(BootError::MissingRole {
                    type_name: component.type_name,
                    expected,
                });
            }
        }
        Ok(())
    }
}
