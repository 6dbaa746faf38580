//! Application context
//!
//! Maps a concrete type to its singleton instance. It only grows while the
//! module graph is resolved and is read-only once the server starts, so
//! request handlers share it without locking.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::component::{Capability, Injectable, Role};
use crate::error::BootError;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
type InjectFn = fn(&(dyn Any + Send + Sync), &Injector<'_>) -> Result<(), BootError>;

struct Entry {
    type_name: &'static str,
    role: Role,
    instance: Instance,
    inject: InjectFn,
}

/// Registry of live singletons, keyed by concrete type
#[derive(Default)]
pub struct ApplicationContext {
    entries: HashMap<TypeId, Entry>,
    /// Registration order; drives the field-injection pass
    order: Vec<TypeId>,
    /// Exported capabilities in registration order
    capabilities: Vec<Capability>,
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Look up a singleton by its concrete type
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(&entry.instance).downcast::<T>().ok())
    }

    /// Look up the first instance that exported capability `C`
    pub fn capability<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        let id = TypeId::of::<C>();
        self.capabilities
            .iter()
            .filter(|cap| cap.id == id)
            .find_map(Capability::downcast::<C>)
    }

    /// Type-erased lookup, used by the dispatcher
    pub(crate) fn instance(&self, id: TypeId) -> Option<Instance> {
        self.entries.get(&id).map(|entry| Arc::clone(&entry.instance))
    }

    /// Registered type names with their role, in registration order
    pub fn registrations(&self) -> impl Iterator<Item = (&'static str, Role)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| (entry.type_name, entry.role))
    }

    /// Insert a freshly built instance. Returns false if the type is already present.
    pub(crate) fn insert<T: Injectable>(
        &mut self,
        instance: Arc<T>,
        capabilities: Vec<Capability>,
    ) -> bool {
        let id = TypeId::of::<T>();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(
            id,
            Entry {
                type_name: type_name::<T>(),
                role: T::ROLE,
                instance,
                inject: inject_erased::<T>,
            },
        );
        self.order.push(id);
        self.capabilities.extend(capabilities);
        true
    }

    /// Second wiring pass: let every instance fill its late-bound fields
    pub(crate) fn inject_all(&self) -> Result<(), BootError> {
        for id in &self.order {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            let injector = Injector::new(self, entry.type_name);
            (entry.inject)(entry.instance.as_ref(), &injector)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.registrations().map(|(name, _)| name))
            .finish()
    }
}

fn inject_erased<T: Injectable>(
    instance: &(dyn Any + Send + Sync),
    injector: &Injector<'_>,
) -> Result<(), BootError> {
    match instance.downcast_ref::<T>() {
        Some(typed) => typed.inject(injector),
        None => Ok(()),
    }
}

/// Dependency lookup on behalf of one requesting type
pub struct Injector<'a> {
    context: &'a ApplicationContext,
    requester: &'static str,
}

impl<'a> Injector<'a> {
    pub(crate) const fn new(context: &'a ApplicationContext, requester: &'static str) -> Self {
        Self { context, requester }
    }

    /// Resolve a concrete dependency
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BootError> {
        self.context
            .get::<T>()
            .ok_or_else(|| self.missing(type_name::<T>()))
    }

    /// Resolve a capability, typically `dyn Trait`
    pub fn capability<C: ?Sized + 'static>(&self) -> Result<Arc<C>, BootError> {
        self.context
            .capability::<C>()
            .ok_or_else(|| self.missing(type_name::<C>()))
    }

    pub const fn requester(&self) -> &'static str {
        self.requester
    }

    pub const fn context(&self) -> &'a ApplicationContext {
        self.context
    }

    const fn missing(&self, dependency: &'static str) -> BootError {
        BootError::MissingDependency {
            dependency,
            requester: self.requester,
        }
    }
}

/// Field filled during the injection pass.
///
/// Construction leaves it empty; `Injectable::inject` fills it from the
/// context. Boot fails if a slot cannot be filled, so handlers can rely on
/// `get` returning `Some` once the server is running.
pub struct Inject<T: ?Sized> {
    slot: OnceLock<Arc<T>>,
}

impl<T: ?Sized> Inject<T> {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.slot.get()
    }

    pub fn is_filled(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Assign a value; a slot that is already filled keeps its first value
    pub fn set(&self, value: Arc<T>) -> bool {
        self.slot.set(value).is_ok()
    }
}

impl<T: Any + Send + Sync> Inject<T> {
    /// Fill from the concrete instance registered for `T`
    pub fn fill(&self, injector: &Injector<'_>) -> Result<(), BootError> {
        if !self.is_filled() {
            self.set(injector.get::<T>()?);
        }
        Ok(())
    }
}

impl<T: ?Sized + 'static> Inject<T> {
    /// Fill from the first instance exporting capability `T`
    pub fn fill_capability(&self, injector: &Injector<'_>) -> Result<(), BootError> {
        if !self.is_filled() {
            self.set(injector.capability::<T>()?);
        }
        Ok(())
    }
}

impl<T: ?Sized> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("target", &type_name::<T>())
            .field("filled", &self.is_filled())
            .finish()
    }
}
