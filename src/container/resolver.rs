//! Module graph resolver
//!
//! Walks the module tree depth-first, imports before the importing module,
//! builds every provider then every controller through constructor
//! injection, and finishes with the field-injection pass. Any failure aborts
//! the whole boot.

use std::collections::HashMap;

use super::context::ApplicationContext;
use super::module::{ComponentDescriptor, ModuleDescriptor, ModuleSignature};
use crate::error::BootError;
use crate::logger;
use crate::routing::ControllerRoutes;

/// Result of a successful resolution
#[derive(Debug)]
pub struct Resolution {
    pub context: ApplicationContext,
    /// Route declarations of every registered controller, in registration order
    pub controllers: Vec<ControllerRoutes>,
}

#[derive(Default)]
struct Resolver {
    context: ApplicationContext,
    controllers: Vec<ControllerRoutes>,
    /// Fully processed modules by name
    done: HashMap<String, ModuleSignature>,
    /// Modules currently being processed, root first
    visiting: Vec<String>,
}

/// Resolve a root module into a fully wired application context
pub fn resolve(root: &ModuleDescriptor) -> Result<Resolution, BootError> {
    let mut resolver = Resolver::default();
    resolver.visit(root)?;
    resolver.context.inject_all()?;
    logger::log_debug(&format!(
        "Application context ready with {} instances",
        resolver.context.len()
    ));

    Ok(Resolution {
        context: resolver.context,
        controllers: resolver.controllers,
    })
}

impl Resolver {
    fn visit(&mut self, module: &ModuleDescriptor) -> Result<(), BootError> {
        let name = module.name();
        if let Some(seen) = self.done.get(name) {
            if *seen != module.signature() {
                return Err(BootError::DuplicateModule {
                    name: name.to_string(),
                });
            }
            logger::log_debug(&format!("Module {name} already resolved"));
            return Ok(());
        }
        if self.visiting.iter().any(|m| m == name) {
            let mut path = self.visiting.clone();
            path.push(name.to_string());
            return Err(BootError::CyclicImport {
                module: name.to_string(),
                path: path.join(" -> "),
            });
        }

        self.visiting.push(name.to_string());
        for import in &module.imports {
            self.visit(import)?;
        }

        module.validate()?;
        logger::log_debug(&format!("Resolving module {name}"));
        for provider in &module.providers {
            self.register(provider)?;
        }
        for controller in &module.controllers {
            if self.register(controller)? {
                if let Some(routes) = controller.routes {
                    self.controllers.push(routes());
                }
            }
        }

        self.visiting.pop();
        self.done.insert(name.to_string(), module.signature());
        Ok(())
    }

    fn register(&mut self, component: &ComponentDescriptor) -> Result<bool, BootError> {
        let added = component.register(&mut self.context)?;
        if added {
            logger::log_debug(&format!(
                "Registered {} {}",
                component.role, component.type_name
            ));
        } else {
            logger::log_debug(&format!(
                "{} already registered, reusing existing instance",
                component.type_name
            ));
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Controller, Inject, Injectable, Injector, Role};
    use crate::routing::RouteDef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Clock;

    impl Injectable for Clock {
        const ROLE: Role = Role::Service;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self)
        }
    }

    struct Calendar {
        clock: Arc<Clock>,
    }

    impl Injectable for Calendar {
        const ROLE: Role = Role::Service;

        fn construct(injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self {
                clock: injector.get()?,
            })
        }
    }

    struct Auditor {
        calendar: Inject<Calendar>,
    }

    impl Injectable for Auditor {
        const ROLE: Role = Role::Service;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self {
                calendar: Inject::new(),
            })
        }

        fn inject(&self, injector: &Injector<'_>) -> Result<(), BootError> {
            self.calendar.fill(injector)
        }
    }

    struct Unmarked;

    impl Injectable for Unmarked {
        const ROLE: Role = Role::Plain;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self)
        }
    }

    struct CalendarController;

    impl Injectable for CalendarController {
        const ROLE: Role = Role::Controller;

        fn construct(injector: &Injector<'_>) -> Result<Self, BootError> {
            injector.get::<Calendar>()?;
            Ok(Self)
        }
    }

    impl Controller for CalendarController {
        fn routes() -> Vec<RouteDef<Self>> {
            Vec::new()
        }
    }

    fn clock_module() -> ModuleDescriptor {
        ModuleDescriptor::new("ClockModule").provider::<Clock>()
    }

    #[test]
    fn test_imports_resolve_before_providers() {
        let root = ModuleDescriptor::new("Root")
            .import(clock_module())
            .provider::<Calendar>()
            .controller::<CalendarController>();

        let resolution = resolve(&root).unwrap();
        assert_eq!(resolution.context.len(), 3);
        assert_eq!(resolution.controllers.len(), 1);

        let calendar = resolution.context.get::<Calendar>().unwrap();
        let clock = resolution.context.get::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&calendar.clock, &clock));
    }

    #[test]
    fn test_missing_dependency_names_both_types() {
        let root = ModuleDescriptor::new("Root").provider::<Calendar>();

        match resolve(&root).unwrap_err() {
            BootError::MissingDependency {
                dependency,
                requester,
            } => {
                assert!(dependency.ends_with("Clock"));
                assert!(requester.ends_with("Calendar"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    static TICKER_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Ticker;

    impl Injectable for Ticker {
        const ROLE: Role = Role::Service;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            TICKER_BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }
    }

    #[test]
    fn test_diamond_import_builds_provider_once() {
        let left = ModuleDescriptor::new("Left").provider::<Ticker>();
        let right = ModuleDescriptor::new("Right").provider::<Ticker>();
        let root = ModuleDescriptor::new("Root")
            .import(left)
            .import(right)
            .provider::<Ticker>();

        let resolution = resolve(&root).unwrap();
        assert_eq!(resolution.context.len(), 1);
        assert_eq!(TICKER_BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_field_injection_sees_later_registrations() {
        let root = ModuleDescriptor::new("Root")
            .provider::<Auditor>()
            .import(clock_module())
            .provider::<Calendar>();

        let resolution = resolve(&root).unwrap();
        let auditor = resolution.context.get::<Auditor>().unwrap();
        assert!(auditor.calendar.is_filled());
    }

    #[test]
    fn test_role_is_checked_before_instantiation() {
        let root = ModuleDescriptor::new("Root")
            .provider::<Unmarked>()
            .provider::<Clock>();

        match resolve(&root).unwrap_err() {
            BootError::MissingRole { type_name, expected } => {
                assert!(type_name.ends_with("Unmarked"));
                assert_eq!(expected, Role::Service);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_controller_listed_as_provider_is_rejected() {
        let root = ModuleDescriptor::new("Root")
            .import(clock_module())
            .provider::<Calendar>()
            .provider::<CalendarController>();

        assert!(matches!(
            resolve(&root).unwrap_err(),
            BootError::MissingRole { expected: Role::Service, .. }
        ));
    }

    struct Agenda;

    impl Injectable for Agenda {
        const ROLE: Role = Role::Controller;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self)
        }
    }

    impl Controller for Agenda {
        fn routes() -> Vec<RouteDef<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_same_name_with_other_contents_is_rejected() {
        let root = ModuleDescriptor::new("Root")
            .import(ModuleDescriptor::new("Feature").provider::<Clock>())
            .import(ModuleDescriptor::new("Feature").controller::<Agenda>());

        match resolve(&root).unwrap_err() {
            BootError::DuplicateModule { name } => assert_eq!(name, "Feature"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_module_imported_twice_is_shared() {
        let root = ModuleDescriptor::new("Root")
            .import(clock_module())
            .import(ModuleDescriptor::new("Agenda").import(clock_module()).controller::<Agenda>());

        let resolution = resolve(&root).unwrap();
        assert_eq!(resolution.context.len(), 2);
        assert_eq!(resolution.controllers.len(), 1);
    }

    #[test]
    fn test_import_cycle_is_detected() {
        let inner = ModuleDescriptor::new("A").import(ModuleDescriptor::new("B").import(
            ModuleDescriptor::new("A"),
        ));
        let root = ModuleDescriptor::new("Root").import(inner);

        match resolve(&root).unwrap_err() {
            BootError::CyclicImport { module, path } => {
                assert_eq!(module, "A");
                assert_eq!(path, "Root -> A -> B -> A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
