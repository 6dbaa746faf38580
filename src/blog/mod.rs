//! Demo blog application

mod post;

use std::sync::Arc;

use rivet::dispatch::Args;
use rivet::storage::memory_module;
use rivet::{BootError, Controller, HandlerError, Inject, Injectable, Injector, ModuleDescriptor};
use rivet::{RouteDef, Role};

pub struct AppService;

impl AppService {
    pub fn hello(&self) -> String {
        "Hello World!".to_string()
    }
}

impl Injectable for AppService {
    const ROLE: Role = Role::Service;

    fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
        Ok(Self)
    }
}

/// Filled through field injection rather than its constructor
pub struct AppController {
    app_service: Inject<AppService>,
}

impl AppController {
    async fn hello(self: Arc<Self>, _args: Args) -> Result<String, HandlerError> {
        self.app_service
            .get()
            .map(|service| service.hello())
            .ok_or_else(|| HandlerError::unhandled("AppService was not injected"))
    }
}

impl Injectable for AppController {
    const ROLE: Role = Role::Controller;

    fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
        Ok(Self {
            app_service: Inject::new(),
        })
    }

    fn inject(&self, injector: &Injector<'_>) -> Result<(), BootError> {
        self.app_service.fill(injector)
    }
}

impl Controller for AppController {
    fn routes() -> Vec<RouteDef<Self>> {
        vec![RouteDef::get("/").handle(Self::hello)]
    }
}

pub fn app_module() -> ModuleDescriptor {
    ModuleDescriptor::new("AppModule")
        .import(memory_module())
        .import(post::post_module())
        .provider::<AppService>()
        .controller::<AppController>()
}
