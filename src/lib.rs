//! rivet: a small module-based web framework
//!
//! An application is a tree of [`ModuleDescriptor`]s. Booting it resolves the
//! module graph into an [`ApplicationContext`] of singletons, turns every
//! controller's declared routes into a [`RouteTrie`], and serves requests by
//! looking up a handler, binding request data to its parameters and writing
//! back whatever it returns.
//!
//! ```ignore
//! let root = ModuleDescriptor::new("AppModule")
//!     .import(storage::memory_module())
//!     .provider::<PostService>()
//!     .controller::<PostController>();
//! Application::bootstrap(&root, Config::load_from("config")?)?.listen().await?;
//! ```

pub mod app;
pub mod config;
pub mod container;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;
pub mod storage;

pub use app::{Application, ApplicationBuilder};
pub use config::Config;
pub use container::{
    ApplicationContext, Controller, Exports, Inject, Injectable, Injector, ModuleDescriptor, Role,
};
pub use dispatch::{Args, Json, Reply};
pub use error::{BootError, HandlerError, HttpError};
pub use routing::{RouteDef, RouteTrie};
