//! Dependency container
//!
//! Components declare themselves through [`Injectable`], modules group them
//! through [`ModuleDescriptor`], and [`resolve`] turns a root module into a
//! wired [`ApplicationContext`].

mod component;
mod context;
mod module;
mod resolver;

pub use component::{Controller, Exports, Injectable, Role};
pub use context::{ApplicationContext, Inject, Injector};
pub use module::{ComponentDescriptor, ModuleDescriptor};
pub use resolver::{resolve, Resolution};

pub(crate) use context::Instance;
