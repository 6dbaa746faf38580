//! Application assembly
//!
//! An [`Application`] owns everything a request needs: the route trie, the
//! wired application context, the CORS policy and the configuration. It is
//! built once before the server starts and only read afterwards, so several
//! independent applications can live in one process.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::{Config, RedirectRule};
use crate::container::{resolve, ApplicationContext, ModuleDescriptor, Resolution};
use crate::error::BootError;
use crate::http::CorsPolicy;
use crate::logger;
use crate::routing::{add_redirect_rule, build_route_trie, HandlerDescriptor, RouteTrie};
use crate::server;

/// A booted application
pub struct Application {
    trie: RouteTrie<HandlerDescriptor>,
    context: ApplicationContext,
    cors: Option<CorsPolicy>,
    config: Config,
}

impl Application {
    pub fn builder(root: ModuleDescriptor) -> ApplicationBuilder {
        ApplicationBuilder::new(root)
    }

    /// Resolve the module graph and build the route table.
    ///
    /// Fails fast: any wiring, route or configuration problem aborts the boot.
    pub fn bootstrap(root: &ModuleDescriptor, config: Config) -> Result<Self, BootError> {
        let cors = config.cors.to_policy()?;
        Self::assemble(root, config, cors)
    }

    fn assemble(
        root: &ModuleDescriptor,
        config: Config,
        cors: Option<CorsPolicy>,
    ) -> Result<Self, BootError> {
        logger::log_debug(&format!("Bootstrapping from module {}", root.name()));
        let Resolution {
            context,
            controllers,
        } = resolve(root)?;

        let mut trie = build_route_trie(controllers)?;
        for rule in &config.redirects {
            add_redirect_rule(&mut trie, &rule.method, &rule.from, &rule.to, rule.status)?;
        }

        Ok(Self {
            trie,
            context,
            cors,
            config,
        })
    }

    pub const fn trie(&self) -> &RouteTrie<HandlerDescriptor> {
        &self.trie
    }

    pub const fn context(&self) -> &ApplicationContext {
        &self.context
    }

    pub const fn cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref()
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Number of mapped handlers
    pub fn route_count(&self) -> usize {
        self.trie.len()
    }

    /// Singleton registered for `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context.get::<T>()
    }

    /// Serve on the configured address until SIGINT/SIGTERM
    pub async fn listen(self) -> std::io::Result<()> {
        server::run(Arc::new(self)).await
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("routes", &self.trie.len())
            .field("context", &self.context)
            .field("cors", &self.cors.is_some())
            .finish_non_exhaustive()
    }
}

/// Programmatic alternative to configuring everything through [`Config`]
pub struct ApplicationBuilder {
    root: ModuleDescriptor,
    config: Config,
    cors: Option<CorsPolicy>,
}

impl ApplicationBuilder {
    pub fn new(root: ModuleDescriptor) -> Self {
        Self {
            root,
            config: Config::default(),
            cors: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use this policy instead of the one described by `config.cors`
    #[must_use]
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Add a static redirect rule for GET requests
    #[must_use]
    pub fn redirect(mut self, from: &str, to: &str, status: u16) -> Self {
        self.config.redirects.push(RedirectRule {
            from: from.to_string(),
            to: to.to_string(),
            method: "GET".to_string(),
            status,
        });
        self
    }

    pub fn build(self) -> Result<Application, BootError> {
        let cors = match self.cors {
            Some(policy) => Some(policy),
            None => self.config.cors.to_policy()?,
        };
        Application::assemble(&self.root, self.config, cors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Controller, Injectable, Injector, Role};
    use crate::dispatch::Args;
    use crate::error::HandlerError;
    use crate::http::OriginRule;
    use crate::routing::RouteDef;
    use hyper::{Method, StatusCode};

    struct Ping;

    impl Injectable for Ping {
        const ROLE: Role = Role::Controller;

        fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
            Ok(Self)
        }
    }

    impl Controller for Ping {
        fn routes() -> Vec<RouteDef<Self>> {
            vec![RouteDef::get("/ping")
                .handle(|_this: Arc<Self>, _args: Args| async { Ok::<_, HandlerError>("pong") })]
        }
    }

    fn root() -> ModuleDescriptor {
        ModuleDescriptor::new("Root").controller::<Ping>()
    }

    #[test]
    fn test_bootstrap_builds_routes_and_redirects() {
        let app = Application::builder(root())
            .redirect("/old", "/ping", 301)
            .build()
            .unwrap();

        assert_eq!(app.route_count(), 1);
        assert!(app.trie().lookup(&Method::GET, "/ping").is_some());
        let redirect = app.trie().find_redirect(&Method::GET, "/old").unwrap();
        assert_eq!(redirect.status(), StatusCode::MOVED_PERMANENTLY);
        assert!(app.get::<Ping>().is_some());
        assert!(app.cors().is_none());
    }

    #[test]
    fn test_builder_cors_overrides_config() {
        let app = Application::builder(root())
            .cors(CorsPolicy::new(OriginRule::Exact("http://x.com".to_string())))
            .build()
            .unwrap();
        assert!(app.cors().unwrap().allowed_origin("http://x.com").is_some());
    }

    #[test]
    fn test_invalid_redirect_aborts_boot() {
        let err = Application::builder(root())
            .redirect("/old", "/ping", 200)
            .build()
            .unwrap_err();
        assert!(matches!(err, BootError::InvalidRoute { .. }));
    }

    #[test]
    fn test_applications_are_independent() {
        let first = Application::bootstrap(&root(), Config::default()).unwrap();
        let second = Application::bootstrap(&root(), Config::default()).unwrap();
        let a = first.get::<Ping>().unwrap();
        let b = second.get::<Ping>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
