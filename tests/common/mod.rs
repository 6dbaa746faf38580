//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rivet::dispatch::Args;
use rivet::handler::handle_request;
use rivet::storage::{memory_module, Entity, Repository, RepositoryFactory};
use rivet::{
    Application, BootError, Config, Controller, HandlerError, Injectable, Injector, Json,
    ModuleDescriptor, RouteDef, Role,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Entity for Post {
    const TABLE: &'static str = "post";
    const UNIQUE: &'static [&'static str] = &["title"];
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FindById {
    pub id: i64,
}

pub struct PostService {
    posts: Repository<Post>,
}

impl Injectable for PostService {
    const ROLE: Role = Role::Service;

    fn construct(injector: &Injector<'_>) -> Result<Self, BootError> {
        let factory = injector.capability::<dyn RepositoryFactory>()?;
        Ok(Self {
            posts: factory.repository::<Post>(),
        })
    }
}

pub struct PostController {
    service: Arc<PostService>,
}

impl PostController {
    async fn create(self: Arc<Self>, mut args: Args) -> Result<Json<Post>, HandlerError> {
        let dto: CreatePost = args.take()?;
        let posts = &self.service.posts;
        Ok(Json(posts.save(posts.create(&dto)?).await?))
    }

    async fn find_by_id(self: Arc<Self>, mut args: Args) -> Result<Json<Option<Post>>, HandlerError> {
        let query: FindById = args.take()?;
        let found = self.service.posts.find_one(serde_json::json!({"id": query.id})).await?;
        Ok(Json(found))
    }

    async fn find_all(self: Arc<Self>, _args: Args) -> Result<Json<Vec<Post>>, HandlerError> {
        Ok(Json(self.service.posts.find().await?))
    }

    async fn detail(self: Arc<Self>, mut args: Args) -> Result<String, HandlerError> {
        let id: i64 = args.take()?;
        Ok(format!("post {id}"))
    }

    async fn broken(self: Arc<Self>, _args: Args) -> Result<Value, HandlerError> {
        Err(HandlerError::unhandled("connection pool exhausted"))
    }
}

impl Injectable for PostController {
    const ROLE: Role = Role::Controller;

    fn construct(injector: &Injector<'_>) -> Result<Self, BootError> {
        Ok(Self {
            service: injector.get::<PostService>()?,
        })
    }
}

impl Controller for PostController {
    fn base_path() -> &'static str {
        "/api/posts"
    }

    fn routes() -> Vec<RouteDef<Self>> {
        vec![
            RouteDef::post("/create")
                .body::<CreatePost>()
                .status(201)
                .header("X-Resource", "post")
                .handle(Self::create),
            RouteDef::get("/findById")
                .query::<FindById>()
                .handle(Self::find_by_id),
            RouteDef::get("/findAll").handle(Self::find_all),
            RouteDef::get("/detail/id/*")
                .path::<i64>("id")
                .handle(Self::detail),
            RouteDef::get("/broken").handle(Self::broken),
            RouteDef::get("/docs")
                .redirect("/api/posts/findAll")
                .handle(|_this: Arc<Self>, _args: Args| async { Ok::<_, HandlerError>(()) }),
        ]
    }
}

pub fn post_module() -> ModuleDescriptor {
    ModuleDescriptor::new("PostModule")
        .provider::<PostService>()
        .controller::<PostController>()
}

pub fn blog_module() -> ModuleDescriptor {
    ModuleDescriptor::new("AppModule")
        .import(memory_module())
        .import(post_module())
}

/// Config with the access log off, to keep test output readable
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.logging.access_log = false;
    config
}

pub fn boot(config: Config) -> Arc<Application> {
    Arc::new(Application::bootstrap(&blog_module(), config).unwrap())
}

pub fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: &str) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Arc<Application>, req: Request<Full<Bytes>>) -> TestResponse {
    let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
    let response = handle_request(req, Arc::clone(app), peer).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}
