//! Posts feature: entity, DTOs, service, controller and module

use std::sync::Arc;

use chrono::Local;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use rivet::dispatch::Args;
use rivet::storage::{Entity, Repository, RepositoryFactory};
use rivet::{BootError, Controller, HandlerError, HttpError, Injectable, Injector, ModuleDescriptor};
use rivet::{Json, RouteDef, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
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
pub struct CreatePostDto {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FindById {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct FindByTitle {
    pub title: String,
}

pub struct PostService {
    posts: Repository<Post>,
}

impl PostService {
    pub async fn create(&self, dto: CreatePostDto) -> Result<Value, HandlerError> {
        if dto.title.trim().is_empty() {
            return Err(HttpError::bad_request("title must not be empty").into());
        }
        let post = self.posts.save(self.posts.create(&dto)?).await?;
        Ok(json!({
            "status": StatusCode::CREATED.as_u16(),
            "message": "Post created successfully",
            "timestamp": Local::now().to_rfc3339(),
            "data": post,
        }))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Post>, HandlerError> {
        Ok(self.posts.find_one(json!({ "id": id })).await?)
    }

    pub async fn find_all(&self) -> Result<Vec<Post>, HandlerError> {
        Ok(self.posts.find().await?)
    }

    pub async fn find_by_title(&self, title: &str) -> Result<Vec<Post>, HandlerError> {
        Ok(self.posts.find_by(json!({ "title": title })).await?)
    }

    pub async fn remove(&self, id: i64) -> Result<(), HandlerError> {
        let post = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| HttpError::not_found(format!("Post {id} not found")))?;
        Ok(self.posts.delete(&post).await?)
    }
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
    posts: Arc<PostService>,
}

impl PostController {
    async fn create(self: Arc<Self>, mut args: Args) -> Result<Value, HandlerError> {
        self.posts.create(args.take()?).await
    }

    async fn find_by_id(self: Arc<Self>, mut args: Args) -> Result<Json<Option<Post>>, HandlerError> {
        let query: FindById = args.take()?;
        self.posts.find_by_id(query.id).await.map(Json)
    }

    async fn find_all(self: Arc<Self>, _args: Args) -> Result<Json<Vec<Post>>, HandlerError> {
        self.posts.find_all().await.map(Json)
    }

    async fn find_by_title(self: Arc<Self>, mut args: Args) -> Result<Json<Vec<Post>>, HandlerError> {
        let query: FindByTitle = args.take()?;
        self.posts.find_by_title(&query.title).await.map(Json)
    }

    async fn detail(self: Arc<Self>, mut args: Args) -> Result<Json<Post>, HandlerError> {
        let id: i64 = args.take()?;
        self.posts
            .find_by_id(id)
            .await?
            .map(Json)
            .ok_or_else(|| HttpError::not_found(format!("Post {id} not found")).into())
    }

    async fn remove(self: Arc<Self>, mut args: Args) -> Result<(), HandlerError> {
        self.posts.remove(args.take()?).await
    }
}

impl Injectable for PostController {
    const ROLE: Role = Role::Controller;

    fn construct(injector: &Injector<'_>) -> Result<Self, BootError> {
        Ok(Self {
            posts: injector.get::<PostService>()?,
        })
    }
}

impl Controller for PostController {
    fn base_path() -> &'static str {
        "api/posts"
    }

    fn routes() -> Vec<RouteDef<Self>> {
        vec![
            RouteDef::post("create")
                .body::<CreatePostDto>()
                .status(201)
                .handle(Self::create),
            RouteDef::get("findById")
                .query::<FindById>()
                .handle(Self::find_by_id),
            RouteDef::get("findAll").handle(Self::find_all),
            RouteDef::get("findByTitle")
                .query::<FindByTitle>()
                .handle(Self::find_by_title),
            RouteDef::get("detail/id/*")
                .path::<i64>("id")
                .handle(Self::detail),
            RouteDef::delete("id/*")
                .path::<i64>("id")
                .status(204)
                .handle(Self::remove),
            RouteDef::get("docs")
                .redirect_with("https://github.com/rivet-rs/rivet", 301)
                .handle(|_this: Arc<Self>, _args: Args| async { Ok::<_, HandlerError>(()) }),
        ]
    }
}

pub fn post_module() -> ModuleDescriptor {
    ModuleDescriptor::new("PostModule")
        .provider::<PostService>()
        .controller::<PostController>()
}
