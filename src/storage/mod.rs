//! Storage collaborator
//!
//! Services persist entities through a [`Repository<T>`] obtained from the
//! [`RepositoryFactory`] capability registered in the application context.
//! A factory hands out untyped [`Table`]s; the repository converts between
//! entities and JSON records.
//!
//! ```ignore
//! let factory = injector.capability::<dyn RepositoryFactory>()?;
//! let posts = factory.repository::<Post>();
//! let saved = posts.save(posts.create(&dto)?).await?;
//! ```

mod memory;

pub use memory::{memory_module, MemoryRepositoryFactory};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored row: column name to value
pub type Record = Map<String, Value>;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{table}: no row with {key} = {value}")]
    NotFound {
        table: String,
        key: String,
        value: Value,
    },

    #[error("{table}: value {value} for unique column '{column}' already exists")]
    UniqueViolation {
        table: String,
        column: String,
        value: Value,
    },

    #[error("{table}: record has no primary key '{key}'")]
    MissingKey { table: String, key: String },

    #[error("{table}: entities must serialize to a JSON object")]
    NotAnObject { table: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Table layout of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    /// Auto-increment integer column
    pub primary_key: &'static str,
    pub unique: &'static [&'static str],
}

/// A persisted type
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    const UNIQUE: &'static [&'static str] = &[];

    fn schema() -> TableSchema {
        TableSchema {
            name: Self::TABLE,
            primary_key: Self::PRIMARY_KEY,
            unique: Self::UNIQUE,
        }
    }
}

/// Untyped table access implemented by a storage backend
pub trait Table: Send + Sync {
    fn schema(&self) -> TableSchema;

    /// Insert, or replace the row with the same primary key. A record without
    /// a key gets the next generated one. Returns the stored record.
    fn save(&self, record: Record) -> BoxFuture<'_, StorageResult<Record>>;

    fn find(&self) -> BoxFuture<'_, StorageResult<Vec<Record>>>;

    /// Rows whose columns equal every entry of `criteria`
    fn find_by(&self, criteria: Record) -> BoxFuture<'_, StorageResult<Vec<Record>>>;

    /// Replace an existing row; fails if its key is unknown
    fn update(&self, record: Record) -> BoxFuture<'_, StorageResult<Record>>;

    fn delete(&self, record: Record) -> BoxFuture<'_, StorageResult<()>>;
}

/// Storage backend capability
pub trait RepositoryFactory: Send + Sync {
    fn table(&self, schema: TableSchema) -> Arc<dyn Table>;
}

impl dyn RepositoryFactory {
    /// Typed repository for entity `T`
    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.table(T::schema()))
    }
}

/// Typed access to the table of entity `T`
pub struct Repository<T> {
    table: Arc<dyn Table>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self {
            table,
            _entity: PhantomData,
        }
    }

    pub async fn save(&self, entity: T) -> StorageResult<T> {
        let record = self.table.save(self.to_record(&entity)?).await?;
        from_record(record)
    }

    pub async fn find(&self) -> StorageResult<Vec<T>> {
        self.table.find().await?.into_iter().map(from_record).collect()
    }

    /// Every entity matching `criteria`, a JSON object of column values
    pub async fn find_by(&self, criteria: Value) -> StorageResult<Vec<T>> {
        let criteria = self.object(criteria)?;
        self.table
            .find_by(criteria)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// First entity matching `criteria`
    pub async fn find_one(&self, criteria: Value) -> StorageResult<Option<T>> {
        Ok(self.find_by(criteria).await?.into_iter().next())
    }

    pub async fn update(&self, entity: &T) -> StorageResult<T> {
        let record = self.table.update(self.to_record(entity)?).await?;
        from_record(record)
    }

    pub async fn delete(&self, entity: &T) -> StorageResult<()> {
        self.table.delete(self.to_record(entity)?).await
    }

    /// Build an unsaved entity from the matching fields of a DTO
    pub fn create<D: Serialize>(&self, dto: &D) -> StorageResult<T> {
        let mut record = self.object(serde_json::to_value(dto)?)?;
        record.remove(self.table.schema().primary_key);
        from_record(record)
    }

    fn to_record(&self, entity: &T) -> StorageResult<Record> {
        self.object(serde_json::to_value(entity)?)
    }

    fn object(&self, value: Value) -> StorageResult<Record> {
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::NotAnObject {
                table: self.table.schema().name.to_string(),
            }),
        }
    }
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table.schema().name)
            .finish()
    }
}

fn from_record<T: DeserializeOwned>(record: Record) -> StorageResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}
