//! In-memory storage backend
//!
//! Rows live in a `BTreeMap` keyed by the generated primary key, so listing
//! order is insertion order. Used by the demo application and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::{Record, RepositoryFactory, StorageError, StorageResult, Table, TableSchema};
use crate::container::{Exports, Injectable, Injector, ModuleDescriptor, Role};
use crate::error::BootError;
use crate::logger;

/// Module registering an in-memory [`RepositoryFactory`]
pub fn memory_module() -> ModuleDescriptor {
    ModuleDescriptor::new("MemoryStorageModule").value(MemoryRepositoryFactory::new())
}

/// Factory handing out one shared in-memory table per entity
#[derive(Default)]
pub struct MemoryRepositoryFactory {
    tables: Mutex<HashMap<&'static str, Arc<MemoryTable>>>,
}

impl MemoryRepositoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryFactory for MemoryRepositoryFactory {
    fn table(&self, schema: TableSchema) -> Arc<dyn Table> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(schema.name).or_insert_with(|| {
            logger::log_debug(&format!("[Storage] Created table {}", schema.name));
            Arc::new(MemoryTable::new(schema))
        });
        Arc::clone(table) as Arc<dyn Table>
    }
}

impl Injectable for MemoryRepositoryFactory {
    const ROLE: Role = Role::Service;

    fn construct(_injector: &Injector<'_>) -> Result<Self, BootError> {
        Ok(Self::new())
    }

    fn exports(this: &Arc<Self>, exports: &mut Exports) {
        exports.export::<dyn RepositoryFactory>(Arc::clone(this) as Arc<dyn RepositoryFactory>);
    }
}

struct Rows {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

/// One table of the in-memory backend
pub struct MemoryTable {
    schema: TableSchema,
    state: Mutex<Rows>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            state: Mutex::new(Rows {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(&self, record: &Record) -> Option<i64> {
        record.get(self.schema.primary_key).and_then(Value::as_i64)
    }

    fn missing_key(&self) -> StorageError {
        StorageError::MissingKey {
            table: self.schema.name.to_string(),
            key: self.schema.primary_key.to_string(),
        }
    }

    fn not_found(&self, id: i64) -> StorageError {
        StorageError::NotFound {
            table: self.schema.name.to_string(),
            key: self.schema.primary_key.to_string(),
            value: Value::from(id),
        }
    }

    /// Reject a record whose unique columns collide with another row
    fn check_unique(&self, rows: &Rows, id: i64, record: &Record) -> StorageResult<()> {
        for column in self.schema.unique {
            let Some(value) = record.get(*column).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = rows
                .rows
                .iter()
                .any(|(other, row)| *other != id && row.get(*column) == Some(value));
            if taken {
                return Err(StorageError::UniqueViolation {
                    table: self.schema.name.to_string(),
                    column: (*column).to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn save_now(&self, mut record: Record) -> StorageResult<Record> {
        let mut rows = self.lock();
        let id = self.key_of(&record).unwrap_or(rows.next_id);
        self.check_unique(&rows, id, &record)?;

        record.insert(self.schema.primary_key.to_string(), Value::from(id));
        rows.next_id = rows.next_id.max(id + 1);
        rows.rows.insert(id, record.clone());
        Ok(record)
    }

    fn update_now(&self, mut record: Record) -> StorageResult<Record> {
        let id = self.key_of(&record).ok_or_else(|| self.missing_key())?;
        let mut rows = self.lock();
        if !rows.rows.contains_key(&id) {
            return Err(self.not_found(id));
        }
        self.check_unique(&rows, id, &record)?;

        record.insert(self.schema.primary_key.to_string(), Value::from(id));
        rows.rows.insert(id, record.clone());
        Ok(record)
    }

    fn delete_now(&self, record: &Record) -> StorageResult<()> {
        let id = self.key_of(record).ok_or_else(|| self.missing_key())?;
        match self.lock().rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(self.not_found(id)),
        }
    }

    fn find_now(&self, criteria: &Record) -> Vec<Record> {
        self.lock()
            .rows
            .values()
            .filter(|row| {
                criteria
                    .iter()
                    .all(|(column, expected)| row.get(column) == Some(expected))
            })
            .cloned()
            .collect()
    }
}

impl Table for MemoryTable {
    fn schema(&self) -> TableSchema {
        self.schema
    }

    fn save(&self, record: Record) -> BoxFuture<'_, StorageResult<Record>> {
        future::ready(self.save_now(record)).boxed()
    }

    fn find(&self) -> BoxFuture<'_, StorageResult<Vec<Record>>> {
        future::ready(Ok(self.find_now(&Record::new()))).boxed()
    }

    fn find_by(&self, criteria: Record) -> BoxFuture<'_, StorageResult<Vec<Record>>> {
        future::ready(Ok(self.find_now(&criteria))).boxed()
    }

    fn update(&self, record: Record) -> BoxFuture<'_, StorageResult<Record>> {
        future::ready(self.update_now(record)).boxed()
    }

    fn delete(&self, record: Record) -> BoxFuture<'_, StorageResult<()>> {
        future::ready(self.delete_now(&record)).boxed()
    }
}
