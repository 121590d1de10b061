//! Key-addressed record storage used by the sample handlers.
//!
//! The server core only depends on the [`Store`] trait. [`MemoryStore`] is
//! the in-process implementation: readers work on an immutable snapshot,
//! writers are serialized through an async mutex and publish a new snapshot
//! on commit. A write transaction dropped without [`WriteTxn::commit`] is
//! aborted and leaves no trace.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Name of the seeded read-only lookup table.
pub const REGION_KIND: &str = "region";

/// The literal entries of the region table.
pub const SEED_REGIONS: [&str; 3] = ["UK", "EU", "USA"];

/// Errors returned by a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this key already exists.
    #[error("{kind} \"{key}\" already exists")]
    Duplicate {
        /// Record kind.
        kind: String,
        /// Duplicated key.
        key: String,
    },

    /// No record with this key exists.
    #[error("{kind} \"{key}\" does not exist")]
    NotFound {
        /// Record kind.
        kind: String,
        /// Missing key.
        key: String,
    },

    /// The table only accepts reads.
    #[error("table \"{0}\" is read-only")]
    ReadOnly(String),

    /// A previous writer panicked while holding the snapshot lock.
    #[error("store snapshot lock poisoned")]
    Poisoned,
}

/// A single stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The record's key, unique within its kind.
    pub key: String,
    /// The record's fields.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Create a record with no fields.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Set a field.
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Look up a field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Read access to a consistent view of the store.
pub trait ReadTxn: Send + Sync {
    /// Get a record by key.
    fn get(&self, kind: &str, key: &str) -> Result<Option<Record>, StoreError>;

    /// List all records of a kind, ordered by key.
    fn list(&self, kind: &str) -> Result<Vec<Record>, StoreError>;
}

/// A write transaction. Changes become visible on [`WriteTxn::commit`].
pub trait WriteTxn: ReadTxn {
    /// Insert a new record. Fails if the key already exists.
    fn put(&mut self, kind: &str, record: Record) -> Result<(), StoreError>;

    /// Replace an existing record. Fails if the key does not exist.
    fn update(&mut self, kind: &str, record: Record) -> Result<(), StoreError>;

    /// Remove a record. Fails if the key does not exist.
    fn delete(&mut self, kind: &str, key: &str) -> Result<(), StoreError>;

    /// Atomically publish every change made in this transaction.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A pluggable record store, shared by every request.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Begin a read-only transaction.
    async fn begin_read(&self) -> Result<Box<dyn ReadTxn>, StoreError>;

    /// Begin a read-write transaction, waiting for any other writer to finish.
    async fn begin_write(&self) -> Result<Box<dyn WriteTxn>, StoreError>;
}

type Tables = BTreeMap<String, BTreeMap<String, Record>>;

struct Shared {
    snapshot: RwLock<Arc<Tables>>,
    writer: Arc<Mutex<()>>,
    read_only: BTreeSet<String>,
}

impl Shared {
    fn snapshot(&self) -> Result<Arc<Tables>, StoreError> {
        self.snapshot
            .read()
            .map(|tables| Arc::clone(&tables))
            .map_err(|_| StoreError::Poisoned)
    }
}

/// An in-memory [`Store`].
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_tables(Tables::new(), BTreeSet::new())
    }

    /// Create a store holding the read-only region table.
    pub fn seeded() -> Self {
        let regions = SEED_REGIONS
            .iter()
            .map(|name| {
                let record = Record::new(*name).with_field("name", serde_json::json!(name));
                (name.to_string(), record)
            })
            .collect();
        let mut tables = Tables::new();
        tables.insert(REGION_KIND.to_string(), regions);
        Self::with_tables(tables, BTreeSet::from([REGION_KIND.to_string()]))
    }

    fn with_tables(tables: Tables, read_only: BTreeSet<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                snapshot: RwLock::new(Arc::new(tables)),
                writer: Arc::new(Mutex::new(())),
                read_only,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("read_only", &self.shared.read_only)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_read(&self) -> Result<Box<dyn ReadTxn>, StoreError> {
        Ok(Box::new(MemoryReadTxn {
            tables: self.shared.snapshot()?,
        }))
    }

    async fn begin_write(&self) -> Result<Box<dyn WriteTxn>, StoreError> {
        let guard = Arc::clone(&self.shared.writer).lock_owned().await;
        let staged = (*self.shared.snapshot()?).clone();
        Ok(Box::new(MemoryWriteTxn {
            shared: Arc::clone(&self.shared),
            staged,
            _guard: guard,
        }))
    }
}

struct MemoryReadTxn {
    tables: Arc<Tables>,
}

impl ReadTxn for MemoryReadTxn {
    fn get(&self, kind: &str, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(lookup(&self.tables, kind, key))
    }

    fn list(&self, kind: &str) -> Result<Vec<Record>, StoreError> {
        Ok(list_kind(&self.tables, kind))
    }
}

struct MemoryWriteTxn {
    shared: Arc<Shared>,
    staged: Tables,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryWriteTxn {
    fn writable(&mut self, kind: &str) -> Result<&mut BTreeMap<String, Record>, StoreError> {
        if self.shared.read_only.contains(kind) {
            return Err(StoreError::ReadOnly(kind.to_string()));
        }
        Ok(self.staged.entry(kind.to_string()).or_default())
    }
}

impl ReadTxn for MemoryWriteTxn {
    fn get(&self, kind: &str, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(lookup(&self.staged, kind, key))
    }

    fn list(&self, kind: &str) -> Result<Vec<Record>, StoreError> {
        Ok(list_kind(&self.staged, kind))
    }
}

impl WriteTxn for MemoryWriteTxn {
    fn put(&mut self, kind: &str, record: Record) -> Result<(), StoreError> {
        let table = self.writable(kind)?;
        if table.contains_key(&record.key) {
            return Err(StoreError::Duplicate {
                kind: kind.to_string(),
                key: record.key,
            });
        }
        table.insert(record.key.clone(), record);
        Ok(())
    }

    fn update(&mut self, kind: &str, record: Record) -> Result<(), StoreError> {
        let table = self.writable(kind)?;
        match table.get_mut(&record.key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: kind.to_string(),
                key: record.key,
            }),
        }
    }

    fn delete(&mut self, kind: &str, key: &str) -> Result<(), StoreError> {
        let table = self.writable(kind)?;
        match table.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryWriteTxn { shared, staged, _guard } = *self;
        let mut snapshot = shared.snapshot.write().map_err(|_| StoreError::Poisoned)?;
        *snapshot = Arc::new(staged);
        debug!("store transaction committed");
        Ok(())
    }
}

fn lookup(tables: &Tables, kind: &str, key: &str) -> Option<Record> {
    tables.get(kind).and_then(|table| table.get(key)).cloned()
}

fn list_kind(tables: &Tables, kind: &str) -> Vec<Record> {
    tables
        .get(kind)
        .map(|table| table.values().cloned().collect())
        .unwrap_or_default()
}
