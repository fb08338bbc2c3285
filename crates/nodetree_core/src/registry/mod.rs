//! Generic key-value registry abstraction and its backends.
//!
//! # Responsibility
//! - Define identity-based CRUD plus predicate reads over schema-less records.
//! - Keep storage details (SQLite, in-memory) behind one contract.
//!
//! # Invariants
//! - `create` on an existing id fails with `DuplicateId`.
//! - `update` merges top-level fields and fails with `NotFound` on a missing id.
//! - `delete` fails with `NotFound` on a missing id.
//! - `get` signals absence with `None`, never with an error.
//! - `read` returns records in insertion order.
//! - The registry has no tree semantics and no multi-call transactions.

use crate::db::DbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod memory;
pub mod sqlite;

/// Registry key.
pub type RecordId = Uuid;

/// Schema-less record body.
pub type Record = Map<String, Value>;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Collection holding node records.
pub const NODES_COLLECTION: &str = "nodes";
/// Collection holding template records.
pub const TEMPLATES_COLLECTION: &str = "templates";

/// Errors from registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// `create` was called with an id that already exists.
    DuplicateId(RecordId),
    /// `update`/`delete` target does not exist.
    NotFound(RecordId),
    /// Write attempted through a read-only handle.
    PermissionDenied {
        collection: String,
        operation: &'static str,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to the requested shape.
    InvalidData(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "registry record already exists: {id}"),
            Self::NotFound(id) => write!(f, "registry record not found: {id}"),
            Self::PermissionDenied {
                collection,
                operation,
            } => write!(
                f,
                "registry `{collection}` is read-only; `{operation}` is not permitted"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "registry requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "registry requires column `{column}` in table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid registry data: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Access level granted to a registry handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPermission {
    ReadOnly,
    ReadWrite,
}

impl RegistryPermission {
    pub fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Field-equality filter for `Registry::read`.
///
/// The key `"id"` matches the record key; every other key matches the record
/// field of the same name. An empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate(Map<String, Value>);

impl Predicate {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the record stored under `id`.
    pub fn id(id: RecordId) -> Self {
        Self::all().field("id", id.to_string())
    }

    /// Adds one field-equality constraint.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn matches(&self, id: RecordId, record: &Record) -> bool {
        self.0.iter().all(|(name, expected)| {
            if name == "id" {
                expected.as_str() == Some(id.to_string().as_str())
            } else {
                record.get(name) == Some(expected)
            }
        })
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// One stored record returned by `Registry::read`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: RecordId,
    pub record: Record,
}

/// Storage contract shared by every registry backend.
pub trait Registry: Send + Sync {
    /// Stores a new record under `id`.
    fn create(&self, id: RecordId, record: Record) -> RegistryResult<()>;
    /// Loads one record.
    fn get(&self, id: RecordId) -> RegistryResult<Option<Record>>;
    /// Merges `record` into the existing record under `id`.
    fn update(&self, id: RecordId, record: Record) -> RegistryResult<()>;
    /// Removes one record.
    fn delete(&self, id: RecordId) -> RegistryResult<()>;
    /// Lists all records matching `predicate`.
    fn read(&self, predicate: &Predicate) -> RegistryResult<Vec<Entry>>;
}

/// Hands out registry handles for named collections.
pub trait RegistryFactory {
    type Registry: Registry;

    fn get(&self, name: &str, permission: RegistryPermission) -> Self::Registry;
}

/// Serializes a typed value into a registry record.
pub fn to_record<T: Serialize>(value: &T) -> RegistryResult<Record> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RegistryError::InvalidData(format!(
            "expected object record, got `{other}`"
        ))),
        Err(err) => Err(RegistryError::InvalidData(err.to_string())),
    }
}

/// Deserializes a registry record into a typed value.
pub fn from_record<T: DeserializeOwned>(id: RecordId, record: Record) -> RegistryResult<T> {
    serde_json::from_value(Value::Object(record))
        .map_err(|err| RegistryError::InvalidData(format!("record {id}: {err}")))
}

fn merge_into(target: &mut Record, patch: Record) {
    for (name, value) in patch {
        target.insert(name, value);
    }
}

fn ensure_writable(
    collection: &str,
    permission: RegistryPermission,
    operation: &'static str,
) -> RegistryResult<()> {
    if permission.can_write() {
        return Ok(());
    }
    Err(RegistryError::PermissionDenied {
        collection: collection.to_string(),
        operation,
    })
}
