//! SQLite registry backend.
//!
//! # Responsibility
//! - Store every collection in the `registry_records` table as JSON bodies.
//! - Keep SQL details inside the registry boundary.
//!
//! # Invariants
//! - Handles are only built on fully migrated connections.
//! - Each operation runs under the shared connection mutex, so a single
//!   create/update/delete is atomic with respect to other handles.
//! - `read` returns rows ordered by insertion (`rowid`).

use super::{
    ensure_writable, merge_into, Entry, Predicate, Record, RecordId, Registry, RegistryError,
    RegistryFactory, RegistryPermission, RegistryResult,
};
use crate::db::migrations::{current_user_version, latest_version};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const REGISTRY_TABLE: &str = "registry_records";

/// Factory for SQLite-backed registry handles sharing one connection.
#[derive(Debug, Clone)]
pub struct SqliteRegistryFactory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistryFactory {
    /// Creates the factory from a migrated connection.
    pub fn try_new(conn: Connection) -> RegistryResult<Self> {
        ensure_registry_connection_ready(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl RegistryFactory for SqliteRegistryFactory {
    type Registry = SqliteRegistry;

    fn get(&self, name: &str, permission: RegistryPermission) -> SqliteRegistry {
        SqliteRegistry {
            conn: Arc::clone(&self.conn),
            collection: name.to_string(),
            permission,
        }
    }
}

/// SQLite-backed registry handle for one collection.
#[derive(Debug, Clone)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    permission: RegistryPermission,
}

impl SqliteRegistry {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Registry for SqliteRegistry {
    fn create(&self, id: RecordId, record: Record) -> RegistryResult<()> {
        ensure_writable(&self.collection, self.permission, "create")?;
        let conn = self.lock();
        if load_body(&conn, &self.collection, id)?.is_some() {
            return Err(RegistryError::DuplicateId(id));
        }
        conn.execute(
            "INSERT INTO registry_records (collection, record_id, body)
             VALUES (?1, ?2, ?3);",
            params![self.collection, id.to_string(), encode_body(&record)?],
        )?;
        debug!(
            "event=registry_create module=registry status=ok backend=sqlite collection={} id={id}",
            self.collection
        );
        Ok(())
    }

    fn get(&self, id: RecordId) -> RegistryResult<Option<Record>> {
        let conn = self.lock();
        load_body(&conn, &self.collection, id)
    }

    fn update(&self, id: RecordId, record: Record) -> RegistryResult<()> {
        ensure_writable(&self.collection, self.permission, "update")?;
        let conn = self.lock();
        let mut stored =
            load_body(&conn, &self.collection, id)?.ok_or(RegistryError::NotFound(id))?;
        merge_into(&mut stored, record);
        conn.execute(
            "UPDATE registry_records
             SET body = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE collection = ?1
               AND record_id = ?2;",
            params![self.collection, id.to_string(), encode_body(&stored)?],
        )?;
        Ok(())
    }

    fn delete(&self, id: RecordId) -> RegistryResult<()> {
        ensure_writable(&self.collection, self.permission, "delete")?;
        let changed = self.lock().execute(
            "DELETE FROM registry_records
             WHERE collection = ?1
               AND record_id = ?2;",
            params![self.collection, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound(id));
        }
        Ok(())
    }

    fn read(&self, predicate: &Predicate) -> RegistryResult<Vec<Entry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT record_id, body
             FROM registry_records
             WHERE collection = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([self.collection.as_str()])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            let body_text: String = row.get(1)?;
            let id = parse_record_id(&id_text)?;
            let record = decode_body(id, &body_text)?;
            if predicate.matches(id, &record) {
                entries.push(Entry { id, record });
            }
        }
        Ok(entries)
    }
}

fn load_body(conn: &Connection, collection: &str, id: RecordId) -> RegistryResult<Option<Record>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body
             FROM registry_records
             WHERE collection = ?1
               AND record_id = ?2;",
            params![collection, id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|text| decode_body(id, &text)).transpose()
}

fn encode_body(record: &Record) -> RegistryResult<String> {
    serde_json::to_string(record).map_err(|err| RegistryError::InvalidData(err.to_string()))
}

fn decode_body(id: RecordId, text: &str) -> RegistryResult<Record> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RegistryError::InvalidData(format!(
            "record {id} body is not a JSON object"
        ))),
        Err(err) => Err(RegistryError::InvalidData(format!("record {id}: {err}"))),
    }
}

fn parse_record_id(value: &str) -> RegistryResult<RecordId> {
    Uuid::parse_str(value).map_err(|_| {
        RegistryError::InvalidData(format!(
            "invalid uuid `{value}` in {REGISTRY_TABLE}.record_id"
        ))
    })
}

fn ensure_registry_connection_ready(conn: &Connection) -> RegistryResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RegistryError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, REGISTRY_TABLE)? {
        return Err(RegistryError::MissingRequiredTable(REGISTRY_TABLE));
    }

    for column in ["collection", "record_id", "body", "created_at", "updated_at"] {
        if !table_has_column(conn, REGISTRY_TABLE, column)? {
            return Err(RegistryError::MissingRequiredColumn {
                table: REGISTRY_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RegistryResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RegistryResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
