//! Remote store contract and the in-memory implementation.
//!
//! The transport behind [`RemoteStore`] (HTTP, retries, timeouts) is an
//! external collaborator; the core only sees this synchronous surface.
//! [`MemoryStore`] mirrors the remote service's observable behavior
//! (serial id assignment, key sanitization, column auto-add on record
//! create, conflict signalling) and adds a reachability toggle so
//! degraded mode can be exercised in-process.

use std::{cell::RefCell, collections::BTreeMap};

use thiserror::Error;

use crate::{
    data::Value,
    schema::{self, NewColumn, ID_COLUMN_KEY, PRIMARY_TABLE},
    table::{Record, RecordId},
    validate,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached. Callers fall back to degraded mode
    /// where the policy allows it.
    #[error("remote store unreachable: {0}")]
    Unavailable(String),
    /// Duplicate table/column name signalled by the store.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    /// The store answered with something the core cannot interpret.
    #[error("malformed remote response: {0}")]
    Protocol(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait RemoteStore {
    /// Reachability probe; decides the session's connected flag.
    fn probe(&self) -> bool;

    fn list_tables(&self) -> StoreResult<Vec<String>>;
    fn create_table(&self, name: &str) -> StoreResult<String>;
    fn drop_table(&self, name: &str) -> StoreResult<()>;

    fn list_columns(&self, table: &str) -> StoreResult<Vec<String>>;
    /// Returns the actual column key used, which may differ from the
    /// requested one after remote-side sanitization.
    fn add_column(&self, table: &str, column: &NewColumn) -> StoreResult<String>;
    fn remove_column(&self, table: &str, key: &str) -> StoreResult<()>;

    fn list_records(&self, table: &str) -> StoreResult<Vec<Record>>;
    fn create_record(
        &self,
        table: &str,
        values: &BTreeMap<String, Value>,
    ) -> StoreResult<Record>;
    fn update_record(
        &self,
        table: &str,
        id: RecordId,
        values: &BTreeMap<String, Value>,
    ) -> StoreResult<()>;
    fn delete_record(&self, table: &str, id: RecordId) -> StoreResult<()>;
    fn delete_all_records(&self, table: &str) -> StoreResult<()>;
    /// One created payload per accepted input record; rejected inputs are
    /// dropped, not fatal.
    fn bulk_create_records(&self, table: &str, records: &[Record]) -> StoreResult<Vec<Record>>;
}

#[derive(Debug)]
struct StoredTable {
    columns: Vec<String>,
    rows: Vec<Record>,
    next_id: RecordId,
}

impl StoredTable {
    fn new() -> Self {
        StoredTable {
            columns: vec![ID_COLUMN_KEY.to_string()],
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn create_record(&mut self, values: &BTreeMap<String, Value>) -> StoreResult<Record> {
        if let Some(Value::Text(email)) = values.get("email")
            && !validate::email_pattern().is_match(email)
        {
            return Err(StoreError::Validation("Invalid email format".to_string()));
        }

        for key in values.keys() {
            if key == ID_COLUMN_KEY {
                continue;
            }
            let safe = schema::sanitize_key(key);
            if !self.columns.iter().any(|column| *column == safe) {
                self.columns.push(safe);
            }
        }

        let mut record = Record::new(self.next_id);
        self.next_id += 1;
        for (key, value) in values {
            if key == ID_COLUMN_KEY {
                continue;
            }
            record.set(schema::sanitize_key(key), value.clone());
        }
        self.rows.push(record.clone());
        Ok(record)
    }
}

#[derive(Debug)]
struct Inner {
    reachable: bool,
    tables: BTreeMap<String, StoredTable>,
}

impl Inner {
    fn table(&self, name: &str) -> StoreResult<&StoredTable> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("table \"{name}\" not found")))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut StoredTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("table \"{name}\" not found")))
    }
}

/// In-process stand-in for the remote service, seeded with the primary
/// table.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RefCell<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(PRIMARY_TABLE.to_string(), StoredTable::new());
        MemoryStore {
            inner: RefCell::new(Inner {
                reachable: true,
                tables,
            }),
        }
    }

    /// A store that refuses every call; drives the CLI's local demo mode.
    pub fn offline() -> Self {
        let store = MemoryStore::new();
        store.set_reachable(false);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.inner.borrow_mut().reachable = reachable;
    }

    fn guard(&self) -> StoreResult<()> {
        if self.inner.borrow().reachable {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store offline".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl RemoteStore for MemoryStore {
    fn probe(&self) -> bool {
        self.inner.borrow().reachable
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.guard()?;
        Ok(self.inner.borrow().tables.keys().cloned().collect())
    }

    fn create_table(&self, name: &str) -> StoreResult<String> {
        self.guard()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("table name is required".to_string()));
        }
        let mut inner = self.inner.borrow_mut();
        if inner.tables.contains_key(name) {
            return Err(StoreError::Conflict("table already exists".to_string()));
        }
        inner.tables.insert(name.to_string(), StoredTable::new());
        Ok(name.to_string())
    }

    fn drop_table(&self, name: &str) -> StoreResult<()> {
        self.guard()?;
        if name == PRIMARY_TABLE {
            return Err(StoreError::Conflict(format!(
                "cannot drop the default \"{PRIMARY_TABLE}\" table"
            )));
        }
        self.inner
            .borrow_mut()
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("table \"{name}\" not found")))
    }

    fn list_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        self.guard()?;
        Ok(self.inner.borrow().table(table)?.columns.clone())
    }

    fn add_column(&self, table: &str, column: &NewColumn) -> StoreResult<String> {
        self.guard()?;
        if column.key.trim().is_empty() {
            return Err(StoreError::Validation("column key is required".to_string()));
        }
        let mut inner = self.inner.borrow_mut();
        let stored = inner.table_mut(table)?;
        let safe = schema::sanitize_key(&column.key);
        if stored.columns.iter().any(|existing| *existing == safe) {
            return Err(StoreError::Conflict("column already exists".to_string()));
        }
        stored.columns.push(safe.clone());
        Ok(safe)
    }

    fn remove_column(&self, table: &str, key: &str) -> StoreResult<()> {
        self.guard()?;
        if key == ID_COLUMN_KEY {
            return Err(StoreError::Validation(
                "cannot remove the ID column".to_string(),
            ));
        }
        let mut inner = self.inner.borrow_mut();
        let stored = inner.table_mut(table)?;
        if !stored.columns.iter().any(|existing| existing == key) {
            return Err(StoreError::NotFound(format!("column \"{key}\" not found")));
        }
        stored.columns.retain(|existing| existing != key);
        for row in &mut stored.rows {
            row.values.remove(key);
        }
        Ok(())
    }

    fn list_records(&self, table: &str) -> StoreResult<Vec<Record>> {
        self.guard()?;
        Ok(self.inner.borrow().table(table)?.rows.clone())
    }

    fn create_record(
        &self,
        table: &str,
        values: &BTreeMap<String, Value>,
    ) -> StoreResult<Record> {
        self.guard()?;
        self.inner.borrow_mut().table_mut(table)?.create_record(values)
    }

    fn update_record(
        &self,
        table: &str,
        id: RecordId,
        values: &BTreeMap<String, Value>,
    ) -> StoreResult<()> {
        self.guard()?;
        let mut inner = self.inner.borrow_mut();
        let stored = inner.table_mut(table)?;
        let columns = stored.columns.clone();
        // Zero rows affected is not an error, mirroring the remote service.
        if let Some(row) = stored.rows.iter_mut().find(|row| row.id == id) {
            for (key, value) in values {
                if key == ID_COLUMN_KEY || !columns.iter().any(|column| column == key) {
                    continue;
                }
                row.set(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn delete_record(&self, table: &str, id: RecordId) -> StoreResult<()> {
        self.guard()?;
        let mut inner = self.inner.borrow_mut();
        let stored = inner.table_mut(table)?;
        stored.rows.retain(|row| row.id != id);
        Ok(())
    }

    fn delete_all_records(&self, table: &str) -> StoreResult<()> {
        self.guard()?;
        self.inner.borrow_mut().table_mut(table)?.rows.clear();
        Ok(())
    }

    fn bulk_create_records(&self, table: &str, records: &[Record]) -> StoreResult<Vec<Record>> {
        self.guard()?;
        let mut inner = self.inner.borrow_mut();
        let stored = inner.table_mut(table)?;
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            match stored.create_record(&record.values) {
                Ok(record) => created.push(record),
                Err(StoreError::Validation(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(created)
    }
}
