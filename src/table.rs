//! Tables, records, and the workspace state container.
//!
//! [`Workspace`] owns every table the session knows about and exposes read
//! accessors plus explicit mutation methods; there is no implicit
//! subscriber machinery. A table owns its columns and records exclusively;
//! the schema registry and the mutation coordinator are the only writers.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    schema::{Column, PRIMARY_TABLE},
};

pub type RecordId = i64;

/// One row of data, keyed by column keys. The identifier is remote-issued
/// when connected and locally synthesized otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Record {
            id,
            values: BTreeMap::new(),
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

/// A named collection of records sharing one column schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
    /// Protects the creation-time baseline columns from deletion. Set for
    /// the primary table only; a policy per table, not per column.
    #[serde(default)]
    pub protect_baseline: bool,
    #[serde(default)]
    pub baseline: Vec<String>,
    #[serde(default)]
    next_local_id: RecordId,
}

impl Table {
    /// An empty table carrying only the identity column.
    pub fn new(name: impl Into<String>) -> Self {
        let columns = vec![Column::identity()];
        let baseline = columns.iter().map(|column| column.key.clone()).collect();
        Table {
            name: name.into(),
            columns,
            records: Vec::new(),
            protect_baseline: false,
            baseline,
            next_local_id: 1,
        }
    }

    /// The primary entity table: same shape, baseline protection on.
    pub fn primary() -> Self {
        let mut table = Table::new(PRIMARY_TABLE);
        table.protect_baseline = true;
        table
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.column(key).is_some()
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    /// Removes the record with `id`, reporting whether it existed.
    pub fn remove_record(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.records.len() != before
    }

    /// Synthesizes a local identifier: monotonically increasing, never
    /// reused, always above every id currently in the table.
    pub fn allocate_local_id(&mut self) -> RecordId {
        let ceiling = self
            .records
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
            + 1;
        let id = self.next_local_id.max(ceiling);
        self.next_local_id = id + 1;
        id
    }
}

/// Explicit state container owning every table in the session.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Workspace {
    tables: BTreeMap<String, Table>,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Returns the named table, creating it on first reference. The
    /// primary table comes up with its protected baseline.
    pub fn ensure_table(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_insert_with(|| {
            if name == PRIMARY_TABLE {
                Table::primary()
            } else {
                Table::new(name)
            }
        })
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating workspace file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing workspace YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening workspace file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing workspace YAML")
    }

    /// Loads a workspace, starting fresh (primary table only) when the
    /// file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Workspace::load(path)
        } else {
            let mut workspace = Workspace::new();
            workspace.ensure_table(PRIMARY_TABLE);
            Ok(workspace)
        }
    }
}
