//! Dual-mode write path: remote-confirmed when connected, optimistic local
//! application with synthesized identifiers when not.
//!
//! Single-record operations are fail-closed: a remote failure leaves
//! local state untouched. Bulk import is fail-open: records stay applied
//! locally even when remote persistence fails, and the divergence is
//! surfaced as a warning rather than hidden. Destructive operations go
//! through a plan/commit pair so the caller decides what actually runs.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::{coerce_form_value, Value},
    error::{Error, Result},
    event::{EventSink, Notice},
    schema::{self, Column, NewColumn, PRIMARY_TABLE},
    store::{RemoteStore, StoreError},
    table::{Record, RecordId, Table, Workspace},
    validate,
};

/// How a mutation reached durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// The remote store confirmed the mutation; local state mirrors it.
    Remote,
    /// Degraded mode: applied to local state only.
    LocalOnly,
    /// Applied locally after the remote store refused; local and remote
    /// state are known to differ.
    Diverged,
}

/// A mutation result plus the mode it was applied under. Degraded success
/// is distinct from full success.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub mode: WriteMode,
}

/// A destructive mutation described before it runs. Produced by the
/// `plan_*` methods; nothing happens until [`Coordinator::commit`].
/// Dropping the plan discards it.
#[derive(Debug)]
pub struct MutationPlan {
    description: String,
    action: PlannedMutation,
}

impl MutationPlan {
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug)]
enum PlannedMutation {
    DeleteRecord { table: String, id: RecordId },
    ClearRecords { table: String },
    RemoveColumn { table: String, key: String },
    DropTable { name: String },
}

pub struct Coordinator<'a> {
    store: &'a dyn RemoteStore,
    connected: bool,
}

impl<'a> Coordinator<'a> {
    /// Starts disconnected; call [`refresh`](Self::refresh) to probe.
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Coordinator {
            store,
            connected: false,
        }
    }

    /// Whether the session reached the remote store at refresh time. Not
    /// re-checked per operation.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Probes the remote store once for the session and, when reachable,
    /// pulls tables plus the columns and records of `table_name`. When
    /// unreachable, the table is initialised locally on first reference.
    pub fn refresh(
        &mut self,
        workspace: &mut Workspace,
        table_name: &str,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        self.connected = self.store.probe();

        if !self.connected {
            workspace.ensure_table(table_name);
            sink.emit(Notice::warning(
                "remote store not reachable; running in local mode",
            ));
            return Ok(());
        }

        let names = match self.store.list_tables() {
            Ok(names) if !names.is_empty() => names,
            Ok(_) => vec![PRIMARY_TABLE.to_string()],
            Err(err) => {
                warn!("listing remote tables failed: {err}");
                vec![PRIMARY_TABLE.to_string()]
            }
        };
        for name in &names {
            workspace.ensure_table(name);
        }

        match self.store.list_columns(table_name) {
            Ok(keys) => {
                let records = self.store.list_records(table_name).unwrap_or_else(|err| {
                    warn!("syncing records for \"{table_name}\" failed: {err}");
                    Vec::new()
                });
                let table = workspace.ensure_table(table_name);
                table.records = records;
                schema::sync_columns(table, &keys);
                debug!(
                    "synced table \"{table_name}\" ({} columns, {} records)",
                    table.columns.len(),
                    table.records.len()
                );
            }
            Err(err) => {
                warn!("syncing columns for \"{table_name}\" failed: {err}");
                workspace.ensure_table(table_name);
            }
        }
        Ok(())
    }

    /// Creates a record from raw form input. Connected sessions are
    /// fail-closed and the remote-confirmed payload, with its
    /// server-assigned id, is what lands locally.
    pub fn create_record(
        &self,
        table: &mut Table,
        input: &BTreeMap<String, String>,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<Record>> {
        let errors = validate::validate_record_input(&table.columns, input);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let values = editable_values(table, input);
        if self.connected {
            let created = self.store.create_record(&table.name, &values)?;
            table.records.push(created.clone());
            sink.emit(Notice::success(format!(
                "record {} created in table \"{}\"",
                created.id, table.name
            )));
            return Ok(Outcome {
                value: created,
                mode: WriteMode::Remote,
            });
        }

        let mut record = Record::new(table.allocate_local_id());
        record.values = values;
        table.records.push(record.clone());
        sink.emit(Notice::warning(format!(
            "record {} created locally in table \"{}\" (remote store not available)",
            record.id, table.name
        )));
        Ok(Outcome {
            value: record,
            mode: WriteMode::LocalOnly,
        })
    }

    /// Updates a record from partial form input; absent fields keep their
    /// current values. Fail-closed when connected.
    pub fn update_record(
        &self,
        table: &mut Table,
        id: RecordId,
        input: &BTreeMap<String, String>,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<Record>> {
        let Some(existing) = table.record(id) else {
            return Err(Error::UnknownRecord { id });
        };

        // The edit buffer starts from the record's current values, so
        // required-field validation sees the full picture.
        let mut merged: BTreeMap<String, String> = table
            .columns
            .iter()
            .filter(|column| column.editable)
            .filter_map(|column| {
                existing
                    .value(&column.key)
                    .map(|value| (column.key.clone(), value.as_display()))
            })
            .collect();
        merged.extend(input.iter().map(|(k, v)| (k.clone(), v.clone())));

        let errors = validate::validate_record_input(&table.columns, &merged);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let values = editable_values(table, &merged);
        if self.connected {
            self.store.update_record(&table.name, id, &values)?;
        }
        let Some(record) = table.record_mut(id) else {
            return Err(Error::UnknownRecord { id });
        };
        for (key, value) in &values {
            record.set(key.clone(), value.clone());
        }
        let updated = record.clone();

        if self.connected {
            sink.emit(Notice::success(format!(
                "record {id} updated in table \"{}\"",
                table.name
            )));
            Ok(Outcome {
                value: updated,
                mode: WriteMode::Remote,
            })
        } else {
            sink.emit(Notice::warning(format!(
                "record {id} updated locally in table \"{}\" (remote store not available)",
                table.name
            )));
            Ok(Outcome {
                value: updated,
                mode: WriteMode::LocalOnly,
            })
        }
    }

    /// Adds a column. When connected, the remote-side key is authoritative
    /// and the column set is re-synced from the store afterwards.
    pub fn add_column(
        &self,
        table: &mut Table,
        new: &NewColumn,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<Column>> {
        if new.key.trim().is_empty() || new.label.trim().is_empty() {
            return Err(Error::Validation(vec![
                "column key and label are required".to_string(),
            ]));
        }
        let requested = schema::sanitize_key(&new.key);
        if table.has_column(&requested) {
            return Err(Error::DuplicateColumn { key: requested });
        }

        if !self.connected {
            let column = schema::add_column(table, new)?;
            sink.emit(Notice::warning(format!(
                "column \"{}\" added to table \"{}\" locally (remote store not available)",
                column.key, table.name
            )));
            return Ok(Outcome {
                value: column,
                mode: WriteMode::LocalOnly,
            });
        }

        let actual_key = self.store.add_column(&table.name, new)?;
        let keys = self.store.list_columns(&table.name)?;
        schema::sync_columns(table, &keys);
        schema::backfill_default(table, &actual_key, new.column_type, new.default_value.as_deref());
        let column = table.column(&actual_key).cloned().ok_or_else(|| {
            Error::Store(StoreError::Protocol(format!(
                "column \"{actual_key}\" missing after remote add"
            )))
        })?;
        sink.emit(Notice::success(format!(
            "column \"{actual_key}\" added to table \"{}\"",
            table.name
        )));
        Ok(Outcome {
            value: column,
            mode: WriteMode::Remote,
        })
    }

    /// Creates a table. Table lifecycle requires a connected session; the
    /// degraded path only materialises tables implicitly on first
    /// reference.
    pub fn create_table(
        &self,
        workspace: &mut Workspace,
        name: &str,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<()>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation(vec!["table name is required".to_string()]));
        }
        if workspace.contains(name) {
            return Err(Error::DuplicateTable {
                name: name.to_string(),
            });
        }
        if !self.connected {
            return Err(Error::Disconnected {
                operation: "create table",
            });
        }
        let confirmed = self.store.create_table(name)?;
        workspace.insert(Table::new(confirmed.as_str()));
        sink.emit(Notice::success(format!("table \"{confirmed}\" created")));
        Ok(Outcome {
            value: (),
            mode: WriteMode::Remote,
        })
    }

    /// Applies an import batch. Never fails: a remote refusal downgrades
    /// to a local-only application with a divergence warning.
    pub fn bulk_create(
        &self,
        table: &mut Table,
        records: Vec<Record>,
        sink: &mut dyn EventSink,
    ) -> Outcome<usize> {
        if self.connected {
            match self.store.bulk_create_records(&table.name, &records) {
                Ok(created) => {
                    let count = created.len();
                    table.records.extend(created);
                    return Outcome {
                        value: count,
                        mode: WriteMode::Remote,
                    };
                }
                Err(err) => {
                    sink.emit(Notice::warning(format!(
                        "bulk create against the remote store failed ({err}); keeping {} record(s) locally",
                        records.len()
                    )));
                    let count = records.len();
                    table.records.extend(records);
                    return Outcome {
                        value: count,
                        mode: WriteMode::Diverged,
                    };
                }
            }
        }

        let count = records.len();
        table.records.extend(records);
        Outcome {
            value: count,
            mode: WriteMode::LocalOnly,
        }
    }

    pub fn plan_delete_record(&self, table: &Table, id: RecordId) -> Result<MutationPlan> {
        if table.record(id).is_none() {
            return Err(Error::UnknownRecord { id });
        }
        Ok(MutationPlan {
            description: format!(
                "delete record {id} from table \"{}\"{}",
                table.name,
                self.degraded_suffix()
            ),
            action: PlannedMutation::DeleteRecord {
                table: table.name.clone(),
                id,
            },
        })
    }

    pub fn plan_clear_records(&self, table: &Table) -> Result<MutationPlan> {
        if table.records.is_empty() {
            return Err(Error::Validation(vec![format!(
                "table \"{}\" has no records to delete",
                table.name
            )]));
        }
        Ok(MutationPlan {
            description: format!(
                "delete all {} record(s) from table \"{}\"{}; this cannot be undone",
                table.records.len(),
                table.name,
                self.degraded_suffix()
            ),
            action: PlannedMutation::ClearRecords {
                table: table.name.clone(),
            },
        })
    }

    pub fn plan_remove_column(&self, table: &Table, key: &str) -> Result<MutationPlan> {
        schema::ensure_removable(table, key)?;
        Ok(MutationPlan {
            description: format!(
                "remove column \"{key}\" from table \"{}\"{}; all data in this column is lost",
                table.name,
                self.degraded_suffix()
            ),
            action: PlannedMutation::RemoveColumn {
                table: table.name.clone(),
                key: key.to_string(),
            },
        })
    }

    pub fn plan_drop_table(&self, workspace: &Workspace, name: &str) -> Result<MutationPlan> {
        if name == PRIMARY_TABLE {
            return Err(Error::ProtectedTable {
                name: name.to_string(),
            });
        }
        let Some(table) = workspace.table(name) else {
            return Err(Error::UnknownTable {
                name: name.to_string(),
            });
        };
        Ok(MutationPlan {
            description: format!(
                "drop table \"{name}\" ({} record(s), {} column(s)); this cannot be undone",
                table.records.len(),
                table.columns.len()
            ),
            action: PlannedMutation::DropTable {
                name: name.to_string(),
            },
        })
    }

    /// Runs a previously planned mutation. The plan is consumed either
    /// way.
    pub fn commit(
        &self,
        workspace: &mut Workspace,
        plan: MutationPlan,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<()>> {
        match plan.action {
            PlannedMutation::DeleteRecord { table, id } => {
                let table = lookup_table(workspace, &table)?;
                self.apply_delete_record(table, id, sink)
            }
            PlannedMutation::ClearRecords { table } => {
                let table = lookup_table(workspace, &table)?;
                self.apply_clear_records(table, sink).map(|outcome| Outcome {
                    value: (),
                    mode: outcome.mode,
                })
            }
            PlannedMutation::RemoveColumn { table, key } => {
                let table = lookup_table(workspace, &table)?;
                self.apply_remove_column(table, &key, sink)
            }
            PlannedMutation::DropTable { name } => self.apply_drop_table(workspace, &name, sink),
        }
    }

    fn apply_delete_record(
        &self,
        table: &mut Table,
        id: RecordId,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<()>> {
        if table.record(id).is_none() {
            return Err(Error::UnknownRecord { id });
        }
        if self.connected {
            self.store.delete_record(&table.name, id)?;
            table.remove_record(id);
            sink.emit(Notice::success(format!(
                "record {id} deleted from table \"{}\"",
                table.name
            )));
            Ok(Outcome {
                value: (),
                mode: WriteMode::Remote,
            })
        } else {
            table.remove_record(id);
            sink.emit(Notice::warning(format!(
                "record {id} deleted locally from table \"{}\" (remote store not available)",
                table.name
            )));
            Ok(Outcome {
                value: (),
                mode: WriteMode::LocalOnly,
            })
        }
    }

    fn apply_clear_records(
        &self,
        table: &mut Table,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<usize>> {
        let count = table.records.len();
        let mode = if self.connected {
            match self.store.delete_all_records(&table.name) {
                Ok(()) => WriteMode::Remote,
                // Local state is cleared regardless so the session keeps a
                // consistent view; the divergence is reported, not hidden.
                Err(err) => {
                    sink.emit(Notice::error(format!(
                        "failed to clear table \"{}\" on the remote store: {err}",
                        table.name
                    )));
                    WriteMode::Diverged
                }
            }
        } else {
            WriteMode::LocalOnly
        };
        table.records.clear();
        match mode {
            WriteMode::Remote => sink.emit(Notice::success(format!(
                "all {count} record(s) deleted from table \"{}\"",
                table.name
            ))),
            WriteMode::LocalOnly | WriteMode::Diverged => sink.emit(Notice::warning(format!(
                "all {count} record(s) deleted from table \"{}\" (local only)",
                table.name
            ))),
        }
        Ok(Outcome { value: count, mode })
    }

    fn apply_remove_column(
        &self,
        table: &mut Table,
        key: &str,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<()>> {
        schema::ensure_removable(table, key)?;
        if self.connected {
            self.store.remove_column(&table.name, key)?;
            schema::remove_column(table, key)?;
            sink.emit(Notice::success(format!(
                "column \"{key}\" removed from table \"{}\"",
                table.name
            )));
            Ok(Outcome {
                value: (),
                mode: WriteMode::Remote,
            })
        } else {
            schema::remove_column(table, key)?;
            sink.emit(Notice::warning(format!(
                "column \"{key}\" removed locally from table \"{}\" (remote store not available)",
                table.name
            )));
            Ok(Outcome {
                value: (),
                mode: WriteMode::LocalOnly,
            })
        }
    }

    fn apply_drop_table(
        &self,
        workspace: &mut Workspace,
        name: &str,
        sink: &mut dyn EventSink,
    ) -> Result<Outcome<()>> {
        if name == PRIMARY_TABLE {
            return Err(Error::ProtectedTable {
                name: name.to_string(),
            });
        }
        if !workspace.contains(name) {
            return Err(Error::UnknownTable {
                name: name.to_string(),
            });
        }
        if !self.connected {
            return Err(Error::Disconnected {
                operation: "drop table",
            });
        }
        self.store.drop_table(name)?;
        workspace.remove(name);
        sink.emit(Notice::success(format!("table \"{name}\" dropped")));
        Ok(Outcome {
            value: (),
            mode: WriteMode::Remote,
        })
    }

    fn degraded_suffix(&self) -> &'static str {
        if self.connected {
            ""
        } else {
            " (local data only)"
        }
    }
}

/// Collects the editable columns' coerced values from raw form input.
fn editable_values(table: &Table, input: &BTreeMap<String, String>) -> BTreeMap<String, Value> {
    table
        .columns
        .iter()
        .filter(|column| column.editable)
        .filter_map(|column| {
            input
                .get(&column.key)
                .map(|raw| (column.key.clone(), coerce_form_value(raw, &column.column_type)))
        })
        .collect()
}

fn lookup_table<'w>(workspace: &'w mut Workspace, name: &str) -> Result<&'w mut Table> {
    workspace.table_mut(name).ok_or_else(|| Error::UnknownTable {
        name: name.to_string(),
    })
}
