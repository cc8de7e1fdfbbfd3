use std::collections::BTreeMap;

use table_managed::{
    event::{MemorySink, Severity},
    mutation::{Coordinator, WriteMode},
    schema::{ColumnType, NewColumn, PRIMARY_TABLE},
    store::{MemoryStore, RemoteStore, StoreError},
    table::Workspace,
    Error,
};

fn input(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn new_column(key: &str, column_type: ColumnType, required: bool) -> NewColumn {
    NewColumn {
        key: key.to_string(),
        label: key.to_string(),
        column_type,
        required,
        default_value: None,
    }
}

fn refreshed<'a>(
    store: &'a MemoryStore,
    workspace: &mut Workspace,
    sink: &mut MemorySink,
) -> Coordinator<'a> {
    let mut coordinator = Coordinator::new(store);
    coordinator
        .refresh(workspace, PRIMARY_TABLE, sink)
        .expect("refresh");
    coordinator
}

#[test]
fn disconnected_create_reports_degraded_success_with_unique_ids() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);
    assert!(!coordinator.connected());

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("name", ColumnType::Text, false), &mut sink)
        .expect("add column");

    let first = coordinator
        .create_record(table, &input(&[("name", "A")]), &mut sink)
        .expect("create");
    let second = coordinator
        .create_record(table, &input(&[("name", "B")]), &mut sink)
        .expect("create");

    assert_eq!(first.mode, WriteMode::LocalOnly);
    assert_eq!(second.mode, WriteMode::LocalOnly);
    assert_ne!(first.value.id, second.value.id);
    assert!(sink.contains(Severity::Warning, "created locally"));
    assert_eq!(table.records.len(), 2);
}

#[test]
fn connected_create_uses_the_remote_confirmed_payload() {
    let store = MemoryStore::new();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);
    assert!(coordinator.connected());

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("name", ColumnType::Text, false), &mut sink)
        .expect("add column");
    let outcome = coordinator
        .create_record(table, &input(&[("name", "Jane")]), &mut sink)
        .expect("create");

    assert_eq!(outcome.mode, WriteMode::Remote);
    assert_eq!(outcome.value.id, 1);
    assert_eq!(store.list_records(PRIMARY_TABLE).expect("records").len(), 1);
}

#[test]
fn single_record_operations_are_fail_closed() {
    let store = MemoryStore::new();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("name", ColumnType::Text, false), &mut sink)
        .expect("add column");
    coordinator
        .create_record(table, &input(&[("name", "Jane")]), &mut sink)
        .expect("create");

    // Connected flag is per session; the store failing afterwards must not
    // leave half-applied local state.
    store.set_reachable(false);
    let err = coordinator
        .create_record(table, &input(&[("name", "Lost")]), &mut sink)
        .expect_err("create must fail");
    assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
    assert_eq!(table.records.len(), 1);

    let err = coordinator
        .update_record(table, 1, &input(&[("name", "Changed")]), &mut sink)
        .expect_err("update must fail");
    assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
    assert_eq!(
        table.records[0].value("name").and_then(|v| v.as_str()),
        Some("Jane")
    );
}

#[test]
fn update_merges_partial_input_over_current_values() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("name", ColumnType::Text, true), &mut sink)
        .expect("add name");
    coordinator
        .add_column(table, &new_column("age", ColumnType::Number, false), &mut sink)
        .expect("add age");
    let created = coordinator
        .create_record(table, &input(&[("name", "Jane"), ("age", "30")]), &mut sink)
        .expect("create");

    let outcome = coordinator
        .update_record(table, created.value.id, &input(&[("age", "31")]), &mut sink)
        .expect("update");
    assert_eq!(
        outcome.value.value("name").and_then(|v| v.as_str()),
        Some("Jane")
    );
    assert_eq!(
        outcome.value.value("age").and_then(|v| v.as_number()),
        Some(31.0)
    );

    let err = coordinator
        .update_record(table, 999, &input(&[("age", "1")]), &mut sink)
        .expect_err("unknown record");
    assert!(matches!(err, Error::UnknownRecord { id: 999 }));
}

#[test]
fn form_validation_blocks_bad_email_and_missing_required_fields() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("name", ColumnType::Text, true), &mut sink)
        .expect("add name");
    coordinator
        .add_column(table, &new_column("email", ColumnType::Email, false), &mut sink)
        .expect("add email");

    let err = coordinator
        .create_record(table, &input(&[("email", "broken")]), &mut sink)
        .expect_err("validation must fail");
    let Error::Validation(messages) = err else {
        panic!("expected validation error");
    };
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("valid email address"));
    assert!(messages[1].contains("required fields: name"));
    assert!(table.records.is_empty());
}

#[test]
fn number_fields_coerce_with_truncation_and_zero_fallback() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    coordinator
        .add_column(table, &new_column("age", ColumnType::Number, false), &mut sink)
        .expect("add age");

    let outcome = coordinator
        .create_record(table, &input(&[("age", "41.9")]), &mut sink)
        .expect("create");
    assert_eq!(
        outcome.value.value("age").and_then(|v| v.as_number()),
        Some(41.0)
    );

    let outcome = coordinator
        .create_record(table, &input(&[("age", "junk")]), &mut sink)
        .expect("create");
    assert_eq!(
        outcome.value.value("age").and_then(|v| v.as_number()),
        Some(0.0)
    );
}

#[test]
fn connected_add_column_uses_the_remote_sanitized_key() {
    let store = MemoryStore::new();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
    let outcome = coordinator
        .add_column(table, &new_column("Home City", ColumnType::Text, false), &mut sink)
        .expect("add column");

    assert_eq!(outcome.mode, WriteMode::Remote);
    assert_eq!(outcome.value.key, "home_city");
    assert!(table.has_column("home_city"));

    let err = coordinator
        .add_column(table, &new_column("home city", ColumnType::Text, false), &mut sink)
        .expect_err("duplicate key");
    assert!(matches!(err, Error::DuplicateColumn { .. }));
}

#[test]
fn delete_and_clear_go_through_plan_and_commit() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    {
        let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
        coordinator
            .add_column(table, &new_column("name", ColumnType::Text, false), &mut sink)
            .expect("add column");
        coordinator
            .create_record(table, &input(&[("name", "A")]), &mut sink)
            .expect("create");
        coordinator
            .create_record(table, &input(&[("name", "B")]), &mut sink)
            .expect("create");
    }

    let plan = {
        let table = workspace.table(PRIMARY_TABLE).expect("users table");
        coordinator.plan_delete_record(table, 1).expect("plan")
    };
    assert!(plan.description().contains("delete record 1"));
    assert!(plan.description().contains("(local data only)"));
    coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect("commit");
    assert_eq!(
        workspace.table(PRIMARY_TABLE).expect("table").records.len(),
        1
    );

    let plan = {
        let table = workspace.table(PRIMARY_TABLE).expect("users table");
        coordinator.plan_clear_records(table).expect("plan")
    };
    let outcome = coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect("commit");
    assert_eq!(outcome.mode, WriteMode::LocalOnly);
    assert!(workspace
        .table(PRIMARY_TABLE)
        .expect("table")
        .records
        .is_empty());

    let table = workspace.table(PRIMARY_TABLE).expect("users table");
    let err = coordinator
        .plan_clear_records(table)
        .expect_err("nothing left to clear");
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn clear_records_diverges_when_the_remote_refuses() {
    let store = MemoryStore::new();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    {
        let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
        coordinator
            .add_column(table, &new_column("name", ColumnType::Text, false), &mut sink)
            .expect("add column");
        coordinator
            .create_record(table, &input(&[("name", "A")]), &mut sink)
            .expect("create");
    }

    store.set_reachable(false);
    let plan = {
        let table = workspace.table(PRIMARY_TABLE).expect("users table");
        coordinator.plan_clear_records(table).expect("plan")
    };
    let outcome = coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect("commit");

    assert_eq!(outcome.mode, WriteMode::Diverged);
    assert!(workspace
        .table(PRIMARY_TABLE)
        .expect("table")
        .records
        .is_empty());
    assert!(sink.contains(Severity::Error, "failed to clear"));
}

#[test]
fn identity_column_removal_always_fails() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    for name in [PRIMARY_TABLE, "projects"] {
        workspace.ensure_table(name);
        let table = workspace.table(name).expect("table");
        let err = coordinator
            .plan_remove_column(table, "id")
            .expect_err("id must be protected");
        assert!(matches!(err, Error::ProtectedColumn { .. }));
    }
}

#[test]
fn non_baseline_columns_can_be_removed() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    {
        let table = workspace.table_mut(PRIMARY_TABLE).expect("users table");
        coordinator
            .add_column(table, &new_column("nickname", ColumnType::Text, false), &mut sink)
            .expect("add column");
        coordinator
            .create_record(table, &input(&[("nickname", "JJ")]), &mut sink)
            .expect("create");
    }

    let plan = {
        let table = workspace.table(PRIMARY_TABLE).expect("users table");
        coordinator.plan_remove_column(table, "nickname").expect("plan")
    };
    coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect("commit");

    let table = workspace.table(PRIMARY_TABLE).expect("users table");
    assert!(!table.has_column("nickname"));
    assert!(table.records[0].value("nickname").is_none());
}

#[test]
fn table_lifecycle_requires_a_connected_session() {
    let store = MemoryStore::offline();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    let err = coordinator
        .create_table(&mut workspace, "projects", &mut sink)
        .expect_err("disconnected create must fail");
    assert!(matches!(err, Error::Disconnected { .. }));

    workspace.ensure_table("scratch");
    let plan = coordinator
        .plan_drop_table(&workspace, "scratch")
        .expect("plan");
    let err = coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect_err("disconnected drop must fail");
    assert!(matches!(err, Error::Disconnected { .. }));
    assert!(workspace.contains("scratch"));
}

#[test]
fn connected_table_lifecycle_round_trips() {
    let store = MemoryStore::new();
    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);

    coordinator
        .create_table(&mut workspace, "projects", &mut sink)
        .expect("create table");
    assert!(workspace.contains("projects"));
    assert!(store
        .list_tables()
        .expect("tables")
        .contains(&"projects".to_string()));

    let err = coordinator
        .create_table(&mut workspace, "projects", &mut sink)
        .expect_err("duplicate table");
    assert!(matches!(err, Error::DuplicateTable { .. }));

    let plan = coordinator
        .plan_drop_table(&workspace, "projects")
        .expect("plan");
    assert!(plan.description().contains("drop table \"projects\""));
    coordinator
        .commit(&mut workspace, plan, &mut sink)
        .expect("commit");
    assert!(!workspace.contains("projects"));

    let err = coordinator
        .plan_drop_table(&workspace, PRIMARY_TABLE)
        .expect_err("primary table is protected");
    assert!(matches!(err, Error::ProtectedTable { .. }));
}

#[test]
fn refresh_syncs_remote_columns_and_records() {
    let store = MemoryStore::new();
    store
        .create_record(
            PRIMARY_TABLE,
            &input(&[("name", "Jane"), ("email", "jane@x.com")])
                .into_iter()
                .map(|(k, v)| (k, table_managed::data::Value::Text(v)))
                .collect(),
        )
        .expect("seed record");

    let mut workspace = Workspace::new();
    let mut sink = MemorySink::new();
    let coordinator = refreshed(&store, &mut workspace, &mut sink);
    assert!(coordinator.connected());

    let table = workspace.table(PRIMARY_TABLE).expect("users table");
    assert_eq!(table.records.len(), 1);
    assert_eq!(table.columns[0].key, "id");
    assert!(!table.columns[0].editable);
    let email = table.column("email").expect("email column");
    assert_eq!(email.column_type, ColumnType::Email);
    assert_eq!(email.label, "Email");
}
