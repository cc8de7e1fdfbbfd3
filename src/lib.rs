pub mod cli;
pub mod data;
pub mod error;
pub mod event;
pub mod import;
pub mod infer;
pub mod io_utils;
pub mod mutation;
pub mod render;
pub mod schema;
pub mod store;
pub mod table;
pub mod tokenizer;
pub mod validate;

use std::{env, path::Path, str::FromStr, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{info, LevelFilter};

use crate::{
    cli::{Cli, ColumnCommand, Commands, RecordCommand, TableCommand},
    event::LogSink,
    mutation::{Coordinator, MutationPlan},
    schema::{ColumnType, NewColumn, PRIMARY_TABLE},
    store::MemoryStore,
    table::Workspace,
};

pub use crate::error::Error;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_managed", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Row-level validation errors shown before the summary truncates.
const MAX_ERRORS_SHOWN: usize = 5;

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let workspace_path = cli.workspace.clone();
    match cli.command {
        Commands::Import(args) => handle_import(&workspace_path, &args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Infer(args) => handle_infer(&args),
        Commands::Tables(command) => handle_tables(&workspace_path, &command),
        Commands::Columns(command) => handle_columns(&workspace_path, &command),
        Commands::Records(command) => handle_records(&workspace_path, &command),
    }
}

fn open_workspace(path: &Path) -> Result<Workspace> {
    Workspace::load_or_default(path).with_context(|| format!("Loading workspace {path:?}"))
}

fn save_workspace(workspace: &Workspace, path: &Path) -> Result<()> {
    workspace
        .save(path)
        .with_context(|| format!("Saving workspace {path:?}"))
}

fn print_plan(plan: &MutationPlan) {
    info!("planned: {}", plan.description());
    info!("re-run with --yes to apply");
}

fn handle_import(workspace_path: &Path, args: &cli::ImportArgs) -> Result<()> {
    let text = io_utils::read_csv_file(&args.input, args.input_encoding.as_deref())?;

    if !args.yes {
        let preview = import::preview(&text, import::PREVIEW_ROWS)?;
        info!(
            "would import {} row(s) with {} column(s) into table \"{}\"",
            preview.total_rows.min(import::MAX_IMPORT_ROWS),
            preview.headers.len(),
            args.table.table
        );
        render::print_table(&preview.headers, &preview.rows);
        info!("re-run with --yes to apply the import");
        return Ok(());
    }

    let mut workspace = open_workspace(workspace_path)?;
    let store = MemoryStore::offline();
    let mut coordinator = Coordinator::new(&store);
    let mut sink = LogSink;
    coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;

    let report = {
        let table = workspace
            .table_mut(&args.table.table)
            .context("table missing after refresh")?;
        import::import_csv(&coordinator, table, &text, &mut sink)?
    };
    save_workspace(&workspace, workspace_path)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Serializing import report")?
        );
        return Ok(());
    }

    if !report.merged_columns.is_empty() {
        info!(
            "added column(s): {}",
            report.merged_columns.iter().join(", ")
        );
    }
    if !report.errors.is_empty() {
        for line in report.errors.iter().take(MAX_ERRORS_SHOWN) {
            println!("{line}");
        }
        if report.errors.len() > MAX_ERRORS_SHOWN {
            println!(
                "... and {} more error(s)",
                report.errors.len() - MAX_ERRORS_SHOWN
            );
        }
    }
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let text = io_utils::read_csv_file(&args.input, args.input_encoding.as_deref())?;
    let preview = import::preview(&text, args.rows)?;
    render::print_table(&preview.headers, &preview.rows);
    info!(
        "{} of {} data row(s) shown, {} column(s)",
        preview.rows.len(),
        preview.total_rows,
        preview.headers.len()
    );
    Ok(())
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let text = io_utils::read_csv_file(&args.input, args.input_encoding.as_deref())?;
    let parsed = tokenizer::parse(&text)?;
    let rows = &parsed.rows[..parsed.rows.len().min(import::MAX_IMPORT_ROWS)];

    let mut output_rows = Vec::with_capacity(parsed.headers.len());
    for header in &parsed.headers {
        let samples: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(header))
            .filter(|value| !value.trim().is_empty())
            .take(infer::MAX_SAMPLE_VALUES)
            .cloned()
            .collect();
        let inference = infer::infer(header, &samples);
        output_rows.push(vec![
            header.clone(),
            schema::sanitize_key(header),
            inference.column_type.to_string(),
            inference.required.to_string(),
        ]);
    }

    let headers = ["header", "key", "type", "required"]
        .map(String::from)
        .to_vec();
    render::print_table(&headers, &output_rows);
    Ok(())
}

fn handle_tables(workspace_path: &Path, command: &TableCommand) -> Result<()> {
    let mut workspace = open_workspace(workspace_path)?;
    let store = MemoryStore::offline();
    let mut coordinator = Coordinator::new(&store);
    let mut sink = LogSink;

    match command {
        TableCommand::List => {
            let rows: Vec<Vec<String>> = workspace
                .names()
                .into_iter()
                .filter_map(|name| workspace.table(name))
                .map(|table| {
                    vec![
                        table.name.clone(),
                        table.columns.len().to_string(),
                        table.records.len().to_string(),
                    ]
                })
                .collect();
            let headers = ["table", "columns", "records"].map(String::from).to_vec();
            render::print_table(&headers, &rows);
            Ok(())
        }
        TableCommand::Create(args) => {
            coordinator.refresh(&mut workspace, PRIMARY_TABLE, &mut sink)?;
            coordinator.create_table(&mut workspace, &args.name, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
        TableCommand::Drop(args) => {
            coordinator.refresh(&mut workspace, PRIMARY_TABLE, &mut sink)?;
            let plan = coordinator.plan_drop_table(&workspace, &args.name)?;
            if !args.yes {
                print_plan(&plan);
                return Ok(());
            }
            coordinator.commit(&mut workspace, plan, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
    }
}

fn handle_columns(workspace_path: &Path, command: &ColumnCommand) -> Result<()> {
    let mut workspace = open_workspace(workspace_path)?;
    let store = MemoryStore::offline();
    let mut coordinator = Coordinator::new(&store);
    let mut sink = LogSink;

    match command {
        ColumnCommand::List(table_ref) => {
            let table = workspace
                .table(&table_ref.table)
                .with_context(|| format!("Unknown table \"{}\"", table_ref.table))?;
            let rows: Vec<Vec<String>> = table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    vec![
                        (idx + 1).to_string(),
                        column.key.clone(),
                        column.label.clone(),
                        column.column_type.to_string(),
                        column.required.to_string(),
                        column.editable.to_string(),
                    ]
                })
                .collect();
            let headers = ["#", "key", "label", "type", "required", "editable"]
                .map(String::from)
                .to_vec();
            render::print_table(&headers, &rows);
            Ok(())
        }
        ColumnCommand::Add(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let column_type = ColumnType::from_str(&args.column_type)?;
            let key = schema::sanitize_key(&args.key);
            let new = NewColumn {
                key: args.key.clone(),
                label: args
                    .label
                    .clone()
                    .unwrap_or_else(|| schema::label_for_key(&key)),
                column_type,
                required: args.required,
                default_value: args.default_value.clone(),
            };
            let table = workspace
                .table_mut(&args.table.table)
                .context("table missing after refresh")?;
            coordinator.add_column(table, &new, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
        ColumnCommand::Remove(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let table = workspace
                .table(&args.table.table)
                .context("table missing after refresh")?;
            let plan = coordinator.plan_remove_column(table, &args.key)?;
            if !args.yes {
                print_plan(&plan);
                return Ok(());
            }
            coordinator.commit(&mut workspace, plan, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
    }
}

fn handle_records(workspace_path: &Path, command: &RecordCommand) -> Result<()> {
    let mut workspace = open_workspace(workspace_path)?;
    let store = MemoryStore::offline();
    let mut coordinator = Coordinator::new(&store);
    let mut sink = LogSink;

    match command {
        RecordCommand::List(table_ref) => {
            let table = workspace
                .table(&table_ref.table)
                .with_context(|| format!("Unknown table \"{}\"", table_ref.table))?;
            let headers: Vec<String> = table
                .columns
                .iter()
                .map(|column| column.label.clone())
                .collect();
            let rows: Vec<Vec<String>> = table
                .records
                .iter()
                .map(|record| {
                    table
                        .columns
                        .iter()
                        .map(|column| {
                            if column.key == schema::ID_COLUMN_KEY {
                                record.id.to_string()
                            } else {
                                record
                                    .value(&column.key)
                                    .map(|value| value.as_display())
                                    .unwrap_or_default()
                            }
                        })
                        .collect()
                })
                .collect();
            render::print_table(&headers, &rows);
            info!(
                "{} record(s) in table \"{}\"",
                table.records.len(),
                table.name
            );
            Ok(())
        }
        RecordCommand::Create(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let input = args.sets.iter().cloned().collect();
            let table = workspace
                .table_mut(&args.table.table)
                .context("table missing after refresh")?;
            let outcome = coordinator.create_record(table, &input, &mut sink)?;
            info!("created record {}", outcome.value.id);
            save_workspace(&workspace, workspace_path)
        }
        RecordCommand::Update(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let input = args.sets.iter().cloned().collect();
            let table = workspace
                .table_mut(&args.table.table)
                .context("table missing after refresh")?;
            coordinator.update_record(table, args.id, &input, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
        RecordCommand::Delete(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let table = workspace
                .table(&args.table.table)
                .context("table missing after refresh")?;
            let plan = coordinator.plan_delete_record(table, args.id)?;
            if !args.yes {
                print_plan(&plan);
                return Ok(());
            }
            coordinator.commit(&mut workspace, plan, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
        RecordCommand::Clear(args) => {
            coordinator.refresh(&mut workspace, &args.table.table, &mut sink)?;
            let table = workspace
                .table(&args.table.table)
                .context("table missing after refresh")?;
            let plan = coordinator.plan_clear_records(table)?;
            if !args.yes {
                print_plan(&plan);
                return Ok(());
            }
            coordinator.commit(&mut workspace, plan, &mut sink)?;
            save_workspace(&workspace, workspace_path)
        }
    }
}
