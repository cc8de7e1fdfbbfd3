use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage dynamic-schema tables with CSV import", long_about = None)]
pub struct Cli {
    /// Workspace file holding tables, columns, and records
    #[arg(short, long, global = true, default_value = "tables.yaml")]
    pub workspace: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a CSV file into a table, inferring new columns from headers
    Import(ImportArgs),
    /// Preview the first rows of a CSV file before importing
    Preview(PreviewArgs),
    /// Show the columns that would be inferred from a CSV file
    Infer(InferArgs),
    /// List, create, or drop tables
    #[command(subcommand)]
    Tables(TableCommand),
    /// List, add, or remove a table's columns
    #[command(subcommand)]
    Columns(ColumnCommand),
    /// List and mutate a table's records
    #[command(subcommand)]
    Records(RecordCommand),
}

#[derive(Debug, Args)]
pub struct TableRef {
    /// Target table (created on first reference)
    #[arg(short, long, default_value = "users")]
    pub table: String,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// CSV file to import
    #[arg(short, long)]
    pub input: PathBuf,
    #[command(flatten)]
    pub table: TableRef,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the import report as JSON
    #[arg(long)]
    pub json: bool,
    /// Apply immediately instead of showing the plan
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CSV file to preview
    #[arg(short, long)]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// CSV file to inspect
    #[arg(short, long)]
    pub input: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TableCommand {
    /// List tables in the workspace
    List,
    /// Create a table (requires a connected session)
    Create(CreateTableArgs),
    /// Drop a table and all of its data
    Drop(DropTableArgs),
}

#[derive(Debug, Args)]
pub struct CreateTableArgs {
    pub name: String,
}

#[derive(Debug, Args)]
pub struct DropTableArgs {
    pub name: String,
    /// Apply immediately instead of showing the plan
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum ColumnCommand {
    /// List a table's columns
    List(TableRef),
    /// Add a column to a table
    Add(AddColumnArgs),
    /// Remove a column and all data in it
    Remove(RemoveColumnArgs),
}

#[derive(Debug, Args)]
pub struct AddColumnArgs {
    #[command(flatten)]
    pub table: TableRef,
    /// Column key (sanitized to [a-z0-9_])
    pub key: String,
    /// Display label (defaults to a title-cased key)
    #[arg(long)]
    pub label: Option<String>,
    /// Column type: text, number, email, tel, url, date, checkbox
    #[arg(long = "type", default_value = "text")]
    pub column_type: String,
    /// Mark the column as required in forms
    #[arg(long)]
    pub required: bool,
    /// Value back-filled into existing records
    #[arg(long = "default")]
    pub default_value: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveColumnArgs {
    #[command(flatten)]
    pub table: TableRef,
    pub key: String,
    /// Apply immediately instead of showing the plan
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// List a table's records
    List(TableRef),
    /// Create a record from key=value assignments
    Create(CreateRecordArgs),
    /// Update fields of an existing record
    Update(UpdateRecordArgs),
    /// Delete one record
    Delete(DeleteRecordArgs),
    /// Delete every record in a table
    Clear(ClearRecordsArgs),
}

#[derive(Debug, Args)]
pub struct CreateRecordArgs {
    #[command(flatten)]
    pub table: TableRef,
    /// Field assignments of the form `key=value`
    #[arg(short = 's', long = "set", value_parser = parse_assignment, required = true, action = clap::ArgAction::Append)]
    pub sets: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct UpdateRecordArgs {
    #[command(flatten)]
    pub table: TableRef,
    /// Record identifier
    pub id: i64,
    /// Field assignments of the form `key=value`
    #[arg(short = 's', long = "set", value_parser = parse_assignment, required = true, action = clap::ArgAction::Append)]
    pub sets: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct DeleteRecordArgs {
    #[command(flatten)]
    pub table: TableRef,
    /// Record identifier
    pub id: i64,
    /// Apply immediately instead of showing the plan
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ClearRecordsArgs {
    #[command(flatten)]
    pub table: TableRef,
    /// Apply immediately instead of showing the plan
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn parse_assignment(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err("Assignments must use the form key=value".to_string()),
    }
}
