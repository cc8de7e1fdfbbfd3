//! Error taxonomy shared across the core.
//!
//! Parse failures abort an import before any schema mutation happens.
//! Row-level validation failures are collected, never fatal to a batch.
//! Remote store failures are fail-closed for single-record mutations and
//! fail-open for bulk import; see the `mutation` module.

use thiserror::Error;

use crate::{store::StoreError, table::RecordId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// CSV text contained no lines after blank-line filtering.
    #[error("CSV input is empty")]
    EmptyInput,

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("column \"{key}\" is protected and cannot be removed")]
    ProtectedColumn { key: String },

    #[error("table \"{name}\" is protected and cannot be dropped")]
    ProtectedTable { name: String },

    #[error("column \"{key}\" already exists")]
    DuplicateColumn { key: String },

    #[error("table \"{name}\" already exists")]
    DuplicateTable { name: String },

    #[error("unknown table \"{name}\"")]
    UnknownTable { name: String },

    #[error("unknown column \"{key}\"")]
    UnknownColumn { key: String },

    #[error("no record with id {id}")]
    UnknownRecord { id: RecordId },

    /// The operation is only available while the remote store is reachable.
    #[error("cannot {operation}: remote store not available")]
    Disconnected { operation: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}
