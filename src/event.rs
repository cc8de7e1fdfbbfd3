//! Notices emitted by the coordinators.
//!
//! The core reports user-facing outcomes as [`Notice`] values pushed into
//! an [`EventSink`] supplied by the caller. Presentation state lives with
//! the caller, never in the core.

use log::{error, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Notice {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, notice: Notice);
}

/// Routes notices through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, notice: Notice) {
        match notice.severity {
            Severity::Info | Severity::Success => info!("{}", notice.message),
            Severity::Warning => warn!("{}", notice.message),
            Severity::Error => error!("{}", notice.message),
        }
    }
}

/// Collects notices for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub notices: Vec<Notice>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.notices
            .iter()
            .any(|n| n.severity == severity && n.message.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
