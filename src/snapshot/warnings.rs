// src/snapshot/warnings.rs

//! Append-only warning sink shared by all inspectors.
//!
//! The sink is the only mutable object inspectors share. Appends are
//! serialized through a mutex; nothing reads the list until the inspection
//! phase is over, at which point the sink is sealed into the snapshot and
//! becomes immutable like everything else.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Error,
    Warn,
    Info,
}

/// Structured warning event carried into every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    /// Name of the originating inspector
    pub source: String,
    /// Affected resource (path, unit, package), when one exists
    #[serde(default)]
    pub resource: String,
    pub message: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub dismissible: bool,
}

#[derive(Debug, Default)]
pub struct WarningSink {
    entries: Mutex<Vec<Warning>>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, warning: Warning) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(warning);
        }
    }

    pub fn warn(&self, source: &str, message: impl Into<String>) {
        self.push(Warning {
            severity: Severity::Warn,
            source: source.to_string(),
            resource: String::new(),
            message: message.into(),
            suggestion: String::new(),
            dismissible: true,
        });
    }

    pub fn info(&self, source: &str, message: impl Into<String>) {
        self.push(Warning {
            severity: Severity::Info,
            source: source.to_string(),
            resource: String::new(),
            message: message.into(),
            suggestion: String::new(),
            dismissible: true,
        });
    }

    /// Consume the sink, returning warnings in append order.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.entries.into_inner().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
