//! Append-only audit trail of transactions.

use super::TransactionState;
use crate::apply::ApplyError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub index: usize,
    pub operation: String,
    pub target: String,
    /// Nodes affected across all parts
    pub affected: usize,
    /// Parts the operation changed, as `package:part`
    pub parts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApplyError>,
}

/// Semantic effect of a transaction on one part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartChange {
    pub package: String,
    pub part: String,
    /// Similarity between the pre-image and the result, 0.0 to 1.0
    pub similarity: f64,
    pub differences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub transaction_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: TransactionState,
    pub success: bool,
    pub dry_run: bool,
    pub packages: Vec<String>,
    pub operations_completed: Vec<OperationRecord>,
    pub operations_failed: Vec<OperationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub changes: Vec<PartChange>,
}

/// Records are kept in memory and, when a sink is configured, appended to
/// it as JSON lines.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    sink: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink<P: AsRef<Path>>(path: P) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sink: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn sink(&self) -> Option<&Path> {
        self.sink.as_deref()
    }

    /// Append a record. The in-memory copy is kept even if the sink write
    /// fails.
    pub fn append(&self, record: AuditRecord) -> std::io::Result<()> {
        let line = match &self.sink {
            Some(_) => Some(serde_json::to_string(&record).map_err(std::io::Error::other)?),
            None => None,
        };
        let mut records = self.records.lock();
        records.push(record);

        if let (Some(path), Some(mut line)) = (&self.sink, line) {
            line.push('\n');
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn last(&self) -> Option<AuditRecord> {
        self.records.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
