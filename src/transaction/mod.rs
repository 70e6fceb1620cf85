//! Atomic application of patch sets.
//!
//! A [`Transaction`] owns mutable access to one or more packages and walks
//! the state machine
//!
//! ```text
//! Pending -> Applying -> Committed
//!                     -> RolledBack
//!                     -> Failed (rollback itself failed)
//! ```
//!
//! Parts are snapshotted the first time an operation is about to change
//! them. The first failing operation restores every snapshot, so no package
//! ever reflects part of a patch set. A transaction dropped while still
//! applying is rolled back the same way.
//!
//! ```
//! use kumquat::opc::Package;
//! use kumquat::patch::{PatchOperation, PatchSet};
//! use kumquat::transaction::{LockRegistry, Transaction, TransactionOptions, TransactionState};
//!
//! # fn run(mut package: Package) -> Result<(), Box<dyn std::error::Error>> {
//! let locks = LockRegistry::new();
//! let patch = PatchSet::new(vec![PatchOperation::set("//p:sldSz/@cx", "12192000")]);
//!
//! let mut tx = Transaction::begin(&locks, std::slice::from_mut(&mut package), TransactionOptions::default())?;
//! tx.apply(&patch)?;
//! let record = tx.commit()?;
//! assert_eq!(record.state, TransactionState::Committed);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod error;
pub mod lock;

pub use audit::{AuditLog, AuditRecord, OperationRecord, PartChange};
pub use error::{Result, TransactionError};
pub use lock::{LockRegistry, PackageLock};

use crate::apply::{Applier, ApplyError, ApplyErrorKind, Plan};
use crate::opc::{Package, PackagePart};
use crate::patch::{PatchOperation, PatchSet};
use crate::xml::{NamespaceMap, XmlDocument, compare_documents};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Pending,
    Applying,
    Committed,
    RolledBack,
    Failed,
}

impl TransactionState {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionState::Pending => "pending",
            TransactionState::Applying => "applying",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled_back",
            TransactionState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Failed
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Apply and validate, then roll back instead of committing
    pub dry_run: bool,
    /// Zero matches for any operation is a failure
    pub require_matches: bool,
    /// Re-parse and compare changed parts before commit
    pub validate: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            require_matches: false,
            validate: true,
        }
    }
}

/// Outcome of a whole transaction, returned as data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionResult {
    pub success: bool,
    pub state: TransactionState,
    pub dry_run: bool,
    pub audit: AuditRecord,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl TransactionResult {
    fn from_record(record: AuditRecord) -> Self {
        Self {
            success: record.success,
            state: record.state,
            dry_run: record.dry_run,
            warnings: record.warnings.clone(),
            errors: record.error.iter().cloned().collect(),
            audit: record,
        }
    }

    /// Result for a transaction that never got as far as applying.
    pub(crate) fn not_started(packages: Vec<String>, options: TransactionOptions, error: String) -> Self {
        let now = Utc::now();
        Self::from_record(AuditRecord {
            transaction_id: Uuid::new_v4(),
            started_at: now,
            finished_at: Some(now),
            state: TransactionState::Failed,
            success: false,
            dry_run: options.dry_run,
            packages,
            operations_completed: Vec::new(),
            operations_failed: Vec::new(),
            error: Some(error),
            warnings: Vec::new(),
            changes: Vec::new(),
        })
    }
}

/// Per-part work planned for one operation.
struct PartPlan {
    package: usize,
    part: String,
    plan: Plan,
}

pub struct Transaction<'a> {
    id: Uuid,
    state: TransactionState,
    options: TransactionOptions,
    packages: &'a mut [Package],
    _locks: Vec<PackageLock>,
    applier: Applier,
    /// Pre-images by package index, then part name
    snapshots: Vec<IndexMap<String, PackagePart>>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    completed: Vec<OperationRecord>,
    failed: Vec<OperationRecord>,
    warnings: Vec<String>,
    changes: Vec<PartChange>,
    error: Option<String>,
}

impl<'a> Transaction<'a> {
    /// Lock every package and open a transaction in the `Pending` state.
    pub fn begin(locks: &LockRegistry, packages: &'a mut [Package], options: TransactionOptions) -> Result<Self> {
        let mut held = Vec::with_capacity(packages.len());
        for package in packages.iter() {
            held.push(locks.try_acquire(&package.lock_key())?);
        }
        Ok(Self::open(packages, held, options))
    }

    /// Open a transaction on packages whose locks the caller already holds,
    /// so the locks can outlive the transaction (until the packages are
    /// saved, for instance).
    pub fn begin_locked(held: &[PackageLock], packages: &'a mut [Package], options: TransactionOptions) -> Result<Self> {
        for package in packages.iter() {
            let key = package.lock_key();
            if !held.iter().any(|lock| lock.key() == key) {
                return Err(TransactionError::NotLocked(key));
            }
        }
        Ok(Self::open(packages, Vec::new(), options))
    }

    fn open(packages: &'a mut [Package], held: Vec<PackageLock>, options: TransactionOptions) -> Self {
        let id = Uuid::new_v4();
        debug!(transaction = %id, packages = packages.len(), "transaction opened");
        Self {
            id,
            state: TransactionState::Pending,
            options,
            snapshots: vec![IndexMap::new(); packages.len()],
            packages,
            _locks: held,
            applier: Applier::default(),
            started_at: Utc::now(),
            finished_at: None,
            completed: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
            changes: Vec::new(),
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Apply every operation of `patch_set` in order, stopping and rolling
    /// back at the first failure.
    pub fn apply(&mut self, patch_set: &PatchSet) -> Result<()> {
        self.expect_state(TransactionState::Pending)?;
        self.state = TransactionState::Applying;

        let mismatched: Vec<String> = self
            .packages
            .iter()
            .filter_map(|package| {
                let format = package.format()?;
                (!patch_set.targets_format(format)).then(|| {
                    format!(
                        "{} is {}, which the patch set does not target",
                        package.lock_key(),
                        format
                    )
                })
            })
            .collect();
        for message in mismatched {
            self.warn(message);
        }

        let base = patch_set.namespace_map();
        for (index, op) in patch_set.operations.iter().enumerate() {
            match self.apply_operation(index, op, &base) {
                Ok(record) => {
                    if record.affected == 0 {
                        self.warn(format!("operation {} ({}) matched no nodes", index, op));
                    }
                    self.completed.push(record);
                },
                Err(source) => {
                    self.failed.push(OperationRecord {
                        index,
                        operation: op.kind().to_string(),
                        target: op.target.clone(),
                        affected: 0,
                        parts: Vec::new(),
                        error: Some(source.clone()),
                    });
                    let err = TransactionError::OperationFailed { index, source };
                    self.abort(&err)?;
                    return Err(err);
                },
            }
        }

        if self.options.validate
            && let Err(err) = self.validate()
        {
            self.abort(&err)?;
            return Err(err);
        }
        Ok(())
    }

    fn apply_operation(&mut self, index: usize, op: &PatchOperation, base: &NamespaceMap) -> std::result::Result<OperationRecord, ApplyError> {
        let ns = op.namespace_map(base);

        // Plan against every eligible part before touching any of them.
        let mut plans = Vec::new();
        for (pi, package) in self.packages.iter().enumerate() {
            let names: Vec<&str> = package
                .parts()
                .filter(|p| p.is_xml())
                .filter(|p| op.part.as_deref().is_none_or(|pattern| p.partname().matches(pattern)))
                .map(PackagePart::path)
                .collect();
            for name in names {
                let Some(part) = package.part(name) else {
                    continue;
                };
                let doc = match part.xml() {
                    Ok(doc) => doc,
                    Err(e) if op.part.is_none() => {
                        debug!(part = %name, error = %e, "skipping unparsable part");
                        continue;
                    },
                    Err(e) => return Err(ApplyError::new(ApplyErrorKind::InvalidTarget, e.to_string())),
                };
                let plan = self.applier.plan(doc, op, &ns)?;
                if !plan.is_empty() {
                    plans.push(PartPlan {
                        package: pi,
                        part: name.to_string(),
                        plan,
                    });
                }
            }
        }

        if plans.is_empty() && (op.required || self.options.require_matches) {
            return Err(ApplyError::new(
                ApplyErrorKind::NoMatch,
                format!("target '{}' matched no nodes", op.target),
            ));
        }

        let mut record = OperationRecord {
            index,
            operation: op.kind().to_string(),
            target: op.target.clone(),
            affected: 0,
            parts: Vec::new(),
            error: None,
        };
        for PartPlan { package, part, plan } in plans {
            let pkg = &mut self.packages[package];
            if !self.snapshots[package].contains_key(&part)
                && let Some(snapshot) = pkg.snapshot_part(&part)
            {
                debug!(part = %part, "part snapshotted");
                self.snapshots[package].insert(part.clone(), snapshot);
            }
            let applier = self.applier;
            let affected = pkg
                .mutate_part(&part, |doc| applier.execute(doc, plan))
                .map_err(|e| ApplyError::new(ApplyErrorKind::InvalidTarget, e.to_string()))?;
            record.affected += affected;
            record.parts.push(format!("{}:{}", pkg.lock_key(), part));
        }
        debug!(op = index, target = %op.target, affected = record.affected, "operation applied");
        Ok(record)
    }

    /// Re-parse every changed part and measure how far it moved.
    fn validate(&mut self) -> Result<()> {
        let mut changes = Vec::new();
        for (pi, snapshots) in self.snapshots.iter().enumerate() {
            let package = &self.packages[pi];
            for (name, before) in snapshots {
                let Some(after) = package.part(name) else {
                    return Err(TransactionError::ValidationFailed(format!("part {} disappeared", name)));
                };
                let reparsed = XmlDocument::parse(&after.blob())
                    .map_err(|e| TransactionError::ValidationFailed(format!("{}: {}", name, e)))?;
                let before = before.xml()?;
                let comparison = compare_documents(before, &reparsed);
                changes.push(PartChange {
                    package: package.lock_key(),
                    part: name.clone(),
                    similarity: comparison.similarity,
                    differences: comparison.differences.len(),
                });
            }
        }
        self.changes = changes;
        Ok(())
    }

    /// Finish the transaction. In dry-run mode the changes are rolled back
    /// and the record reports `RolledBack`.
    pub fn commit(&mut self) -> Result<AuditRecord> {
        self.expect_state(TransactionState::Applying)?;
        if self.options.dry_run {
            self.restore()?;
            self.state = TransactionState::RolledBack;
            info!(transaction = %self.id, "dry run rolled back");
        } else {
            for package in self.packages.iter_mut() {
                package.finalize();
            }
            self.state = TransactionState::Committed;
            info!(
                transaction = %self.id,
                operations = self.completed.len(),
                "transaction committed"
            );
        }
        self.finished_at = Some(Utc::now());
        Ok(self.record())
    }

    /// Abandon the transaction, restoring every snapshotted part.
    pub fn rollback(&mut self) -> Result<AuditRecord> {
        if self.state.is_terminal() {
            return Err(TransactionError::InvalidState {
                expected: TransactionState::Applying,
                actual: self.state,
            });
        }
        self.restore()?;
        self.state = TransactionState::RolledBack;
        self.finished_at = Some(Utc::now());
        Ok(self.record())
    }

    fn abort(&mut self, cause: &TransactionError) -> Result<()> {
        error!(transaction = %self.id, error = %cause, "rolling back");
        self.error = Some(cause.to_string());
        self.finished_at = Some(Utc::now());
        match self.restore() {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                Ok(())
            },
            Err(e) => {
                error!(transaction = %self.id, error = %e, "rollback failed");
                self.state = TransactionState::Failed;
                self.error = Some(format!("{}; {}", cause, e));
                Err(e)
            },
        }
    }

    fn restore(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        for (pi, snapshots) in self.snapshots.iter_mut().enumerate() {
            for (name, snapshot) in snapshots.drain(..) {
                if !self.packages[pi].restore_part(snapshot) {
                    missing.push(name);
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransactionError::RollbackFailed(format!(
                "parts not restored: {}",
                missing.join(", ")
            )))
        }
    }

    /// Audit record for the current state.
    pub fn record(&self) -> AuditRecord {
        AuditRecord {
            transaction_id: self.id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            state: self.state,
            success: self.state == TransactionState::Committed
                || (self.options.dry_run && self.state == TransactionState::RolledBack && self.failed.is_empty()),
            dry_run: self.options.dry_run,
            packages: self.packages.iter().map(Package::lock_key).collect(),
            operations_completed: self.completed.clone(),
            operations_failed: self.failed.clone(),
            error: self.error.clone(),
            warnings: self.warnings.clone(),
            changes: self.changes.clone(),
        }
    }

    fn expect_state(&self, expected: TransactionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransactionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn warn(&mut self, message: String) {
        warn!(transaction = %self.id, "{}", message);
        self.warnings.push(message);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Applying {
            warn!(transaction = %self.id, "transaction dropped while applying; rolling back");
            let _ = self.restore();
        }
    }
}

/// Run `patch_set` against `packages` as one transaction.
///
/// Only a failure to open the transaction is an `Err`; every other outcome,
/// rollback included, is reported in the result.
pub fn run(
    locks: &LockRegistry,
    packages: &mut [Package],
    patch_set: &PatchSet,
    options: TransactionOptions,
) -> Result<TransactionResult> {
    let tx = Transaction::begin(locks, packages, options)?;
    Ok(drive(tx, patch_set))
}

/// Like [`run`] for packages whose locks the caller holds.
pub fn run_locked(
    held: &[PackageLock],
    packages: &mut [Package],
    patch_set: &PatchSet,
    options: TransactionOptions,
) -> Result<TransactionResult> {
    let tx = Transaction::begin_locked(held, packages, options)?;
    Ok(drive(tx, patch_set))
}

fn drive(mut tx: Transaction<'_>, patch_set: &PatchSet) -> TransactionResult {
    let record = match tx.apply(patch_set) {
        Ok(()) => match tx.commit() {
            Ok(record) => record,
            Err(_) => tx.record(),
        },
        Err(_) => tx.record(),
    };
    TransactionResult::from_record(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::fixtures;
    use crate::patch::InsertPosition;
    use std::io::{Cursor, Read};

    fn potx() -> Package {
        Package::from_bytes(fixtures::minimal_potx()).unwrap()
    }

    fn part_bytes(pkg: &Package, name: &str) -> Vec<u8> {
        pkg.part(name).unwrap().blob().into_owned()
    }

    fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut f = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_commit_changes_only_targeted_part() {
        let source = fixtures::minimal_potx();
        let mut packages = vec![Package::from_bytes(source.clone()).unwrap()];
        let patch = PatchSet::new(vec![PatchOperation::set("//title/@text", "Hello")]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, TransactionOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.state, TransactionState::Committed);
        assert_eq!(result.audit.operations_completed.len(), 1);
        assert_eq!(result.audit.operations_completed[0].affected, 1);
        assert_eq!(result.audit.changes.len(), 1);
        assert!(result.audit.changes[0].differences > 0);

        let out = packages[0].to_bytes().unwrap();
        let before = archive_entries(&source);
        let after = archive_entries(&out);
        assert_eq!(before.len(), after.len());
        for ((name, old), (new_name, new)) in before.iter().zip(&after) {
            assert_eq!(name, new_name);
            if name == "ppt/presentation.xml" {
                let text = String::from_utf8(new.clone()).unwrap();
                assert!(text.contains(r#"<title text="Hello"/>"#));
            } else {
                assert_eq!(old, new, "{} changed", name);
            }
        }
    }

    #[test]
    fn test_failure_rolls_back_everything() {
        let mut packages = vec![potx()];
        let before: Vec<(String, Vec<u8>)> = packages[0]
            .part_names()
            .map(|n| (n.to_string(), part_bytes(&packages[0], n)))
            .collect();

        let patch = PatchSet::new(vec![
            PatchOperation::set("//title/@text", "Hello"),
            PatchOperation::insert("//a:t", "<a:r><unclosed>", InsertPosition::After),
        ]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, TransactionOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.state, TransactionState::RolledBack);
        assert_eq!(result.audit.operations_completed.len(), 1);
        assert_eq!(result.audit.operations_failed.len(), 1);
        assert_eq!(
            result.audit.operations_failed[0].error.as_ref().map(|e| e.kind),
            Some(ApplyErrorKind::FragmentParse)
        );
        assert!(!packages[0].is_dirty());
        for (name, bytes) in before {
            assert_eq!(part_bytes(&packages[0], &name), bytes, "{} differs after rollback", name);
        }
    }

    #[test]
    fn test_state_machine() {
        let mut packages = vec![potx()];
        let locks = LockRegistry::new();
        let mut tx = Transaction::begin(&locks, &mut packages, TransactionOptions::default()).unwrap();
        assert_eq!(tx.state(), TransactionState::Pending);
        assert!(matches!(tx.commit(), Err(TransactionError::InvalidState { .. })));

        tx.apply(&PatchSet::new(vec![PatchOperation::set("//a:t", "Bye")])).unwrap();
        assert_eq!(tx.state(), TransactionState::Applying);
        let record = tx.commit().unwrap();
        assert_eq!(record.state, TransactionState::Committed);
        assert!(record.success);
        assert!(matches!(tx.apply(&PatchSet::default()), Err(TransactionError::InvalidState { .. })));
        assert!(tx.rollback().is_err());
    }

    #[test]
    fn test_second_transaction_is_rejected() {
        let locks = LockRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.potx");
        std::fs::write(&path, fixtures::minimal_potx()).unwrap();

        let mut first = vec![Package::open(&path).unwrap()];
        let mut second = vec![Package::open(&path).unwrap()];
        let tx = Transaction::begin(&locks, &mut first, TransactionOptions::default()).unwrap();
        assert!(matches!(
            Transaction::begin(&locks, &mut second, TransactionOptions::default()),
            Err(TransactionError::AlreadyLocked(_))
        ));
        drop(tx);
        assert!(Transaction::begin(&locks, &mut second, TransactionOptions::default()).is_ok());
    }

    #[test]
    fn test_begin_locked_requires_held_lock() {
        let locks = LockRegistry::new();
        let mut packages = vec![potx()];
        let patch = PatchSet::new(vec![PatchOperation::set("//title/@text", "Held")]);
        assert!(matches!(
            run_locked(&[], &mut packages, &patch, TransactionOptions::default()),
            Err(TransactionError::NotLocked(_))
        ));

        let guard = locks.try_acquire(&packages[0].lock_key()).unwrap();
        let result = run_locked(std::slice::from_ref(&guard), &mut packages, &patch, TransactionOptions::default()).unwrap();
        assert_eq!(result.state, TransactionState::Committed);
        assert!(locks.is_locked(&packages[0].lock_key()));
        drop(guard);
        assert!(!locks.is_locked(&packages[0].lock_key()));
    }

    #[test]
    fn test_dry_run() {
        let mut packages = vec![potx()];
        let options = TransactionOptions {
            dry_run: true,
            ..Default::default()
        };
        let patch = PatchSet::new(vec![PatchOperation::set("//title/@text", "Hello")]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, options).unwrap();
        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.state, TransactionState::RolledBack);
        assert_eq!(result.audit.changes.len(), 1);
        assert!(!packages[0].is_dirty());
    }

    #[test]
    fn test_zero_matches() {
        let mut packages = vec![potx()];
        let patch = PatchSet::new(vec![PatchOperation::set("//nothing", "x")]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, TransactionOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);

        let strict = TransactionOptions {
            require_matches: true,
            ..Default::default()
        };
        let result = run(&LockRegistry::new(), &mut packages, &patch, strict).unwrap();
        assert!(!result.success);
        assert_eq!(
            result.audit.operations_failed[0].error.as_ref().map(|e| e.kind),
            Some(ApplyErrorKind::NoMatch)
        );
    }

    #[test]
    fn test_part_filter_and_multiple_packages() {
        let mut packages = vec![potx(), potx()];
        let patch = PatchSet::new(vec![
            PatchOperation::set("//a:srgbClr/@val", "112233").with_part("ppt/theme/theme*.xml"),
            PatchOperation::set("//a:rPr/@sz", "3200").with_part("ppt/slides/*.xml"),
        ]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, TransactionOptions::default()).unwrap();
        assert!(result.success);
        // Two srgbClr per theme, two packages.
        assert_eq!(result.audit.operations_completed[0].affected, 4);
        assert_eq!(result.audit.operations_completed[1].affected, 2);
        assert_eq!(result.audit.changes.len(), 4);
        for pkg in &packages {
            assert!(!pkg.part("ppt/presentation.xml").unwrap().is_dirty());
        }
    }

    #[test]
    fn test_rollback_across_packages() {
        let mut packages = vec![potx(), potx()];
        let patch = PatchSet::new(vec![
            PatchOperation::set("//a:t", "Changed"),
            PatchOperation::set("//a:t[", "broken"),
        ]);
        let result = run(&LockRegistry::new(), &mut packages, &patch, TransactionOptions::default()).unwrap();
        assert_eq!(result.state, TransactionState::RolledBack);
        assert_eq!(
            result.audit.operations_failed[0].error.as_ref().map(|e| e.kind),
            Some(ApplyErrorKind::InvalidTarget)
        );
        assert!(packages.iter().all(|p| !p.is_dirty()));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut packages = vec![potx()];
        {
            let locks = LockRegistry::new();
            let mut tx = Transaction::begin(&locks, &mut packages, TransactionOptions::default()).unwrap();
            tx.apply(&PatchSet::new(vec![PatchOperation::set("//a:t", "Lost")])).unwrap();
        }
        assert!(!packages[0].is_dirty());
    }
}
