//! Public operations.
//!
//! [`Engine`] bundles everything the four operations share: configuration,
//! the carrier registry, the package lock registry and the audit log. Build
//! one per process (or per tenant) and call it from as many threads as
//! needed. The free functions at the bottom of this module run against a
//! lazily built default engine.
//!
//! Every operation reports expected failures as data. Only resource
//! exhaustion escapes as [`FatalError`].

use crate::carrier::{CarrierRegistry, InjectionIssue, InjectionResult, Injector};
use crate::common::error::FatalError;
use crate::common::value::PatchValue;
use crate::config::Config;
use crate::opc::{Package, PackageError, file_lock_key};
use crate::patch::{ParseResult, PatchParser, PatchSet, ValidationLevel, substitute_str};
use crate::tokens::{ResolutionContext, ResolutionError, ResolvedToken, TokenLayers, TokenResolver, TokenValue};
use crate::transaction::{
    self, AuditLog, LockRegistry, TransactionError, TransactionOptions, TransactionResult, TransactionState,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Variable bindings supplied at apply time.
pub type Variables = IndexMap<String, PatchValue>;

pub struct Engine {
    config: Config,
    carriers: Arc<CarrierRegistry>,
    locks: LockRegistry,
    audit: AuditLog,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    /// Engine with the built-in carrier set.
    pub fn new(config: Config) -> Self {
        let audit = match &config.audit_log {
            Some(path) => AuditLog::with_sink(path),
            None => AuditLog::new(),
        };
        Self {
            config,
            carriers: Arc::new(CarrierRegistry::builtin()),
            locks: LockRegistry::new(),
            audit,
        }
    }

    pub fn with_carriers(mut self, carriers: Arc<CarrierRegistry>) -> Self {
        self.carriers = carriers;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn carriers(&self) -> &Arc<CarrierRegistry> {
        &self.carriers
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Parse a patch document at the configured validation level.
    pub fn parse_patch_set(&self, text: &str) -> ParseResult {
        PatchParser::new(self.config.validation_level).parse(text)
    }

    /// Apply `patch_set` to the package at `path` in one transaction and
    /// save it if the transaction commits.
    pub fn apply_patch_set<P: AsRef<Path>>(
        &self,
        path: P,
        patch_set: &PatchSet,
        variables: &Variables,
    ) -> Result<TransactionResult, FatalError> {
        self.apply_patch_set_with(path, patch_set, variables, self.config.transaction_options())
    }

    /// Like [`apply_patch_set`](Self::apply_patch_set) with explicit options.
    /// A dry run never writes the file.
    pub fn apply_patch_set_with<P: AsRef<Path>>(
        &self,
        path: P,
        patch_set: &PatchSet,
        variables: &Variables,
        options: TransactionOptions,
    ) -> Result<TransactionResult, FatalError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let (patch_set, unresolved) = bind_variables(patch_set, variables);

        // Held from before the read until after the write.
        let guard = match self.locks.try_acquire(&file_lock_key(path)) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(path = %shown, error = %e, "transaction not started");
                let result = TransactionResult::not_started(vec![shown], options, e.to_string());
                return self.finish(result);
            },
        };

        let mut packages = match Package::open(path) {
            Ok(package) => vec![package],
            Err(e) => {
                fatal_package(&e)?;
                warn!(path = %shown, error = %e, "cannot open package");
                let result = TransactionResult::not_started(vec![shown], options, e.to_string());
                return self.finish(result);
            },
        };
        packages[0].set_compression(self.config.compression);

        let held = std::slice::from_ref(&guard);
        let mut result = match transaction::run_locked(held, &mut packages, &patch_set, options) {
            Ok(result) => result,
            Err(e) => {
                if let TransactionError::Package(pe) = &e {
                    fatal_package(pe)?;
                }
                warn!(path = %shown, error = %e, "transaction not started");
                TransactionResult::not_started(vec![shown.clone()], options, e.to_string())
            },
        };

        for name in unresolved {
            warn!(variable = %name, "unresolved variable left in place");
            let message = format!("unresolved variable '{}'", name);
            result.audit.warnings.push(message.clone());
            result.warnings.push(message);
        }

        if result.state == TransactionState::Committed && packages[0].is_dirty() {
            if let Err(e) = packages[0].save(path) {
                fatal_package(&e)?;
                let message = format!("save failed: {}", e);
                warn!(path = %shown, error = %e, "committed package could not be written");
                result.success = false;
                result.state = TransactionState::Failed;
                result.audit.success = false;
                result.audit.state = TransactionState::Failed;
                result.audit.error = Some(message.clone());
                result.errors.push(message);
            }
        } else {
            debug!(path = %shown, state = %result.state, "package left unwritten");
        }
        drop(guard);

        self.finish(result)
    }

    /// Apply one patch set to many packages, one transaction each, in
    /// parallel. Results are in input order.
    pub fn apply_patch_set_batch<P>(
        &self,
        paths: &[P],
        patch_set: &PatchSet,
        variables: &Variables,
    ) -> Vec<Result<TransactionResult, FatalError>>
    where
        P: AsRef<Path> + Sync,
    {
        paths
            .par_iter()
            .map(|path| self.apply_patch_set(path, patch_set, variables))
            .collect()
    }

    /// Resolve one token with the configured unit settings.
    pub fn resolve_tokens(&self, layers: &TokenLayers, id: &str) -> Result<ResolvedToken, ResolutionError> {
        self.resolve_tokens_in(layers, id, &self.config.resolution_context())
    }

    pub fn resolve_tokens_in(
        &self,
        layers: &TokenLayers,
        id: &str,
        ctx: &ResolutionContext,
    ) -> Result<ResolvedToken, ResolutionError> {
        TokenResolver::new(layers).resolve(id, ctx)
    }

    /// Write resolved token values into the package at `path` through one
    /// carrier and save it if anything changed.
    pub fn inject_tokens<P: AsRef<Path>>(
        &self,
        path: P,
        tokens: &IndexMap<String, TokenValue>,
        carrier_id: &str,
    ) -> Result<InjectionResult, FatalError> {
        let path = path.as_ref();
        let failed = |message: String| InjectionResult {
            carrier: carrier_id.to_string(),
            errors: vec![InjectionIssue {
                token: String::new(),
                target: None,
                message,
            }],
            ..Default::default()
        };

        let _lock = match self.locks.try_acquire(&file_lock_key(path)) {
            Ok(lock) => lock,
            Err(e) => return Ok(failed(e.to_string())),
        };

        let mut package = match Package::open(path) {
            Ok(package) => package,
            Err(e) => {
                fatal_package(&e)?;
                return Ok(failed(e.to_string()));
            },
        };
        package.set_compression(self.config.compression);

        let injector = Injector::new(Arc::clone(&self.carriers), self.config.injection_options());
        let mut result = match injector.inject_package(&mut package, tokens, carrier_id) {
            Ok(result) => result,
            Err(e) => return Ok(failed(e.to_string())),
        };

        if package.is_dirty()
            && let Err(e) = package.save(path)
        {
            fatal_package(&e)?;
            result.errors.push(InjectionIssue {
                token: String::new(),
                target: None,
                message: format!("save failed: {}", e),
            });
        }
        Ok(result)
    }

    fn finish(&self, result: TransactionResult) -> Result<TransactionResult, FatalError> {
        if let Err(e) = self.audit.append(result.audit.clone()) {
            if let Some(fatal) = FatalError::from_io(&e) {
                return Err(fatal);
            }
            warn!(error = %e, "audit record not written to sink");
        }
        info!(
            transaction = %result.audit.transaction_id,
            state = %result.state,
            success = result.success,
            "patch set applied"
        );
        Ok(result)
    }
}

/// Fill placeholders the parser left unresolved from `variables`, then
/// from the set's own declarations. Returns the names still unbound.
fn bind_variables(patch_set: &PatchSet, variables: &Variables) -> (PatchSet, Vec<String>) {
    let mut bindings = patch_set.metadata.variables.clone();
    for (name, value) in variables {
        bindings.insert(name.clone(), value.clone());
    }

    let mut unresolved = Vec::new();
    let mut bound = patch_set.clone();
    bound.operations = patch_set
        .operations
        .iter()
        .map(|op| op.map_strings(&mut |s| substitute_str(s, &bindings, &mut unresolved)))
        .collect();
    (bound, unresolved)
}

fn fatal_package(err: &PackageError) -> Result<(), FatalError> {
    match err {
        PackageError::Io(io) => match FatalError::from_io(io) {
            Some(fatal) => Err(fatal),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::default);

pub fn parse_patch_set(text: &str, level: ValidationLevel) -> ParseResult {
    PatchParser::new(level).parse(text)
}

pub fn apply_patch_set<P: AsRef<Path>>(
    path: P,
    patch_set: &PatchSet,
    variables: &Variables,
) -> Result<TransactionResult, FatalError> {
    DEFAULT_ENGINE.apply_patch_set(path, patch_set, variables)
}

pub fn resolve_tokens(layers: &TokenLayers, id: &str) -> Result<ResolvedToken, ResolutionError> {
    DEFAULT_ENGINE.resolve_tokens(layers, id)
}

pub fn inject_tokens<P: AsRef<Path>>(
    path: P,
    tokens: &IndexMap<String, TokenValue>,
    carrier_id: &str,
) -> Result<InjectionResult, FatalError> {
    DEFAULT_ENGINE.inject_tokens(path, tokens, carrier_id)
}

/// Paths of packages in `dir` with an OOXML template extension.
pub fn template_paths<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_template = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "potx" | "dotx" | "xltx"));
        if is_template {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
