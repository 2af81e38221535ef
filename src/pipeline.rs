//! Build driver - runs every stage over a configured source tree.
//!
//! Failures of single files or single entry points are recorded in the
//! [`BuildReport`] and the run continues; only configuration and output I/O
//! problems abort the build.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::bundler::bundle;
use crate::config::{BuildConfig, EntryPoint};
use crate::error::{BuildError, BundleError};
use crate::linter::{check_references, CheckResult, Diagnostic, Severity};
use crate::normalizer::{normalize_namespace, Rewrite};
use crate::registry::SchemaRegistry;
use crate::sanitizer::sanitize_registry;
use crate::types::CanonicalBase;
use crate::validator::check_bundle;

/// Outcome of one file, namespace or entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

/// Outcome of normalizing and registering one source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub namespace: String,
    pub file: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// References that fell through to the import-by-name rule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<Rewrite>,
}

/// Outcome of listing one namespace directory.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceReport {
    pub namespace: String,
    pub status: Status,
    pub files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one entry point.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub name: String,
    pub root: String,
    pub output: PathBuf,
    pub status: Status,
    /// Documents in the closure, root included.
    pub members: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a build run did, per namespace, file and entry point.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub namespaces: Vec<NamespaceReport>,
    pub files: Vec<FileReport>,
    /// `required` entries removed by sanitization.
    pub sanitized: usize,
    pub check: CheckResult,
    pub bundles: Vec<BundleReport>,
}

impl BuildReport {
    /// True when no namespace, file or entry point failed.
    pub fn is_success(&self) -> bool {
        self.namespaces.iter().all(|n| n.status == Status::Ok)
            && self.files.iter().all(|f| f.status == Status::Ok)
            && self.bundles.iter().all(|b| b.status == Status::Ok)
    }

    pub fn files_failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == Status::Failed)
            .count()
    }

    pub fn bundles_failed(&self) -> usize {
        self.bundles
            .iter()
            .filter(|b| b.status == Status::Failed)
            .count()
    }
}

/// Normalize every configured namespace into a fresh registry.
///
/// The returned report has its namespace and file sections filled in.
pub fn populate_registry(config: &BuildConfig) -> (SchemaRegistry, BuildReport) {
    let base = config.base();
    let mut registry = SchemaRegistry::new();
    let mut report = BuildReport::default();

    for namespace in &config.namespaces {
        let outcome = match normalize_namespace(&base, &config.source_dir, namespace) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "cannot read namespace");
                report.namespaces.push(NamespaceReport {
                    namespace: namespace.clone(),
                    status: Status::Failed,
                    files: 0,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        info!(
            namespace = %namespace,
            documents = outcome.documents.len(),
            failures = outcome.failures.len(),
            "normalized namespace"
        );
        report.namespaces.push(NamespaceReport {
            namespace: namespace.clone(),
            status: Status::Ok,
            files: outcome.documents.len() + outcome.failures.len(),
            error: None,
        });

        for normalized in outcome.documents {
            let flagged: Vec<Rewrite> = normalized.flagged().cloned().collect();
            let (status, uri, error) = match registry.register(normalized.document) {
                Ok(uri) => (Status::Ok, Some(uri), None),
                Err(e) => (Status::Failed, None, Some(e.to_string())),
            };
            report.files.push(FileReport {
                namespace: normalized.source.namespace,
                file: normalized.source.file_name,
                status,
                uri,
                error,
                flagged,
            });
        }

        for (source, e) in outcome.failures {
            report.files.push(FileReport {
                namespace: source.namespace,
                file: source.file_name,
                status: Status::Failed,
                uri: None,
                error: Some(e.to_string()),
                flagged: Vec::new(),
            });
        }
    }

    info!(documents = registry.len(), "registry populated");
    (registry, report)
}

/// Check every reference of the registry and add flagged import-by-name
/// references from the file reports as warnings.
pub fn reference_check(
    registry: &SchemaRegistry,
    base: &CanonicalBase,
    files: &[FileReport],
) -> CheckResult {
    let mut check = check_references(registry, base);

    for file in files {
        let Some(uri) = &file.uri else {
            continue;
        };
        for rewrite in &file.flagged {
            check.push(Diagnostic {
                severity: Severity::Warning,
                code: "W001".to_string(),
                uri: uri.clone(),
                path: rewrite.pointer.clone(),
                message: format!(
                    "\"{}\" matched no known convention; imported by name as {}",
                    rewrite.original, rewrite.rewritten
                ),
            });
        }
    }

    for diag in check
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
    {
        warn!(uri = %diag.uri, path = %diag.path, code = %diag.code, "{}", diag.message);
    }
    check
}

/// Run the whole pipeline and write one output file per entry point.
///
/// An entry point fails when its closure can't be bundled, a reference check
/// error lies inside the closure, or the bundle isn't a valid schema. Its
/// output from an earlier run is then removed.
///
/// # Errors
///
/// Returns `BuildError` if the output directory can't be created or a bundle
/// can't be written or removed. Everything else is recorded in the report.
pub fn run(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    let base = config.base();
    let (mut registry, mut report) = populate_registry(config);

    report.sanitized = sanitize_registry(&mut registry);
    info!(removed = report.sanitized, "sanitized read-only requirements");

    report.check = reference_check(&registry, &base, &report.files);

    std::fs::create_dir_all(&config.output_dir).map_err(|source| BuildError::OutputDir {
        path: config.output_dir.clone(),
        source,
    })?;

    for entry in &config.entry_points {
        let bundle_report = build_entry_point(config, &registry, &base, &report.check, entry)?;
        report.bundles.push(bundle_report);
    }

    info!(
        bundles = report.bundles.len(),
        failed = report.bundles_failed(),
        "build finished"
    );
    Ok(report)
}

fn build_entry_point(
    config: &BuildConfig,
    registry: &SchemaRegistry,
    base: &CanonicalBase,
    check: &CheckResult,
    entry: &EntryPoint,
) -> Result<BundleReport, BuildError> {
    let root = entry.root_uri(base);
    let output = config.output_dir.join(&entry.output);
    let mut report = BundleReport {
        name: entry.name.clone(),
        root: root.clone(),
        output: output.clone(),
        status: Status::Failed,
        members: 0,
        error: None,
    };

    let document = match bundle_document(registry, base, check, &root) {
        Ok((document, members)) => {
            report.members = members;
            document
        }
        Err(e) => {
            warn!(entry = %entry.name, error = %e, "bundle failed");
            report.error = Some(e.to_string());
            remove_stale(&output)?;
            return Ok(report);
        }
    };

    let mut json = serde_json::to_string_pretty(&document).map_err(|source| {
        BuildError::Serialize {
            name: entry.name.clone(),
            source,
        }
    })?;
    json.push('\n');

    std::fs::write(&output, json).map_err(|source| BuildError::WriteError {
        path: output.clone(),
        source,
    })?;

    info!(entry = %entry.name, output = %output.display(), members = report.members, "wrote bundle");
    report.status = Status::Ok;
    Ok(report)
}

/// A failed entry point must not leave the output of an earlier run behind.
fn remove_stale(output: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(output) {
        Ok(()) => {
            warn!(output = %output.display(), "removed stale bundle");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::RemoveStale {
            path: output.to_path_buf(),
            source,
        }),
    }
}

fn bundle_document(
    registry: &SchemaRegistry,
    base: &CanonicalBase,
    check: &CheckResult,
    root: &str,
) -> Result<(serde_json::Value, usize), BundleError> {
    let bundle = bundle(registry, base, root)?;
    let members = bundle.len();

    // Reference errors anywhere in the closure make the bundle unusable.
    let broken = check.diagnostics.iter().find(|d| {
        d.severity == Severity::Error
            && (d.uri == bundle.root_uri || bundle.definitions.contains_key(&d.uri))
    });
    if let Some(diag) = broken {
        return Err(BundleError::BrokenReference {
            uri: diag.uri.clone(),
            pointer: diag.path.clone(),
            message: diag.message.clone(),
        });
    }

    let document = bundle.into_document();
    check_bundle(root, &document)?;
    Ok((document, members))
}
