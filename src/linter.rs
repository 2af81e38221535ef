//! Reference checking - static analysis of a populated registry.
//!
//! Reports:
//! - references into the canonical namespace whose document isn't registered
//! - JSON Pointer fragments that don't resolve in their target document

use serde::Serialize;

use crate::error::RegistryError;
use crate::loader::{collect_refs, navigate_fragment, split_ref};
use crate::registry::SchemaRegistry;
use crate::types::CanonicalBase;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from reference checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Canonical URI of the document holding the reference.
    pub uri: String,
    /// JSON Pointer of the object holding the `$ref`.
    pub path: String,
    pub message: String,
}

/// Result of checking every registered document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
    pub documents_checked: usize,
    pub references_checked: usize,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    /// Returns true if no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Record a diagnostic and update the counters.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.diagnostics.push(diagnostic);
    }
}

/// Check that every reference of every registered document resolves.
///
/// Same-document fragments are checked against the holding document. Plain-name
/// anchors (`#foo`) aren't pointers and are not checked.
pub fn check_references(registry: &SchemaRegistry, base: &CanonicalBase) -> CheckResult {
    let mut result = CheckResult::default();

    for (uri, document) in registry.iter() {
        result.documents_checked += 1;

        for site in collect_refs(document) {
            result.references_checked += 1;
            let (target, fragment) = split_ref(&site.reference);

            if target.is_empty() {
                if let Some(fragment) = fragment.filter(|f| is_pointer(f)) {
                    if navigate_fragment(document, fragment).is_none() {
                        result.push(Diagnostic {
                            severity: Severity::Error,
                            code: "E002".to_string(),
                            uri: uri.to_string(),
                            path: site.pointer.clone(),
                            message: format!("anchor not found: {}", fragment),
                        });
                    }
                }
                continue;
            }

            if !registry.contains(target) {
                if base.owns(target) {
                    result.push(Diagnostic {
                        severity: Severity::Error,
                        code: "E001".to_string(),
                        uri: uri.to_string(),
                        path: site.pointer.clone(),
                        message: format!("schema not registered: {}", target),
                    });
                }
                continue;
            }

            if !fragment.map(is_pointer).unwrap_or(false) {
                continue;
            }
            if let Err(RegistryError::FragmentNotFound { uri: target, fragment }) =
                registry.resolve_ref(&site.reference)
            {
                result.push(Diagnostic {
                    severity: Severity::Error,
                    code: "E002".to_string(),
                    uri: uri.to_string(),
                    path: site.pointer.clone(),
                    message: format!("anchor not found in {}: {}", target, fragment),
                });
            }
        }
    }

    result
}

fn is_pointer(fragment: &str) -> bool {
    fragment == "#" || fragment.starts_with("#/")
}
