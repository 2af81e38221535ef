//! Meta-validation of bundle outputs before they are written.

use serde_json::{json, Value};
use tracing::debug;

use crate::error::BundleError;
use crate::types::declared_draft;

/// Meta-schemas the validator ships with.
const KNOWN_DRAFTS: &[&str] = &[
    "https://json-schema.org/draft/2020-12/schema",
    "https://json-schema.org/draft/2019-09/schema",
    "http://json-schema.org/draft-07/schema",
    "http://json-schema.org/draft-06/schema",
    "http://json-schema.org/draft-04/schema",
];

/// Check a bundle against the meta-schema of the draft it declares.
///
/// The bundle is validated as an instance of its meta-schema, so references to
/// external documents are never fetched. Documents declaring a meta-schema
/// outside the known drafts are skipped.
///
/// # Errors
///
/// Returns `BundleError::InvalidSchema` if the document isn't a valid schema
/// under its draft.
pub fn check_bundle(uri: &str, document: &Value) -> Result<(), BundleError> {
    let Some(draft) = declared_draft(document) else {
        debug!(uri = %uri, "no $schema declared; skipping meta-validation");
        return Ok(());
    };
    if !KNOWN_DRAFTS.contains(&draft.trim_end_matches('#')) {
        debug!(uri = %uri, draft = %draft, "unknown meta-schema; skipping meta-validation");
        return Ok(());
    }

    let invalid = |message: String| BundleError::InvalidSchema {
        uri: uri.to_string(),
        message,
    };
    let validator = jsonschema::validator_for(&json!({ "$ref": draft }))
        .map_err(|e| invalid(e.to_string()))?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(invalid(errors.join("; ")))
    }
}
