//! Core types shared by the pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Meta-schema assigned to documents that do not declare one.
pub const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

/// Draft-07 meta-schema, as declared by the older SensorML documents.
pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Keywords whose values are instance data rather than schemas.
///
/// `$ref`-looking strings below these are never rewritten or followed.
pub const INSTANCE_KEYWORDS: &[&str] = &["const", "enum", "default", "examples"];

/// Namespace holding the shared common definitions.
pub const COMMON_NAMESPACE: &str = "common";

/// Namespace holding the SensorML suite.
pub const SENSORML_NAMESPACE: &str = "sensorml/schemas/json";

/// Namespace holding the SWE Common suite.
pub const SWECOMMON_NAMESPACE: &str = "swecommon/schemas/json";

/// Absolute URL prefix under which every namespace is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBase {
    url: String,
}

impl CanonicalBase {
    /// Create a base from a URL. A trailing `/` is ignored.
    ///
    /// The URL is stored in its serialized form (lower-case host, no default
    /// port) so that `$id`s agree with references resolved through [`Url::join`].
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let url = Url::parse(&url).map(String::from).unwrap_or(url);
        Self {
            url: url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without trailing slash.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Directory URI of a namespace, always ending in `/`.
    pub fn namespace_uri(&self, namespace: &str) -> String {
        format!("{}/{}/", self.url, namespace.trim_matches('/'))
    }

    /// Canonical `$id` of a file within a namespace.
    pub fn document_uri(&self, namespace: &str, file_name: &str) -> String {
        format!("{}{}", self.namespace_uri(namespace), file_name)
    }

    /// Whether a URI lies inside the canonical namespace.
    pub fn owns(&self, uri: &str) -> bool {
        uri.strip_prefix(self.url.as_str())
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}

/// One on-disk schema document before processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SchemaSource {
    pub namespace: String,
    pub file_name: String,
}

impl SchemaSource {
    pub fn new(namespace: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            file_name: file_name.into(),
        }
    }
}

impl std::fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.file_name)
    }
}

/// Classification of a raw `$ref` value.
///
/// Variants are listed in the order the rules are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// Already an absolute URI.
    Absolute,
    /// Same-document fragment (`#...`).
    Local,
    /// `../common/commonDefs.json#/$defs/X`
    CommonDefs,
    /// `../common/sweCommonDefs.json#/$defs/X`
    SweCommonDefs,
    /// Any other path starting with `.`
    Relative,
    /// `sensormlDefs.json#/$defs/X`
    SensormlDefs,
    /// `commonDefs.json#/$defs/X` without a relative prefix.
    BareCommonDefs,
    /// Fallback: a file name inside the current namespace.
    ImportByName,
}

impl RefKind {
    /// Whether references of this kind pass through unchanged.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, RefKind::Absolute | RefKind::Local)
    }
}

/// Returns the `$schema` of a document, if it declares one.
pub fn declared_draft(schema: &Value) -> Option<&str> {
    schema.get("$schema").and_then(Value::as_str)
}

/// Name of the auxiliary section used by a document's draft.
pub fn definitions_keyword(schema: &Value) -> &'static str {
    match declared_draft(schema) {
        Some(draft) if draft.contains("draft-07") || draft.contains("draft-06") => "definitions",
        _ => "$defs",
    }
}
