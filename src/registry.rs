//! Schema registry - canonical URI to normalized document.
//!
//! The registry is an explicit value handed from stage to stage. Registration is
//! last-write-wins and performs no cross-document checks: suites reference each
//! other cyclically, so broken references only surface when something resolves
//! them (the bundler or the reference checker).

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::RegistryError;
use crate::loader::{navigate_fragment, split_ref};

/// Canonical URI to document, iterated in URI order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    documents: BTreeMap<String, Value>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document under its own `$id`, replacing any earlier registration.
    ///
    /// Returns the URI the document was stored under.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::MissingId` if the document has no string `$id`.
    pub fn register(&mut self, document: Value) -> Result<String, RegistryError> {
        let uri = document
            .get("$id")
            .and_then(Value::as_str)
            .ok_or(RegistryError::MissingId)?
            .to_string();

        if self.documents.insert(uri.clone(), document).is_some() {
            debug!(uri = %uri, "replaced registered schema");
        }
        Ok(uri)
    }

    /// Look up a document by canonical URI (no fragment).
    pub fn resolve(&self, uri: &str) -> Option<&Value> {
        self.documents.get(uri)
    }

    /// Resolve a full reference, navigating its JSON Pointer fragment if any.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if the document isn't registered, or
    /// `RegistryError::FragmentNotFound` if the pointer doesn't resolve.
    pub fn resolve_ref(&self, reference: &str) -> Result<&Value, RegistryError> {
        let (uri, fragment) = split_ref(reference);
        let document = self.resolve(uri).ok_or_else(|| RegistryError::NotFound {
            uri: uri.to_string(),
        })?;

        match fragment {
            Some(fragment) => {
                navigate_fragment(document, fragment).ok_or_else(|| {
                    RegistryError::FragmentNotFound {
                        uri: uri.to_string(),
                        fragment: fragment.to_string(),
                    }
                })
            }
            None => Ok(document),
        }
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Registered URIs in sorted order.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.documents.iter().map(|(uri, doc)| (uri.as_str(), doc))
    }

    /// Mutable access to every registered document, for in-place derivations
    /// such as sanitization. URIs can't be changed this way.
    pub fn documents_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.documents
            .iter_mut()
            .map(|(uri, doc)| (uri.as_str(), doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_uses_id() {
        let mut registry = SchemaRegistry::new();
        let uri = registry
            .register(json!({ "$id": "https://example.org/csa/common/links.json" }))
            .unwrap();
        assert_eq!(uri, "https://example.org/csa/common/links.json");
        assert!(registry.contains(&uri));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_without_id_fails() {
        let mut registry = SchemaRegistry::new();
        let result = registry.register(json!({ "type": "object" }));
        assert!(matches!(result, Err(RegistryError::MissingId)));
        assert!(registry.is_empty());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = SchemaRegistry::new();
        let uri = "https://example.org/csa/common/links.json";
        registry
            .register(json!({ "$id": uri, "type": "object" }))
            .unwrap();
        registry
            .register(json!({ "$id": uri, "type": "array" }))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(uri).unwrap()["type"], "array");
    }

    #[test]
    fn resolve_unknown_is_none() {
        let registry = SchemaRegistry::new();
        assert!(registry.resolve("https://example.org/csa/nope.json").is_none());
    }

    #[test]
    fn resolve_ref_navigates_fragment() {
        let mut registry = SchemaRegistry::new();
        let uri = "https://example.org/csa/swecommon/schemas/json/encodings.json";
        registry
            .register(json!({
                "$id": uri,
                "$defs": { "BinaryEncoding": { "type": "object" } }
            }))
            .unwrap();

        let target = registry
            .resolve_ref(&format!("{}#/$defs/BinaryEncoding", uri))
            .unwrap();
        assert_eq!(target, &json!({ "type": "object" }));

        let missing = registry.resolve_ref(&format!("{}#/$defs/TextEncoding", uri));
        assert!(matches!(
            missing,
            Err(RegistryError::FragmentNotFound { .. })
        ));

        let unknown = registry.resolve_ref("https://example.org/csa/other.json#/a");
        assert!(matches!(unknown, Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn uris_are_sorted() {
        let mut registry = SchemaRegistry::new();
        for uri in ["https://x/b.json", "https://x/a.json", "https://x/c.json"] {
            registry.register(json!({ "$id": uri })).unwrap();
        }
        let uris: Vec<_> = registry.uris().collect();
        assert_eq!(uris, vec!["https://x/a.json", "https://x/b.json", "https://x/c.json"]);
    }

    #[test]
    fn documents_mut_edits_in_place() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(json!({ "$id": "https://x/a.json" }))
            .unwrap();
        for (_, doc) in registry.documents_mut() {
            doc["title"] = json!("edited");
        }
        assert_eq!(registry.resolve("https://x/a.json").unwrap()["title"], "edited");
    }
}
