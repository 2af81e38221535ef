//! Bundling - packs an entry point and everything it reaches into one document.
//!
//! References were made absolute during normalization, and every bundled
//! document keeps its `$id`, so bundling only has to embed documents; no `$ref`
//! is rewritten here.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::BundleError;
use crate::loader::{collect_refs, split_ref};
use crate::registry::SchemaRegistry;
use crate::types::{definitions_keyword, CanonicalBase};

/// An entry point together with its dependency closure.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub root_uri: String,
    pub root: Value,
    /// Every other member of the closure, keyed by canonical URI.
    pub definitions: BTreeMap<String, Value>,
}

impl Bundle {
    /// Number of documents in the closure, root included.
    pub fn len(&self) -> usize {
        self.definitions.len() + 1
    }

    /// Always false; a bundle contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Produce the output document.
    ///
    /// Closure members are added to the root's `$defs` (or `definitions` for
    /// draft-07 roots), after any definitions the root already declares. A root
    /// without dependencies is returned unchanged.
    pub fn into_document(self) -> Value {
        if self.definitions.is_empty() {
            return self.root;
        }

        let keyword = definitions_keyword(&self.root);
        let Value::Object(mut root) = self.root else {
            return self.root;
        };

        match root.get_mut(keyword) {
            Some(Value::Object(existing)) => existing.extend(self.definitions),
            _ => {
                let section: Map<String, Value> = self.definitions.into_iter().collect();
                root.insert(keyword.to_string(), Value::Object(section));
            }
        }
        Value::Object(root)
    }
}

/// Compute the dependency closure of a registered root, root first.
///
/// Documents are visited breadth-first and never twice, so cyclic suites
/// terminate. A reference into the canonical namespace that isn't registered
/// fails the closure; references elsewhere that aren't registered are external
/// and skipped.
///
/// # Errors
///
/// Returns `BundleError::UnknownRoot` if the root isn't registered, or
/// `BundleError::Unresolved` naming the missing URI and the referring document.
pub fn closure(
    registry: &SchemaRegistry,
    base: &CanonicalBase,
    root_uri: &str,
) -> Result<Vec<String>, BundleError> {
    if !registry.contains(root_uri) {
        return Err(BundleError::UnknownRoot {
            uri: root_uri.to_string(),
        });
    }

    let mut members = vec![root_uri.to_string()];
    let mut seen: HashSet<String> = HashSet::from([root_uri.to_string()]);
    let mut queue = VecDeque::from([root_uri.to_string()]);

    while let Some(current) = queue.pop_front() {
        let Some(document) = registry.resolve(&current) else {
            continue;
        };

        for site in collect_refs(document) {
            let (target, _) = split_ref(&site.reference);
            if target.is_empty() || seen.contains(target) {
                continue;
            }

            if !registry.contains(target) {
                if base.owns(target) {
                    return Err(BundleError::Unresolved {
                        uri: target.to_string(),
                        referrer: current.clone(),
                    });
                }
                debug!(uri = %target, referrer = %current, "leaving external reference");
                continue;
            }

            seen.insert(target.to_string());
            members.push(target.to_string());
            queue.push_back(target.to_string());
        }
    }

    Ok(members)
}

/// Bundle a registered root schema with its dependency closure.
///
/// # Errors
///
/// Returns the errors of [`closure`].
pub fn bundle(
    registry: &SchemaRegistry,
    base: &CanonicalBase,
    root_uri: &str,
) -> Result<Bundle, BundleError> {
    let members = closure(registry, base, root_uri)?;

    let mut definitions = BTreeMap::new();
    for uri in members.iter().skip(1) {
        if let Some(document) = registry.resolve(uri) {
            definitions.insert(uri.clone(), document.clone());
        }
    }

    let root = registry
        .resolve(root_uri)
        .cloned()
        .ok_or_else(|| BundleError::UnknownRoot {
            uri: root_uri.to_string(),
        })?;

    debug!(root = %root_uri, members = members.len(), "bundled closure");

    Ok(Bundle {
        root_uri: root_uri.to_string(),
        root,
        definitions,
    })
}
