//! Source discovery, parsing and `$ref` traversal.
//!
//! Handles listing the files of a namespace directory, turning them into JSON
//! documents, and walking the `$ref` sites of a parsed document.

use std::path::Path;

use serde_json::Value;

use crate::error::NormalizeError;
use crate::types::{SchemaSource, INSTANCE_KEYWORDS};

/// A `$ref` value together with the JSON Pointer of the object holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    pub pointer: String,
    pub reference: String,
}

/// List the `.json` files directly inside a namespace directory, sorted by name.
///
/// # Errors
///
/// Returns `NormalizeError::NamespaceNotFound` if the directory doesn't exist,
/// or `NormalizeError::ReadError` if it can't be listed.
pub fn discover_sources(
    root_dir: &Path,
    namespace: &str,
) -> Result<Vec<SchemaSource>, NormalizeError> {
    let dir = root_dir.join(namespace);
    if !dir.is_dir() {
        return Err(NormalizeError::NamespaceNotFound { path: dir });
    }

    let entries = std::fs::read_dir(&dir).map_err(|source| NormalizeError::ReadError {
        path: dir.clone(),
        source,
    })?;

    let mut sources = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            sources.push(SchemaSource::new(namespace, name));
        }
    }
    sources.sort();
    Ok(sources)
}

/// Read the raw text of a source file.
///
/// # Errors
///
/// Returns `NormalizeError::ReadError` if the file can't be read.
pub fn read_source(root_dir: &Path, source: &SchemaSource) -> Result<String, NormalizeError> {
    let path = root_dir.join(&source.namespace).join(&source.file_name);
    std::fs::read_to_string(&path).map_err(|err| NormalizeError::ReadError { path, source: err })
}

/// Parse source text into a JSON document.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidJson` naming the file if the text isn't valid JSON.
pub fn parse_source(source: &SchemaSource, content: &str) -> Result<Value, NormalizeError> {
    serde_json::from_str(content).map_err(|err| NormalizeError::InvalidJson {
        namespace: source.namespace.clone(),
        file: source.file_name.clone(),
        source: err,
    })
}

/// Split a reference into its document part and optional fragment (including `#`).
pub fn split_ref(reference: &str) -> (&str, Option<&str>) {
    match reference.find('#') {
        Some(idx) => (&reference[..idx], Some(&reference[idx..])),
        None => (reference, None),
    }
}

/// Navigate a JSON Pointer fragment (e.g., "#/$defs/foo" or "#/properties/bar").
///
/// Returns `None` when any segment is missing. Plain-name anchors (`#foo`) are
/// not pointers and also yield `None`.
pub fn navigate_fragment<'a>(schema: &'a Value, fragment: &str) -> Option<&'a Value> {
    let path = fragment.trim_start_matches('#');
    if path.is_empty() {
        return Some(schema);
    }
    let path = path.strip_prefix('/')?;

    let mut current = schema;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Collect every `$ref` site of a document in document order.
pub fn collect_refs(schema: &Value) -> Vec<RefSite> {
    let mut sites = Vec::new();
    collect_refs_inner(schema, "", false, &mut sites);
    sites
}

fn collect_refs_inner(value: &Value, pointer: &str, names: bool, sites: &mut Vec<RefSite>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref").filter(|_| !names) {
                sites.push(RefSite {
                    pointer: pointer.to_string(),
                    reference: reference.clone(),
                });
            }
            for (key, child) in map {
                if !names && INSTANCE_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let child_names = !names && NAME_MAP_KEYWORDS.contains(&key.as_str());
                collect_refs_inner(child, &child_pointer(pointer, key), child_names, sites);
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                collect_refs_inner(item, &format!("{}/{}", pointer, i), false, sites);
            }
        }
        _ => {}
    }
}

/// Visit every `$ref` string of a document mutably, in document order.
///
/// The callback receives the pointer of the holding object and the value; the
/// first error stops the walk.
pub fn visit_refs_mut<E>(
    schema: &mut Value,
    visitor: &mut impl FnMut(&str, &mut String) -> Result<(), E>,
) -> Result<(), E> {
    visit_refs_inner(schema, "", false, visitor)
}

fn visit_refs_inner<E>(
    value: &mut Value,
    pointer: &str,
    names: bool,
    visitor: &mut impl FnMut(&str, &mut String) -> Result<(), E>,
) -> Result<(), E> {
    match value {
        Value::Object(map) => {
            if !names {
                if let Some(Value::String(reference)) = map.get_mut("$ref") {
                    visitor(pointer, reference)?;
                }
            }
            for (key, child) in map.iter_mut() {
                if !names && INSTANCE_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let child_names = !names && NAME_MAP_KEYWORDS.contains(&key.as_str());
                visit_refs_inner(child, &child_pointer(pointer, key), child_names, visitor)?;
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter_mut().enumerate() {
                visit_refs_inner(item, &format!("{}/{}", pointer, i), false, visitor)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Keywords whose object keys are names chosen by the schema author.
const NAME_MAP_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
];

fn child_pointer(pointer: &str, key: &str) -> String {
    format!("{}/{}", pointer, key.replace('~', "~0").replace('/', "~1"))
}
