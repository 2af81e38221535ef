//! Readonly sanitization - derives the request-validation variant of a schema.
//!
//! Request payloads must not be forced to carry output-only fields, so any
//! property declared `"readOnly": true` is dropped from the `required` list of
//! the object schema declaring it. `properties` is never touched.

use serde_json::{Map, Value};
use tracing::debug;

use crate::registry::SchemaRegistry;

/// Keywords whose array entries are sanitized as independent branches.
const COMPOSITION_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// Keywords whose object entries are sanitized as independent definitions.
const DEFINITION_KEYWORDS: &[&str] = &["$defs", "definitions"];

/// Sanitize a schema node for request validation.
///
/// When the node has both `properties` and `required`, entries naming a
/// read-only property are removed from `required`, preserving order. Entries
/// naming a property absent from `properties` are kept. The same applies,
/// independently, to every `allOf`/`anyOf`/`oneOf` branch and every
/// `$defs`/`definitions` entry. Referenced documents are not followed.
pub fn sanitize(schema: &Value) -> Value {
    let mut removed = 0;
    sanitize_node(schema, &mut removed)
}

/// Replace every registered document with its sanitized form.
///
/// Returns the number of `required` entries removed across the registry.
pub fn sanitize_registry(registry: &mut SchemaRegistry) -> usize {
    let mut total = 0;
    for (uri, document) in registry.documents_mut() {
        let mut removed = 0;
        *document = sanitize_node(document, &mut removed);
        if removed > 0 {
            debug!(uri = %uri, removed, "stripped read-only properties from required");
        }
        total += removed;
    }
    total
}

fn sanitize_node(value: &Value, removed: &mut usize) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };

    let mut result = Map::with_capacity(map.len());
    for (key, child) in map {
        let sanitized = match key.as_str() {
            "required" => strip_read_only(child, map.get("properties"), removed),
            k if COMPOSITION_KEYWORDS.contains(&k) => sanitize_branches(child, removed),
            k if DEFINITION_KEYWORDS.contains(&k) => sanitize_definitions(child, removed),
            _ => child.clone(),
        };
        result.insert(key.clone(), sanitized);
    }
    Value::Object(result)
}

fn strip_read_only(required: &Value, properties: Option<&Value>, removed: &mut usize) -> Value {
    let (Value::Array(names), Some(Value::Object(props))) = (required, properties) else {
        return required.clone();
    };

    let kept: Vec<Value> = names
        .iter()
        .filter(|name| {
            let read_only = name
                .as_str()
                .and_then(|n| props.get(n))
                .map(is_read_only)
                .unwrap_or(false);
            if read_only {
                *removed += 1;
            }
            !read_only
        })
        .cloned()
        .collect();
    Value::Array(kept)
}

fn sanitize_branches(value: &Value, removed: &mut usize) -> Value {
    match value {
        Value::Array(branches) => Value::Array(
            branches
                .iter()
                .map(|branch| sanitize_node(branch, removed))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn sanitize_definitions(value: &Value, removed: &mut usize) -> Value {
    match value {
        Value::Object(defs) => Value::Object(
            defs.iter()
                .map(|(name, def)| (name.clone(), sanitize_node(def, removed)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_read_only(definition: &Value) -> bool {
    definition
        .get("readOnly")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
