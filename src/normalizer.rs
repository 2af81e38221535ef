//! Reference normalization - rewrites every `$ref` into the canonical namespace.
//!
//! The source suites follow several historical conventions for pointing at each
//! other (`../common/commonDefs.json#/$defs/X`, bare `sensormlDefs.json` anchors,
//! plain file names, ...). Each convention is a [`Rule`] in [`RULES`]; the first
//! rule whose predicate accepts a reference decides how it is rewritten.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::NormalizeError;
use crate::loader::{discover_sources, parse_source, read_source, visit_refs_mut};
use crate::types::{
    CanonicalBase, RefKind, SchemaSource, COMMON_NAMESPACE, DRAFT_2020_12, SENSORML_NAMESPACE,
    SWECOMMON_NAMESPACE,
};

const COMMON_DEFS_PREFIX: &str = "../common/commonDefs.json#/$defs/";
const SWE_COMMON_DEFS_PREFIX: &str = "../common/sweCommonDefs.json#/$defs/";
const SENSORML_DEFS_PREFIX: &str = "sensormlDefs.json#/$defs/";
const BARE_COMMON_DEFS_PREFIX: &str = "commonDefs.json#/$defs/";

/// Where a reference is being rewritten: the canonical base and the namespace
/// of the document holding it.
#[derive(Debug, Clone, Copy)]
pub struct RefContext<'a> {
    pub base: &'a CanonicalBase,
    pub namespace: &'a str,
}

/// One classification rule: a predicate on the raw value and its rewrite.
pub struct Rule {
    pub kind: RefKind,
    pub matches: fn(&str) -> bool,
    pub rewrite: fn(&RefContext<'_>, &str) -> Result<String, NormalizeError>,
}

/// Classification rules in priority order. The last rule accepts everything.
pub const RULES: &[Rule] = &[
    Rule {
        kind: RefKind::Absolute,
        matches: |r| r.starts_with("http"),
        rewrite: unchanged,
    },
    Rule {
        kind: RefKind::Local,
        matches: |r| r.starts_with('#'),
        rewrite: unchanged,
    },
    Rule {
        kind: RefKind::CommonDefs,
        matches: |r| r.starts_with(COMMON_DEFS_PREFIX),
        rewrite: rewrite_common_defs,
    },
    Rule {
        kind: RefKind::SweCommonDefs,
        matches: |r| r.starts_with(SWE_COMMON_DEFS_PREFIX),
        rewrite: rewrite_swe_common_defs,
    },
    Rule {
        kind: RefKind::Relative,
        matches: |r| r.starts_with('.'),
        rewrite: rewrite_relative,
    },
    Rule {
        kind: RefKind::SensormlDefs,
        matches: |r| r.starts_with(SENSORML_DEFS_PREFIX),
        rewrite: rewrite_sensorml_defs,
    },
    Rule {
        kind: RefKind::BareCommonDefs,
        matches: |r| r.starts_with(BARE_COMMON_DEFS_PREFIX),
        rewrite: rewrite_bare_common_defs,
    },
    Rule {
        kind: RefKind::ImportByName,
        matches: |_| true,
        rewrite: rewrite_import_by_name,
    },
];

/// A reference that was changed during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    /// JSON Pointer of the object holding the `$ref`.
    pub pointer: String,
    pub original: String,
    pub rewritten: String,
    pub kind: RefKind,
}

/// A source document after normalization, ready for registration.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub source: SchemaSource,
    /// Canonical URI, equal to the document's `$id`.
    pub uri: String,
    pub document: Value,
    pub rewrites: Vec<Rewrite>,
}

impl NormalizedDocument {
    /// References that only matched the import-by-name fallback.
    pub fn flagged(&self) -> impl Iterator<Item = &Rewrite> {
        self.rewrites
            .iter()
            .filter(|r| r.kind == RefKind::ImportByName)
    }
}

/// Result of normalizing every file of one namespace.
#[derive(Debug)]
pub struct NamespaceOutcome {
    pub namespace: String,
    pub documents: Vec<NormalizedDocument>,
    pub failures: Vec<(SchemaSource, NormalizeError)>,
}

/// Find the rule that applies to a raw reference value.
pub fn classify(reference: &str) -> RefKind {
    find_rule(reference).kind
}

/// Rewrite a single reference value to its canonical form.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidReference` if a relative reference can't be
/// resolved against the namespace URI.
pub fn rewrite_ref(ctx: &RefContext<'_>, reference: &str) -> Result<String, NormalizeError> {
    (find_rule(reference).rewrite)(ctx, reference)
}

fn find_rule(reference: &str) -> &'static Rule {
    // The fallback rule accepts everything, so a match always exists.
    RULES
        .iter()
        .find(|rule| (rule.matches)(reference))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Normalize an already parsed document.
///
/// Rewrites every `$ref`, then sets `$id` to the canonical URI of `source` and
/// `$schema` to draft 2020-12 when absent. `$schema` and `$id` are placed first;
/// the remaining keys keep their order.
///
/// # Errors
///
/// Returns `NormalizeError::NotAnObject` if the document root isn't an object, or
/// `NormalizeError::InvalidReference` if a reference can't be rewritten.
pub fn normalize_document(
    base: &CanonicalBase,
    source: &SchemaSource,
    mut document: Value,
) -> Result<NormalizedDocument, NormalizeError> {
    if !document.is_object() {
        return Err(NormalizeError::NotAnObject {
            namespace: source.namespace.clone(),
            file: source.file_name.clone(),
        });
    }

    let ctx = RefContext {
        base,
        namespace: &source.namespace,
    };
    let mut rewrites = Vec::new();
    let mut rewrite_site = |pointer: &str, reference: &mut String| -> Result<(), NormalizeError> {
        let rule = find_rule(reference);
        if rule.kind.is_passthrough() {
            return Ok(());
        }
        let rewritten = (rule.rewrite)(&ctx, reference)?;
        rewrites.push(Rewrite {
            pointer: pointer.to_string(),
            original: std::mem::replace(reference, rewritten.clone()),
            rewritten,
            kind: rule.kind,
        });
        Ok(())
    };
    visit_refs_mut(&mut document, &mut rewrite_site)?;

    let uri = base.document_uri(&source.namespace, &source.file_name);
    let document = assign_identity(document, &uri);

    let normalized = NormalizedDocument {
        source: source.clone(),
        uri,
        document,
        rewrites,
    };

    for flagged in normalized.flagged() {
        warn!(
            source = %source,
            pointer = %flagged.pointer,
            reference = %flagged.original,
            "reference matched no known convention; treated as import by name"
        );
    }
    debug!(
        uri = %normalized.uri,
        rewrites = normalized.rewrites.len(),
        "normalized document"
    );

    Ok(normalized)
}

/// Parse raw source text and normalize it.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidJson` naming the file if the text isn't valid
/// JSON, plus the errors of [`normalize_document`].
pub fn normalize_str(
    base: &CanonicalBase,
    source: &SchemaSource,
    content: &str,
) -> Result<NormalizedDocument, NormalizeError> {
    let document = parse_source(source, content)?;
    normalize_document(base, source, document)
}

/// Normalize every file of a namespace directory below `root_dir`.
///
/// Per-file failures are collected in the outcome so that one malformed file
/// doesn't hide the state of its siblings.
///
/// # Errors
///
/// Returns an error only if the namespace directory itself can't be listed.
pub fn normalize_namespace(
    base: &CanonicalBase,
    root_dir: &Path,
    namespace: &str,
) -> Result<NamespaceOutcome, NormalizeError> {
    let sources = discover_sources(root_dir, namespace)?;
    let mut outcome = NamespaceOutcome {
        namespace: namespace.to_string(),
        documents: Vec::with_capacity(sources.len()),
        failures: Vec::new(),
    };

    for source in sources {
        let result = read_source(root_dir, &source)
            .and_then(|content| normalize_str(base, &source, &content));
        match result {
            Ok(document) => outcome.documents.push(document),
            Err(e) => {
                warn!(source = %source, error = %e, "failed to normalize");
                outcome.failures.push((source, e));
            }
        }
    }

    Ok(outcome)
}

fn assign_identity(document: Value, uri: &str) -> Value {
    let Value::Object(map) = document else {
        return document;
    };

    let schema = map
        .get("$schema")
        .cloned()
        .unwrap_or_else(|| Value::String(DRAFT_2020_12.to_string()));

    let mut result = Map::with_capacity(map.len() + 2);
    result.insert("$schema".to_string(), schema);
    result.insert("$id".to_string(), Value::String(uri.to_string()));
    for (key, value) in map {
        if key != "$schema" && key != "$id" {
            result.insert(key, value);
        }
    }
    Value::Object(result)
}

// --- Rewrite functions ---

fn unchanged(_ctx: &RefContext<'_>, reference: &str) -> Result<String, NormalizeError> {
    Ok(reference.to_string())
}

fn rewrite_common_defs(ctx: &RefContext<'_>, reference: &str) -> Result<String, NormalizeError> {
    let rest = &reference[COMMON_DEFS_PREFIX.len()..];
    Ok(common_definition_uri(ctx.base, rest))
}

fn rewrite_swe_common_defs(
    ctx: &RefContext<'_>,
    reference: &str,
) -> Result<String, NormalizeError> {
    let rest = &reference[SWE_COMMON_DEFS_PREFIX.len()..];
    let (name, tail) = split_definition(rest);
    let uri = match name {
        "AnyComponent" => anchor_uri(ctx.base, SWECOMMON_NAMESPACE, "sweCommon.json", name, tail),
        "AnyEncoding" => anchor_uri(ctx.base, SWECOMMON_NAMESPACE, "encodings.json", name, tail),
        _ if name.contains("Encoding") => {
            anchor_uri(ctx.base, SWECOMMON_NAMESPACE, "encodings.json", name, tail)
        }
        _ => file_uri(ctx.base, SWECOMMON_NAMESPACE, &format!("{}.json", name), tail),
    };
    Ok(uri)
}

fn rewrite_relative(ctx: &RefContext<'_>, reference: &str) -> Result<String, NormalizeError> {
    let invalid = |message: String| NormalizeError::InvalidReference {
        reference: reference.to_string(),
        message,
    };
    let namespace_uri = ctx.base.namespace_uri(ctx.namespace);
    let base = Url::parse(&namespace_uri).map_err(|e| invalid(e.to_string()))?;
    let resolved = base.join(reference).map_err(|e| invalid(e.to_string()))?;
    Ok(resolved.to_string())
}

fn rewrite_sensorml_defs(ctx: &RefContext<'_>, reference: &str) -> Result<String, NormalizeError> {
    let rest = &reference[SENSORML_DEFS_PREFIX.len()..];
    let (name, tail) = split_definition(rest);
    Ok(file_uri(
        ctx.base,
        SENSORML_NAMESPACE,
        &format!("{}.json", name),
        tail,
    ))
}

fn rewrite_bare_common_defs(
    ctx: &RefContext<'_>,
    reference: &str,
) -> Result<String, NormalizeError> {
    let rest = &reference[BARE_COMMON_DEFS_PREFIX.len()..];
    if ctx.namespace.starts_with("sensorml") {
        // SensorML vendors its own copy of the common definitions.
        return Ok(format!(
            "{}#/$defs/{}",
            ctx.base.document_uri(ctx.namespace, "commonDefs.json"),
            rest
        ));
    }
    Ok(common_definition_uri(ctx.base, rest))
}

fn rewrite_import_by_name(
    ctx: &RefContext<'_>,
    reference: &str,
) -> Result<String, NormalizeError> {
    Ok(format!("{}{}", ctx.base.namespace_uri(ctx.namespace), reference))
}

/// `X` of a shared common definition maps to its own file, `x.json`, except
/// `Links` which lives at `links.json`.
fn common_definition_uri(base: &CanonicalBase, rest: &str) -> String {
    let (name, tail) = split_definition(rest);
    let file_name = if name == "Links" {
        "links.json".to_string()
    } else {
        format!("{}.json", lower_first(name))
    };
    file_uri(base, COMMON_NAMESPACE, &file_name, tail)
}

/// Split `Name/rest/of/pointer` into the definition name and the remainder.
fn split_definition(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((name, tail)) if !tail.is_empty() => (name, Some(tail)),
        Some((name, _)) => (name, None),
        None => (rest, None),
    }
}

fn file_uri(base: &CanonicalBase, namespace: &str, file_name: &str, tail: Option<&str>) -> String {
    let uri = base.document_uri(namespace, file_name);
    match tail {
        Some(tail) => format!("{}#/{}", uri, tail),
        None => uri,
    }
}

fn anchor_uri(
    base: &CanonicalBase,
    namespace: &str,
    file_name: &str,
    name: &str,
    tail: Option<&str>,
) -> String {
    let uri = format!("{}#/$defs/{}", base.document_uri(namespace, file_name), name);
    match tail {
        Some(tail) => format!("{}/{}", uri, tail),
        None => uri,
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
