//! Connected Systems schema pipeline
//!
//! Turns the Connected Systems JSON Schema sources into self-contained bundles.
//!
//! The sources reference each other through a mix of relative paths,
//! cross-namespace shortcuts and bare definition names. The pipeline runs in four
//! stages:
//!
//! 1. **Normalize** every namespace: each `$ref` becomes an absolute URI under one
//!    canonical base, and each document gets `$schema` and `$id`.
//! 2. **Register** every normalized document by `$id`.
//! 3. **Sanitize**: properties marked `readOnly` are dropped from `required`.
//! 4. **Bundle** each entry point with everything it reaches into one document.
//!
//! # Example
//!
//! ```
//! use csa_schemas::{bundle, normalize_document, sanitize_registry, CanonicalBase,
//!     SchemaRegistry, SchemaSource};
//! use serde_json::json;
//!
//! let base = CanonicalBase::new("https://example.org/csa");
//! let mut registry = SchemaRegistry::new();
//!
//! let links = normalize_document(
//!     &base,
//!     &SchemaSource::new("common", "links.json"),
//!     json!({ "type": "array" }),
//! )
//! .unwrap();
//! let system = normalize_document(
//!     &base,
//!     &SchemaSource::new("part1/sensorml", "system.json"),
//!     json!({
//!         "type": "object",
//!         "required": ["id", "name"],
//!         "properties": {
//!             "id": { "type": "string", "readOnly": true },
//!             "name": { "type": "string" },
//!             "links": { "$ref": "../../common/links.json" }
//!         }
//!     }),
//! )
//! .unwrap();
//!
//! registry.register(links.document).unwrap();
//! registry.register(system.document).unwrap();
//! sanitize_registry(&mut registry);
//!
//! let root = "https://example.org/csa/part1/sensorml/system.json";
//! let document = bundle(&registry, &base, root).unwrap().into_document();
//!
//! assert_eq!(document["required"], json!(["name"]));
//! assert_eq!(
//!     document["properties"]["links"]["$ref"],
//!     "https://example.org/csa/common/links.json"
//! );
//! assert!(document["$defs"]
//!     .get("https://example.org/csa/common/links.json")
//!     .is_some());
//! ```
//!
//! # Reference Conventions
//!
//! | Source form | Rewritten to |
//! |-------------|--------------|
//! | `http(s)://...` | unchanged |
//! | `#/...` | unchanged |
//! | `../common/commonDefs.json#/$defs/X` | `<base>/common/x.json` (first letter lowered; `Links` is `links.json`) |
//! | `../common/sweCommonDefs.json#/$defs/X` | `<base>/swecommon/schemas/json/X.json` |
//! | `.../sweCommonDefs.json#/$defs/AnyComponent` | `sweCommon.json#/$defs/AnyComponent` in SWE Common |
//! | `.../sweCommonDefs.json#/$defs/*Encoding*` | `encodings.json#/$defs/X` in SWE Common |
//! | `./x.json`, `../x.json` | resolved against the namespace URI |
//! | `sensormlDefs.json#/$defs/X` | `<base>/sensorml/schemas/json/X.json` |
//! | `commonDefs.json#/$defs/X` | the namespace's own `commonDefs.json` in SensorML, otherwise as the common row |
//! | anything else | `<namespace URI>/<ref>`, flagged |

mod bundler;
mod config;
mod error;
mod linter;
mod loader;
mod normalizer;
mod pipeline;
mod registry;
mod sanitizer;
mod types;
mod validator;

pub use bundler::{bundle, closure, Bundle};
pub use config::{BuildConfig, EntryPoint};
pub use error::{BuildError, BundleError, ConfigError, NormalizeError, RegistryError};
pub use linter::{check_references, CheckResult, Diagnostic, Severity};
pub use loader::{
    collect_refs, discover_sources, navigate_fragment, read_source, split_ref, RefSite,
};
pub use normalizer::{
    classify, normalize_document, normalize_namespace, normalize_str, rewrite_ref,
    NamespaceOutcome, NormalizedDocument, RefContext, Rewrite, Rule, RULES,
};
pub use pipeline::{
    populate_registry, reference_check, run, BuildReport, BundleReport, FileReport,
    NamespaceReport, Status,
};
pub use registry::SchemaRegistry;
pub use sanitizer::{sanitize, sanitize_registry};
pub use types::{
    CanonicalBase, RefKind, SchemaSource, DRAFT_07, DRAFT_2020_12, INSTANCE_KEYWORDS,
};
pub use validator::check_bundle;
