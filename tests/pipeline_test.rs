//! Integration tests for the build pipeline over a small source tree.

use std::fs;
use std::path::Path;

use csa_schemas::{
    collect_refs, populate_registry, reference_check, run, BuildConfig, BuildError, EntryPoint,
    Severity, Status,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const BASE: &str = "https://example.org/csa";

fn uri(path: &str) -> String {
    format!("{}/{}", BASE, path)
}

fn write_json(root: &Path, path: &str, value: &Value) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Writes a miniature suite with the same layout as the real sources:
/// shared common definitions, a draft-07 SensorML namespace, SWE Common and
/// one part with the entry points.
fn write_suite(dir: &TempDir) -> BuildConfig {
    let src = dir.path().join("api");

    write_json(
        &src,
        "common/links.json",
        &json!({
            "type": "array",
            "items": { "$ref": "#/$defs/Link" },
            "$defs": {
                "Link": {
                    "type": "object",
                    "required": ["href"],
                    "properties": { "href": { "type": "string" } }
                }
            }
        }),
    );
    write_json(
        &src,
        "sensorml/schemas/json/PhysicalSystem.json",
        &json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "definition": { "$ref": "commonDefs.json#/$defs/Uri" },
                "outputs": { "$ref": "../../../swecommon/schemas/json/DataRecord.json" }
            }
        }),
    );
    write_json(
        &src,
        "sensorml/schemas/json/commonDefs.json",
        &json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "definitions": {},
            "$defs": { "Uri": { "type": "string", "format": "uri" } }
        }),
    );
    write_json(
        &src,
        "swecommon/schemas/json/DataRecord.json",
        &json!({
            "type": "object",
            "properties": { "fields": { "type": "array" } }
        }),
    );
    write_json(
        &src,
        "part1/sensorml/system.json",
        &json!({
            "type": "object",
            "required": ["id", "type", "name"],
            "allOf": [{ "$ref": "../../sensorml/schemas/json/PhysicalSystem.json" }],
            "properties": {
                "id": { "type": "string", "readOnly": true },
                "type": { "const": "PhysicalSystem" },
                "name": { "type": "string" },
                "links": { "$ref": "../common/commonDefs.json#/$defs/Links" }
            }
        }),
    );
    write_json(
        &src,
        "part1/sensorml/procedure.json",
        &json!({ "allOf": [{ "$ref": "system.json" }] }),
    );
    write_json(
        &src,
        "part1/sensorml/orphan.json",
        &json!({
            "properties": { "position": { "$ref": "../../common/position.json" } }
        }),
    );
    fs::write(src.join("part1/sensorml/broken.json"), "{ \"type\": ").unwrap();

    BuildConfig {
        base_url: BASE.to_string(),
        source_dir: src,
        output_dir: dir.path().join("out"),
        namespaces: vec![
            "common".to_string(),
            "sensorml/schemas/json".to_string(),
            "swecommon/schemas/json".to_string(),
            "part1/sensorml".to_string(),
        ],
        entry_points: vec![
            EntryPoint {
                name: "system.sml".to_string(),
                namespace: "part1/sensorml".to_string(),
                root: "system.json".to_string(),
                output: "system.sml.schema".to_string(),
            },
            EntryPoint {
                name: "orphan".to_string(),
                namespace: "part1/sensorml".to_string(),
                root: "orphan.json".to_string(),
                output: "orphan.schema".to_string(),
            },
        ],
    }
}

fn read_output(config: &BuildConfig, name: &str) -> Value {
    let text = fs::read_to_string(config.output_dir.join(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

mod build {
    use super::*;

    #[test]
    fn writes_bundle_with_closure() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        run(&config).unwrap();
        let bundle = read_output(&config, "system.sml.schema");

        assert_eq!(bundle["$id"], uri("part1/sensorml/system.json"));
        let defs = bundle["$defs"].as_object().unwrap();
        let mut members: Vec<&str> = defs.keys().map(String::as_str).collect();
        members.sort();
        assert_eq!(
            members,
            vec![
                uri("common/links.json").as_str(),
                uri("sensorml/schemas/json/PhysicalSystem.json").as_str(),
                uri("sensorml/schemas/json/commonDefs.json").as_str(),
                uri("swecommon/schemas/json/DataRecord.json").as_str(),
            ]
        );
    }

    #[test]
    fn read_only_properties_are_not_required() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let report = run(&config).unwrap();
        let bundle = read_output(&config, "system.sml.schema");

        assert_eq!(bundle["required"], json!(["type", "name"]));
        assert_eq!(bundle["properties"]["id"]["readOnly"], json!(true));
        assert_eq!(report.sanitized, 1);
    }

    #[test]
    fn bundled_references_are_absolute_or_local() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        run(&config).unwrap();
        let bundle = read_output(&config, "system.sml.schema");

        let refs = collect_refs(&bundle);
        assert!(!refs.is_empty());
        for site in refs {
            assert!(
                site.reference.starts_with("https://") || site.reference.starts_with('#'),
                "{} at {}",
                site.reference,
                site.pointer
            );
        }
        assert_eq!(
            bundle["properties"]["links"]["$ref"],
            uri("common/links.json")
        );
    }

    #[test]
    fn output_is_pretty_with_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        run(&config).unwrap();
        let text = fs::read_to_string(config.output_dir.join("system.sml.schema")).unwrap();

        assert!(text.starts_with("{\n  \"$schema\": \"https://json-schema.org/draft/2020-12/schema\""));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn failing_entry_point_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let report = run(&config).unwrap();

        let orphan = report.bundles.iter().find(|b| b.name == "orphan").unwrap();
        assert_eq!(orphan.status, Status::Failed);
        let error = orphan.error.as_deref().unwrap();
        assert!(error.contains(&uri("common/position.json")));
        assert!(error.contains(&uri("part1/sensorml/orphan.json")));
        assert!(!config.output_dir.join("orphan.schema").exists());

        let system = report.bundles.iter().find(|b| b.name == "system.sml").unwrap();
        assert_eq!(system.status, Status::Ok);
        assert_eq!(system.members, 5);
        assert!(config.output_dir.join("system.sml.schema").exists());
    }

    #[test]
    fn failing_entry_point_removes_previous_output() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);
        fs::create_dir_all(&config.output_dir).unwrap();
        let stale = config.output_dir.join("orphan.schema");
        fs::write(&stale, "{}\n").unwrap();

        let report = run(&config).unwrap();

        let orphan = report.bundles.iter().find(|b| b.name == "orphan").unwrap();
        assert_eq!(orphan.status, Status::Failed);
        assert!(!stale.exists());
    }

    #[test]
    fn missing_fragment_in_closure_fails_entry_point() {
        let dir = TempDir::new().unwrap();
        let mut config = write_suite(&dir);
        write_json(
            &config.source_dir,
            "part1/sensorml/deployment.json",
            &json!({
                "properties": {
                    "link": { "$ref": "../../common/links.json#/$defs/Missing" }
                }
            }),
        );
        config.entry_points.push(EntryPoint {
            name: "deployment.sml".to_string(),
            namespace: "part1/sensorml".to_string(),
            root: "deployment.json".to_string(),
            output: "deployment.sml.schema".to_string(),
        });

        let report = run(&config).unwrap();

        assert_eq!(report.check.errors, 2);
        let deployment = report
            .bundles
            .iter()
            .find(|b| b.name == "deployment.sml")
            .unwrap();
        assert_eq!(deployment.status, Status::Failed);
        let error = deployment.error.as_deref().unwrap();
        assert!(error.starts_with("broken reference in"), "{}", error);
        assert!(error.contains("/properties/link"));
        assert!(!config.output_dir.join("deployment.sml.schema").exists());

        let system = report.bundles.iter().find(|b| b.name == "system.sml").unwrap();
        assert_eq!(system.status, Status::Ok);
    }

    #[test]
    fn malformed_file_is_reported_and_siblings_survive() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let report = run(&config).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.files_failed(), 1);
        let broken = report
            .files
            .iter()
            .find(|f| f.status == Status::Failed)
            .unwrap();
        assert_eq!(broken.file, "broken.json");
        assert!(broken
            .error
            .as_deref()
            .unwrap()
            .contains("part1/sensorml/broken.json"));
        assert!(report.files.iter().any(|f| f.file == "system.json"));
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        run(&config).unwrap();
        let first = fs::read(config.output_dir.join("system.sml.schema")).unwrap();
        run(&config).unwrap();
        let second = fs::read(config.output_dir.join("system.sml.schema")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn missing_namespace_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut config = write_suite(&dir);
        config.namespaces.push("part2/json".to_string());

        let report = run(&config).unwrap();

        let part2 = report
            .namespaces
            .iter()
            .find(|n| n.namespace == "part2/json")
            .unwrap();
        assert_eq!(part2.status, Status::Failed);
        assert!(config.output_dir.join("system.sml.schema").exists());
    }

    #[test]
    fn clean_suite_succeeds() {
        let dir = TempDir::new().unwrap();
        let mut config = write_suite(&dir);
        fs::remove_file(config.source_dir.join("part1/sensorml/broken.json")).unwrap();
        fs::remove_file(config.source_dir.join("part1/sensorml/orphan.json")).unwrap();
        config.entry_points.retain(|e| e.name != "orphan");

        let report = run(&config).unwrap();
        assert!(report.is_success(), "{:#?}", report);
    }

    #[test]
    fn output_dir_that_is_a_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = write_suite(&dir);
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        config.output_dir = blocker;

        let result = run(&config);
        assert!(matches!(result, Err(BuildError::OutputDir { .. })));
    }
}

mod check {
    use super::*;

    #[test]
    fn reports_unregistered_reference() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let (registry, report) = populate_registry(&config);
        let check = reference_check(&registry, &config.base(), &report.files);

        assert!(!check.is_ok());
        let e001: Vec<_> = check.diagnostics.iter().filter(|d| d.code == "E001").collect();
        assert_eq!(e001.len(), 1);
        assert_eq!(e001[0].uri, uri("part1/sensorml/orphan.json"));
        assert_eq!(e001[0].path, "/properties/position");
    }

    #[test]
    fn import_by_name_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let (registry, report) = populate_registry(&config);
        let check = reference_check(&registry, &config.base(), &report.files);

        let w001: Vec<_> = check.diagnostics.iter().filter(|d| d.code == "W001").collect();
        assert_eq!(w001.len(), 1);
        assert_eq!(w001[0].severity, Severity::Warning);
        assert_eq!(w001[0].uri, uri("part1/sensorml/procedure.json"));
        assert_eq!(w001[0].path, "/allOf/0");
        assert_eq!(
            registry.resolve(&uri("part1/sensorml/procedure.json")).unwrap()["allOf"][0]["$ref"],
            uri("part1/sensorml/system.json")
        );
    }

    #[test]
    fn registry_holds_every_readable_file() {
        let dir = TempDir::new().unwrap();
        let config = write_suite(&dir);

        let (registry, _) = populate_registry(&config);

        // Seven files parse; broken.json doesn't.
        assert_eq!(registry.len(), 7);
        let physical = registry
            .resolve(&uri("sensorml/schemas/json/PhysicalSystem.json"))
            .unwrap();
        assert_eq!(physical["$schema"], "http://json-schema.org/draft-07/schema#");
        assert_eq!(
            physical["properties"]["definition"]["$ref"],
            format!("{}#/$defs/Uri", uri("sensorml/schemas/json/commonDefs.json"))
        );
    }
}
