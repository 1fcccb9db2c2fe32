//! Cloud assembly loading.
//!
//! # Layout
//!
//! ```text
//! cdk.out/
//!   manifest.json               (artifacts, in declaration order)
//!   ApiStack.template.json
//!   assembly-Prod/              (nested assembly, i.e. a CDK Stage)
//!     manifest.json
//!     ProdApi.template.json
//! ```
//!
//! Artifacts of type `aws:cloudformation:stack` become [`Stack`]s; artifacts of
//! type `cdk:cloud-assembly` are loaded recursively and their stacks are
//! spliced in at the position the nested assembly was declared. The final list
//! is ordered so that every stack comes after the stacks it depends on, with
//! declaration order breaking ties.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, AssemblyError};
use crate::types::{Stack, StackId};

const MANIFEST_FILE: &str = "manifest.json";
const STACK_ARTIFACT: &str = "aws:cloudformation:stack";
const NESTED_ASSEMBLY_ARTIFACT: &str = "cdk:cloud-assembly";

#[derive(Debug, Deserialize)]
struct AssemblyManifest {
    #[serde(default)]
    artifacts: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactManifest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    properties: ArtifactProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactProperties {
    template_file: Option<String>,
    stack_name: Option<String>,
    directory_name: Option<String>,
}

/// `<dir>/manifest.json`. Pure, no I/O.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Load every stack of the assembly at `dir`, nested assemblies included,
/// in dependency order.
pub fn load_stacks(dir: &Path) -> Result<Vec<Stack>, AssemblyError> {
    let mut stacks = Vec::new();
    collect_stacks(dir, true, &mut stacks)?;
    order_by_dependencies(dir, stacks)
}

fn collect_stacks(dir: &Path, top_level: bool, out: &mut Vec<Stack>) -> Result<(), AssemblyError> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Err(AssemblyError::ManifestNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let manifest: AssemblyManifest = serde_json::from_str(&contents).map_err(|e| {
        AssemblyError::Parse {
            path: path.clone(),
            source: e,
        }
    })?;

    for (artifact_id, value) in manifest.artifacts {
        let artifact: ArtifactManifest =
            serde_json::from_value(value).map_err(|e| AssemblyError::Parse {
                path: path.clone(),
                source: e,
            })?;

        match artifact.kind.as_str() {
            STACK_ARTIFACT => {
                let template_file = artifact.properties.template_file.ok_or_else(|| {
                    AssemblyError::MissingField {
                        path: path.clone(),
                        artifact: artifact_id.clone(),
                        field: "templateFile",
                    }
                })?;
                out.push(Stack {
                    display_name: artifact.display_name.unwrap_or_else(|| artifact_id.clone()),
                    stack_name: artifact
                        .properties
                        .stack_name
                        .unwrap_or_else(|| artifact_id.clone()),
                    template_file: PathBuf::from(template_file),
                    assembly_dir: dir.to_path_buf(),
                    top_level,
                    dependencies: artifact.dependencies.into_iter().map(StackId).collect(),
                    id: StackId(artifact_id),
                });
            }
            NESTED_ASSEMBLY_ARTIFACT => {
                let directory = artifact.properties.directory_name.ok_or_else(|| {
                    AssemblyError::MissingField {
                        path: path.clone(),
                        artifact: artifact_id.clone(),
                        field: "directoryName",
                    }
                })?;
                collect_stacks(&dir.join(directory), false, out)?;
            }
            other => {
                tracing::trace!("skipping artifact {artifact_id} of type {other}");
            }
        }
    }
    Ok(())
}

/// Stable topological order: repeatedly emit the first stack (in declaration
/// order) whose stack dependencies have all been emitted. Dependencies on
/// non-stack artifacts (asset manifests, tree metadata) are ignored.
fn order_by_dependencies(dir: &Path, stacks: Vec<Stack>) -> Result<Vec<Stack>, AssemblyError> {
    let known: HashSet<StackId> = stacks.iter().map(|s| s.id.clone()).collect();
    let mut emitted: HashSet<StackId> = HashSet::new();
    let mut pending = stacks;
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|stack| {
            stack
                .dependencies
                .iter()
                .all(|dep| !known.contains(dep) || emitted.contains(dep))
        });
        let Some(index) = ready else {
            let names: Vec<&str> = pending.iter().map(|s| s.display_name.as_str()).collect();
            return Err(AssemblyError::DependencyCycle {
                path: manifest_path(dir),
                stacks: names.join(", "),
            });
        };
        let stack = pending.remove(index);
        emitted.insert(stack.id.clone());
        ordered.push(stack);
    }
    Ok(ordered)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, json: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), json).unwrap();
    }

    #[test]
    fn missing_manifest_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = load_stacks(tmp.path()).unwrap_err();
        assert!(matches!(err, AssemblyError::ManifestNotFound { .. }));
    }

    #[test]
    fn malformed_manifest_reports_path() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "{ not json");
        let err = load_stacks(tmp.path()).unwrap_err();
        assert!(matches!(err, AssemblyError::Parse { .. }));
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn declaration_order_is_preserved_without_dependencies() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"{"artifacts": {
                "Zeta": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Zeta.template.json"}},
                "Alpha": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Alpha.template.json"}}
            }}"#,
        );
        let stacks = load_stacks(tmp.path()).unwrap();
        let ids: Vec<&str> = stacks.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, ["Zeta", "Alpha"]);
        assert_eq!(stacks[0].stack_name, "Zeta");
        assert!(stacks[0].top_level);
    }

    #[test]
    fn dependencies_come_first() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"{"artifacts": {
                "Api": {"type": "aws:cloudformation:stack", "dependencies": ["Network", "Api.assets"],
                        "properties": {"templateFile": "Api.template.json"}},
                "Api.assets": {"type": "cdk:asset-manifest", "properties": {"file": "Api.assets.json"}},
                "Network": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Network.template.json"}}
            }}"#,
        );
        let stacks = load_stacks(tmp.path()).unwrap();
        let ids: Vec<&str> = stacks.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, ["Network", "Api"]);
    }

    #[test]
    fn nested_assemblies_are_flattened_in_place() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"{"artifacts": {
                "Pipeline": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Pipeline.template.json"}},
                "assembly-Prod": {"type": "cdk:cloud-assembly",
                                  "properties": {"directoryName": "assembly-Prod", "displayName": "Prod"}},
                "Tail": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Tail.template.json"}}
            }}"#,
        );
        write_manifest(
            &tmp.path().join("assembly-Prod"),
            r#"{"artifacts": {
                "ProdApi": {"type": "aws:cloudformation:stack", "displayName": "Prod/Api",
                            "properties": {"templateFile": "ProdApi.template.json", "stackName": "Prod-Api"}}
            }}"#,
        );

        let stacks = load_stacks(tmp.path()).unwrap();
        let names: Vec<&str> = stacks.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, ["Pipeline", "Prod/Api", "Tail"]);
        let nested = &stacks[1];
        assert!(!nested.top_level);
        assert_eq!(nested.stack_name, "Prod-Api");
        assert!(nested.template_path().ends_with("assembly-Prod/ProdApi.template.json"));
    }

    #[test]
    fn stack_without_template_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"{"artifacts": {"Api": {"type": "aws:cloudformation:stack", "properties": {}}}}"#,
        );
        let err = load_stacks(tmp.path()).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::MissingField { field: "templateFile", .. }
        ));
    }

    #[test]
    fn dependency_cycle_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"{"artifacts": {
                "A": {"type": "aws:cloudformation:stack", "dependencies": ["B"], "properties": {"templateFile": "A.json"}},
                "B": {"type": "aws:cloudformation:stack", "dependencies": ["A"], "properties": {"templateFile": "B.json"}}
            }}"#,
        );
        let err = load_stacks(tmp.path()).unwrap_err();
        assert!(matches!(err, AssemblyError::DependencyCycle { .. }));
    }
}
