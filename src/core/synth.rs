//! Synthesizer — writes a topology as Terraform JSON under `stacks/{stack_id}/`.
//!
//! The stack directory layout is what the orchestrator applies, so the path
//! convention here is load-bearing. Writes are atomic (temp file + rename) and
//! verified against the rendered document before success is reported.

use super::digest;
use super::types::{ResourceDescriptor, ResourceTopology, StackId};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under the workspace root holding all stacks.
pub const STACKS_DIR: &str = "stacks";
/// Synthesized configuration file inside a stack directory.
pub const CONFIG_FILE: &str = "cdk.tf.json";

/// Synthesis failure.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("cannot create stack dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("synthesized config {path} does not match rendered document: {detail}")]
    Verify { path: PathBuf, detail: String },
}

/// A stack written to disk.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub stack_id: StackId,
    /// `{workspace}/stacks/{stack_id}`
    pub dir: PathBuf,
    /// `{dir}/cdk.tf.json`
    pub config_file: PathBuf,
    /// Topology fingerprint embedded in the document metadata
    pub fingerprint: String,
}

/// Derive the stack directory for a workspace.
pub fn stack_dir(workspace_root: &Path, stack_id: &StackId) -> PathBuf {
    workspace_root.join(STACKS_DIR).join(stack_id.as_str())
}

/// Render a topology as a Terraform JSON document.
pub fn render(topology: &ResourceTopology, fingerprint: &str) -> Value {
    let mut required_providers = Map::new();
    let mut providers = Map::new();
    let mut resources: Map<String, Value> = Map::new();

    for resource in topology.resources() {
        match resource {
            ResourceDescriptor::Provider(p) => {
                required_providers.insert(
                    p.name.clone(),
                    json!({ "source": p.source, "version": p.version }),
                );
                providers.insert(p.name.clone(), json!([{}]));
            }
            ResourceDescriptor::Image(i) => {
                insert_resource(
                    &mut resources,
                    resource.type_name(),
                    &i.id,
                    json!({ "name": i.name, "keep_locally": i.keep_locally }),
                );
            }
            ResourceDescriptor::Container(c) => {
                let ports: Vec<Value> = c
                    .ports
                    .iter()
                    .map(|p| json!({ "internal": p.internal, "external": p.external }))
                    .collect();
                insert_resource(
                    &mut resources,
                    resource.type_name(),
                    &c.id,
                    json!({
                        "name": c.name,
                        "image": format!("${{docker_image.{}.image_id}}", c.image_ref),
                        "ports": ports,
                        "env": c.env,
                    }),
                );
            }
        }
    }

    let mut doc = Map::new();
    doc.insert(
        "//".to_string(),
        json!({
            "metadata": {
                "stackName": topology.stack_id().as_str(),
                "provider": topology.provider().to_string(),
                "generator": format!("aguaform {}", env!("CARGO_PKG_VERSION")),
                "fingerprint": fingerprint,
            }
        }),
    );
    let terraform = if required_providers.is_empty() {
        json!({})
    } else {
        json!({ "required_providers": required_providers })
    };
    doc.insert("terraform".to_string(), terraform);
    if !providers.is_empty() {
        doc.insert("provider".to_string(), Value::Object(providers));
    }
    if !resources.is_empty() {
        doc.insert("resource".to_string(), Value::Object(resources));
    }
    Value::Object(doc)
}

fn insert_resource(resources: &mut Map<String, Value>, type_name: &str, id: &str, body: Value) {
    let entry = resources
        .entry(type_name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(by_id) = entry {
        by_id.insert(id.to_string(), body);
    }
}

/// Write a topology under `{workspace_root}/stacks/{stack_id}/`.
pub fn synthesize(
    topology: &ResourceTopology,
    workspace_root: &Path,
) -> Result<SynthesizedStack, SynthError> {
    let fingerprint = digest::topology_fingerprint(topology)?;
    let document = serde_json::to_string_pretty(&render(topology, &fingerprint))?;

    let dir = stack_dir(workspace_root, topology.stack_id());
    std::fs::create_dir_all(&dir).map_err(|source| SynthError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let config_file = dir.join(CONFIG_FILE);
    write_atomic(&config_file, &document)?;
    verify(&config_file, &document)?;

    log::debug!(
        "[{}] synthesized {} resource(s) to {}",
        topology.stack_id(),
        topology.resources().len(),
        config_file.display()
    );

    Ok(SynthesizedStack {
        stack_id: topology.stack_id().clone(),
        dir,
        config_file,
        fingerprint,
    })
}

fn write_atomic(path: &Path, content: &str) -> Result<(), SynthError> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content).map_err(|source| SynthError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| SynthError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn verify(path: &Path, expected: &str) -> Result<(), SynthError> {
    let on_disk = digest::hash_file(path).map_err(|detail| SynthError::Verify {
        path: path.to_path_buf(),
        detail,
    })?;
    if on_disk != digest::hash_string(expected) {
        return Err(SynthError::Verify {
            path: path.to_path_buf(),
            detail: "content hash mismatch".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::StackRegistry;
    use crate::core::topology;
    use crate::core::types::DeploymentRequest;

    fn blog(provider: &str, role: &str) -> ResourceTopology {
        let req = DeploymentRequest {
            name: "blog".to_string(),
            provider: provider.to_string(),
            image: "nginx:latest".to_string(),
            internal_port: 80,
            external_port: 8080,
            role: role.to_string(),
        };
        let reg = StackRegistry::builtin();
        topology::build(&req, reg.resolve(role).unwrap()).unwrap()
    }

    #[test]
    fn test_stack_dir_layout() {
        let id = StackId::derive("blog", crate::core::types::Role::Api);
        assert_eq!(
            stack_dir(Path::new("/ws"), &id),
            PathBuf::from("/ws/stacks/blog_api_stack")
        );
    }

    #[test]
    fn test_render_docker_stack() {
        let topo = blog("docker", "api");
        let doc = render(&topo, "blake3:x");

        assert_eq!(doc["//"]["metadata"]["stackName"], "blog_api_stack");
        assert_eq!(
            doc["terraform"]["required_providers"]["docker"]["source"],
            "kreuzwerker/docker"
        );
        assert!(doc["provider"]["docker"].is_array());

        let image = &doc["resource"]["docker_image"]["blog_image"];
        assert_eq!(image["name"], "nginx:latest");
        assert_eq!(image["keep_locally"], false);

        let container = &doc["resource"]["docker_container"]["blog_container"];
        assert_eq!(container["name"], "blog_container");
        assert_eq!(container["image"], "${docker_image.blog_image.image_id}");
        assert_eq!(container["ports"][0]["internal"], 80);
        assert_eq!(container["ports"][0]["external"], 8080);
        assert_eq!(container["env"], json!(["API_MODE=true"]));
    }

    #[test]
    fn test_render_cloud_stack_has_no_resources() {
        let topo = blog("cloud", "worker");
        let doc = render(&topo, "blake3:x");
        assert_eq!(doc["terraform"], json!({}));
        assert!(doc.get("resource").is_none());
        assert!(doc.get("provider").is_none());
        assert_eq!(doc["//"]["metadata"]["provider"], "cloud");
    }

    #[test]
    fn test_synthesize_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let topo = blog("docker", "api");
        let stack = synthesize(&topo, dir.path()).unwrap();

        assert!(stack.dir.ends_with("stacks/blog_api_stack"));
        assert!(stack.dir.is_dir());
        assert!(stack.config_file.exists());
        assert!(stack.fingerprint.starts_with("blake3:"));

        let content = std::fs::read_to_string(&stack.config_file).unwrap();
        let doc: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["//"]["metadata"]["fingerprint"], stack.fingerprint.as_str());
        assert!(content.contains("API_MODE=true"));

        // No temp file left behind
        assert!(!stack.dir.join("cdk.tf.json.tmp").exists());
    }

    #[test]
    fn test_synthesize_cloud_dir_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stack = synthesize(&blog("aws", "service"), dir.path()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(&stack.dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_synthesize_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let sa = synthesize(&blog("docker", "worker"), a.path()).unwrap();
        let sb = synthesize(&blog("docker", "worker"), b.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&sa.config_file).unwrap(),
            std::fs::read_to_string(&sb.config_file).unwrap()
        );
    }

    #[test]
    fn test_synthesize_unwritable_root() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the workspace root should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let err = synthesize(&blog("docker", "api"), &blocker).unwrap_err();
        assert!(matches!(err, SynthError::CreateDir { .. }));
        assert!(err.to_string().contains("cannot create stack dir"));
    }
}
