//! Deployment types — requests, resource descriptors, topology, outcomes, settings.
//!
//! Requests carry provider and role as raw strings so that unknown values can be
//! reported as resolution failures instead of being rejected at parse time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Deployment request
// ============================================================================

/// Parameters for one deployment, as submitted by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentRequest {
    /// Project name (used to derive resource and stack names)
    pub name: String,

    /// Infrastructure provider: `container-local` (alias `docker`) or `cloud` (alias `aws`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Container image reference
    #[serde(default = "default_image")]
    pub image: String,

    /// Port the container listens on
    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    /// Port published on the host
    #[serde(default = "default_external_port")]
    pub external_port: u16,

    /// Application role: `api`, `worker` or `service`
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_provider() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "nginx:latest".to_string()
}

fn default_internal_port() -> u16 {
    80
}

fn default_external_port() -> u16 {
    8080
}

fn default_role() -> String {
    "api".to_string()
}

// ============================================================================
// Provider and role
// ============================================================================

/// Infrastructure provider a topology targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    ContainerLocal,
    Cloud,
}

impl Provider {
    /// Parse a provider identifier. Accepts the canonical names and the
    /// `docker`/`aws` aliases used by the web form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "container-local" | "docker" => Some(Self::ContainerLocal),
            "cloud" | "aws" => Some(Self::Cloud),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainerLocal => write!(f, "container-local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Application archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Api,
    Worker,
    Service,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Api, Role::Worker, Role::Service];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Worker => "worker",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource descriptors
// ============================================================================

/// Provider block required by the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderBinding {
    /// Local provider name (e.g. `docker`)
    pub name: String,
    /// Registry source address
    pub source: String,
    /// Version constraint
    pub version: String,
}

/// Container image pulled by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageResource {
    /// Logical resource id inside the stack
    pub id: String,
    /// Image reference
    pub name: String,
    /// Keep the image on the host after teardown
    pub keep_locally: bool,
}

/// Internal → external port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub internal: u16,
    pub external: u16,
}

/// Container workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerResource {
    /// Logical resource id inside the stack
    pub id: String,
    /// Container name on the host
    pub name: String,
    /// Id of the image resource this container runs
    pub image_ref: String,
    pub ports: Vec<PortBinding>,
    /// `KEY=value` environment entries
    pub env: Vec<String>,
}

/// One declarative resource in a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDescriptor {
    Provider(ProviderBinding),
    Image(ImageResource),
    Container(ContainerResource),
}

impl ResourceDescriptor {
    /// Engine resource type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Image(_) => "docker_image",
            Self::Container(_) => "docker_container",
        }
    }
}

// ============================================================================
// Stack identifier and topology
// ============================================================================

/// `{name}_{role}_stack`: names the synthesized directory and tags log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackId(String);

impl StackId {
    pub fn derive(name: &str, role: Role) -> Self {
        Self(format!("{}_{}_stack", name.trim(), role))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered resource graph for one stack. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTopology {
    stack_id: StackId,
    provider: Provider,
    resources: Vec<ResourceDescriptor>,
}

impl ResourceTopology {
    pub(crate) fn new(
        stack_id: StackId,
        provider: Provider,
        resources: Vec<ResourceDescriptor>,
    ) -> Self {
        Self {
            stack_id,
            provider,
            resources,
        }
    }

    pub fn stack_id(&self) -> &StackId {
        &self.stack_id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// True for placeholder topologies that provision nothing.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The workload resource, if any.
    pub fn container(&self) -> Option<&ContainerResource> {
        self.resources.iter().find_map(|r| match r {
            ResourceDescriptor::Container(c) => Some(c),
            _ => None,
        })
    }
}

// ============================================================================
// Provisioning outcome
// ============================================================================

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// Structured result of one deployment attempt. Exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// Apply succeeded; carries the engine's stdout and the stack fingerprint.
    Success {
        applied_output: String,
        fingerprint: String,
    },
    /// Bad or missing input; no I/O was performed.
    ValidationError { message: String },
    /// Role is not registered.
    UnknownRole { role: String },
    /// Provider is not supported.
    UnsupportedProvider { provider: String },
    /// Local environment or serialization fault while writing the stack.
    SynthesisError { message: String },
    /// Engine rejected `init`; stderr passed through verbatim.
    InitError { stderr: String },
    /// Engine rejected `apply`; stderr passed through verbatim.
    ApplyError { stderr: String },
    /// Engine binary is not installed.
    EngineMissing { binary: String },
    /// Engine exceeded the configured timeout and was killed.
    TimedOut { phase: Phase, seconds: u64 },
    /// Operator interrupted the run; the engine was killed.
    Interrupted { phase: Phase },
    /// Uncaught internal fault inside the deployment pipeline.
    InternalFault { message: String },
}

impl ProvisioningOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short machine-readable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ValidationError { .. } => "validation_error",
            Self::UnknownRole { .. } => "unknown_role",
            Self::UnsupportedProvider { .. } => "unsupported_provider",
            Self::SynthesisError { .. } => "synthesis_error",
            Self::InitError { .. } => "init_error",
            Self::ApplyError { .. } => "apply_error",
            Self::EngineMissing { .. } => "engine_missing",
            Self::TimedOut { .. } => "timed_out",
            Self::Interrupted { .. } => "interrupted",
            Self::InternalFault { .. } => "internal_fault",
        }
    }
}

impl fmt::Display for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "deploy succeeded"),
            Self::ValidationError { message } => write!(f, "validation error: {}", message),
            Self::UnknownRole { role } => {
                let known: Vec<_> = Role::ALL.iter().map(Role::as_str).collect();
                write!(
                    f,
                    "application role '{}' is not supported (expected one of: {})",
                    role,
                    known.join(", ")
                )
            }
            Self::UnsupportedProvider { provider } => {
                write!(f, "provider '{}' is not supported", provider)
            }
            Self::SynthesisError { message } => write!(f, "synthesis failed: {}", message),
            Self::InitError { stderr } => write!(f, "engine init failed:\n{}", stderr),
            Self::ApplyError { stderr } => write!(f, "engine apply failed:\n{}", stderr),
            Self::EngineMissing { binary } => {
                write!(f, "provisioning engine '{}' not found in PATH", binary)
            }
            Self::TimedOut { phase, seconds } => {
                write!(f, "engine {} timed out after {}s", phase, seconds)
            }
            Self::Interrupted { phase } => write!(f, "engine {} interrupted", phase),
            Self::InternalFault { message } => write!(f, "deploy failed: {}", message),
        }
    }
}

// ============================================================================
// Settings (aguaform.yaml)
// ============================================================================

/// Process-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Provisioning engine invocation
    #[serde(default)]
    pub engine: EngineSettings,

    /// Parent directory for per-request workspaces (default: system temp dir)
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

/// How to invoke the provisioning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine executable
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Arguments for the init phase
    #[serde(default = "default_init_args")]
    pub init_args: Vec<String>,

    /// Arguments for the apply phase
    #[serde(default = "default_apply_args")]
    pub apply_args: Vec<String>,

    /// Per-invocation timeout in seconds (0 = none)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            init_args: default_init_args(),
            apply_args: default_apply_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then_some(Duration::from_secs(self.timeout_secs))
    }
}

fn default_binary() -> String {
    "terraform".to_string()
}

fn default_init_args() -> Vec<String> {
    vec!["init".into(), "-input=false".into(), "-no-color".into()]
}

fn default_apply_args() -> Vec<String> {
    vec![
        "apply".into(),
        "-auto-approve".into(),
        "-input=false".into(),
        "-no-color".into(),
    ]
}

fn default_timeout_secs() -> u64 {
    600
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: DeploymentRequest = serde_yaml_ng::from_str("name: blog").unwrap();
        assert_eq!(req.provider, "docker");
        assert_eq!(req.image, "nginx:latest");
        assert_eq!(req.internal_port, 80);
        assert_eq!(req.external_port, 8080);
        assert_eq!(req.role, "api");
    }

    #[test]
    fn test_request_port_out_of_range() {
        let yaml = "name: blog\ninternal_port: 70000\n";
        assert!(serde_yaml_ng::from_str::<DeploymentRequest>(yaml).is_err());
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!(Provider::parse("docker"), Some(Provider::ContainerLocal));
        assert_eq!(Provider::parse("container-local"), Some(Provider::ContainerLocal));
        assert_eq!(Provider::parse(" aws "), Some(Provider::Cloud));
        assert_eq!(Provider::parse("cloud"), Some(Provider::Cloud));
        assert_eq!(Provider::parse("gcp"), None);
        assert_eq!(Provider::ContainerLocal.to_string(), "container-local");
    }

    #[test]
    fn test_stack_id_derive() {
        assert_eq!(StackId::derive("blog", Role::Api).as_str(), "blog_api_stack");
        assert_eq!(StackId::derive(" jobs ", Role::Worker).as_str(), "jobs_worker_stack");
    }

    #[test]
    fn test_outcome_kind_and_display() {
        let o = ProvisioningOutcome::InitError {
            stderr: "provider not found".to_string(),
        };
        assert_eq!(o.kind(), "init_error");
        assert!(!o.is_success());
        assert!(o.to_string().contains("provider not found"));

        let o = ProvisioningOutcome::UnknownRole {
            role: "batch".to_string(),
        };
        assert!(o.to_string().contains("api, worker, service"));

        let o = ProvisioningOutcome::TimedOut {
            phase: Phase::Apply,
            seconds: 30,
        };
        assert_eq!(o.to_string(), "engine apply timed out after 30s");
    }

    #[test]
    fn test_engine_settings_defaults() {
        let s: Settings = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(s.engine.binary, "terraform");
        assert_eq!(s.engine.init_args[0], "init");
        assert!(s.engine.apply_args.contains(&"-auto-approve".to_string()));
        assert_eq!(s.engine.timeout(), Some(Duration::from_secs(600)));
        assert!(s.workspace_root.is_none());
    }

    #[test]
    fn test_engine_settings_no_timeout() {
        let s: Settings = serde_yaml_ng::from_str("engine:\n  timeout_secs: 0\n").unwrap();
        assert_eq!(s.engine.timeout(), None);
    }

    #[test]
    fn test_descriptor_type_names() {
        let image = ResourceDescriptor::Image(ImageResource {
            id: "blog_image".to_string(),
            name: "nginx:latest".to_string(),
            keep_locally: false,
        });
        assert_eq!(image.type_name(), "docker_image");
        let json = serde_json::to_string(&image).unwrap();
        assert!(json.contains("\"kind\":\"image\""));
    }
}
