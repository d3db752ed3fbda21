//! YAML parsing and validation for deployment requests and settings.
//!
//! Request validation covers input shape only:
//! - name non-empty after trimming, and usable as an engine resource label
//! - image present for container-local stacks
//! - ports non-zero
//!
//! Role and provider resolution are reported separately by the registry.

use super::types::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "aguaform.yaml";

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Join validation errors into one message.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static label regex"))
}

/// Parse a request file from disk.
pub fn parse_request_file(path: &Path) -> Result<DeploymentRequest, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_request(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Parse a request from a YAML string.
pub fn parse_request(yaml: &str) -> Result<DeploymentRequest, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a request. Returns a list of errors (empty = valid).
pub fn validate_request(request: &DeploymentRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let name = request.name.trim();
    if name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    } else if !label_pattern().is_match(name) {
        errors.push(ValidationError {
            message: format!(
                "name '{}' must start with a letter or underscore and contain only letters, digits, '_' or '-'",
                name
            ),
        });
    }

    if Provider::parse(&request.provider) == Some(Provider::ContainerLocal)
        && request.image.trim().is_empty()
    {
        errors.push(ValidationError {
            message: "image must not be empty for container-local stacks".to_string(),
        });
    }

    if request.internal_port == 0 {
        errors.push(ValidationError {
            message: "internal_port must be between 1 and 65535".to_string(),
        });
    }
    if request.external_port == 0 {
        errors.push(ValidationError {
            message: "external_port must be between 1 and 65535".to_string(),
        });
    }

    errors
}

/// Parse a settings file from disk.
pub fn parse_settings_file(path: &Path) -> Result<Settings, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_settings(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Parse settings from a YAML string.
pub fn parse_settings(yaml: &str) -> Result<Settings, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate settings. Returns a list of errors (empty = valid).
pub fn validate_settings(settings: &Settings) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if settings.engine.binary.trim().is_empty() {
        errors.push(ValidationError {
            message: "engine.binary must not be empty".to_string(),
        });
    }
    if settings.engine.init_args.is_empty() {
        errors.push(ValidationError {
            message: "engine.init_args must not be empty".to_string(),
        });
    }
    if settings.engine.apply_args.is_empty() {
        errors.push(ValidationError {
            message: "engine.apply_args must not be empty".to_string(),
        });
    }
    errors
}

/// Load settings: an explicit path must exist; otherwise `aguaform.yaml` in
/// `base_dir` is used when present, else built-in defaults.
pub fn load_settings(explicit: Option<&Path>, base_dir: &Path) -> Result<Settings, String> {
    let settings = match explicit {
        Some(path) => parse_settings_file(path)?,
        None => {
            let default_path = base_dir.join(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                log::debug!("Loading settings from {}", default_path.display());
                parse_settings_file(&default_path)?
            } else {
                log::debug!("No {} found, using defaults", DEFAULT_SETTINGS_FILE);
                Settings::default()
            }
        }
    };

    let errors = validate_settings(&settings);
    if errors.is_empty() {
        Ok(settings)
    } else {
        Err(format!("invalid settings: {}", join_errors(&errors)))
    }
}
