//! CLI subcommands — deploy, synth, validate, init, roles, check, schema, completions.

use crate::core::deploy::DeploymentService;
use crate::core::types::{DeploymentRequest, Provider, ProvisioningOutcome, Settings, StackId};
use crate::core::{parser, registry, synth, topology, types};
use crate::transport::{self, local::ProcessEngine};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "aguaform",
    version,
    about = "Role-based container stacks — synthesize Terraform JSON and provision it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: ./aguaform.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provisioning engine binary (overrides settings)
    #[arg(long, global = true)]
    pub engine: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Deployment parameters given as flags.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Project name
    #[arg(long)]
    pub name: Option<String>,

    /// Provider: container-local (docker) or cloud (aws)
    #[arg(long, default_value = "docker")]
    pub provider: String,

    /// Container image
    #[arg(long, default_value = "nginx:latest")]
    pub image: String,

    /// Container port
    #[arg(long, default_value_t = 80)]
    pub internal_port: u16,

    /// Host port
    #[arg(long, default_value_t = 8080)]
    pub external_port: u16,

    /// Application role: api, worker or service
    #[arg(long, default_value = "api")]
    pub role: String,
}

impl RequestArgs {
    fn into_request(self) -> Result<DeploymentRequest, String> {
        let name = self
            .name
            .ok_or_else(|| "either --name or --file is required".to_string())?;
        Ok(DeploymentRequest {
            name,
            provider: self.provider,
            image: self.image,
            internal_port: self.internal_port,
            external_port: self.external_port,
            role: self.role,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize and provision one or more stacks
    Deploy {
        /// Request file(s); several files deploy concurrently
        #[arg(short, long)]
        file: Vec<PathBuf>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Write the synthesized stack to disk without provisioning
    Synth {
        /// Request file (instead of flags)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        request: RequestArgs,

        /// Output directory (stack lands in OUT/stacks/{name}_{role}_stack)
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Validate a request file without touching the engine
    Validate {
        /// Path to the request file
        #[arg(short, long, default_value = "deploy.yaml")]
        file: PathBuf,
    },

    /// Write a sample deploy.yaml and aguaform.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List registered application roles
    Roles,

    /// Check that the provisioning engine is installed
    Check,

    /// Print the JSON schema of request files
    Schema,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Shared state for command handlers.
pub struct Context {
    pub settings: Settings,
    pub cancel: Arc<AtomicBool>,
}

impl Context {
    fn engine(&self) -> ProcessEngine {
        ProcessEngine::from_settings(&self.settings.engine).with_cancel_flag(self.cancel.clone())
    }
}

/// Load settings, install the interrupt handler and dispatch.
pub fn run(cli: Cli) -> Result<(), String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read current dir: {}", e))?;
    let mut settings = parser::load_settings(cli.config.as_deref(), &cwd)?;
    if let Some(engine) = cli.engine {
        settings.engine.binary = engine;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("cannot install Ctrl-C handler: {}", e);
    }

    dispatch(cli.command, &Context { settings, cancel })
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, ctx: &Context) -> Result<(), String> {
    match cmd {
        Commands::Deploy { file, request } => cmd_deploy(ctx, &file, request),
        Commands::Synth { file, request, out } => cmd_synth(file.as_deref(), request, &out),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Init { path } => cmd_init(&path),
        Commands::Roles => cmd_roles(),
        Commands::Check => cmd_check(ctx),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "aguaform", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Requests from files when given, else from flags.
fn collect_requests(files: &[PathBuf], args: RequestArgs) -> Result<Vec<DeploymentRequest>, String> {
    if files.is_empty() {
        return Ok(vec![args.into_request()?]);
    }
    files.iter().map(|f| parser::parse_request_file(f)).collect()
}

fn cmd_deploy(ctx: &Context, files: &[PathBuf], args: RequestArgs) -> Result<(), String> {
    let requests = collect_requests(files, args)?;
    let engine = ctx.engine();

    match transport::probe(&engine) {
        Ok(version) => log::info!("Using {}", version),
        Err(e) => log::warn!("engine probe failed: {}", e),
    }

    let service = DeploymentService::new(Arc::new(engine))
        .with_workspace_root(ctx.settings.workspace_root.clone());
    run_deploy(&service, requests)
}

fn run_deploy(service: &DeploymentService, requests: Vec<DeploymentRequest>) -> Result<(), String> {
    let outcomes = service.deploy_all(requests.clone());

    let mut failed = 0;
    for (request, outcome) in requests.iter().zip(&outcomes) {
        print_outcome(request, outcome);
        if !outcome.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} deployment(s) failed", failed, outcomes.len()));
    }
    Ok(())
}

fn print_outcome(request: &DeploymentRequest, outcome: &ProvisioningOutcome) {
    let provider = Provider::parse(&request.provider)
        .map(|p| p.to_string())
        .unwrap_or_else(|| request.provider.clone());

    match outcome {
        ProvisioningOutcome::Success {
            applied_output,
            fingerprint,
        } => {
            println!("Deploy succeeded: {}", request.name.trim());
            println!("  Name:          {}", request.name.trim());
            println!("  Provider:      {}", provider);
            println!("  Image:         {}", request.image);
            println!("  Internal port: {}", request.internal_port);
            println!("  External port: {}", request.external_port);
            println!("  Role:          {}", request.role);
            println!("  Fingerprint:   {}", fingerprint);
            println!();
            println!("Engine output:");
            println!("{}", applied_output.trim_end());
        }
        other => {
            eprintln!("Deploy failed: {}", request.name.trim());
            eprintln!("  {}", other);
            if matches!(other, ProvisioningOutcome::ApplyError { .. }) {
                eprintln!(
                    "  NOTE: apply failed after init; some resources may exist and are not rolled back."
                );
            }
        }
    }
}

/// Validate, resolve and build the topology for a request. No engine I/O.
fn resolve_request(request: &DeploymentRequest) -> Result<types::ResourceTopology, String> {
    let errors = parser::validate_request(request);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err("validation failed".to_string());
    }
    let profile = registry::global()
        .resolve(&request.role)
        .map_err(|e| e.to_string())?;
    topology::build(request, profile).map_err(|e| e.to_string())
}

fn cmd_synth(file: Option<&Path>, args: RequestArgs, out: &Path) -> Result<(), String> {
    let request = match file {
        Some(f) => parser::parse_request_file(f)?,
        None => args.into_request()?,
    };
    let topology = resolve_request(&request)?;
    let stack = synth::synthesize(&topology, out).map_err(|e| e.to_string())?;

    println!("Synthesized {}", stack.stack_id);
    println!("  Config:      {}", stack.config_file.display());
    println!("  Resources:   {}", topology.resources().len());
    println!("  Fingerprint: {}", stack.fingerprint);
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let request = parser::parse_request_file(file)?;
    let topology = resolve_request(&request)?;
    println!(
        "OK: {} ({} resources, {})",
        topology.stack_id(),
        topology.resources().len(),
        topology.provider()
    );
    if topology.is_empty() {
        println!("  WARNING: provider '{}' provisions nothing yet", topology.provider());
    }
    Ok(())
}

const SAMPLE_REQUEST: &str = r#"# Deployment request
name: my-app
provider: docker        # container-local (docker) | cloud (aws)
image: nginx:latest
internal_port: 80
external_port: 8080
role: api               # api | worker | service
"#;

const SAMPLE_SETTINGS: &str = r#"engine:
  binary: terraform
  init_args: [init, -input=false, -no-color]
  apply_args: [apply, -auto-approve, -input=false, -no-color]
  timeout_secs: 600
# workspace_root: /var/tmp/aguaform
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let request_path = path.join("deploy.yaml");
    if request_path.exists() {
        return Err(format!("{} already exists", request_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    std::fs::write(&request_path, SAMPLE_REQUEST)
        .map_err(|e| format!("cannot write {}: {}", request_path.display(), e))?;
    println!("Initialized aguaform project at {}", path.display());
    println!("  Created: {}", request_path.display());

    let settings_path = path.join(parser::DEFAULT_SETTINGS_FILE);
    if !settings_path.exists() {
        std::fs::write(&settings_path, SAMPLE_SETTINGS)
            .map_err(|e| format!("cannot write {}: {}", settings_path.display(), e))?;
        println!("  Created: {}", settings_path.display());
    }
    Ok(())
}

fn cmd_roles() -> Result<(), String> {
    for profile in registry::global().profiles() {
        let example = StackId::derive("NAME", profile.role);
        println!(
            "{:<8} {:<18} stack: {}",
            profile.role,
            profile.env_entry(),
            example
        );
    }
    Ok(())
}

fn cmd_check(ctx: &Context) -> Result<(), String> {
    let engine = ctx.engine();
    let version = transport::probe(&engine)?;
    println!("OK: {}", version);
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(DeploymentRequest);
    let json = serde_json::to_string_pretty(&schema).map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}
