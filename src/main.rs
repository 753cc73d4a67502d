//! Edgestack CLI entrypoint.
//!
//! This is the main entrypoint for the edgestack command-line tool.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use edgestack::assembly::{
    open_store, ArtifactStore, CloudAssembly, LocalArtifactStore, DEFAULT_OUT_DIR,
};
use edgestack::cli::{Cli, Commands, ContextCommands, OutputFormatter};
use edgestack::config::{find_config_file, ConfigHasher, ConfigParser, ConfigValidator, TopologyConfig};
use edgestack::context::{LookupContext, DEFAULT_CONTEXT_FILE};
use edgestack::error::Result;
use edgestack::planner::{DeploymentPlan, DiffEngine};
use edgestack::topology::{AssembledTopology, ResolvedZone, TopologyAssembler};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Attempts for a retryable store operation.
const MAX_ATTEMPTS: u32 = 3;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();
    let context_path = cli.context.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Synth { out } => cmd_synth(config_path, context_path, out, &formatter).await,
        Commands::Plan { detailed } => cmd_plan(config_path, context_path, detailed, &formatter).await,
        Commands::Publish { yes } => cmd_publish(config_path, context_path, yes, &formatter).await,
        Commands::Outputs => cmd_outputs(config_path, context_path, &formatter),
        Commands::Context { command } => cmd_context(config_path, context_path, command, &formatter),
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new edgestack project in: {}", path.display());

    let config_path = path.join("edgestack.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/edgestack.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    let out_entry = format!("{DEFAULT_OUT_DIR}/");
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = [".env", out_entry.as_str()]
            .into_iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
            .collect();
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new().append(true).open(&gitignore_path)?;
            writeln!(file, "\n# edgestack")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!(".env\n{out_entry}\n"))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Edit edgestack.yaml with your account, region and CI provider");
    eprintln!("  2. Run 'edgestack validate' to check your configuration");
    eprintln!("  3. Run 'edgestack synth' to see the declaration tree");
    eprintln!("  4. Run 'edgestack publish' to publish the assembly");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let result = ConfigValidator::new().validate(&config)?;
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    let variant = config.variant()?;
    eprintln!("Configuration summary:");
    eprintln!("  Stack: {}", config.stack_name());
    eprintln!("  Target: {}/{}", config.project.account, config.project.region);
    eprintln!("  Variant: {variant}");
    eprintln!("  Repository: {}", config.repository_name());
    eprintln!("  Cluster: {}", config.cluster_name());

    Ok(())
}

/// Assemble and write the cloud assembly.
async fn cmd_synth(
    config_path: Option<&PathBuf>,
    context_path: Option<&PathBuf>,
    out: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let base_dir = base_dir(&config_file);
    let topology = assemble(&config, &base_dir, context_path)?;

    eprintln!("{}", formatter.format_stack(&topology.stack));

    let out_dir = out.unwrap_or_else(|| {
        base_dir.join(config.artifacts.path.as_deref().unwrap_or(DEFAULT_OUT_DIR))
    });
    let store = LocalArtifactStore::new(out_dir, &config.stack_name());
    let assembly = CloudAssembly::synthesize(&config, topology.stack)?;
    store.save(&assembly).await?;

    eprintln!("{}", formatter.format_manifest(&assembly.manifest));
    eprintln!("{}", formatter.success(&format!("Assembly written to {}", store.location())));
    Ok(())
}

/// Show the deployment plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    context_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let base_dir = base_dir(&config_file);
    let topology = assemble(&config, &base_dir, context_path)?;
    let store = open_store(&config, &base_dir).await?;

    let published = with_retry("load published template", || store.load_template()).await?;
    if published.is_none() {
        debug!("Nothing published yet in {}", store.location());
    }

    let tree_hash = ConfigHasher::new().hash_stack(&topology.stack)?;
    let diff = DiffEngine::new().compute_diff(&topology.stack, published.as_ref())?;
    let plan = DeploymentPlan::from_diff(&topology.stack, &diff, &tree_hash)?;

    eprintln!("{}", formatter.format_plan(&plan));
    if detailed {
        eprintln!("{}", formatter.format_diff(&diff));
    }

    Ok(())
}

/// Publish the assembly to the artifact store.
async fn cmd_publish(
    config_path: Option<&PathBuf>,
    context_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let base_dir = base_dir(&config_file);
    let topology = assemble(&config, &base_dir, context_path)?;
    let store = open_store(&config, &base_dir).await?;

    let assembly = CloudAssembly::synthesize(&config, topology.stack)?;

    if let Some(manifest) = with_retry("load manifest", || store.load_manifest()).await?
        && assembly.same_tree(&manifest)
    {
        eprintln!(
            "{}",
            formatter.success(&format!(
                "Assembly {} already published, nothing to do.",
                manifest.assembly_id
            ))
        );
        return Ok(());
    }

    let published = with_retry("load published template", || store.load_template()).await?;
    let diff = DiffEngine::new().compute_diff(&assembly.template, published.as_ref())?;
    let plan = DeploymentPlan::from_diff(&assembly.template, &diff, &assembly.manifest.tree_hash)?;
    eprintln!("{}", formatter.format_plan(&plan));

    if !auto_approve {
        eprint!("Publish this assembly to {}? [y/N]: ", store.location());
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Publish cancelled.");
            return Ok(());
        }
    }

    let lock = with_retry("acquire publish lock", || store.acquire_lock("")).await?;
    let saved = with_retry("save assembly", || store.save(&assembly)).await;
    if let Err(e) = store.release_lock(&lock.lock_id).await {
        warn!("Failed to release publish lock {}: {e}", lock.lock_id);
    }
    saved?;

    eprintln!("{}", formatter.format_manifest(&assembly.manifest));
    eprintln!(
        "{}",
        formatter.success(&format!("Published to {} ({})", store.location(), store.backend_type()))
    );
    Ok(())
}

/// Show stack outputs.
fn cmd_outputs(
    config_path: Option<&PathBuf>,
    context_path: Option<&PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let topology = assemble(&config, &base_dir(&config_file), context_path)?;

    eprintln!("{}", formatter.format_outputs(&topology.stack));
    Ok(())
}

/// Lookup context commands.
fn cmd_context(
    config_path: Option<&PathBuf>,
    context_path: Option<&PathBuf>,
    command: ContextCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let path = context_path.cloned().unwrap_or_else(|| {
        let base = resolve_config_path(config_path)
            .map(|file| base_dir(&file))
            .unwrap_or_else(|_| PathBuf::from("."));
        base.join(DEFAULT_CONTEXT_FILE)
    });
    let mut context = LookupContext::load(&path)?;

    match command {
        ContextCommands::Show => {
            eprintln!("{}", formatter.format_context(&context));
            return Ok(());
        }
        ContextCommands::Zone { domain, zone_id, absent } => {
            let zone = if absent {
                None
            } else {
                zone_id.map(|zone_id| ResolvedZone {
                    zone_id,
                    name: domain.clone(),
                })
            };
            info!("Recording hosted zone for {domain}");
            context.record_hosted_zone(domain, zone);
        }
        ContextCommands::Zones { region, zones } => {
            info!("Recording {} zone(s) for {region}", zones.len());
            context.record_zones(region, zones);
        }
    }

    context.save(&path)?;
    eprintln!("{}", formatter.success(&format!("Context saved to {}", path.display())));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Directory relative paths in the configuration resolve against.
fn base_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads `.env` and the configuration with environment overrides.
fn load_config(config_path: Option<&PathBuf>) -> Result<(TopologyConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(base_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config, config_file))
}

/// Runs one assembly pass with the lookup context.
fn assemble(
    config: &TopologyConfig,
    base_dir: &Path,
    context_path: Option<&PathBuf>,
) -> Result<AssembledTopology> {
    let path = context_path.map_or_else(|| base_dir.join(DEFAULT_CONTEXT_FILE), Clone::clone);
    let context = LookupContext::load(&path)?;
    TopologyAssembler::new(config).with_context(&context).assemble()
}

/// Retries a store operation while its error is retryable.
async fn with_retry<T, F, Fut>(operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                let delay = e.retry_delay_secs().unwrap_or(1) * u64::from(attempt);
                warn!("{operation} failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}; retrying in {delay}s");
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
