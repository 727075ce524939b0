use anyhow::{Context, Result};
use clap::Parser;
use kiln_config::{ConfigLoader, KilnConfig};
use kiln_core::{Classpath, LogLevel};
use kiln_execution::{
    worker_main, ActionRegistry, ActionSpec, ModuleProbe, ProbeModules, WorkerProcessBuilder,
    WorkerProcessFactory, EXIT_BOOTSTRAP_FAILED,
};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use tracing::{debug, info};

mod cli;

use cli::{Cli, Commands, ConfigCommands, WorkerArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle worker mode first; the worker sets up its own logging from the descriptor
    if cli.worker {
        return run_worker_process(cli.classpath.as_deref()).await;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run as worker process
async fn run_worker_process(classpath: Option<&str>) -> ExitCode {
    let system_classpath = classpath.map(Classpath::parse).unwrap_or_default();
    let registry = ActionRegistry::with_builtins();

    match worker_main(system_classpath, tokio::io::stdin(), &registry).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Worker failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_ref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.as_str().to_string());
    kiln_logging::init_simple_tracing(&level)?;

    match cli.command {
        Some(Commands::Run {
            action,
            params,
            input,
            worker,
        }) => {
            let params = match params {
                Some(json) => serde_json::from_str(&json).context("Invalid --params JSON")?,
                None => JsonValue::Null,
            };
            let inputs = input
                .iter()
                .map(|json| serde_json::from_str::<JsonValue>(json))
                .collect::<Result<Vec<_>, _>>()
                .context("Invalid --input JSON")?;
            run_action(&config, ActionSpec::new(action, params), &worker, &inputs).await
        }
        Some(Commands::Probe { modules, worker }) => probe_modules(&config, modules, &worker).await,
        Some(Commands::Actions) => {
            for kind in ActionRegistry::with_builtins().kinds() {
                println!("{}", kind);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config { config_cmd }) => {
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(&config_file)?,
                ConfigCommands::Generate { output, force } => handle_config_generate(&output, force)?,
                ConfigCommands::Show {
                    config_file,
                    format,
                } => handle_config_show(config_file.as_ref(), &format)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load configuration from file or environment
fn load_config(config_path: Option<&PathBuf>) -> Result<KilnConfig> {
    let loader = ConfigLoader::new();
    let config = loader
        .load(config_path)
        .with_context(|| match config_path {
            Some(path) => format!("Failed to load configuration from {:?}", path),
            None => "Failed to load configuration from environment".to_string(),
        })?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

fn configure(builder: &mut WorkerProcessBuilder, args: &WorkerArgs) -> Result<()> {
    if let Some(isolation) = args.isolation {
        builder.isolation(isolation);
    }
    if !args.application_classpath.is_empty() {
        builder.application_classpath(Classpath::from_entries(
            args.application_classpath.iter().cloned(),
        ));
    }
    for module in &args.shared_modules {
        kiln_core::validate_module_name(module)
            .with_context(|| format!("Invalid --share value '{}'", module))?;
        builder.share_module(module.clone());
    }
    if let Some(level) = &args.worker_log_level {
        builder.log_level(level.parse::<LogLevel>()?);
    }
    Ok(())
}

/// Spawn a worker for `action`, send it `inputs`, and print every payload
/// it sends back on its own line
async fn run_action(
    config: &KilnConfig,
    action: ActionSpec,
    args: &WorkerArgs,
    inputs: &[JsonValue],
) -> Result<ExitCode> {
    let factory = WorkerProcessFactory::from_config(config)?;
    let mut builder = factory.new_process();
    builder.worker(action);
    configure(&mut builder, args)?;

    let mut process = builder.build().await?;
    let connection = process.wait_for_connection().await?;

    for value in inputs {
        connection.dispatch(value).await?;
    }
    // Actions reading from the build process run until this end of stream.
    // A worker that has already finished may have closed its socket.
    if let Err(e) = connection.stop().await {
        debug!("{} closed before the end of stream was sent: {}", process.display_name(), e);
    }

    while let Some(payload) = connection.receive_payload::<JsonValue>().await? {
        println!("{}", payload);
    }

    let status = process.wait_for_stop().await?;
    info!("{} finished: {}", process.display_name(), status);
    Ok(exit_code_of(status))
}

/// Spawn a worker that resolves `modules` and print one line per module
async fn probe_modules(config: &KilnConfig, modules: Vec<String>, args: &WorkerArgs) -> Result<ExitCode> {
    let factory = WorkerProcessFactory::from_config(config)?;
    let mut builder = factory.new_process();
    builder.worker(ActionSpec::from_action(&ProbeModules::new(modules))?);
    configure(&mut builder, args)?;

    let mut process = builder.build().await?;
    let connection = process.wait_for_connection().await?;

    while let Some(probe) = connection.receive_payload::<ModuleProbe>().await? {
        println!(
            "{}\tapplication={}\timplementation={}\tidentical={}",
            probe.module,
            probe.application.as_deref().unwrap_or("-"),
            probe.implementation.as_deref().unwrap_or("-"),
            probe.identical
        );
    }

    let status = process.wait_for_stop().await?;
    Ok(exit_code_of(status))
}

fn exit_code_of(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_BOOTSTRAP_FAILED)),
        None => ExitCode::FAILURE,
    }
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_) => {
            println!("Configuration file is valid");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Configuration validation failed: {}", e)),
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, KilnConfig::generate_sample()).context("Failed to write configuration file")?;

    println!("Configuration generated at: {:?}", output);
    println!("Validate with: kiln config validate --config-file {:?}", output);
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config_file: Option<&PathBuf>, format: &str) -> Result<()> {
    let config = load_config(config_file)?;

    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml_output = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            println!("{}", yaml_output);
        }
        "json" => {
            let json_output =
                serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
            println!("{}", json_output);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported format: {}. Use 'yaml' or 'json'",
                format
            ));
        }
    }

    Ok(())
}
