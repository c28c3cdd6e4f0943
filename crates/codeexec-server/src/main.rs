//! HTTP server for sandboxed code execution
//!
//! Loads the service configuration, connects to the local Docker daemon and
//! serves the execution API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeexec_core::{ConfigLoader, DockerSandbox, ExecutionEngine, SandboxRuntime, ServiceConfig};
use codeexec_server::{shutdown_signal, ApiServer, ServerConfig};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "codeexec server - run untrusted code in disposable containers")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Path to a YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, help = "Address to listen on, overrides server.bind_addr")]
    bind_addr: Option<String>,

    #[clap(long, short, help = "Log level, overrides logging.level")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default command)
    Run,
    /// Report whether the runtime is reachable and every language image is present
    CheckImages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // env_logger passes everything through, the global max level does the filtering
    // so it can follow the configuration once that is loaded.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .init();
    log::set_max_level(log_level(cli.log_level.as_deref(), None));

    let config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    log::set_max_level(log_level(
        cli.log_level.as_deref(),
        Some(&config.logging.level),
    ));

    if cli.config.is_none() {
        log::info!("No configuration file given, using defaults and environment");
    }

    let runtime: Arc<dyn SandboxRuntime> =
        Arc::new(DockerSandbox::connect().context("failed to create Docker client")?);

    match cli.command {
        Some(Commands::CheckImages) => check_images(&config, runtime).await,
        Some(Commands::Run) | None => run_server(config, runtime, cli.bind_addr).await,
    }
}

/// `--log-level` wins over `logging.level`; anything unparsable means info.
fn log_level(cli: Option<&str>, configured: Option<&str>) -> LevelFilter {
    cli.or(configured)
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

async fn run_server(
    config: ServiceConfig,
    runtime: Arc<dyn SandboxRuntime>,
    bind_addr: Option<String>,
) -> Result<()> {
    match runtime.ping().await {
        Ok(()) => warn_missing_images(&config, runtime.as_ref()).await,
        Err(e) => log::warn!(
            "Docker daemon did not answer a ping, executions will fail until it does: {}",
            e
        ),
    }

    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(config.language_registry()),
        runtime,
        config.execution.engine_settings(),
    ));
    let names: Vec<&str> = engine
        .registry()
        .languages()
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    log::info!("Languages: {}", names.join(", "));

    let mut server_config = ServerConfig::from_service_config(&config)?;
    if let Some(addr) = bind_addr {
        server_config = server_config.with_bind_addr_str(&addr)?;
    }

    let server = ApiServer::with_config(engine, server_config);
    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// Images are never pulled per request, so a missing one fails every run of that language.
async fn warn_missing_images(config: &ServiceConfig, runtime: &dyn SandboxRuntime) {
    for image in config.language_registry().images() {
        match runtime.image_available(image).await {
            Ok(true) => log::debug!("Image {} is present", image),
            Ok(false) => log::warn!("Image {} is not present locally, pull it before use", image),
            Err(e) => log::warn!("Could not inspect image {}: {}", image, e),
        }
    }
}

async fn check_images(config: &ServiceConfig, runtime: Arc<dyn SandboxRuntime>) -> Result<()> {
    runtime
        .ping()
        .await
        .context("Docker daemon is not reachable")?;
    println!("runtime: {} reachable", runtime.name());

    let registry = config.language_registry();
    let mut missing = Vec::new();
    for image in registry.images() {
        let present = runtime
            .image_available(image)
            .await
            .with_context(|| format!("failed to inspect image {}", image))?;
        println!("{:<40} {}", image, if present { "present" } else { "MISSING" });
        if !present {
            missing.push(image.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} image(s) missing, pull them with: docker pull {}",
            missing.len(),
            missing.join(" && docker pull ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_resolution() {
        assert_eq!(log_level(None, None), LevelFilter::Info);
        assert_eq!(log_level(None, Some("debug")), LevelFilter::Debug);
        assert_eq!(log_level(Some("warn"), Some("debug")), LevelFilter::Warn);
        assert_eq!(log_level(Some("loud"), Some("debug")), LevelFilter::Info);
    }

    #[test]
    fn test_cli_parses_run_by_default() {
        let cli = Cli::parse_from(["codeexec-server", "--log-level", "debug"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
