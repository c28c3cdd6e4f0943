use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeexec_cli::{
    exit_code, render_error, ExecutionClient, LocalClient, RemoteClient, EXIT_INFRA_ERROR,
};
use codeexec_core::{ConfigLoader, ExecutionResult};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[clap(name = "codeexec", author, version, about = "Run source code in a disposable sandbox")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, help = "Path to a YAML configuration file (local mode)")]
    config: Option<PathBuf>,

    #[clap(long, help = "Send the code to a codeexec server instead of the local Docker daemon")]
    server: Option<String>,

    #[clap(long, env = "CODEEXEC_API_KEY", hide_env_values = true, help = "API key for --server")]
    api_key: Option<String>,

    #[clap(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a file (or stdin with `-`) and print its output
    Run {
        #[clap(long, short)]
        language: String,

        #[clap(long, short, help = "Timeout in milliseconds")]
        timeout: Option<u64>,

        file: PathBuf,
    },
    /// Syntax check only, without running the code
    Check {
        #[clap(long, short)]
        language: String,

        file: PathBuf,
    },
    /// List supported languages
    Languages,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            EXIT_INFRA_ERROR
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            ref language,
            timeout,
            ref file,
        } => {
            let code = read_source(file).await?;
            let client = client(&cli).await?;
            let result = client
                .execute(&code, language, timeout.map(Duration::from_millis))
                .await?;
            Ok(report(&result))
        }
        Commands::Check {
            ref language,
            ref file,
        } => {
            if cli.server.is_some() {
                anyhow::bail!("check runs against the local Docker daemon only");
            }
            let code = read_source(file).await?;
            let config = ConfigLoader::load(cli.config.as_deref()).await?;
            let result = LocalClient::docker(&config)?.check(&code, language).await;
            if result.is_success() {
                println!("ok");
            }
            Ok(report(&result))
        }
        Commands::Languages => {
            let client = client(&cli).await?;
            for language in client.languages().await? {
                println!(
                    "{:<12} {:<24} {}",
                    language.id,
                    language.aliases.join(","),
                    language.image
                );
            }
            Ok(0)
        }
    }
}

async fn client(cli: &Cli) -> Result<Box<dyn ExecutionClient>> {
    match &cli.server {
        Some(url) => Ok(Box::new(RemoteClient::new(url.clone(), cli.api_key.clone()))),
        None => {
            let config = ConfigLoader::load(cli.config.as_deref()).await?;
            Ok(Box::new(LocalClient::docker(&config)?))
        }
    }
}

async fn read_source(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut code = String::new();
        tokio::io::stdin()
            .read_to_string(&mut code)
            .await
            .context("failed to read source from stdin")?;
        Ok(code)
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))
    }
}

fn report(result: &ExecutionResult) -> i32 {
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if let Some(line) = render_error(result) {
        eprintln!("{}", line);
    }
    exit_code(result)
}
