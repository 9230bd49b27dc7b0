//! jsbox CLI - run a snippet once, or serve NDJSON requests.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsbox::pipeline::{Pipeline, PipelineConfig};
use jsbox::service::{Service, serve_tcp};
use jsbox::transform::TransformOptions;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "jsbox")]
#[command(about = "Parse, rewrite and run untrusted JavaScript snippets in a sandbox", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Wall-clock limit per execution, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Run the program exactly as parsed, without rewrite rules
    #[arg(long, global = true)]
    no_transform: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a file (or `-` for stdin) and print the response JSON
    Run {
        /// Source file
        file: PathBuf,

        /// Pretty-print the response
        #[arg(long)]
        pretty: bool,
    },

    /// Answer NDJSON requests on stdio, or on TCP with --listen
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:5050
        #[arg(long)]
        listen: Option<String>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { file, pretty } => {
            let source = read_source(&file)?;
            let response = Pipeline::new(config).submit(&source);
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{json}");
        }

        Commands::Serve { listen: None } => {
            let service = Service::new(Pipeline::new(config));
            let stdin = io::stdin();
            let stdout = io::stdout();
            service.handle(BufReader::new(stdin.lock()), BufWriter::new(stdout.lock()))?;
        }

        Commands::Serve {
            listen: Some(address),
        } => {
            let service = Service::new(Pipeline::new(config));
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind(&address)
                    .await
                    .with_context(|| format!("Failed to bind {address}"))?;
                serve_tcp(service, listener).await?;
                anyhow::Ok(())
            })?;
        }

        Commands::InitConfig { path } => {
            config.save(&path)?;
            println!("Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}

/// File config (or defaults) with command-line flags applied on top.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(timeout) = cli.timeout_ms {
        config.limits.timeout = Duration::from_millis(timeout);
    }
    if cli.no_transform {
        config.transform = TransformOptions::disabled();
    }
    config.validate()?;
    Ok(config)
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
