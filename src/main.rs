//! `live-config` command line tool.
//!
//! Resolves path templates, shows documents in canonical form and watches
//! a directory of documents, logging every reload and failure.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use live_config::node::parse_document;
use live_config::observability::{logging, metrics};
use live_config::settings::{load_settings, StoreSettings};
use live_config::{resolve, ConfigStore, Style, Substitution, Untyped};

#[derive(Parser)]
#[command(name = "live-config")]
#[command(about = "Inspect and watch live configuration documents", long_about = None)]
struct Cli {
    /// Store settings (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a path template
    Resolve {
        template: String,

        /// Substitution as name=value; may be repeated
        #[arg(short, long = "set", value_parser = parse_substitution)]
        set: Vec<Substitution>,
    },
    /// Print a document in canonical form
    Show {
        file: PathBuf,

        /// Single-line flow style
        #[arg(long)]
        flow: bool,

        /// Print the content as JSON instead
        #[arg(long, conflicts_with = "flow")]
        json: bool,
    },
    /// Load every document in a directory and follow changes until Ctrl-C
    Watch { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => StoreSettings::default(),
    };
    logging::init_logging(&settings.logging);

    match cli.command {
        Commands::Resolve { template, set } => {
            let path = resolve(&template, &set)?;
            println!("{}", path.display());
        }
        Commands::Show { file, flow, json } => {
            let text = std::fs::read_to_string(&file)?;
            let style = if flow { Style::Flow } else { Style::Block };
            let tree = parse_document(&text, style).map_err(|e| format!("{}: {}", file.display(), e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree.root().to_value())?);
            } else {
                print!("{}", tree.emit());
            }
        }
        Commands::Watch { dir } => watch(settings, dir).await?,
    }

    Ok(())
}

async fn watch(settings: StoreSettings, dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = ConfigStore::new(settings);
    let mut failures = store.failures();
    let documents = store.load_directory::<Untyped>(&dir, Vec::new())?;

    tracing::info!(
        directory = %dir.display(),
        documents = documents.len(),
        live = store.watcher().is_live(),
        "Watching for changes"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            failure = failures.recv() => match failure {
                Ok(failure) => eprintln!(
                    "{} failure{}: {}",
                    failure.kind.as_str(),
                    failure.path.map(|p| format!(" ({})", p.display())).unwrap_or_default(),
                    failure.message
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Failure channel lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    store.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_substitution(pair: &str) -> Result<Substitution, String> {
    Substitution::parse(pair).ok_or_else(|| format!("expected name=value, got `{}`", pair))
}
