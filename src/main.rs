//! argilla-remote CLI - Inspect, pull and delete Argilla feedback datasets.

use anyhow::{Context, Result, bail};
use argilla_remote::client::{ArgillaClient, FeedbackApi, HealthStatus, HttpTransport};
use argilla_remote::{Config, RemoteFeedbackDataset, ResponseStatusFilter};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "argilla-remote")]
#[command(version)]
#[command(about = "Inspect, pull and delete feedback datasets on an Argilla server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show example configuration
    Example,

    /// Validate configuration file
    Validate,

    /// Check that the server is reachable
    Status,

    /// Show a dataset's identity, schema and record count
    Info {
        /// Dataset id
        #[arg(short, long)]
        dataset: Uuid,
    },

    /// Count records, optionally by response status
    Count {
        /// Dataset id
        #[arg(short, long)]
        dataset: Uuid,

        /// Response status filter (draft, pending, submitted, discarded); repeatable
        #[arg(short, long)]
        status: Vec<ResponseStatusFilter>,
    },

    /// Pull records into a local JSONL file
    Pull {
        /// Dataset id
        #[arg(short, long)]
        dataset: Uuid,

        /// Path to output JSONL file (defaults to `output.path`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many records
        #[arg(long)]
        max_records: Option<usize>,
    },

    /// Delete a dataset from the server
    Delete {
        /// Dataset id
        #[arg(short, long)]
        dataset: Uuid,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

async fn open_dataset(config: &Config, id: Uuid) -> Result<RemoteFeedbackDataset> {
    let api_key = config
        .resolve_api_key()
        .context("Failed to resolve API key")?;
    let client = ArgillaClient::connect(&config.server, &api_key)
        .await
        .context("Failed to connect to Argilla")?;
    let api: Arc<dyn FeedbackApi> = Arc::new(client);

    RemoteFeedbackDataset::from_config(api, id, config)
        .await
        .with_context(|| format!("Failed to load dataset {id}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            println!("{}", Config::example());
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            // Try to resolve API key
            config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            info!("Configuration is valid");
            info!("  Server: {}", config.server.api_url);
            info!(
                "  Batches: push {}, delete {}, fetch {}",
                config.batching.push_batch_size,
                config.batching.delete_batch_size,
                config.batching.fetch_page_size
            );
        }

        Commands::Status => {
            let config = load_config(&cli.config)?;
            let api_key = config.resolve_api_key().unwrap_or_default();
            let transport = HttpTransport::new(
                &config.server.api_url,
                &api_key,
                config.server.workspace.as_deref(),
                config.server.timeout_secs,
                config.server.max_retries,
            )?;

            let health = transport.health_check().await;
            println!("Endpoint: {}", health.endpoint);
            println!("Status:   {}", health.status);
            if let Some(latency) = health.latency_ms {
                println!("Latency:  {latency}ms");
            }
            if let Some(error) = &health.error {
                println!("Error:    {error}");
            }
            if health.status != HealthStatus::Healthy {
                bail!("Argilla server at {} is {}", health.endpoint, health.status);
            }
        }

        Commands::Info { dataset } => {
            let config = load_config(&cli.config)?;
            let dataset = open_dataset(&config, dataset).await?;

            println!("{dataset}");
            println!("Records: {}", dataset.len().await?);
            let properties = dataset.metadata_properties().await?;
            if properties.is_empty() {
                println!("Metadata properties: none");
            } else {
                println!("Metadata properties:");
                for property in &properties {
                    println!("  - {} ({})", property.name(), property.id);
                }
            }
        }

        Commands::Count { dataset, status } => {
            let config = load_config(&cli.config)?;
            let dataset = open_dataset(&config, dataset).await?;

            let count = if status.is_empty() {
                dataset.len().await?
            } else {
                dataset.filter_by(status, Vec::new()).await?.len().await?
            };
            println!("{count}");
        }

        Commands::Pull {
            dataset,
            output,
            max_records,
        } => {
            let config = load_config(&cli.config)?;
            let output = output
                .or_else(|| config.output.path.clone())
                .context("No output path given and `output.path` is not set")?;
            let dataset = open_dataset(&config, dataset).await?;

            let local = dataset.pull(max_records).await?;
            let written = local.write_jsonl(&output)?;

            println!("\n=== Pull Complete ===");
            println!("Dataset:  {} ({})", dataset.name(), dataset.id());
            println!("Records:  {written}");
            println!("Output:   {output:?}");
        }

        Commands::Delete { dataset, yes } => {
            if !yes {
                bail!("Refusing to delete dataset {dataset} without --yes");
            }
            let config = load_config(&cli.config)?;
            let dataset = open_dataset(&config, dataset).await?;
            dataset.delete().await?;
            println!("Deleted dataset {} ({})", dataset.name(), dataset.id());
        }
    }

    Ok(())
}
