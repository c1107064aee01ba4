//! Terraform Provider for Vultr
//!
//! Manages Vultr block storage and firewall rules for a host that speaks
//! line-delimited JSON over stdin/stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use vultr_provider::config::ProviderConfig;
use vultr_provider::server::{Connector, Server};
use vultr_provider::{VultrClient, VultrProvider};

/// Vultr provider plugin
#[derive(Parser)]
#[command(name = "terraform-provider-vultr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vultr API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Vultr API endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider schema as JSON
    Schema,

    /// Serve host requests on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProviderConfig::load(path)?,
        None => ProviderConfig::default(),
    }
    .with_env()
    .with_overrides(cli.api_key, cli.base_url);

    match cli.command {
        Commands::Schema => {
            let provider: VultrProvider<VultrClient> = VultrProvider::new();
            println!("{}", serde_json::to_string_pretty(&provider.schema())?);
        }
        Commands::Serve => {
            info!("Starting Vultr provider");

            let connect: Connector<VultrClient> =
                Box::new(|config: &ProviderConfig| Ok(Arc::new(VultrClient::new(config)?)));
            let server = Server::new(VultrProvider::new(), config, connect);

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            server.serve(stdin, tokio::io::stdout()).await?;

            info!("Provider stopped");
        }
    }

    Ok(())
}
