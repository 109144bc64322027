use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::ConfigError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registry_reconciler::{build_backend, RegistryBackend, RegistryHelperClient, Settings};

mod cli;

use cli::repos::RepoCommands;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the manifest of an image tag (creates the repository if missing)
    #[command(visible_alias = "m")]
    Manifest {
        /// Image name, may include a namespace (e.g., "namespace/name")
        image: String,
        /// Image tag
        #[arg(default_value = "latest")]
        tag: String,
    },
    /// Print pull credentials for an image tag
    Credentials {
        /// Image name
        image: String,
        /// Image tag
        #[arg(default_value = "latest")]
        tag: String,
    },
    /// Create the repository for an image if it does not exist
    EnsureRepo {
        /// Image name
        image: String,
    },
    /// Repository management commands
    #[command(subcommand)]
    #[command(visible_alias = "r")]
    Repos(RepoCommands),
    /// Check that the registry helper is reachable
    Health,
    /// Check configuration for errors and unused options
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let loaded = Settings::new();

    match &cli.command {
        Commands::Manifest { image, tag } => {
            let backend = backend(loaded)?;
            cli::image::show_manifest(backend.as_ref(), image, tag).await?;
        }
        Commands::Credentials { image, tag } => {
            let backend = backend(loaded)?;
            cli::image::show_credentials(backend.as_ref(), image, tag).await?;
        }
        Commands::EnsureRepo { image } => {
            let backend = backend(loaded)?;
            cli::image::ensure_repository(backend.as_ref(), image).await?;
        }
        Commands::Repos(repo_cmd) => {
            let client = helper_client(loaded)?;
            cli::repos::handle_repo_command(&client, repo_cmd).await?;
        }
        Commands::Health => {
            let client = helper_client(loaded)?;
            cli::backend::check_health(&client).await?;
        }
        Commands::CheckConfig => cli::backend::check_config(loaded)?,
    }

    Ok(())
}

fn backend(loaded: Result<Settings, ConfigError>) -> Result<Arc<dyn RegistryBackend>> {
    let settings = loaded.context("Failed to load configuration")?;
    Ok(build_backend(&settings.registry, settings.http.timeout())?)
}

fn helper_client(loaded: Result<Settings, ConfigError>) -> Result<RegistryHelperClient> {
    let settings = loaded.context("Failed to load configuration")?;
    Ok(settings.registry.helper_client(settings.http.timeout())?)
}
