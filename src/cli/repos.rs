use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};
use serde_json::Value;

use registry_reconciler::RegistryHelperClient;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum RepoCommands {
    /// List repositories known to the registry helper
    #[command(visible_alias = "ls")]
    List,
    /// Delete a repository and all of its images
    #[command(visible_alias = "rm")]
    Delete {
        /// Repository name (e.g., "namespace/name")
        image: String,
    },
}

/// First string field present in a repository record
///
/// Providers describe repositories differently (ECR uses `repositoryName`,
/// OCIR uses `displayName`).
fn field<'a>(repo: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|key| repo.get(*key).and_then(Value::as_str))
        .unwrap_or("-")
}

pub async fn handle_repo_command(client: &RegistryHelperClient, cmd: &RepoCommands) -> Result<()> {
    match cmd {
        RepoCommands::List => list_repositories(client).await,
        RepoCommands::Delete { image } => {
            client
                .delete_repository(image)
                .await
                .with_context(|| format!("Failed to delete repository {}", image))?;
            println!("✓ Deleted repository '{}'", image);
            Ok(())
        }
    }
}

async fn list_repositories(client: &RegistryHelperClient) -> Result<()> {
    let repos = client
        .list_repositories()
        .await
        .context("Failed to list repositories")?;

    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("NAME").add_attribute(Attribute::Bold),
            Cell::new("ID / URI").add_attribute(Attribute::Bold),
        ]);

    for repo in &repos {
        table.add_row(vec![
            Cell::new(field(repo, &["repositoryName", "displayName", "name"])),
            Cell::new(field(repo, &["repositoryUri", "id", "repositoryArn"])),
        ]);
    }

    println!("{}", table);
    Ok(())
}
