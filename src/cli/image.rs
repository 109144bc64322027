use anyhow::{Context, Result};
use serde_json::Value;

use registry_reconciler::RegistryBackend;

fn print_json(value: &Option<Value>) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{}", rendered);
    Ok(())
}

/// Resolve `image:tag`, creating the repository if needed, and print the manifest
pub async fn show_manifest(backend: &dyn RegistryBackend, image: &str, tag: &str) -> Result<()> {
    let manifest = backend
        .get_image_manifest(image, tag)
        .await
        .with_context(|| format!("Failed to resolve image {}:{}", image, tag))?;

    if manifest.is_none() {
        tracing::info!("Image {}:{} does not exist yet", image, tag);
    }
    print_json(&manifest)
}

/// Print pull credentials for `image:tag`
pub async fn show_credentials(
    backend: &dyn RegistryBackend,
    image: &str,
    tag: &str,
) -> Result<()> {
    let credentials = backend
        .get_credentials(image, tag)
        .await
        .with_context(|| format!("Failed to get credentials for {}:{}", image, tag))?;

    if credentials.is_none() {
        tracing::info!("No credentials available for {}:{}", image, tag);
    }
    print_json(&credentials)
}

/// Make sure the repository for `image` exists
pub async fn ensure_repository(backend: &dyn RegistryBackend, image: &str) -> Result<()> {
    let existed = backend
        .ensure_repository_exists(image)
        .await
        .with_context(|| format!("Failed to reconcile repository {}", image))?;

    if existed {
        println!("Repository '{}' already exists", image);
    } else {
        println!("✓ Created repository '{}'", image);
    }
    Ok(())
}
