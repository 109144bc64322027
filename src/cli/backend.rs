use anyhow::{Context, Result};
use config::ConfigError;
use tracing::{info, warn};

use registry_reconciler::{RegistryHelperClient, Settings};

/// Report the outcome of loading the configuration
pub fn check_config(loaded: Result<Settings, ConfigError>) -> Result<()> {
    println!("Checking registry configuration...");
    match loaded {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!("  service_url: {}", settings.registry.service_url());
            println!("  timeout:     {}s", settings.http.timeout_secs);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Query the helper's health endpoint
pub async fn check_health(client: &RegistryHelperClient) -> Result<()> {
    let health = client
        .health()
        .await
        .context("Failed to reach registry helper")?;

    println!("✓ Registry helper is healthy");
    println!(
        "  version: {}",
        if health.version.is_empty() {
            "(unknown)"
        } else {
            &health.version
        }
    );
    for (key, value) in &health.extra {
        println!("  {}: {}", key, value);
    }

    if health.version.is_empty() {
        warn!("Registry helper did not report a version");
    } else {
        info!(
            client_version = env!("CARGO_PKG_VERSION"),
            helper_version = %health.version,
            "Registry helper version"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_config_reports_loaded_settings() {
        assert!(check_config(Ok(Settings::default())).is_ok());
    }
}
