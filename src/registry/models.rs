use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque description of an image tag, passed through from the remote side
pub type Manifest = serde_json::Value;

/// Opaque login fields used by the caller to pull an image
pub type CredentialSet = serde_json::Value;

/// Response of the helper's `/health` endpoint
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HealthInfo {
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Configuration for the helper-native backend
#[derive(Debug, Clone, Deserialize)]
pub struct HelperConfig {
    /// Base URL of the registry helper (e.g., "http://binderhub-container-registry-helper:8080")
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Bearer token sent with every request; empty disables the header
    #[serde(default = "default_auth_token")]
    pub auth_token: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            auth_token: default_auth_token(),
        }
    }
}

/// Protocol used to reach the backing registry in pass-through mode
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryProtocol {
    #[default]
    Https,
    Http,
}

/// Configuration for the pass-through backend
///
/// Repositories are still reconciled through the helper, but tag lookups go
/// straight to the registry's OCI Distribution API.
#[derive(Debug, Clone, Deserialize)]
pub struct PassthroughConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_auth_token")]
    pub auth_token: String,
    /// Registry host used for tag lookups (e.g., "registry.example.com", "localhost:5000")
    pub registry_url: String,
    #[serde(default)]
    pub protocol: RegistryProtocol,
    /// Optional basic-auth credentials for the registry; anonymous if unset
    pub username: Option<String>,
    pub password: Option<String>,
}

pub(crate) const AUTH_TOKEN_ENV_VAR: &str = "BINDERHUB_AUTH_TOKEN";

fn default_service_url() -> String {
    "http://binderhub-container-registry-helper:8080".to_string()
}

fn default_auth_token() -> String {
    std::env::var(AUTH_TOKEN_ENV_VAR).unwrap_or_else(|_| "secret-token".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_info_keeps_extra_fields() {
        let info: HealthInfo =
            serde_json::from_value(json!({"version": "1.2.3", "provider": "amazon"})).unwrap();
        assert_eq!(info.version, "1.2.3");
        assert_eq!(info.extra.get("provider"), Some(&json!("amazon")));
    }

    #[test]
    fn test_passthrough_config_defaults() {
        let config: PassthroughConfig =
            serde_json::from_value(json!({"registry_url": "localhost:5000", "protocol": "http"}))
                .unwrap();
        assert_eq!(config.protocol, RegistryProtocol::Http);
        assert_eq!(
            config.service_url,
            "http://binderhub-container-registry-helper:8080"
        );
        assert!(config.username.is_none());
    }
}
