use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, ValueKind};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;
use std::env;
use std::path::Path;

use crate::error::RegistryError;
use crate::registry::models::{HelperConfig, PassthroughConfig};
use crate::registry::RegistryHelperClient;
use crate::transport::ReqwestTransport;

const ENV_PREFIX: &str = "REGISTRY_RECONCILER";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub http: HttpSettings,
}

/// Registry backend selection
///
/// ```yaml
/// registry:
///   type: helper
///   service_url: "http://binderhub-container-registry-helper:8080"
///   auth_token: "${BINDERHUB_AUTH_TOKEN}"
/// ```
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistrySettings {
    /// Registry helper answers repository, image and token lookups
    Helper(HelperConfig),
    /// Registry helper manages repositories, tags are checked on the registry
    Passthrough(PassthroughConfig),
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings::Helper(HelperConfig::default())
    }
}

impl RegistrySettings {
    pub fn service_url(&self) -> &str {
        match self {
            RegistrySettings::Helper(config) => &config.service_url,
            RegistrySettings::Passthrough(config) => &config.service_url,
        }
    }

    pub fn auth_token(&self) -> &str {
        match self {
            RegistrySettings::Helper(config) => &config.auth_token,
            RegistrySettings::Passthrough(config) => &config.auth_token,
        }
    }

    /// Client for the registry helper both backend variants talk to
    pub fn helper_client(
        &self,
        timeout: std::time::Duration,
    ) -> Result<RegistryHelperClient, RegistryError> {
        let transport = ReqwestTransport::new(self.service_url(), timeout)?;
        Ok(RegistryHelperClient::new(
            std::sync::Arc::new(transport),
            self.auth_token(),
        ))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    /// Timeout in seconds for each request to the helper or registry (default: 20)
    #[serde(
        default = "default_timeout_secs",
        deserialize_with = "deserialize_u64_lenient"
    )]
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    20
}

/// Accept both `20` and `"20"`; environment overrides always arrive as strings
fn deserialize_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Extensions tried for each settings layer, first match wins
const LAYER_EXTENSIONS: [&str; 3] = ["toml", "yaml", "yml"];

/// `${NAME}` or `${NAME:-fallback}` inside a string setting
const PLACEHOLDER: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Expand placeholders from the environment
///
/// An unset variable without a fallback expands to nothing, so
/// `auth_token: "${BINDERHUB_AUTH_TOKEN}"` yields an empty token when the
/// variable is missing.
fn expand_placeholders(pattern: &Regex, raw: &str) -> String {
    pattern
        .replace_all(raw, |caps: &Captures| {
            env::var(&caps[1])
                .unwrap_or_else(|_| caps.get(2).map_or_else(String::new, |m| m.as_str().into()))
        })
        .into_owned()
}

/// Rebuild the merged settings tree as JSON, expanding string leaves
fn to_json(pattern: &Regex, value: config::Value) -> Json {
    match value.kind {
        ValueKind::Nil => Json::Null,
        ValueKind::Boolean(b) => Json::from(b),
        ValueKind::I64(n) => Json::from(n),
        ValueKind::I128(n) => i64::try_from(n).map_or(Json::Null, Json::from),
        ValueKind::U64(n) => Json::from(n),
        ValueKind::U128(n) => u64::try_from(n).map_or(Json::Null, Json::from),
        ValueKind::Float(f) => Json::from(f),
        ValueKind::String(raw) => Json::String(expand_placeholders(pattern, &raw)),
        ValueKind::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, to_json(pattern, value)))
                .collect(),
        ),
        ValueKind::Array(items) => {
            Json::Array(items.into_iter().map(|v| to_json(pattern, v)).collect())
        }
    }
}

/// Stack `{config_dir}/{layer}.{toml,yaml,yml}` onto `builder` when present
fn add_layer(
    builder: ConfigBuilder<DefaultState>,
    config_dir: &Path,
    layer: &str,
) -> ConfigBuilder<DefaultState> {
    let found = LAYER_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("{}.{}", layer, ext)))
        .find(|path| path.exists());

    match found {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading settings layer");
            builder.add_source(config::File::from(path))
        }
        None => {
            tracing::debug!(layer, dir = %config_dir.display(), "No settings file for layer");
            builder
        }
    }
}

impl Settings {
    /// Load settings from the directory and run mode given by the environment
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode =
            env::var(format!("{}_RUN_MODE", ENV_PREFIX)).unwrap_or_else(|_| "development".into());
        let config_dir =
            env::var(format!("{}_CONFIG_DIR", ENV_PREFIX)).unwrap_or_else(|_| "config".into());
        Self::load(&config_dir, &run_mode)
    }

    /// Load settings from `config_dir`
    ///
    /// Sources, later ones overriding earlier ones: `default.*`, `{run_mode}.*`,
    /// `local.*`, then `REGISTRY_RECONCILER__SECTION__KEY` environment variables.
    /// All files are optional.
    pub fn load(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(config_dir);
        let builder = ["default", run_mode, "local"]
            .into_iter()
            .fold(Config::builder(), |builder, layer| add_layer(builder, dir, layer));

        let merged = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()?;

        let pattern = Regex::new(PLACEHOLDER)
            .map_err(|e| ConfigError::Message(format!("Bad placeholder pattern: {}", e)))?;
        let root = merged
            .cache
            .into_table()
            .map_err(|e| ConfigError::Message(format!("Settings root is not a table: {}", e)))?;
        let tree = Json::Object(
            root.into_iter()
                .map(|(key, value)| (key, to_json(&pattern, value)))
                .collect(),
        );

        let mut unknown = Vec::new();
        let settings: Settings = serde_ignored::deserialize(tree, |path| {
            unknown.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for key in &unknown {
            tracing::warn!(key = %key, "Unknown configuration key");
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let service_url = self.registry.service_url();
        url::Url::parse(service_url).map_err(|e| {
            ConfigError::Message(format!(
                "Invalid registry service_url '{}': {}",
                service_url, e
            ))
        })?;

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
