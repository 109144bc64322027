use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oci_distribution::{
    client::{ClientConfig, ClientProtocol},
    errors::{OciDistributionError, OciEnvelope, OciErrorCode},
    secrets::RegistryAuth,
    Client, Reference,
};
use serde_json::json;

use crate::error::RegistryError;
use crate::registry::{
    models::{CredentialSet, Manifest, PassthroughConfig, RegistryProtocol},
    RegistryBackend, RegistryHelperClient,
};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Registry backend for helpers that only manage repositories
///
/// Repository reconciliation and credentials go through the registry helper,
/// while tag lookups use the registry's OCI Distribution API directly.
pub struct PassthroughRegistry {
    helper: RegistryHelperClient,
    oci: Client,
    registry_host: String,
    auth: RegistryAuth,
    timeout: Duration,
}

impl PassthroughRegistry {
    pub fn new(config: &PassthroughConfig, timeout: Duration) -> Result<Self, RegistryError> {
        let transport = ReqwestTransport::new(&config.service_url, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), config, timeout))
    }

    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        config: &PassthroughConfig,
        timeout: Duration,
    ) -> Self {
        let protocol = match config.protocol {
            RegistryProtocol::Https => ClientProtocol::Https,
            RegistryProtocol::Http => ClientProtocol::Http,
        };
        let oci = Client::new(ClientConfig {
            protocol,
            ..Default::default()
        });

        let auth = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                RegistryAuth::Basic(username.clone(), password.clone())
            }
            _ => RegistryAuth::Anonymous,
        };

        Self {
            helper: RegistryHelperClient::new(transport, &config.auth_token),
            oci,
            registry_host: registry_host(&config.registry_url),
            auth,
            timeout,
        }
    }

    fn reference(&self, image: &str, tag: &str) -> Result<Reference, RegistryError> {
        let image_ref = format!("{}/{}:{}", self.registry_host, image, tag);
        Reference::try_from(image_ref.as_str())
            .map_err(|e| RegistryError::InvalidReference(format!("{}: {}", image_ref, e)))
    }

    /// Fetch the tag's manifest from the registry, `None` if it does not exist
    async fn fetch_manifest(&self, image: &str, tag: &str) -> Result<Option<Manifest>, RegistryError> {
        let reference = self.reference(image, tag)?;
        let path = format!("/v2/{}/manifests/{}", image, tag);
        tracing::debug!("Checking whether image exists in registry: {}", reference);

        let pulled = tokio::time::timeout(
            self.timeout,
            self.oci.pull_manifest(&reference, &self.auth),
        )
        .await
        .map_err(|_| RegistryError::Transport {
            method: "GET".to_string(),
            path: path.clone(),
            message: "request timed out".to_string(),
        })?;

        match pulled {
            Ok((manifest, digest)) => {
                let manifest =
                    serde_json::to_value(&manifest).map_err(|source| RegistryError::Decode {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Some(json!({
                    "digest": digest,
                    "manifest": manifest,
                })))
            }
            Err(err) => classify_pull_error(err, &path),
        }
    }
}

/// Strip protocol and trailing path from a registry URL
fn registry_host(registry_url: &str) -> String {
    registry_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(registry_url)
        .to_string()
}

/// Turn a failed manifest pull into `None` for an absent tag, or an error
///
/// Only the registry's own "unknown manifest/name" codes mean the tag is
/// absent. Any other failure is fatal and keeps its HTTP status when the
/// client reported one.
fn classify_pull_error(
    err: OciDistributionError,
    path: &str,
) -> Result<Option<Manifest>, RegistryError> {
    let status = match &err {
        OciDistributionError::ImageManifestNotFoundError(_) => return Ok(None),
        OciDistributionError::RegistryError { envelope, .. } => {
            if envelope.errors.iter().any(|e| {
                matches!(e.code, OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown)
            }) {
                return Ok(None);
            }
            envelope_status(envelope)
        }
        OciDistributionError::ServerError { code, .. } => Some(*code),
        OciDistributionError::UnauthorizedError { .. } => Some(401),
        _ => None,
    };

    Err(match status {
        Some(status) => RegistryError::Status {
            method: "GET".to_string(),
            path: path.to_string(),
            status,
            body: err.to_string(),
        },
        None => RegistryError::Transport {
            method: "GET".to_string(),
            path: path.to_string(),
            message: err.to_string(),
        },
    })
}

/// Status implied by a 4xx error envelope; the client drops the real one
fn envelope_status(envelope: &OciEnvelope) -> Option<u16> {
    envelope.errors.iter().find_map(|e| match e.code {
        OciErrorCode::Unauthorized => Some(401),
        OciErrorCode::Denied => Some(403),
        _ => None,
    })
}

#[async_trait]
impl RegistryBackend for PassthroughRegistry {
    async fn ensure_repository_exists(&self, repository: &str) -> Result<bool, RegistryError> {
        self.helper.ensure_repository_exists(repository).await
    }

    async fn get_image_manifest(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<Manifest>, RegistryError> {
        if !self.helper.ensure_repository_exists(image).await? {
            return Ok(None);
        }
        self.fetch_manifest(image, tag).await
    }

    async fn get_credentials(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<CredentialSet>, RegistryError> {
        self.helper.get_token(image, tag).await
    }

    fn backend_type(&self) -> &str {
        "passthrough"
    }
}
