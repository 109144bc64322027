use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::registry::{
    models::{CredentialSet, HelperConfig, Manifest},
    RegistryBackend, RegistryHelperClient,
};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Registry backend that delegates everything to the registry helper
///
/// Repository names are passed through verbatim; the helper maps them to
/// provider-specific names (e.g. OCIR "namespace/name").
pub struct HelperRegistry {
    client: RegistryHelperClient,
}

impl HelperRegistry {
    /// Create a backend talking to `config.service_url` over HTTP
    pub fn new(config: &HelperConfig, timeout: Duration) -> Result<Self, RegistryError> {
        let transport = ReqwestTransport::new(&config.service_url, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), &config.auth_token))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, auth_token: &str) -> Self {
        Self {
            client: RegistryHelperClient::new(transport, auth_token),
        }
    }
}

#[async_trait]
impl RegistryBackend for HelperRegistry {
    async fn ensure_repository_exists(&self, repository: &str) -> Result<bool, RegistryError> {
        self.client.ensure_repository_exists(repository).await
    }

    async fn get_image_manifest(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<Manifest>, RegistryError> {
        if !self.client.ensure_repository_exists(image).await? {
            return Ok(None);
        }
        self.client.get_image(image, tag).await
    }

    async fn get_credentials(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<CredentialSet>, RegistryError> {
        self.client.get_token(image, tag).await
    }

    fn backend_type(&self) -> &str {
        "helper"
    }
}
