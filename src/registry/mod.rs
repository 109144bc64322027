pub mod client;
pub mod models;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

pub use client::RegistryHelperClient;
pub use models::{CredentialSet, Manifest};
pub use providers::{build_backend, HelperRegistry, PassthroughRegistry};

use crate::error::RegistryError;
use async_trait::async_trait;

/// Trait for image registry backends used by the build platform
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Make sure the repository backing `repository` exists
    ///
    /// # Returns
    /// `true` if it already existed, `false` if it had to be created
    async fn ensure_repository_exists(&self, repository: &str) -> Result<bool, RegistryError>;

    /// Get the manifest of `image:tag`, creating the repository if needed
    ///
    /// Returns `None` if the tag does not exist yet. A freshly created
    /// repository cannot hold any tag, so no tag lookup is made in that case.
    async fn get_image_manifest(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<Manifest>, RegistryError>;

    /// Get short-lived credentials for pulling `image:tag`
    ///
    /// Returns `None` if the backend does not issue credentials for it.
    async fn get_credentials(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<CredentialSet>, RegistryError>;

    /// Short name of the backend variant (e.g., "helper")
    fn backend_type(&self) -> &str;
}
