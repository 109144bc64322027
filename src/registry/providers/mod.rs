pub mod helper;
pub mod passthrough;

pub use helper::HelperRegistry;
pub use passthrough::PassthroughRegistry;

use std::sync::Arc;
use std::time::Duration;

use crate::error::RegistryError;
use crate::registry::RegistryBackend;
use crate::settings::RegistrySettings;

/// Build the registry backend selected by configuration
pub fn build_backend(
    settings: &RegistrySettings,
    timeout: Duration,
) -> Result<Arc<dyn RegistryBackend>, RegistryError> {
    let backend: Arc<dyn RegistryBackend> = match settings {
        RegistrySettings::Helper(config) => Arc::new(HelperRegistry::new(config, timeout)?),
        RegistrySettings::Passthrough(config) => {
            Arc::new(PassthroughRegistry::new(config, timeout)?)
        }
    };
    tracing::debug!("Using {} registry backend", backend.backend_type());
    Ok(backend)
}
