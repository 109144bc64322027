//! Image registry backend that reconciles repositories through a registry helper
//!
//! The build platform asks a [`RegistryBackend`] whether `image:tag` already
//! exists. Before answering, the backend makes sure the repository backing
//! `image` exists, creating it through the helper service if it does not.

pub mod error;
pub mod registry;
pub mod settings;
pub mod transport;

pub use error::RegistryError;
pub use registry::{
    build_backend, CredentialSet, HelperRegistry, Manifest, PassthroughRegistry,
    RegistryBackend, RegistryHelperClient,
};
pub use settings::Settings;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
