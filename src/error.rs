use thiserror::Error;

/// Errors raised while talking to the registry helper or a backing registry.
///
/// A remote 404 is not represented here when the calling operation gives it
/// an "absent" meaning; it is translated to `None`/`false` instead.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The remote answered with a status that is neither success nor a
    /// meaningful "not found".
    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("{method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// A successful response whose body is not valid JSON.
    #[error("Invalid JSON in response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),
}

impl RegistryError {
    /// HTTP status carried by the error, if the remote answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a transport-level failure (bad status or no response)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RegistryError::Status { .. } | RegistryError::Transport { .. }
        )
    }
}
