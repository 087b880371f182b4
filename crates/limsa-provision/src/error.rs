use limsa_core::ModelError;
use thiserror::Error;

/// Result type alias for provisioning
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The definition document is well-formed JSON but not a usable model
    #[error("invalid definition: {0}")]
    Definition(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    pub fn definition(msg: impl Into<String>) -> Self {
        Self::Definition(msg.into())
    }
}
