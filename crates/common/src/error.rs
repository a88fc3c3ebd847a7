use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Asset processing error: {0}")]
    Asset(String),

    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("Provisioning failed at {step}: {message}")]
    Provisioning { step: String, message: String },

    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Errors the caller can fix by changing the submitted form.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
