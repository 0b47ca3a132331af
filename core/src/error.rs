use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Not a block device: {0}")]
    NotABlockDevice(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Verification failed: {0}")]
    VerifyFailed(String),
}

impl FormatError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        FormatError::InvalidParameter(msg.into())
    }

    /// True for the kinds that are decided before anything is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FormatError::InvalidParameter(_) | FormatError::Configuration(_)
        )
    }
}
