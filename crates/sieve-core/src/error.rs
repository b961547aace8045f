use thiserror::Error;

/// Result type alias for policy operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by policy types and stores
#[derive(Error, Debug)]
pub enum CoreError {
    /// No settings are stored under the requested ID
    #[error("policy not found: {id}")]
    NotFound {
        /// The caller/policy ID that was looked up
        id: String,
    },

    /// A preset submitted through the management API could not be converted
    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    /// The backing store failed to read or persist data
    #[error("policy store error: {0}")]
    Store(String),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns true if the error means the policy does not exist
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Shorthand for [`CoreError::NotFound`]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
