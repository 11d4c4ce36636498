use thiserror::Error;

/// Isoshelf error types
#[derive(Error, Debug)]
pub enum ShelfError {
    /// Image or archive member does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Traversal or malformed virtual path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The external listing capability could not produce a listing
    #[error("Archive unavailable: {image} - {message}")]
    ArchiveUnavailable { image: String, message: String },

    /// The external extraction capability failed
    #[error("Extraction failed: {image}:{path} - {message}")]
    ExtractionFailed {
        image: String,
        path: String,
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The image store directory cannot be read
    #[error("Image store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ShelfError {
    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ShelfError::NotFound(_) | ShelfError::InvalidPath(_))
    }

    /// Description safe to hand back to a client.
    ///
    /// Never includes host filesystem paths or tool output.
    pub fn public_message(&self) -> &'static str {
        match self {
            ShelfError::NotFound(_) => "Not found",
            ShelfError::InvalidPath(_) => "Invalid path",
            ShelfError::ArchiveUnavailable { .. } => "Archive listing is unavailable",
            ShelfError::ExtractionFailed { .. } => "Failed to extract file from archive",
            ShelfError::IoError(_) => "Internal I/O error",
            ShelfError::StoreUnavailable(_) => "Image store is unavailable",
            ShelfError::ConfigError(_) => "Server misconfigured",
        }
    }
}

/// Result type alias for isoshelf operations
pub type Result<T> = std::result::Result<T, ShelfError>;
