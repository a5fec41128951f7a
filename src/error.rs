//! Error types for Tipster.

use thiserror::Error;

/// Library-level error type for Tipster operations.
#[derive(Error, Debug)]
pub enum TipsterError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidVideoReference(String),

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("User not found: {0}")]
    UnknownUser(String),

    #[error("Free-tier limit of {limit} analyses reached for {month}. Upgrade to Premium for unlimited analyses.")]
    QuotaExceeded { limit: u32, month: String },

    #[error("Failed to fetch transcript: {0}")]
    TranscriptUnavailable(String),

    #[error("Failed to process recommendations: {0}")]
    ExtractionFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Video platform error: {0}")]
    VideoPlatform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl TipsterError {
    /// Stable machine-readable code for this error, used in API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TipsterError::InvalidVideoReference(_) => "invalid_video_reference",
            TipsterError::Unauthenticated => "unauthenticated",
            TipsterError::UnknownUser(_) => "unknown_user",
            TipsterError::QuotaExceeded { .. } => "quota_exceeded",
            TipsterError::TranscriptUnavailable(_) => "transcript_unavailable",
            TipsterError::ExtractionFailed(_) => "extraction_failed",
            TipsterError::PersistenceFailed(_) | TipsterError::Database(_) => "persistence_failed",
            TipsterError::Config(_) | TipsterError::TomlParse(_) => "config",
            TipsterError::InvalidInput(_) => "invalid_input",
            TipsterError::VideoPlatform(_) => "video_platform",
            TipsterError::Io(_) | TipsterError::Json(_) => "internal",
        }
    }

    /// Whether the caller should be offered an upgrade path.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, TipsterError::QuotaExceeded { .. })
    }
}

/// Result type alias for Tipster operations.
pub type Result<T> = std::result::Result<T, TipsterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_mentions_upgrade() {
        let err = TipsterError::QuotaExceeded {
            limit: 10,
            month: "2024-01".to_string(),
        };
        assert!(err.is_quota_exceeded());
        assert_eq!(err.kind(), "quota_exceeded");
        assert!(err.to_string().contains("Upgrade to Premium"));
    }
}
