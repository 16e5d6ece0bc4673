//! Error types for Lekt.

use thiserror::Error;

/// Library-level error type for Lekt operations.
#[derive(Error, Debug)]
pub enum LektError {
    #[error("Authentication failed for provider {provider}: {message}")]
    Authentication { provider: String, message: String },

    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("Provider {provider} is rate limiting requests: {message}")]
    RateLimited { provider: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Content is empty: {0}")]
    EmptyContent(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LektError {
    /// Whether the caller may reasonably retry the operation later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LektError::ProviderUnavailable { .. } | LektError::RateLimited { .. }
        )
    }

    /// Whether the error was caused by the caller (bad id, bad payload, bad setting).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LektError::NotFound(_)
                | LektError::EmptyContent(_)
                | LektError::InvalidConfig(_)
                | LektError::InvalidInput(_)
        )
    }
}

/// Result type alias for Lekt operations.
pub type Result<T> = std::result::Result<T, LektError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let limited = LektError::RateLimited {
            provider: "groq".to_string(),
            message: "slow down".to_string(),
        };
        assert!(limited.is_transient());
        assert!(!limited.is_client_error());

        let missing = LektError::NotFound("class cs101".to_string());
        assert!(missing.is_client_error());
        assert!(!missing.is_transient());

        let auth = LektError::Authentication {
            provider: "nvidia".to_string(),
            message: "NVIDIA_API_KEY not set".to_string(),
        };
        assert!(!auth.is_transient());
        assert!(auth.to_string().contains("nvidia"));
    }
}
