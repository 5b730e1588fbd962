//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so logs, exports and API responses
//! can be grepped by category.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - transport / provider errors: how a source call failed
//! - CFG_xxx: Configuration errors (fatal at startup)
//! - DENYLIST_xxx: Denylist persistence errors
//! - API_xxx: HTTP API errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Configuration problems abort before any analysis begins
    pub fn is_config_error(&self) -> bool {
        self.code.is_config()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ============================================
    // Transport Errors (transient)
    // ============================================
    /// Provider did not answer within the per-call timeout
    ExternalTimeout,
    /// TCP/TLS connection could not be established
    ConnectionFailed,
    /// Provider answered with HTTP 5xx
    ProviderServerError,
    /// Provider answered with HTTP 429
    RateLimited,
    /// The run deadline expired before the call finished
    RunDeadline,

    // ============================================
    // Provider Errors (definitive)
    // ============================================
    /// Token unknown or delisted at the provider
    TokenNotFound,
    /// Invalid or missing provider API key (HTTP 401/403)
    ApiUnauthorized,
    /// Provider rejected the request (other 4xx)
    ApiBadRequest,
    /// Provider body could not be parsed
    InvalidResponse,
    /// Token lacks a field the adapter needs (e.g. twitter handle)
    MissingInput,

    // ============================================
    // Run-level Errors
    // ============================================
    /// No signal in the whole run was usable
    AllSourcesUnavailable,
    /// Writing the export failed
    ExportFailed,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Missing API key for an enabled source
    ConfigMissingApiKey,
    /// Config file is not valid TOML
    ConfigParseFailed,

    // ============================================
    // Denylist Errors
    // ============================================
    /// Denylist file exists but is malformed
    DenylistMalformed,
    /// Denylist file could not be read or written
    DenylistIo,
    /// Empty or otherwise unusable address
    InvalidAddress,

    // ============================================
    // API Errors
    // ============================================
    /// Internal server error
    ApiInternalError,
    /// Resource not found
    ApiNotFound,
    /// Missing or wrong admin key
    ApiForbidden,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalTimeout => "EXTERNAL_TIMEOUT",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ProviderServerError => "PROVIDER_SERVER_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::RunDeadline => "RUN_DEADLINE",

            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::ApiUnauthorized => "API_UNAUTHORIZED",
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::MissingInput => "MISSING_INPUT",

            Self::AllSourcesUnavailable => "ALL_SOURCES_UNAVAILABLE",
            Self::ExportFailed => "EXPORT_FAILED",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",
            Self::ConfigParseFailed => "CFG_PARSE_FAILED",

            Self::DenylistMalformed => "DENYLIST_MALFORMED",
            Self::DenylistIo => "DENYLIST_IO",
            Self::InvalidAddress => "INVALID_ADDRESS",

            Self::ApiInternalError => "API_INTERNAL_ERROR",
            Self::ApiNotFound => "API_NOT_FOUND",
            Self::ApiForbidden => "API_FORBIDDEN",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::InvalidAddress | Self::ConfigInvalidValue => 400,
            Self::ApiUnauthorized | Self::ConfigMissingApiKey => 401,
            Self::ApiForbidden => 403,
            Self::ApiNotFound | Self::TokenNotFound => 404,
            Self::RateLimited => 429,
            Self::AllSourcesUnavailable => 503,
            Self::ExternalTimeout | Self::RunDeadline => 504,
            _ => 500,
        }
    }

    /// Check if error is retryable (timeout, connection failure, 5xx only)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalTimeout | Self::ConnectionFailed | Self::ProviderServerError
        )
    }

    /// Transient failures map to UNAVAILABLE, everything else to ERROR
    pub fn is_transient(&self) -> bool {
        self.is_retryable() || matches!(self, Self::RateLimited | Self::RunDeadline)
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissingEnv
                | Self::ConfigInvalidValue
                | Self::ConfigMissingApiKey
                | Self::ConfigParseFailed
                | Self::DenylistMalformed
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalTimeout, msg)
    }

    pub fn token_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TokenNotFound, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, msg)
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingInput, msg)
    }

    /// Map a non-success HTTP status from a provider to its error code
    pub fn from_status(status: u16, provider: &str) -> Self {
        let code = match status {
            401 | 403 => ErrorCode::ApiUnauthorized,
            404 => ErrorCode::TokenNotFound,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::ProviderServerError,
            _ => ErrorCode::ApiBadRequest,
        };
        Self::new(code, format!("{} returned HTTP {}", provider, status))
    }

    /// Missing API key
    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn all_sources_unavailable(tokens: usize) -> Self {
        Self::new(
            ErrorCode::AllSourcesUnavailable,
            format!("No source returned a usable signal for any of {} tokens", tokens),
        )
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExternalTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::new(ErrorCode::InvalidResponse, err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), "provider")
        } else {
            // Remaining reqwest failures are transport-level (reset, body read)
            Self::new(ErrorCode::ConnectionFailed, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::InvalidResponse, "JSON parse error", err)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::with_source(ErrorCode::ConfigParseFailed, "TOML parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::timeout("Connection timed out");
        assert_eq!(err.code, ErrorCode::ExternalTimeout);
        assert_eq!(err.code_str(), "EXTERNAL_TIMEOUT");
        assert_eq!(err.to_string(), "[EXTERNAL_TIMEOUT] Connection timed out");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::ExternalTimeout.is_retryable());
        assert!(ErrorCode::ProviderServerError.is_retryable());
        assert!(!ErrorCode::RateLimited.is_retryable());
        assert!(!ErrorCode::TokenNotFound.is_retryable());
        assert!(!ErrorCode::ApiUnauthorized.is_retryable());
    }

    #[test]
    fn test_transient_vs_definitive() {
        assert!(ErrorCode::RateLimited.is_transient());
        assert!(ErrorCode::RunDeadline.is_transient());
        assert!(!ErrorCode::MissingInput.is_transient());
        assert!(!ErrorCode::InvalidResponse.is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from_status(503, "x").code, ErrorCode::ProviderServerError);
        assert_eq!(AppError::from_status(404, "x").code, ErrorCode::TokenNotFound);
        assert_eq!(AppError::from_status(403, "x").code, ErrorCode::ApiUnauthorized);
        assert_eq!(AppError::from_status(429, "x").code, ErrorCode::RateLimited);
        assert_eq!(AppError::from_status(418, "x").code, ErrorCode::ApiBadRequest);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::ApiBadRequest.http_status(), 400);
        assert_eq!(ErrorCode::ApiForbidden.http_status(), 403);
        assert_eq!(ErrorCode::AllSourcesUnavailable.http_status(), 503);
        assert_eq!(ErrorCode::Unknown.http_status(), 500);
    }

    #[test]
    fn test_config_codes() {
        assert!(AppError::missing_api_key("TWEETSCOUT_API_KEY").is_config_error());
        assert!(ErrorCode::DenylistMalformed.is_config());
        assert!(!ErrorCode::DenylistIo.is_config());
    }
}
