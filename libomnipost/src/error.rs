//! Error types for Omnipost

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OmnipostError>;

#[derive(Error, Debug)]
pub enum OmnipostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Schedule rejected: {0}")]
    Window(#[from] WindowViolation),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl OmnipostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            OmnipostError::InvalidInput(_)
            | OmnipostError::Window(_)
            | OmnipostError::NotFound(_) => 3,
            OmnipostError::Config(_) => 2,
            OmnipostError::Platform(_) | OmnipostError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row for post {id}: {reason}")]
    CorruptRow { id: String, reason: String },
}

/// Error raised by a platform adapter's publish call.
///
/// `Api` errors carry the numeric code the platform returned; the code
/// drives retry classification. `Http` errors come from a non-success
/// response and keep the status next to the code (the body's code, or the
/// status itself when the body had none).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("{message} (code {code})")]
    Api { code: i64, message: String },

    #[error("{message} (HTTP {status}, code {code})")]
    Http {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

impl PlatformError {
    pub const AUTH_EXPIRED: i64 = 190;
    pub const RATE_LIMITED: i64 = 368;
    pub const BAD_REQUEST: i64 = 100;

    pub fn api(code: i64, message: impl Into<String>) -> Self {
        PlatformError::Api {
            code,
            message: message.into(),
        }
    }

    /// Error raised by the rate limit wrapper when a platform is at budget
    pub fn rate_limited() -> Self {
        Self::api(Self::RATE_LIMITED, "rate_limited")
    }

    /// Numeric platform code, if the error carries one
    pub fn code(&self) -> Option<i64> {
        match self {
            PlatformError::Api { code, .. } | PlatformError::Http { code, .. } => Some(*code),
            PlatformError::Network(_) | PlatformError::Timeout(_) => None,
        }
    }

    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message without the code suffix
    pub fn message(&self) -> String {
        match self {
            PlatformError::Api { message, .. } | PlatformError::Http { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Reason a candidate schedule time was rejected by a publish window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowViolation {
    #[error("outside_window: {platform} does not accept posts at this time of day")]
    OutsideWindow { platform: String },

    #[error("min_gap_violation: {platform} requires {min_gap_minutes} minutes between posts")]
    MinGap {
        platform: String,
        min_gap_minutes: u32,
    },
}

impl WindowViolation {
    /// Stable machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            WindowViolation::OutsideWindow { .. } => "outside_window",
            WindowViolation::MinGap { .. } => "min_gap_violation",
        }
    }

    pub fn platform(&self) -> &str {
        match self {
            WindowViolation::OutsideWindow { platform } => platform,
            WindowViolation::MinGap { platform, .. } => platform,
        }
    }
}
