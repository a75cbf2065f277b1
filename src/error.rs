use std::collections::HashMap;
use thiserror::Error;

/// Main error type for the download subsystem
#[derive(Error, Debug)]
pub enum ArcError {
    /// Base error
    #[error("{message}")]
    Base {
        message: String,
        error_code: i32,
        api_error_code: i32,
        extra_data: Option<HashMap<String, serde_json::Value>>,
        status: u16,
    },

    /// Input validation error
    #[error("Input error: {message}")]
    Input {
        message: String,
        error_code: i32,
        api_error_code: i32,
        extra_data: Option<HashMap<String, serde_json::Value>>,
        status: u16,
    },

    /// Data not found error
    #[error("No data: {message}")]
    NoData {
        message: String,
        error_code: i32,
        api_error_code: i32,
        extra_data: Option<HashMap<String, serde_json::Value>>,
        status: u16,
    },

    /// No access permission error
    #[error("No access: {message}")]
    NoAccess {
        message: String,
        error_code: i32,
        api_error_code: i32,
        extra_data: Option<HashMap<String, serde_json::Value>>,
        status: u16,
    },

    /// Rate limit exceeded error
    #[error("Rate limit: {message}")]
    RateLimit {
        message: String,
        error_code: i32,
        api_error_code: i32,
        extra_data: Option<HashMap<String, serde_json::Value>>,
        status: u16,
    },

    /// Database error
    #[error("Database error: {message}")]
    Database { message: String },

    /// JSON serialization error
    #[error("JSON error: {message}")]
    Json { message: String },

    /// IO error
    #[error("IO error: {message}")]
    Io { message: String },
}

impl ArcError {
    /// Create a new input validation error
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
            error_code: 108,
            api_error_code: -100,
            extra_data: None,
            status: 200,
        }
    }

    /// Create a new data not found error
    pub fn no_data<S: Into<String>>(message: S, error_code: i32) -> Self {
        Self::NoData {
            message: message.into(),
            error_code,
            api_error_code: -3,
            extra_data: None,
            status: 200,
        }
    }

    /// Create a new no access error
    pub fn no_access<S: Into<String>>(message: S, error_code: i32) -> Self {
        Self::NoAccess {
            message: message.into(),
            error_code,
            api_error_code: -999,
            extra_data: None,
            status: 403,
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit<S: Into<String>>(message: S, error_code: i32, api_error_code: i32) -> Self {
        Self::RateLimit {
            message: message.into(),
            error_code,
            api_error_code,
            extra_data: None,
            status: 429,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            Self::Base { status, .. }
            | Self::Input { status, .. }
            | Self::NoData { status, .. }
            | Self::NoAccess { status, .. }
            | Self::RateLimit { status, .. } => *status,
            Self::Database { .. } | Self::Json { .. } | Self::Io { .. } => 500,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> i32 {
        match self {
            Self::Base { error_code, .. }
            | Self::Input { error_code, .. }
            | Self::NoData { error_code, .. }
            | Self::NoAccess { error_code, .. }
            | Self::RateLimit { error_code, .. } => *error_code,
            Self::Database { .. } | Self::Json { .. } | Self::Io { .. } => 108,
        }
    }

    /// Get the API error code for this error
    pub fn api_error_code(&self) -> i32 {
        match self {
            Self::Base { api_error_code, .. }
            | Self::Input { api_error_code, .. }
            | Self::NoData { api_error_code, .. }
            | Self::NoAccess { api_error_code, .. }
            | Self::RateLimit { api_error_code, .. } => *api_error_code,
            Self::Database { .. } | Self::Json { .. } | Self::Io { .. } => -999,
        }
    }

    /// Get the extra data for this error
    pub fn extra_data(&self) -> Option<&HashMap<String, serde_json::Value>> {
        match self {
            Self::Base { extra_data, .. }
            | Self::Input { extra_data, .. }
            | Self::NoData { extra_data, .. }
            | Self::NoAccess { extra_data, .. }
            | Self::RateLimit { extra_data, .. } => extra_data.as_ref(),
            Self::Database { .. } | Self::Json { .. } | Self::Io { .. } => None,
        }
    }
}

impl From<sqlx::Error> for ArcError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ArcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ArcError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Alias for Result with ArcError
pub type ArcResult<T> = Result<T, ArcError>;
