//! codescout Error Types
//!
//! This crate provides unified error types for all codescout components.

/// Unified error type for codescout
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("request cancelled")]
    Cancelled,
}

impl ScoutError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Input errors are detected before any network call is made.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;

impl From<serde_json::Error> for ScoutError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for ScoutError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for ScoutError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialize error: {}", err))
    }
}
