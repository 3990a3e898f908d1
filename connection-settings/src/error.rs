use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid connection string format at position {position}: {message}")]
    InvalidFormat { position: usize, message: String },

    #[error("Invalid boolean value '{value}' for keyword '{keyword}'")]
    InvalidBoolean { keyword: String, value: String },

    #[error("Invalid numeric value '{value}' for keyword '{keyword}'")]
    InvalidNumber { keyword: String, value: String },

    #[error("Invalid connection string template: {0}")]
    Template(String),

    #[error("Invalid entity metadata '{0}': expected res://*/<model>.csdl|res://*/<model>.ssdl|res://*/<model>.msl")]
    InvalidMetadata(String),

    #[error("Missing required keyword '{0}'")]
    MissingKeyword(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Why a connectivity check failed.
///
/// `ConnectivityTestable::test` collapses all of these into `false`; callers
/// that need to tell a bad password from an unreachable host use
/// `check_connectivity` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Malformed connection string: {0}")]
    Malformed(String),

    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server rejected the connection: {0}")]
    Server(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl ConnectivityError {
    /// Short, stable name for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::AuthFailed(_) => "auth_failed",
            Self::Malformed(_) => "malformed",
            Self::Timeout(_) => "timeout",
            Self::Server(_) => "server",
            Self::UnsupportedProvider(_) => "unsupported_provider",
        }
    }
}

impl From<SettingsError> for ConnectivityError {
    fn from(err: SettingsError) -> Self {
        Self::Malformed(err.to_string())
    }
}

pub type ConnectivityResult<T> = Result<T, ConnectivityError>;
