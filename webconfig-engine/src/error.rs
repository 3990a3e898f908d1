use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtectionError {
    #[error("Invalid protection key: {0}")]
    InvalidKey(String),

    #[error("Invalid protection key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Unsupported key version {version}, only version {supported} is supported")]
    UnsupportedKeyVersion { version: u32, supported: u32 },

    #[error("Invalid protected payload format")]
    InvalidFormat,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Protection provider '{0}' is not registered")]
    ProviderNotRegistered(String),

    #[error("No protection provider is configured")]
    NoProvider,
}

pub type ProtectionResult<T> = std::result::Result<T, ProtectionError>;

/// Why a typed section lookup produced nothing.
#[derive(Error, Debug)]
pub enum SectionError {
    #[error("Configuration section '{0}' not found")]
    NotFound(String),

    #[error("Configuration section '{section}' does not have the expected shape: {reason}")]
    TypeMismatch { section: String, reason: String },

    #[error("Configuration section '{section}' is malformed: {reason}")]
    Malformed { section: String, reason: String },

    #[error("Configuration section '{section}' could not be unprotected: {source}")]
    Protection {
        section: String,
        #[source]
        source: ProtectionError,
    },
}

pub type SectionResult<T> = std::result::Result<T, SectionError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file {path} is not valid XML: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error(transparent)]
    Section(#[from] SectionError),

    #[error(transparent)]
    Protection(#[from] ProtectionError),

    /// The section's protection state did not match the request after saving.
    #[error("Configuration Encryption Failed: expected section '{section}' to be {}", protection_state(.expected_protected))]
    EncryptionVerification { section: String, expected_protected: bool },

    #[error("Invalid settings: {0}")]
    Settings(#[from] config::ConfigError),
}

fn protection_state(protected: &bool) -> &'static str {
    if *protected {
        "protected"
    } else {
        "unprotected"
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
