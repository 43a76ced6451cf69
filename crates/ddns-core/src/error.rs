//! Error types for the DDNS watchdog
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::address::InterfaceMap;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS watchdog
#[derive(Error, Debug)]
pub enum Error {
    /// No address could be obtained for a family
    #[error("IP resolution failed: {0}")]
    Resolution(String),

    /// An address of the wrong family was returned
    #[error("Malformed {family} address: got {value:?}")]
    MalformedAddress {
        /// "IPv4" or "IPv6"
        family: &'static str,
        /// The rejected value
        value: String,
    },

    /// The configured network interface key is absent or has no usable address
    #[error("Network interface not found: {0}")]
    InterfaceNotFound(String),

    /// Network-card mode is on but no interface names are configured
    ///
    /// Carries the enumerated interfaces so the caller can persist them for the operator.
    #[error("No network interface selected, choose from {} enumerated address(es)", .0.len())]
    NeedsInterfaceSelection(InterfaceMap),

    /// The provider has no record matching (name, type)
    #[error("{provider}: record {name} ({record_type}) does not exist")]
    RecordNotFound {
        /// Provider display name
        provider: &'static str,
        /// Fully qualified record name
        name: String,
        /// "A" or "AAAA"
        record_type: &'static str,
    },

    /// Network, authentication or parse failure while talking to a provider
    #[error("{provider}: {message}")]
    Provider {
        /// Provider display name
        provider: String,
        /// Error message
        message: String,
    },

    /// Bad, unknown or disabled relay token
    #[error("Relay authorization failed: {0}")]
    RelayAuth(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors outside of a provider (lookup API, center)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an interface-not-found error
    pub fn interface_not_found(msg: impl Into<String>) -> Self {
        Self::InterfaceNotFound(msg.into())
    }

    /// Create a relay authorization error
    pub fn relay_auth(msg: impl Into<String>) -> Self {
        Self::RelayAuth(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error means "nothing usable for this family"
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::Resolution(_)
                | Self::MalformedAddress { .. }
                | Self::InterfaceNotFound(_)
                | Self::Http(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
