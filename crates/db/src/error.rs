//! Error types for profile resolution and provisioning.

use std::time::Duration;

use thiserror::Error;

use crate::outcome::Stage;

/// Failure to resolve a connection profile from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MissingField: {0}")]
    MissingField(&'static str),

    #[error("InvalidEndpoint: {0}")]
    InvalidEndpoint(String),
}

/// Failure while validating, opening a session, or issuing the create call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("InvalidName: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("TransportFailure: {message}")]
    TransportFailure {
        message: String,
        cause: Option<String>,
    },

    #[error("ServiceRejected: {message}")]
    ServiceRejected {
        status: Option<u16>,
        message: String,
        cause: Option<String>,
    },

    #[error("timeout")]
    Timeout { after: Duration },
}

impl ProvisionError {
    /// Create a transport failure without a nested cause
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a service rejection carrying the HTTP status and response text
    pub fn rejected(status: Option<u16>, message: impl Into<String>, cause: Option<String>) -> Self {
        Self::ServiceRejected {
            status,
            message: message.into(),
            cause,
        }
    }

    /// Stage at which this error surfaces in a failed outcome
    pub fn stage(&self) -> Stage {
        Stage::Provision
    }

    /// Lower-level description kept for diagnostics
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::InvalidName { name, .. } => Some(format!("database name {name:?}")),
            Self::TransportFailure { cause, .. } | Self::ServiceRejected { cause, .. } => {
                cause.clone()
            }
            Self::Timeout { after } => Some(format!("no response within {} ms", after.as_millis())),
        }
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransportFailure {
            message: err.to_string(),
            cause: source_chain(&err),
        }
    }
}

/// Join the `source()` chain of an error into a single line.
pub(crate) fn source_chain(err: &dyn std::error::Error) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(": "))
    }
}
