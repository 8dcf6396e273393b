//! Connection profile resolution.

use std::fmt;

use connect_kernel::KeyValueSource;
use reqwest::Url;

use crate::error::ConfigError;

/// Configuration key holding the account endpoint URI.
pub const ACCOUNT_ENDPOINT_KEY: &str = "cosmos.account_endpoint";
/// Configuration key holding the account access key.
pub const AUTH_KEY_KEY: &str = "cosmos.auth_key";

/// Endpoint and credential of a store account.
///
/// Only constructible with both fields present, so holding one means a session
/// may be opened against it.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    endpoint: Url,
    access_key: String,
}

impl ConnectionProfile {
    pub fn new(endpoint: &str, access_key: &str) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingField("endpoint"));
        }
        let access_key = access_key.trim();
        if access_key.is_empty() {
            return Err(ConfigError::MissingField("accessKey"));
        }

        let endpoint = Url::parse(endpoint)
            .map_err(|err| ConfigError::InvalidEndpoint(format!("{endpoint}: {err}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidEndpoint(format!(
                "{endpoint}: expected an http or https URL"
            )));
        }

        Ok(Self {
            endpoint,
            access_key: access_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Read the endpoint and access key out of `source`.
///
/// Performs no network access; reachability is only discovered when a session
/// is opened.
pub fn resolve(source: &dyn KeyValueSource) -> Result<ConnectionProfile, ConfigError> {
    let endpoint = source.get(ACCOUNT_ENDPOINT_KEY).unwrap_or_default();
    let access_key = source.get(AUTH_KEY_KEY).unwrap_or_default();

    ConnectionProfile::new(&endpoint, &access_key)
}
