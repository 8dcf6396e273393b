//! Transport trust and topology policy.

use connect_kernel::settings::DatabaseSettings;
pub use connect_kernel::settings::{Topology, TrustMode};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

const USER_AGENT: &str = concat!("cosmos-connect/", env!("CARGO_PKG_VERSION"));

/// How the store client reaches and trusts the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportPolicy {
    #[serde(default)]
    pub trust_mode: TrustMode,
    #[serde(default)]
    pub topology: Topology,
}

impl TransportPolicy {
    pub fn new(trust_mode: TrustMode, topology: Topology) -> Self {
        Self {
            trust_mode,
            topology,
        }
    }

    /// Whether certificate verification is switched off
    pub fn is_unverified(&self) -> bool {
        self.trust_mode == TrustMode::AcceptAllCertificates
    }

    /// Build the HTTP client backing one session.
    pub fn build_client(&self) -> Result<reqwest::Client, ProvisionError> {
        if self.is_unverified() {
            tracing::warn!(
                target: "connect-db",
                trust_mode = ?self.trust_mode,
                "certificate verification disabled for this session; use only against development emulators"
            );
        }

        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.is_unverified())
            .build()
            .map_err(ProvisionError::from)
    }
}

impl From<&DatabaseSettings> for TransportPolicy {
    fn from(settings: &DatabaseSettings) -> Self {
        Self::new(settings.trust_mode, settings.topology)
    }
}
