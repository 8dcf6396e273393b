//! Client session seam between the provisioner and a concrete store client.

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::profile::ConnectionProfile;
use crate::transport::TransportPolicy;

/// State of the database after a create-if-absent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// This call created it.
    Created,
    /// It was already there; nothing was mutated.
    Existing,
}

/// A live connection to one store account, owned by a single provisioning call.
#[async_trait]
pub trait ClientSession: Send {
    /// Ensure database `id` exists.
    async fn create_database_if_not_exists(
        &mut self,
        id: &str,
    ) -> Result<DatabaseState, ProvisionError>;

    /// Release the underlying transport. Called exactly once per session.
    fn close(&mut self);
}

/// Opens sessions. Implementations hold no per-call state, so one factory can
/// serve concurrent calls, each receiving its own session.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        profile: &ConnectionProfile,
        policy: &TransportPolicy,
    ) -> Result<Box<dyn ClientSession>, ProvisionError>;
}

/// Owns an open session and closes it when dropped, which covers early
/// returns, panics, timeouts and cancellation alike.
pub(crate) struct SessionGuard {
    session: Box<dyn ClientSession>,
}

impl SessionGuard {
    pub(crate) fn new(session: Box<dyn ClientSession>) -> Self {
        Self { session }
    }

    pub(crate) fn session(&mut self) -> &mut dyn ClientSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        tracing::debug!(target: "connect-db", "client session released");
    }
}
