//! Document store client factory and database provisioning.
//!
//! The [`Provisioner`] resolves a [`ConnectionProfile`], opens a client session
//! under a [`TransportPolicy`] and makes sure a named database exists,
//! reporting a [`ProvisionOutcome`] instead of failing.

use async_trait::async_trait;
use connect_kernel::settings::Environment;
use connect_kernel::{InitCtx, Module};

pub mod auth;
pub mod error;
pub mod http;
pub mod memory;
pub mod outcome;
pub mod profile;
pub mod provision;
pub mod session;
pub mod transport;

pub use error::{ConfigError, ProvisionError};
pub use http::HttpSessionFactory;
pub use outcome::{ProvisionOutcome, Stage};
pub use profile::{resolve, ConnectionProfile};
pub use provision::{ProvisionRequest, Provisioner};
pub use session::{ClientSession, DatabaseState, SessionFactory};
pub use transport::{Topology, TransportPolicy, TrustMode};

/// Core module that reports the store configuration at startup.
pub struct DbModule;

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let database = &ctx.settings.database;
        let policy = TransportPolicy::from(database);

        // Surface configuration problems early; they are still reported per call.
        match resolve(ctx.source) {
            Ok(profile) => tracing::info!(
                target: "connect-db",
                endpoint = %profile.endpoint(),
                database = %database.name,
                trust_mode = ?policy.trust_mode,
                topology = ?policy.topology,
                timeout_ms = database.timeout_ms,
                "store connection profile resolved"
            ),
            Err(err) => tracing::warn!(
                target: "connect-db",
                error = %err,
                "store connection profile incomplete; provisioning requests will fail"
            ),
        }

        if policy.is_unverified() {
            tracing::warn!(
                target: "connect-db",
                environment = ?ctx.settings.environment,
                production = ctx.settings.environment == Environment::Production,
                "database.trust_mode is accept_all_certificates; server certificates will not be verified"
            );
        }

        Ok(())
    }
}

/// Create the core db module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(DbModule)
}
