//! Cosmos Connect application library.
//!
//! Wires configuration, the store client and the HTTP facade together. The
//! [`App`] is shared by the `connect-app` server binary and `connect-cli`.

pub mod modules;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use connect_db::{HttpSessionFactory, ProvisionOutcome, Provisioner, TransportPolicy};
use connect_kernel::settings::{load_layered, Settings};
use connect_kernel::{InitCtx, ModuleRegistry, SharedSource};

/// Loaded settings, the secret source and the registered modules.
pub struct App {
    settings: Settings,
    source: SharedSource,
    registry: ModuleRegistry,
}

impl App {
    /// Load layered configuration and install the tracing subscriber.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = load_layered().context("failed to load configuration")?;
        let settings = Settings::from_config(&cfg).context("failed to load settings")?;
        connect_telemetry::init(&settings.telemetry);

        Ok(Self::new(settings, Arc::new(cfg)))
    }

    pub fn new(settings: Settings, source: SharedSource) -> Self {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &settings, source.clone());

        Self {
            settings,
            source,
            registry,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Run the module lifecycle around the HTTP server until `shutdown` resolves.
    pub async fn serve<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ctx = InitCtx {
            settings: &self.settings,
            source: self.source.as_ref(),
        };

        self.registry
            .init_all(&ctx)
            .await
            .context("module initialization failed")?;
        self.registry
            .start_all(&ctx)
            .await
            .context("module startup failed")?;

        let served = connect_http::start_server(&self.registry, &self.settings, shutdown).await;

        // Stop modules even when the server failed; its error wins.
        let stopped = self.registry.stop_all().await;
        served?;
        stopped.context("module shutdown failed")
    }

    /// Provision a database once against the configured store.
    ///
    /// `database` falls back to `database.name`.
    pub async fn provision(
        &self,
        database: Option<&str>,
        policy: TransportPolicy,
    ) -> ProvisionOutcome {
        let provisioner = Provisioner::from_settings(
            Arc::new(HttpSessionFactory::new()),
            &self.settings.database,
        );
        let database = database.unwrap_or(&self.settings.database.name);

        provisioner
            .provision_from(self.source.as_ref(), database, policy)
            .await
    }
}
