use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "CONNECT_ENV";
const CONFIG_DIR_ENV: &str = "CONNECT_CONFIG_DIR";
const ENV_PREFIX: &str = "CONNECT";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
///
/// Secrets (account endpoint and key) are deliberately absent: they are read
/// per invocation through a [`crate::KeyValueSource`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = load_layered()?;
        Self::from_config(&cfg)
    }

    /// Deserialize typed settings out of an already built configuration.
    pub fn from_config(cfg: &config::Config) -> anyhow::Result<Self> {
        let mut settings: Settings = cfg
            .clone()
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        settings.environment = Environment::parse(&environment)?;

        Ok(settings)
    }
}

/// Build the layered configuration: `config/base.toml`, `config/{env}.toml`,
/// then `CONNECT_*` environment variables (`__` separates nested keys, so
/// `CONNECT_COSMOS__AUTH_KEY` maps to `cosmos.auth_key`).
pub fn load_layered() -> anyhow::Result<config::Config> {
    // Allow missing `.env` files without failing.
    let _ = dotenvy::dotenv();

    let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let config_dir = match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir()
            .map(|cwd| cwd.join("config"))
            .with_context(|| "unable to resolve current directory")?,
    };

    layered_from(&config_dir, &environment)
}

/// Layer `{config_dir}/base.toml`, `{config_dir}/{environment}.toml` and the
/// `CONNECT_*` environment variables. Missing files are skipped.
pub fn layered_from(config_dir: &Path, environment: &str) -> anyhow::Result<config::Config> {
    let base_path = config_dir.join("base.toml");
    let environment_path = config_dir.join(format!("{}.toml", environment));

    config::Config::builder()
        .add_source(config::File::from(base_path).required(false))
        .add_source(config::File::from(environment_path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .with_context(|| "failed to build configuration")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Whether the store client verifies the server certificate chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Verify against the trusted root store.
    #[default]
    SystemTrustStore,
    /// Skip certificate verification entirely. Development emulators only.
    AcceptAllCertificates,
}

/// Network path requests take to reach the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Requests go to the data node endpoint advertised by the account.
    Direct,
    /// Requests go through the account gateway endpoint.
    #[default]
    Gateway,
}

/// Non-secret settings of the database bootstrap.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default)]
    pub trust_mode: TrustMode,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default = "DatabaseSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_name() -> String {
        "cosmicworks".to_string()
    }

    fn default_timeout_ms() -> u64 {
        10000
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            trust_mode: TrustMode::default(),
            topology: Topology::default(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
