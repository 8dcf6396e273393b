//! Idempotent database bootstrap.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use connect_kernel::settings::DatabaseSettings;
use connect_kernel::KeyValueSource;
use futures::FutureExt;

use crate::error::ProvisionError;
use crate::outcome::ProvisionOutcome;
use crate::profile::{self, ConnectionProfile};
use crate::session::{DatabaseState, SessionFactory, SessionGuard};
use crate::transport::TransportPolicy;

const MAX_NAME_LEN: usize = 255;
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', '?', '#'];

/// Everything one provisioning call needs.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub database_name: String,
    pub profile: ConnectionProfile,
    pub policy: TransportPolicy,
}

/// Ensures a named database exists, converting every failure into a
/// [`ProvisionOutcome::Failed`].
///
/// A single attempt is made per call; retrying is left to the caller. Each
/// call opens its own session and releases it before returning.
#[derive(Clone)]
pub struct Provisioner {
    factory: Arc<dyn SessionFactory>,
    timeout: Duration,
}

impl Provisioner {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn from_settings(factory: Arc<dyn SessionFactory>, settings: &DatabaseSettings) -> Self {
        Self::new(factory).with_timeout(Duration::from_millis(settings.timeout_ms))
    }

    /// Deadline for opening the session and completing the create call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the connection profile from `source`, then provision.
    ///
    /// Incomplete configuration fails at the `configuration` stage without
    /// any session being opened.
    pub async fn provision_from(
        &self,
        source: &dyn KeyValueSource,
        database_name: &str,
        policy: TransportPolicy,
    ) -> ProvisionOutcome {
        match profile::resolve(source) {
            Ok(profile) => {
                self.provision(ProvisionRequest {
                    database_name: database_name.to_string(),
                    profile,
                    policy,
                })
                .await
            }
            Err(err) => {
                let outcome = ProvisionOutcome::from(err);
                log_outcome(database_name, &outcome);
                outcome
            }
        }
    }

    /// Ensure `req.database_name` exists in the account described by `req.profile`.
    pub async fn provision(&self, req: ProvisionRequest) -> ProvisionOutcome {
        tracing::info!(
            target: "connect-db",
            database = %req.database_name,
            endpoint = %req.profile.endpoint(),
            trust_mode = ?req.policy.trust_mode,
            topology = ?req.policy.topology,
            "provisioning database"
        );

        let outcome = match self.try_provision(&req).await {
            Ok(DatabaseState::Created) => ProvisionOutcome::Created {
                id: req.database_name.clone(),
            },
            Ok(DatabaseState::Existing) => ProvisionOutcome::AlreadyExists {
                id: req.database_name.clone(),
            },
            Err(err) => ProvisionOutcome::from(err),
        };

        log_outcome(&req.database_name, &outcome);
        outcome
    }

    async fn try_provision(&self, req: &ProvisionRequest) -> Result<DatabaseState, ProvisionError> {
        validate_name(&req.database_name)?;

        let attempt = async {
            let session = self.factory.open(&req.profile, &req.policy).await?;
            let mut guard = SessionGuard::new(session);
            guard
                .session()
                .create_database_if_not_exists(&req.database_name)
                .await
        };

        match tokio::time::timeout(self.timeout, AssertUnwindSafe(attempt).catch_unwind()).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ProvisionError::TransportFailure {
                message: "session panicked".to_string(),
                cause: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(ProvisionError::Timeout {
                after: self.timeout,
            }),
        }
    }
}

/// Check a database id before any network activity.
pub fn validate_name(name: &str) -> Result<(), ProvisionError> {
    let invalid = |reason: &str| ProvisionError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("database name must not be empty"));
    }
    if name.ends_with(' ') {
        return Err(invalid("database name must not end with a space"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(invalid("database name must be at most 255 characters"));
    }
    if name.contains(FORBIDDEN_NAME_CHARS) {
        return Err(invalid("database name must not contain '/', '\\', '?' or '#'"));
    }

    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

fn log_outcome(database: &str, outcome: &ProvisionOutcome) {
    match outcome {
        ProvisionOutcome::Created { id } => {
            tracing::info!(target: "connect-db", database = %id, "database created");
        }
        ProvisionOutcome::AlreadyExists { id } => {
            tracing::info!(target: "connect-db", database = %id, "database already exists");
        }
        ProvisionOutcome::Failed {
            stage,
            message,
            cause,
        } => {
            tracing::error!(
                target: "connect-db",
                database,
                %stage,
                message = %message,
                cause = cause.as_deref().unwrap_or("-"),
                "database provisioning failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryStore};
    use crate::outcome::Stage;
    use crate::profile::{ACCOUNT_ENDPOINT_KEY, AUTH_KEY_KEY};
    use crate::transport::{Topology, TrustMode};
    use std::collections::HashMap;

    fn request(name: &str) -> ProvisionRequest {
        ProvisionRequest {
            database_name: name.to_string(),
            profile: ConnectionProfile::new("https://localhost:8081/", "c2VjcmV0").unwrap(),
            policy: TransportPolicy::new(TrustMode::SystemTrustStore, Topology::Gateway),
        }
    }

    fn provisioner(store: &MemoryStore) -> Provisioner {
        Provisioner::new(Arc::new(store.clone())).with_timeout(Duration::from_millis(200))
    }

    fn assert_released(store: &MemoryStore) {
        assert_eq!(store.opens(), store.closes(), "every opened session must be closed");
    }

    #[tokio::test]
    async fn creates_then_reports_existing() {
        let store = MemoryStore::new();
        let provisioner = provisioner(&store);

        let first = provisioner.provision(request("cosmicworks")).await;
        assert_eq!(
            first,
            ProvisionOutcome::Created {
                id: "cosmicworks".into()
            }
        );

        let second = provisioner.provision(request("cosmicworks")).await;
        assert_eq!(
            second,
            ProvisionOutcome::AlreadyExists {
                id: "cosmicworks".into()
            }
        );

        assert_eq!(store.mutations(), 1);
        assert_eq!(store.databases(), vec!["cosmicworks".to_string()]);
        assert_eq!(store.opens(), 2);
        assert_released(&store);
    }

    #[tokio::test]
    async fn missing_access_key_fails_before_any_session() {
        let store = MemoryStore::new();
        let source: HashMap<String, String> = [
            (ACCOUNT_ENDPOINT_KEY.to_string(), "https://localhost:8081/".to_string()),
            (AUTH_KEY_KEY.to_string(), String::new()),
        ]
        .into_iter()
        .collect();

        let outcome = provisioner(&store)
            .provision_from(&source, "cosmicworks", TransportPolicy::default())
            .await;

        assert_eq!(
            outcome,
            ProvisionOutcome::Failed {
                stage: Stage::Configuration,
                message: "MissingField: accessKey".into(),
                cause: None,
            }
        );
        assert_eq!(store.opens(), 0);
        assert!(store.policies().is_empty());
    }

    #[tokio::test]
    async fn resolves_profile_from_source() {
        let store = MemoryStore::new();
        let source: HashMap<String, String> = [
            (ACCOUNT_ENDPOINT_KEY.to_string(), "https://localhost:8081/".to_string()),
            (AUTH_KEY_KEY.to_string(), "c2VjcmV0".to_string()),
        ]
        .into_iter()
        .collect();

        let outcome = provisioner(&store)
            .provision_from(&source, "inventory", TransportPolicy::default())
            .await;

        assert_eq!(outcome.id(), Some("inventory"));
        assert!(store.contains("inventory"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Unreachable));

        let outcome = provisioner(&store).provision(request("cosmicworks")).await;

        match outcome {
            ProvisionOutcome::Failed {
                stage,
                message,
                cause,
            } => {
                assert_eq!(stage, Stage::Provision);
                assert!(message.contains("TransportFailure"));
                assert_eq!(cause.as_deref(), Some("connection refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.opens(), 0);
        assert_released(&store);
    }

    #[tokio::test]
    async fn rejection_releases_the_session() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Reject {
            status: 401,
            message: "Unauthorized (401)".into(),
        }));

        let outcome = provisioner(&store).provision(request("cosmicworks")).await;

        assert!(matches!(
            &outcome,
            ProvisionOutcome::Failed { stage: Stage::Provision, message, .. }
                if message == "ServiceRejected: Unauthorized (401)"
        ));
        assert_eq!(store.opens(), 1);
        assert_released(&store);
        assert!(!store.contains("cosmicworks"));
    }

    #[tokio::test]
    async fn hanging_call_times_out_and_releases() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Hang));

        let outcome = provisioner(&store)
            .with_timeout(Duration::from_millis(20))
            .provision(request("cosmicworks"))
            .await;

        assert_eq!(
            outcome,
            ProvisionOutcome::Failed {
                stage: Stage::Provision,
                message: "timeout".into(),
                cause: Some("no response within 20 ms".into()),
            }
        );
        assert_eq!(store.opens(), 1);
        assert_released(&store);
    }

    #[tokio::test]
    async fn panicking_session_is_contained() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Panic));
        let provisioner = provisioner(&store);

        let outcome = provisioner.provision(request("cosmicworks")).await;
        assert!(matches!(
            &outcome,
            ProvisionOutcome::Failed { message, .. } if message.contains("TransportFailure")
        ));
        assert_released(&store);

        store.set_fault(None);
        let outcome = provisioner.provision(request("cosmicworks")).await;
        assert!(matches!(outcome, ProvisionOutcome::Created { .. }));
        assert_released(&store);
    }

    #[tokio::test]
    async fn invalid_names_never_reach_the_store() {
        let store = MemoryStore::new();
        let provisioner = provisioner(&store);

        for name in ["", "   ", "trailing ", "a/b", "a?b", "a#b", "a\\b"] {
            let outcome = provisioner.provision(request(name)).await;
            match outcome {
                ProvisionOutcome::Failed { stage, message, .. } => {
                    assert_eq!(stage, Stage::Provision, "{name:?}");
                    assert!(message.starts_with("InvalidName: "), "{name:?}: {message}");
                }
                other => panic!("{name:?} should be rejected, got {other:?}"),
            }
        }

        let long = "x".repeat(256);
        assert!(validate_name(&long).is_err());
        assert!(validate_name(&"x".repeat(255)).is_ok());
        assert_eq!(store.opens(), 0);
    }

    #[tokio::test]
    async fn policy_reaches_the_session_unchanged() {
        let store = MemoryStore::new();
        let provisioner = provisioner(&store);

        let mut expected = Vec::new();
        for trust_mode in [TrustMode::SystemTrustStore, TrustMode::AcceptAllCertificates] {
            for topology in [Topology::Direct, Topology::Gateway] {
                let policy = TransportPolicy::new(trust_mode, topology);
                let mut req = request("cosmicworks");
                req.policy = policy;
                assert!(provisioner.provision(req).await.is_success());
                expected.push(policy);
            }
        }

        assert_eq!(store.policies(), expected);
        assert_eq!(store.mutations(), 1);
        assert_released(&store);
    }

    #[tokio::test]
    async fn concurrent_calls_each_own_a_session() {
        let store = MemoryStore::new();
        let provisioner = provisioner(&store);

        let calls = (0..8).map(|i| {
            let provisioner = provisioner.clone();
            tokio::spawn(async move {
                let name = format!("db-{}", i % 4);
                provisioner.provision(request(&name)).await
            })
        });

        let outcomes: Vec<_> = futures::future::join_all(calls)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let created = outcomes
            .iter()
            .filter(|o| matches!(o, ProvisionOutcome::Created { .. }))
            .count();
        assert_eq!(created, 4);
        assert!(outcomes.iter().all(ProvisionOutcome::is_success));
        assert_eq!(store.opens(), 8);
        assert_released(&store);
    }
}
