pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use connect_db::{ProvisionOutcome, Provisioner, SessionFactory, Stage, TransportPolicy};
use connect_http::error::AppError;
use connect_kernel::settings::DatabaseSettings;
use connect_kernel::{InitCtx, Module, SharedSource};

use models::ProvisionBody;

/// Shared handler state. Holds no per-request data: every request resolves
/// the profile anew and gets its own store session.
#[derive(Clone)]
pub struct CosmosState {
    provisioner: Provisioner,
    source: SharedSource,
    database: String,
    policy: TransportPolicy,
    timeout_ms: u64,
}

impl CosmosState {
    pub fn new(
        settings: &DatabaseSettings,
        source: SharedSource,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            provisioner: Provisioner::from_settings(factory, settings),
            source,
            database: settings.name.clone(),
            policy: TransportPolicy::from(settings),
            timeout_ms: settings.timeout_ms,
        }
    }
}

/// Exposes the database bootstrap over HTTP
pub struct CosmosModule {
    state: CosmosState,
}

impl CosmosModule {
    pub fn new(state: CosmosState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for CosmosModule {
    fn name(&self) -> &'static str {
        "cosmos"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            database = %self.state.database,
            timeout_ms = self.state.timeout_ms,
            "cosmos module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(provision_database))
            .route("/health", get(health_check))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error_response = |description: &str| {
            serde_json::json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };

        Some(serde_json::json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Ensure the database exists",
                        "tags": ["Cosmos"],
                        "requestBody": {
                            "required": false,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ProvisionBody" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Database created or already present",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ProvisionOutcome" }
                                    }
                                }
                            },
                            "400": error_response("Malformed request body"),
                            "500": error_response("Connection profile incomplete"),
                            "502": error_response("Invalid name, store unreachable or request rejected"),
                            "504": error_response("Store did not answer in time")
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Cosmos module health check",
                        "tags": ["Cosmos"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "text/plain": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "ProvisionBody": {
                        "type": "object",
                        "properties": {
                            "database": {
                                "type": "string",
                                "description": "Database to ensure; defaults to the configured name"
                            }
                        }
                    },
                    "ProvisionOutcome": {
                        "type": "object",
                        "properties": {
                            "outcome": {
                                "type": "string",
                                "enum": ["created", "already_exists", "failed"]
                            },
                            "id": { "type": "string" },
                            "stage": {
                                "type": "string",
                                "enum": ["configuration", "provision"]
                            },
                            "message": { "type": "string" },
                            "cause": { "type": "string" }
                        },
                        "required": ["outcome"]
                    }
                }
            }
        }))
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "cosmos module is healthy"
}

/// Provision the requested (or configured) database
async fn provision_database(
    State(state): State<CosmosState>,
    body: Bytes,
) -> Result<Json<ProvisionOutcome>, AppError> {
    let body = ProvisionBody::parse(&body)
        .map_err(|err| AppError::bad_request(format!("invalid request body: {err}")))?;
    let database = body.database.unwrap_or_else(|| state.database.clone());

    let outcome = state
        .provisioner
        .provision_from(state.source.as_ref(), &database, state.policy)
        .await;

    outcome_response(outcome)
}

fn outcome_response(outcome: ProvisionOutcome) -> Result<Json<ProvisionOutcome>, AppError> {
    let (stage, message) = match &outcome {
        ProvisionOutcome::Created { .. } | ProvisionOutcome::AlreadyExists { .. } => {
            return Ok(Json(outcome));
        }
        ProvisionOutcome::Failed { stage, message, .. } => (*stage, message.clone()),
    };

    let details = vec![serde_json::to_value(&outcome).unwrap_or_default()];
    Err(match stage {
        Stage::Configuration => AppError::misconfigured(details, message),
        Stage::Provision if message == "timeout" => AppError::gateway_timeout(details, message),
        Stage::Provision => AppError::bad_gateway(details, message),
    })
}

/// Create the cosmos module
pub fn create_module(
    settings: &DatabaseSettings,
    source: SharedSource,
    factory: Arc<dyn SessionFactory>,
) -> Arc<dyn Module> {
    Arc::new(CosmosModule::new(CosmosState::new(settings, source, factory)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use connect_db::memory::{Fault, MemoryStore};
    use connect_db::profile::{ACCOUNT_ENDPOINT_KEY, AUTH_KEY_KEY};
    use connect_kernel::settings::Settings;
    use connect_kernel::ModuleRegistry;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn source(auth_key: &str) -> SharedSource {
        let map: HashMap<String, String> = [
            (ACCOUNT_ENDPOINT_KEY.to_string(), "https://localhost:8081/".to_string()),
            (AUTH_KEY_KEY.to_string(), auth_key.to_string()),
        ]
        .into_iter()
        .collect();
        Arc::new(map)
    }

    fn app(store: &MemoryStore, source: SharedSource) -> Router {
        let mut settings = Settings::default();
        settings.database.timeout_ms = 100;

        let mut registry = ModuleRegistry::new();
        registry.register_custom(create_module(
            &settings.database,
            source,
            Arc::new(store.clone()),
        ));
        connect_http::build_router(&registry, &settings)
    }

    async fn post(router: &Router, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/cosmos")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn post_creates_then_reports_existing() {
        let store = MemoryStore::new();
        let router = app(&store, source("c2VjcmV0"));

        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"outcome": "created", "id": "cosmicworks"}));

        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"outcome": "already_exists", "id": "cosmicworks"})
        );

        assert_eq!(store.mutations(), 1);
        assert_eq!(store.opens(), store.closes());
    }

    #[tokio::test]
    async fn body_selects_the_database() {
        let store = MemoryStore::new();
        let router = app(&store, source("c2VjcmV0"));

        let (status, body) = post(&router, r#"{"database": "inventory"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "inventory");
        assert!(store.contains("inventory"));
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let store = MemoryStore::new();
        let router = app(&store, source(""));

        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "configuration_error");
        assert_eq!(body["error"]["details"][0]["stage"], "configuration");
        assert_eq!(body["error"]["details"][0]["message"], "MissingField: accessKey");
        assert_eq!(store.opens(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_is_a_bad_gateway() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Unreachable));
        let router = app(&store, source("c2VjcmV0"));

        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("TransportFailure"));
        assert_eq!(body["error"]["details"][0]["cause"], "connection refused");
    }

    #[tokio::test]
    async fn slow_store_is_a_gateway_timeout() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Hang));
        let router = app(&store, source("c2VjcmV0"));

        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["message"], "timeout");
        assert_eq!(store.opens(), store.closes());
    }

    #[tokio::test]
    async fn invalid_name_fails_provisioning_and_bad_body_is_rejected() {
        let store = MemoryStore::new();
        let router = app(&store, source("c2VjcmV0"));

        let (status, body) = post(&router, r#"{"database": "a/b"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["details"][0]["stage"], "provision");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("InvalidName: "));

        let (status, body) = post(&router, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(store.opens(), 0);
    }

    #[tokio::test]
    async fn host_keeps_serving_after_failures() {
        let store = MemoryStore::new();
        store.set_fault(Some(Fault::Panic));
        let router = app(&store, source("c2VjcmV0"));

        let (status, _) = post(&router, "").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        store.set_fault(None);
        let (status, body) = post(&router, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "created");
    }

    #[test]
    fn openapi_documents_the_trigger() {
        let store = MemoryStore::new();
        let module = create_module(&DatabaseSettings::default(), source("k"), Arc::new(store));
        let spec = module.openapi().unwrap();
        assert!(spec["paths"]["/"]["post"]["responses"]["504"].is_object());
        assert!(spec["components"]["schemas"]["ProvisionOutcome"].is_object());
    }
}
