//! Store sessions over the account REST surface.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::auth::{http_date, MasterKeySigner};
use crate::error::ProvisionError;
use crate::profile::ConnectionProfile;
use crate::session::{ClientSession, DatabaseState, SessionFactory};
use crate::transport::{Topology, TransportPolicy};

const API_VERSION: &str = "2018-12-31";

/// Opens [`HttpSession`]s, building a fresh HTTP client for every session.
#[derive(Debug, Clone, Default)]
pub struct HttpSessionFactory;

impl HttpSessionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(
        &self,
        profile: &ConnectionProfile,
        policy: &TransportPolicy,
    ) -> Result<Box<dyn ClientSession>, ProvisionError> {
        let signer = MasterKeySigner::new(profile.access_key())?;
        let client = policy.build_client()?;

        let mut session = HttpSession {
            client: Some(client),
            signer,
            base: with_trailing_slash(profile.endpoint().clone()),
        };

        if policy.topology == Topology::Direct {
            session.base = session.write_endpoint().await?;
        }

        tracing::debug!(
            target: "connect-db",
            endpoint = %session.base,
            topology = ?policy.topology,
            trust_mode = ?policy.trust_mode,
            "client session opened"
        );

        Ok(Box::new(session))
    }
}

/// One authenticated HTTP session against a store account.
pub struct HttpSession {
    client: Option<reqwest::Client>,
    signer: MasterKeySigner,
    base: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseAccount {
    #[serde(default)]
    writable_locations: Vec<AccountLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountLocation {
    database_account_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpSession {
    /// Resolve the endpoint of the account's write region. Falls back to the
    /// configured endpoint when the account advertises none.
    async fn write_endpoint(&self) -> Result<Url, ProvisionError> {
        let response = self.send(Method::GET, "", "", "", None).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let account: DatabaseAccount = response.json().await?;
        match account.writable_locations.first() {
            Some(location) => Url::parse(&location.database_account_endpoint)
                .map(with_trailing_slash)
                .map_err(|err| ProvisionError::TransportFailure {
                    message: format!(
                        "account advertised an invalid write endpoint '{}'",
                        location.database_account_endpoint
                    ),
                    cause: Some(err.to_string()),
                }),
            None => Ok(self.base.clone()),
        }
    }

    async fn send(
        &self,
        method: Method,
        resource_type: &str,
        resource_link: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, ProvisionError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProvisionError::transport("session is closed"))?;

        let url = self.base.join(path).map_err(|err| ProvisionError::TransportFailure {
            message: format!("cannot address '{path}' under {}", self.base),
            cause: Some(err.to_string()),
        })?;
        let date = http_date(OffsetDateTime::now_utc())?;
        let authorization =
            self.signer
                .authorization(method.as_str(), resource_type, resource_link, &date)?;

        let mut request = client
            .request(method, url)
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl ClientSession for HttpSession {
    async fn create_database_if_not_exists(
        &mut self,
        id: &str,
    ) -> Result<DatabaseState, ProvisionError> {
        let link = format!("dbs/{id}");

        let response = self.send(Method::GET, "dbs", &link, &link, None).await?;
        match response.status() {
            StatusCode::OK => return Ok(DatabaseState::Existing),
            StatusCode::NOT_FOUND => {}
            _ => return Err(rejection(response).await),
        }

        let response = self
            .send(Method::POST, "dbs", "", "dbs", Some(json!({ "id": id })))
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(DatabaseState::Created),
            // Another caller created it between our read and write.
            StatusCode::CONFLICT => Ok(DatabaseState::Existing),
            _ => Err(rejection(response).await),
        }
    }

    fn close(&mut self) {
        self.client.take();
    }
}

async fn rejection(response: Response) -> ProvisionError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (code, detail) = match serde_json::from_str::<ServiceError>(&body) {
        Ok(err) => (err.code, err.message),
        Err(_) if body.trim().is_empty() => (None, None),
        Err(_) => (None, Some(body)),
    };

    let reason = code
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "unexpected status".to_string());

    ProvisionError::rejected(
        Some(status.as_u16()),
        format!("{reason} ({})", status.as_u16()),
        detail,
    )
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
