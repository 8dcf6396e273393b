//! Result of a provisioning call as reported to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProvisionError};

/// Where a provisioning attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Resolving the connection profile from configuration.
    Configuration,
    /// Checking the name, opening the session or issuing the create call.
    Provision,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Provision => "provision",
        };
        f.write_str(name)
    }
}

/// Result of a single provisioning invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Created {
        id: String,
    },
    AlreadyExists {
        id: String,
    },
    Failed {
        stage: Stage,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl ProvisionOutcome {
    /// True for `Created` and `AlreadyExists`
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Database id for successful outcomes
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Created { id } | Self::AlreadyExists { id } => Some(id),
            Self::Failed { .. } => None,
        }
    }
}

impl From<ProvisionError> for ProvisionOutcome {
    fn from(err: ProvisionError) -> Self {
        Self::Failed {
            stage: err.stage(),
            cause: err.cause(),
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for ProvisionOutcome {
    fn from(err: ConfigError) -> Self {
        Self::Failed {
            stage: Stage::Configuration,
            message: err.to_string(),
            cause: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_outcome_tag() {
        let created = ProvisionOutcome::Created {
            id: "cosmicworks".into(),
        };
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"outcome": "created", "id": "cosmicworks"})
        );

        let failed = ProvisionOutcome::from(ConfigError::MissingField("accessKey"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "outcome": "failed",
                "stage": "configuration",
                "message": "MissingField: accessKey"
            })
        );
    }

    #[test]
    fn failed_outcome_keeps_the_cause() {
        let outcome = ProvisionOutcome::from(ProvisionError::TransportFailure {
            message: "error sending request".into(),
            cause: Some("connection refused".into()),
        });

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
    }

    #[test]
    fn success_accessors() {
        let outcome = ProvisionOutcome::AlreadyExists { id: "db".into() };
        assert!(outcome.is_success());
        assert_eq!(outcome.id(), Some("db"));
    }
}
