use serde::{Deserialize, Serialize};

/// Optional body of a provisioning request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionBody {
    /// Database to ensure; the configured `database.name` when absent
    #[serde(default)]
    pub database: Option<String>,
}

impl ProvisionBody {
    /// An empty body is the same as `{}`.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_uses_defaults() {
        assert!(ProvisionBody::parse(b"").unwrap().database.is_none());
        assert!(ProvisionBody::parse(b"  \n").unwrap().database.is_none());
        assert!(ProvisionBody::parse(b"{}").unwrap().database.is_none());
    }

    #[test]
    fn explicit_database_name() {
        let body = ProvisionBody::parse(br#"{"database": "inventory"}"#).unwrap();
        assert_eq!(body.database.as_deref(), Some("inventory"));
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(ProvisionBody::parse(b"{not json").is_err());
    }
}
