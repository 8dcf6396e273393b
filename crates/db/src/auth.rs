//! Master-key request signing.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

use crate::error::ProvisionError;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as the service expects in `x-ms-date`.
const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Signs requests with an account master key.
#[derive(Clone)]
pub struct MasterKeySigner {
    key: Vec<u8>,
}

impl MasterKeySigner {
    /// The account key is distributed base64-encoded; a key that does not
    /// decode can never authenticate.
    pub fn new(access_key: &str) -> Result<Self, ProvisionError> {
        let key = STANDARD.decode(access_key.trim()).map_err(|err| {
            ProvisionError::rejected(
                None,
                "access key is not a valid base64 master key",
                Some(err.to_string()),
            )
        })?;
        Ok(Self { key })
    }

    /// URL-encoded `authorization` header value for one request.
    ///
    /// `resource_link` is case sensitive and excludes the leading slash.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, ProvisionError> {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| ProvisionError::rejected(None, "unusable master key", Some(err.to_string())))?;
        mac.update(payload.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={signature}");
        Ok(url::form_urlencoded::byte_serialize(token.as_bytes()).collect())
    }
}

/// Current time formatted for `x-ms-date`.
pub fn http_date(now: OffsetDateTime) -> Result<String, ProvisionError> {
    now.format(HTTP_DATE)
        .map_err(|err| ProvisionError::transport(format!("failed to format request date: {err}")))
}
