//! Service-account credential document and OAuth assertion signing.

use crate::error::{CloudError, CloudResult};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lessonsync_vault::Credential;
use serde::{Deserialize, Deserializer, Serialize};
use zeroize::Zeroizing;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for each assertion; the token endpoint caps it at one hour.
const ASSERTION_TTL_SECS: i64 = 3600;

pub(crate) const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a service-account JSON document that authentication needs.
///
/// Deliberately not `Debug`: it holds the private key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    pub client_email: String,
    #[serde(deserialize_with = "secret_string")]
    pub private_key: Zeroizing<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn secret_string<'de, D: Deserializer<'de>>(d: D) -> Result<Zeroizing<String>, D::Error> {
    String::deserialize(d).map(Zeroizing::new)
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// Parses the decrypted credential. Anything unusable is an auth failure.
    pub fn from_credential(credential: &Credential) -> CloudResult<Self> {
        let key: Self = serde_json::from_slice(credential.as_bytes())
            .map_err(|e| CloudError::AuthFailed(format!("malformed credential document: {e}")))?;

        if let Some(kind) = key.account_type.as_deref() {
            if kind != "service_account" {
                return Err(CloudError::AuthFailed(format!(
                    "unsupported credential type {kind}"
                )));
            }
        }
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(CloudError::AuthFailed(
                "credential document is missing client_email or private_key".into(),
            ));
        }
        Ok(key)
    }

    /// Signs an RS256 assertion for `scope`, valid from now.
    pub fn sign_assertion(&self, scope: &str) -> CloudResult<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| CloudError::AuthFailed(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| CloudError::AuthFailed(format!("signing assertion failed: {e}")))
    }
}
