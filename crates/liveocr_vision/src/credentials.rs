//! Service-account credentials and OAuth2 JWT-bearer assertions.

use crate::error::{OcrError, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// OAuth scope needed for `images:annotate`.
pub const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";

/// Lifetime requested for each signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account JSON key file that the client uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default, rename = "type")]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Load a key file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| OcrError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse a key from its JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| OcrError::Credentials(format!("invalid key file: {e}")))?;

        if let Some(kind) = key.key_type.as_deref() {
            if kind != "service_account" {
                return Err(OcrError::Credentials(format!(
                    "expected a service_account key, got '{kind}'"
                )));
            }
        }
        if key.client_email.trim().is_empty() {
            return Err(OcrError::Credentials("client_email is empty".to_string()));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

/// Signs JWT-bearer assertions for one service account.
pub(crate) struct AssertionSigner {
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
}

impl AssertionSigner {
    pub fn new(key: &ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| OcrError::Credentials(format!("invalid private key: {e}")))?;
        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            key_id: key.private_key_id.clone(),
            encoding_key,
        })
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub fn claims(&self, audience: &str, issued_at: u64) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: VISION_SCOPE.to_string(),
            aud: audience.to_string(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Sign a fresh assertion addressed to `audience`.
    pub fn sign(&self, audience: &str) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        let claims = self.claims(audience, unix_now());
        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
