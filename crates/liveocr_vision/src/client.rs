//! Cloud Vision REST client.
//!
//! Uses raw HTTP requests (no SDK): a JWT-bearer token exchange against the
//! key file's token endpoint, then `images:annotate` with TEXT_DETECTION.

use crate::credentials::{AssertionSigner, ServiceAccountKey};
use crate::error::{OcrError, Result};
use crate::{TextAnnotation, TextDetector};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_API_BASE: &str = "https://vision.googleapis.com";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Cached tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Longer lifetimes from the token endpoint are cut down to this.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Where requests go. Production uses the defaults; tests point both at a
/// local listener.
#[derive(Debug, Clone)]
pub struct VisionEndpoints {
    pub api_base: String,
    /// Overrides the key file's `token_uri` when set.
    pub token_uri: Option<String>,
}

impl Default for VisionEndpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_uri: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Whole-request timeout applied to both token and annotate calls.
    pub timeout: Duration,
    pub endpoints: VisionEndpoints,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            endpoints: VisionEndpoints::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchAnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl BatchAnnotateRequest {
    fn text_detection(image: &[u8]) -> Self {
        Self {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Authenticated Cloud Vision client.
///
/// Built once at startup; the access token is fetched on first use and
/// refreshed shortly before it expires.
pub struct VisionClient {
    http: reqwest::blocking::Client,
    signer: AssertionSigner,
    token_uri: String,
    annotate_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl VisionClient {
    /// Build a client from a service-account key file.
    pub fn from_key_file(path: &Path, config: VisionConfig) -> Result<Self> {
        let key = ServiceAccountKey::from_file(path)?;
        Self::new(&key, config)
    }

    pub fn new(key: &ServiceAccountKey, config: VisionConfig) -> Result<Self> {
        let signer = AssertionSigner::new(key)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let token_uri = config
            .endpoints
            .token_uri
            .clone()
            .unwrap_or_else(|| signer.token_uri().to_string());
        let annotate_url = format!(
            "{}/v1/images:annotate",
            config.endpoints.api_base.trim_end_matches('/')
        );

        tracing::debug!(
            client_email = %key.client_email,
            annotate_url = %annotate_url,
            "Vision client configured"
        );

        Ok(Self {
            http,
            signer,
            token_uri,
            annotate_url,
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token()?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn invalidate_token(&self) {
        let mut cached = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    fn request_token(&self) -> Result<AccessToken> {
        let assertion = self.signer.sign(&self.token_uri)?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        tracing::debug!(token_uri = %self.token_uri, "Requesting access token");

        let requested_at = Instant::now();
        let response = self.http.post(&self.token_uri).form(&params).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(OcrError::Token {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| OcrError::Decode(format!("token response: {e}")))?;
        let lifetime = Duration::from_secs(token.expires_in).min(MAX_TOKEN_LIFETIME);
        let expires_at = requested_at.checked_add(lifetime).ok_or_else(|| {
            OcrError::Decode(format!("token lifetime out of range: {}s", token.expires_in))
        })?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }

    fn annotate(&self, image: &[u8]) -> Result<Vec<TextAnnotation>> {
        let token = self.access_token()?;
        let body = BatchAnnotateRequest::text_detection(image);

        let response = self
            .http
            .post(&self.annotate_url)
            .bearer_auth(token)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.invalidate_token();
            }
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(OcrError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let batch: BatchAnnotateResponse = response
            .json()
            .map_err(|e| OcrError::Decode(format!("annotate response: {e}")))?;
        let first = batch
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Decode("annotate response has no entries".to_string()))?;

        if let Some(err) = first.error {
            return Err(OcrError::Api {
                status: status.as_u16(),
                message: format!("code {}: {}", err.code, err.message),
            });
        }

        Ok(first
            .text_annotations
            .into_iter()
            .map(|a| TextAnnotation {
                text: a.description,
                locale: a.locale,
            })
            .collect())
    }
}

impl TextDetector for VisionClient {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>> {
        let started = Instant::now();
        let annotations = self.annotate(image)?;
        tracing::debug!(
            bytes = image.len(),
            annotations = annotations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Text detection finished"
        );
        Ok(annotations)
    }
}
