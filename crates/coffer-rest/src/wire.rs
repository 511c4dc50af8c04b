//! JSON bodies of the backend API and HTTP status mapping

use base64::{engine::general_purpose::STANDARD as VALUE_ENCODING, Engine};
use chrono::{DateTime, Utc};
use coffer_core::{ErrorKind, ProviderError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Body of `PUT /v1/secrets/{name}`
#[derive(Debug, Serialize)]
pub(crate) struct PutSecretBody<'a> {
    /// Base64 of the secret bytes
    pub(crate) value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) version: Option<&'a str>,
    pub(crate) tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<&'a str>,
}

/// Version record returned by a write
#[derive(Debug, Deserialize)]
pub(crate) struct VersionDto {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

/// Body of `GET /v1/secrets/{name}`
#[derive(Debug, Deserialize)]
pub(crate) struct SecretDto {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) value: String,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

impl SecretDto {
    pub(crate) fn decode_value(&self) -> Result<Vec<u8>, ProviderError> {
        VALUE_ENCODING.decode(&self.value).map_err(|e| {
            ProviderError::data_integrity(COMPONENT, "secret value is not valid base64")
                .with_context("name", self.name.as_str())
                .with_source(e)
        })
    }
}

/// One entry of `GET /v1/secrets`
#[derive(Debug, Deserialize)]
pub(crate) struct SummaryDto {
    pub(crate) name: String,
    pub(crate) latest_version: String,
    #[serde(default)]
    pub(crate) version_count: usize,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Body of `GET /v1/secrets`
#[derive(Debug, Deserialize)]
pub(crate) struct ListDto {
    #[serde(default)]
    pub(crate) secrets: Vec<SummaryDto>,
    #[serde(default)]
    pub(crate) next_page_token: Option<String>,
}

/// Body of `GET /v1/auth/token/self`
#[derive(Debug, Deserialize)]
pub(crate) struct TokenDto {
    #[serde(default)]
    pub(crate) display_name: Option<String>,
    #[serde(default)]
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

/// Body of `GET /v1/health`
#[derive(Debug, Deserialize)]
pub(crate) struct HealthDto {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) version: Option<String>,
}

/// Error body the backend may attach to non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDto {
    #[serde(alias = "message")]
    pub(crate) error: String,
}

pub(crate) const COMPONENT: &str = "rest";

pub(crate) fn encode_value(bytes: &[u8]) -> String {
    VALUE_ENCODING.encode(bytes)
}

/// Error kind for a non-success status
pub(crate) fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 413 | 422 => ErrorKind::InvalidConfig,
        401 | 403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        429 => ErrorKind::Throttled,
        502..=504 => ErrorKind::Unavailable,
        400..=499 => ErrorKind::InvalidConfig,
        _ => ErrorKind::Internal,
    }
}

/// Error for a non-success response, using the backend message when present
pub(crate) fn status_error(status: StatusCode, body: &str, operation: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorDto>(body)
        .map(|dto| dto.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unexpected status").to_string());
    ProviderError::new(
        kind_for_status(status),
        COMPONENT,
        format!("backend returned {} during {}: {}", status.as_u16(), operation, detail),
    )
    .with_context("status", status.as_u16().to_string())
    .with_context("operation", operation)
}

/// Error for a failed exchange that produced no response
pub(crate) fn transport_error(err: reqwest::Error, operation: &str) -> ProviderError {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Internal
    };
    ProviderError::new(kind, COMPONENT, format!("request failed during {}: {}", operation, err))
        .with_context("operation", operation)
        .with_context("timeout", err.is_timeout().to_string())
        .with_source(err)
}
