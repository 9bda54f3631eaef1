//! NiceHash HTTP API clients.
//!
//! [`PublicClient`] issues unauthenticated requests (exchange rates);
//! [`PrivateClient`] signs every request per [`signer`] and attaches the
//! authentication headers. Both decode JSON response bodies and map any
//! non-2xx status to [`ApiError::Status`], preserving the status code,
//! reason phrase, and raw body for diagnostics. A request is a single
//! attempt; retry policy belongs to callers.
//!
//! The coordinators depend on the [`MiningApi`] and [`RatesApi`] traits
//! rather than the concrete clients, so tests can substitute mocks.

pub mod signer;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::control::DeviceAction;
use crate::tracing::prelude::*;

pub use signer::Credentials;

/// Base URL of the NiceHash API.
pub const API_BASE_URL: &str = "https://api2.nicehash.com";

/// Default page size for payout-history requests.
pub const DEFAULT_PAYOUT_PAGE: u32 = 84;

/// Per-request timeout applied to both clients.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the HTTP transport layer.
///
/// The API reports authentication failures as plain HTTP statuses with
/// no distinct error code, so they surface as [`ApiError::Status`] like
/// any other rejection.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response. Status, reason, and raw body are preserved.
    #[error("HTTP {status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    /// Connection, timeout, or protocol failure below the HTTP layer.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request body failed to serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Private-API operations the coordinators and the command interface
/// depend on.
#[async_trait]
pub trait MiningApi: Send + Sync {
    /// Account balances for the organization.
    async fn accounts(&self) -> Result<Value, ApiError>;

    /// All mining rigs with per-device telemetry.
    async fn mining_rigs(&self) -> Result<Value, ApiError>;

    /// Detail for a single rig.
    async fn mining_rig(&self, rig_id: &str) -> Result<Value, ApiError>;

    /// A page of recent payout records.
    async fn rig_payouts(&self, size: u32) -> Result<Value, ApiError>;

    /// Request a mining-state change for one device of one rig.
    async fn set_device_state(
        &self,
        rig_id: &str,
        device_id: &str,
        action: DeviceAction,
    ) -> Result<Value, ApiError>;
}

/// Public-API exchange-rate lookup.
#[async_trait]
pub trait RatesApi: Send + Sync {
    /// The raw exchange-rate list (every currency pair).
    async fn exchange_rates(&self) -> Result<Value, ApiError>;
}

/// Unauthenticated client for public endpoints.
pub struct PublicClient {
    http: HttpClient,
    base_url: String,
}

impl PublicClient {
    /// Create a client for the production API host.
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL.to_string())
    }

    /// Create a client for a specific base URL.
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: build_http(),
            base_url,
        }
    }

    /// Issue an unauthenticated request and decode the JSON response.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = join_url(&self.base_url, path, query);
        debug!(%url, "public request");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(serde_json::to_string(body)?);
        }

        decode(request.send().await?).await
    }
}

impl Default for PublicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RatesApi for PublicClient {
    async fn exchange_rates(&self) -> Result<Value, ApiError> {
        let data = self
            .request(Method::GET, "/main/api/v2/exchangeRate/list", None, None)
            .await?;
        Ok(data.get("list").cloned().unwrap_or_else(|| json!([])))
    }
}

/// Signed client for private endpoints.
pub struct PrivateClient {
    http: HttpClient,
    base_url: String,
    credentials: Arc<Credentials>,
}

impl PrivateClient {
    /// Create a client for the production API host.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, API_BASE_URL.to_string())
    }

    /// Create a client for a specific base URL.
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Self {
        Self {
            http: build_http(),
            base_url,
            credentials: Arc::new(credentials),
        }
    }

    /// Issue a signed request and decode the JSON response.
    ///
    /// Each call signs with the current time and a fresh nonce; a
    /// [`signer::digest`] value is never reused across requests.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let query = query.unwrap_or("");
        let time_ms = epoch_millis();
        let nonce = Uuid::new_v4().to_string();
        let body = body.map(serde_json::to_string).transpose()?;

        let digest = signer::digest(
            &self.credentials,
            method.as_str(),
            path,
            query,
            body.as_deref(),
            time_ms,
            &nonce,
        );

        let url = join_url(&self.base_url, path, Some(query));
        debug!(%url, "private request");

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Time", time_ms.to_string())
            .header("X-Nonce", &nonce)
            .header("X-Auth", signer::auth_header(&self.credentials, &digest))
            .header("X-Organization-Id", &self.credentials.organization_id)
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        decode(request.send().await?).await
    }
}

#[async_trait]
impl MiningApi for PrivateClient {
    async fn accounts(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, "/main/api/v2/accounting/accounts2", None, None)
            .await
    }

    async fn mining_rigs(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, "/main/api/v2/mining/rigs2", None, None)
            .await
    }

    async fn mining_rig(&self, rig_id: &str) -> Result<Value, ApiError> {
        let path = format!("/main/api/v2/mining/rig2/{rig_id}");
        self.request(Method::GET, &path, None, None).await
    }

    async fn rig_payouts(&self, size: u32) -> Result<Value, ApiError> {
        let query = format!("size={size}");
        self.request(
            Method::GET,
            "/main/api/v2/mining/rigs/payouts",
            Some(&query),
            None,
        )
        .await
    }

    async fn set_device_state(
        &self,
        rig_id: &str,
        device_id: &str,
        action: DeviceAction,
    ) -> Result<Value, ApiError> {
        let body = json!({
            "rigId": rig_id,
            "deviceId": device_id,
            "action": action.to_string(),
        });
        self.request(
            Method::POST,
            "/main/api/v2/mining/rigs/status2",
            None,
            Some(&body),
        )
        .await
    }
}

fn build_http() -> HttpClient {
    HttpClient::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("failed to create HTTP client")
}

fn join_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{base}{path}?{query}"),
        _ => format!("{base}{path}"),
    }
}

/// Current time as epoch milliseconds.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Decode a response, mapping non-2xx statuses to [`ApiError::Status`].
async fn decode(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        reason,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_appends_query_only_when_present() {
        assert_eq!(join_url("https://h", "/p", None), "https://h/p");
        assert_eq!(join_url("https://h", "/p", Some("")), "https://h/p");
        assert_eq!(
            join_url("https://h", "/p", Some("size=42")),
            "https://h/p?size=42"
        );
    }

    #[test]
    fn status_error_preserves_diagnostics() {
        let err = ApiError::Status {
            status: 403,
            reason: "Forbidden".to_string(),
            body: "{\"error\":\"bad key\"}".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("403"));
        assert!(rendered.contains("Forbidden"));
        assert!(rendered.contains("bad key"));
    }
}
