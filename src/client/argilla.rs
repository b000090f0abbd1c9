//! HTTP client for the Argilla v1 REST API.
//!
//! Epistemic foundation:
//! - K_i: Argilla authenticates with the `X-Argilla-Api-Key` header
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//! - I^B: Network availability unknowable → retry idempotent calls with backoff

use crate::client::{
    DatasetMetrics, DatasetModel, FeedbackApi, MetadataPropertyUpdate, RecordsQuery, Workspace,
};
use crate::models::{
    ApiError, FeedbackError, MetadataProperty, RecordPayload, RecordUpdatePayload, RecordsPage,
    RemoteField, RemoteMetadataProperty, RemoteQuestion, ServerConfig, User,
};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const API_KEY_HEADER: &str = "X-Argilla-Api-Key";
const WORKSPACE_HEADER: &str = "X-Argilla-Workspace";

/// List envelope used by most collection endpoints.
#[derive(Debug, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Debug, Serialize)]
struct ItemsBody<T> {
    items: Vec<T>,
}

/// Error body (`{"detail": ...}`), detail may be a string or an object.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    detail: serde_json::Value,
}

/// Low-level HTTP plumbing shared by all endpoints.
///
/// Features:
/// - Auth and workspace headers on every request
/// - Retry with exponential backoff for GET and DELETE
/// - Status → `ApiError` mapping
pub struct HttpTransport {
    client: reqwest::Client,
    /// Base URL without trailing slash
    base_url: String,
    headers: HeaderMap,
    /// Request timeout
    timeout: Duration,
    /// Maximum attempts for idempotent requests
    max_retries: u32,
}

impl HttpTransport {
    /// Create a new transport.
    pub fn new(
        base_url: &str,
        api_key: &str,
        workspace: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, ApiError> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-argilla-api-key"),
            HeaderValue::from_str(api_key).map_err(|_| {
                ApiError::InvalidResponse(format!("{API_KEY_HEADER} contains invalid characters"))
            })?,
        );
        if let Some(workspace) = workspace {
            headers.insert(
                HeaderName::from_static("x-argilla-workspace"),
                HeaderValue::from_str(workspace).map_err(|_| {
                    ApiError::InvalidResponse(format!(
                        "{WORKSPACE_HEADER} contains invalid characters"
                    ))
                })?,
            );
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            timeout,
            max_retries: max_retries.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .headers(self.headers.clone())
    }

    /// Send a request and decode the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.execute(method, path, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse response from {path}: {e}"))
            })
    }

    /// Send a request and ignore the body.
    async fn send_unit(
        &self,
        method: Method,
        path: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<(), ApiError> {
        self.execute(method, path, build).await.map(|_| ())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let idempotent = matches!(method, Method::GET | Method::DELETE);
        let attempts = if idempotent { self.max_retries } else { 1 };
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..attempts {
            let start = Instant::now();
            let result = build(self.request(method.clone(), path)).send().await;

            let error = match result {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        %method,
                        path,
                        status = response.status().as_u16(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                    return Ok(response);
                }
                Ok(response) => Self::status_error(response).await,
                Err(e) if e.is_timeout() => ApiError::Timeout(self.timeout),
                Err(e) => ApiError::Network(e),
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt + 1 < attempts {
                let backoff = Duration::from_secs(2u64.pow(attempt));
                debug!(
                    %method,
                    path,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %error,
                    "Retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(error);
        }

        match last_error {
            Some(error) if attempts == 1 => Err(error),
            Some(error) => Err(ApiError::MaxRetriesExceeded {
                attempts,
                last_error: error.to_string(),
            }),
            None => Err(ApiError::MaxRetriesExceeded {
                attempts,
                last_error: "Unknown error".to_string(),
            }),
        }
    }

    async fn status_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(ApiErrorResponse {
                detail: serde_json::Value::String(message),
            }) => message,
            Ok(ApiErrorResponse { detail }) => detail.to_string(),
            Err(_) => body,
        };

        match status {
            401 => ApiError::AuthenticationFailed,
            404 => ApiError::NotFound(detail),
            _ => ApiError::Status { status, detail },
        }
    }

    /// Health check: ping the status endpoint.
    ///
    /// K_i: endpoint is reachable and responding
    /// B_i: server is healthy if /api/_status returns 200
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        match self
            .request(Method::GET, "/api/_status")
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if response.status().is_success() {
                    HealthCheckResult {
                        endpoint: self.base_url.clone(),
                        status: HealthStatus::Healthy,
                        latency_ms: Some(latency_ms),
                        error: None,
                    }
                } else {
                    HealthCheckResult {
                        endpoint: self.base_url.clone(),
                        status: HealthStatus::Unhealthy,
                        latency_ms: Some(latency_ms),
                        error: Some(format!("HTTP {}", response.status().as_u16())),
                    }
                }
            }
            Err(e) => HealthCheckResult {
                endpoint: self.base_url.clone(),
                status: HealthStatus::Unreachable,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Authenticated Argilla client.
///
/// The user (and with it the role used by the mutation guard) is resolved once
/// in [`ArgillaClient::connect`] and never re-fetched.
pub struct ArgillaClient {
    http: HttpTransport,
    user: User,
}

impl ArgillaClient {
    /// Connect using server settings and an API key, resolving the current user.
    pub async fn connect(server: &ServerConfig, api_key: &str) -> Result<Self, FeedbackError> {
        let http = HttpTransport::new(
            &server.api_url,
            api_key,
            server.workspace.as_deref(),
            server.timeout_secs,
            server.max_retries,
        )
        .map_err(|e| FeedbackError::remote("Failed to build the HTTP client", e))?;

        Self::from_transport(http).await
    }

    /// Resolve the current user over an existing transport.
    pub async fn from_transport(http: HttpTransport) -> Result<Self, FeedbackError> {
        let user: User = http
            .send(Method::GET, "/api/me", |r| r)
            .await
            .map_err(|e| FeedbackError::remote("Failed to authenticate against Argilla", e))?;

        debug!(username = %user.username, role = %user.role, "Connected to Argilla");
        Ok(Self { http, user })
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.http
    }
}

#[async_trait]
impl FeedbackApi for ArgillaClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn current_user(&self) -> &User {
        &self.user
    }

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<DatasetModel, ApiError> {
        self.http
            .send(Method::GET, &format!("/api/v1/datasets/{dataset_id}"), |r| r)
            .await
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Workspace, ApiError> {
        self.http
            .send(Method::GET, &format!("/api/v1/workspaces/{workspace_id}"), |r| r)
            .await
    }

    async fn list_fields(&self, dataset_id: Uuid) -> Result<Vec<RemoteField>, ApiError> {
        let page: Items<RemoteField> = self
            .http
            .send(Method::GET, &format!("/api/v1/datasets/{dataset_id}/fields"), |r| r)
            .await?;
        Ok(page.items)
    }

    async fn list_questions(&self, dataset_id: Uuid) -> Result<Vec<RemoteQuestion>, ApiError> {
        let page: Items<RemoteQuestion> = self
            .http
            .send(Method::GET, &format!("/api/v1/datasets/{dataset_id}/questions"), |r| r)
            .await?;
        Ok(page.items)
    }

    async fn get_metrics(&self, dataset_id: Uuid) -> Result<DatasetMetrics, ApiError> {
        self.http
            .send(Method::GET, &format!("/api/v1/datasets/{dataset_id}/metrics"), |r| r)
            .await
    }

    async fn get_records(
        &self,
        dataset_id: Uuid,
        query: &RecordsQuery,
    ) -> Result<RecordsPage, ApiError> {
        let pairs = query.to_query_pairs();
        self.http
            .send(Method::GET, &format!("/api/v1/datasets/{dataset_id}/records"), |r| {
                r.query(&pairs)
            })
            .await
    }

    async fn add_records(
        &self,
        dataset_id: Uuid,
        records: Vec<RecordPayload>,
    ) -> Result<(), ApiError> {
        let body = ItemsBody { items: records };
        self.http
            .send_unit(Method::POST, &format!("/api/v1/datasets/{dataset_id}/records"), |r| {
                r.json(&body)
            })
            .await
    }

    async fn update_records(
        &self,
        dataset_id: Uuid,
        records: Vec<RecordUpdatePayload>,
    ) -> Result<(), ApiError> {
        let body = ItemsBody { items: records };
        self.http
            .send_unit(Method::PATCH, &format!("/api/v1/datasets/{dataset_id}/records"), |r| {
                r.json(&body)
            })
            .await
    }

    async fn delete_records(
        &self,
        dataset_id: Uuid,
        record_ids: Vec<Uuid>,
    ) -> Result<(), ApiError> {
        let ids = record_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.http
            .send_unit(Method::DELETE, &format!("/api/v1/datasets/{dataset_id}/records"), |r| {
                r.query(&[("ids", ids.as_str())])
            })
            .await
    }

    async fn list_metadata_properties(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<RemoteMetadataProperty>, ApiError> {
        let page: Items<RemoteMetadataProperty> = self
            .http
            .send(
                Method::GET,
                &format!("/api/v1/datasets/{dataset_id}/metadata-properties"),
                |r| r,
            )
            .await?;
        Ok(page.items)
    }

    async fn add_metadata_property(
        &self,
        dataset_id: Uuid,
        property: &MetadataProperty,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.http
            .send(
                Method::POST,
                &format!("/api/v1/datasets/{dataset_id}/metadata-properties"),
                |r| r.json(property),
            )
            .await
    }

    async fn update_metadata_property(
        &self,
        property_id: Uuid,
        update: &MetadataPropertyUpdate,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.http
            .send(
                Method::PATCH,
                &format!("/api/v1/metadata-properties/{property_id}"),
                |r| r.json(update),
            )
            .await
    }

    async fn delete_metadata_property(
        &self,
        property_id: Uuid,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.http
            .send(
                Method::DELETE,
                &format!("/api/v1/metadata-properties/{property_id}"),
                |r| r,
            )
            .await
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<(), ApiError> {
        self.http
            .send_unit(Method::DELETE, &format!("/api/v1/datasets/{dataset_id}"), |r| r)
            .await
    }
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Server base URL
    pub endpoint: String,
    /// Health status
    pub status: HealthStatus,
    /// Latency in milliseconds (if reachable)
    pub latency_ms: Option<u64>,
    /// Error message (if unhealthy or unreachable)
    pub error: Option<String>,
}

/// Health status of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Server is responding normally
    Healthy,
    /// Server is responding but with errors
    Unhealthy,
    /// Server is not reachable
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}
