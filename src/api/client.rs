//! HTTP client for the learning platform.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::ServerConfig;
use crate::error::{DeliveryError, LearnsyncError};
use crate::features::queue::{ActionSink, QueuedAction};
use crate::features::reconcile::{
    ProgressSnapshot, ServerStatus, SyncServer, VerifyOutcome, VerifyRequest,
};

const STATUS_PATH: &str = "/api/sync/status";
const ITEMS_PATH: &str = "/api/sync/items";
const VERIFY_PATH: &str = "/api/sync/verify";

/// Longest response body kept in a delivery error.
const MAX_ERROR_BODY: usize = 200;

/// Client for the submission routes and the sync endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client from server settings.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, LearnsyncError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LearnsyncError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Replace the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// The server's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the server is reachable.
    ///
    /// Any answer from the status endpoint, even an error status, counts as
    /// connectivity.
    pub async fn probe(&self) -> bool {
        match self.request(Method::GET, STATUS_PATH).send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "probe answered");
                true
            },
            Err(e) => {
                tracing::debug!(error = %e, "probe failed");
                false
            },
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LearnsyncError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| LearnsyncError::SyncFetchFailed(e.to_string()))?;

        let response = ensure_success(response)
            .await
            .map_err(|e| LearnsyncError::SyncFetchFailed(e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| LearnsyncError::SyncFetchFailed(format!("Failed to parse {path}: {e}")))
    }
}

#[async_trait]
impl ActionSink for ApiClient {
    async fn deliver(&self, action: &QueuedAction) -> Result<(), DeliveryError> {
        let body = action
            .submission_body()
            .map_err(|e| DeliveryError::Network(format!("Failed to encode payload: {e}")))?;

        let response = self
            .request(Method::POST, action.kind().route())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        ensure_success(response).await.map(|_| ())
    }
}

#[async_trait]
impl SyncServer for ApiClient {
    async fn status(&self) -> Result<ServerStatus, LearnsyncError> {
        self.get_json(STATUS_PATH).await
    }

    async fn inventory(&self) -> Result<ProgressSnapshot, LearnsyncError> {
        self.get_json(ITEMS_PATH).await
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, LearnsyncError> {
        let response = self
            .request(Method::POST, VERIFY_PATH)
            .json(request)
            .send()
            .await
            .map_err(|e| LearnsyncError::SyncVerifyFailed(e.to_string()))?;

        let response = ensure_success(response)
            .await
            .map_err(|e| LearnsyncError::SyncVerifyFailed(e.to_string()))?;

        response
            .json::<VerifyOutcome>()
            .await
            .map_err(|e| {
                LearnsyncError::SyncVerifyFailed(format!("Failed to parse verify response: {e}"))
            })
    }
}

fn transport_error(e: &reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Network(e.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        code: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
