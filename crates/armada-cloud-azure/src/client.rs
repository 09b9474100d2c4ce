//! Azure Resource Manager HTTP client
//!
//! Implements [`RemoteClient`] over the ARM REST API with bearer token
//! authentication. Connection errors, throttling (429) and server errors
//! (5xx) are retried here with bounded backoff; everything else is
//! classified and handed back to the reconciler verbatim.

use crate::error::{AzureError, Result};
use armada_cloud::{
    ClientResult, GetResponse, MutationResponse, OperationHandle, OperationStatus, PollLocation,
    RemoteClient, RemoteFault, RetryConfig, TransportError,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// Environment variable holding the access token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Configuration for the ARM client
#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub endpoint: String,
    pub access_token: String,
    pub retry: RetryConfig,
}

impl ArmConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            endpoint: ARM_ENDPOINT.to_string(),
            access_token: access_token.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Read the access token from the given environment variable
    pub fn from_env(token_env: &str) -> Result<Self> {
        let access_token = std::env::var(token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| AzureError::MissingEnvVar(token_env.to_string()))?;
        Ok(Self::new(access_token))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// ARM REST client
pub struct ArmClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    retry: RetryConfig,
}

impl ArmClient {
    pub fn new(config: ArmConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(AzureError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got {:?}",
                config.endpoint
            )));
        }
        if config.retry.max_attempts == 0 {
            return Err(AzureError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("armada/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token,
            retry: config.retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn resource_url(&self, id: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, id, api_version)
    }

    /// Send a request, retrying transport failures, throttling and 5xx
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> ClientResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.access_token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let retries_left = attempt + 1 < self.retry.max_attempts;
            let delay = match request.send().await {
                Ok(response) if retries_left && is_retryable(response.status()) => {
                    let delay = retry_after(response.headers())
                        .map(|hint| hint.min(self.retry.max_delay))
                        .unwrap_or_else(|| self.retry.delay_for_attempt(attempt));
                    warn!(
                        %method,
                        url = %url,
                        status = response.status().as_u16(),
                        ?delay,
                        "Retrying request"
                    );
                    delay
                }
                Ok(response) => return Ok(response),
                Err(e) if retries_left && (e.is_connect() || e.is_timeout()) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(%method, url = %url, error = %e, ?delay, "Retrying request");
                    delay
                }
                Err(e) => {
                    return Err(TransportError::with_source(
                        format!("{} {} failed", method, url),
                        e,
                    ));
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RemoteClient for ArmClient {
    async fn get(&self, id: &str, api_version: &str) -> ClientResult<GetResponse> {
        let response = self
            .send(Method::GET, &self.resource_url(id, api_version), None)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(GetResponse::NotFound),
            status if status.is_success() => Ok(GetResponse::Found(
                read_json(response)
                    .await?
                    .unwrap_or_else(|| serde_json::json!({})),
            )),
            _ => Ok(GetResponse::Failed(read_fault(response).await?)),
        }
    }

    async fn create_or_update(
        &self,
        id: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse> {
        let response = self
            .send(Method::PUT, &self.resource_url(id, api_version), Some(body))
            .await?;
        classify_mutation(response, false).await
    }

    async fn update(
        &self,
        id: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse> {
        let response = self
            .send(Method::PATCH, &self.resource_url(id, api_version), Some(body))
            .await?;
        classify_mutation(response, false).await
    }

    async fn delete(&self, id: &str, api_version: &str) -> ClientResult<MutationResponse> {
        let response = self
            .send(Method::DELETE, &self.resource_url(id, api_version), None)
            .await?;
        classify_mutation(response, true).await
    }

    async fn poll(&self, handle: &OperationHandle) -> ClientResult<OperationStatus> {
        let response = self.send(Method::GET, handle.location().url(), None).await?;
        let hint = retry_after(response.headers());
        let status = response.status();

        match handle.location() {
            PollLocation::AsyncOperation(_) => {
                if !status.is_success() {
                    return Ok(OperationStatus::Failed(read_fault(response).await?));
                }
                let text = read_text(response).await?;
                let operation: AsyncOperation = serde_json::from_str(&text).map_err(|e| {
                    TransportError::with_source("malformed operation status body", e)
                })?;
                debug!(status = %operation.status, "Operation status");
                Ok(operation.into_status(status.as_u16(), hint))
            }
            PollLocation::Location(_) => match status {
                StatusCode::ACCEPTED => Ok(OperationStatus::InProgress { retry_after: hint }),
                s if s.is_success() => Ok(OperationStatus::Succeeded(read_json(response).await?)),
                _ => Ok(OperationStatus::Failed(read_fault(response).await?)),
            },
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `Retry-After` in delay-seconds form
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header(headers, RETRY_AFTER.as_str())?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// `Azure-AsyncOperation` is preferred over `Location`
fn poll_location(headers: &HeaderMap) -> Option<PollLocation> {
    header(headers, ASYNC_OPERATION_HEADER)
        .map(PollLocation::AsyncOperation)
        .or_else(|| header(headers, LOCATION.as_str()).map(PollLocation::Location))
}

async fn classify_mutation(
    response: reqwest::Response,
    is_delete: bool,
) -> ClientResult<MutationResponse> {
    let status = response.status();
    let location = poll_location(response.headers());
    let hint = retry_after(response.headers());

    match status {
        StatusCode::NOT_FOUND | StatusCode::NO_CONTENT if is_delete => {
            Ok(MutationResponse::NotFound)
        }
        StatusCode::ACCEPTED => match location {
            Some(location) => Ok(MutationResponse::Accepted(
                OperationHandle::new(location).with_retry_after(hint),
            )),
            None => {
                debug!("Accepted without a polling location; treating as complete");
                Ok(MutationResponse::Completed(None))
            }
        },
        // A 200/201 carrying an async operation header is still provisioning
        s if s.is_success() => match location {
            Some(location @ PollLocation::AsyncOperation(_)) => Ok(MutationResponse::Accepted(
                OperationHandle::new(location).with_retry_after(hint),
            )),
            _ => Ok(MutationResponse::Completed(read_json(response).await?)),
        },
        _ => Ok(MutationResponse::Failed(read_fault(response).await?)),
    }
}

async fn read_text(response: reqwest::Response) -> ClientResult<String> {
    response
        .text()
        .await
        .map_err(|e| TransportError::with_source("reading response body", e))
}

async fn read_json(response: reqwest::Response) -> ClientResult<Option<serde_json::Value>> {
    let text = read_text(response).await?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| TransportError::with_source("response body is not valid JSON", e))
}

async fn read_fault(response: reqwest::Response) -> ClientResult<RemoteFault> {
    let status = response.status();
    let text = read_text(response).await?;
    Ok(parse_fault(status, &text))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn into_fault(self, status: u16, fallback: &str) -> RemoteFault {
        let fault = RemoteFault::new(status, self.message.unwrap_or_else(|| fallback.to_string()));
        match self.code {
            Some(code) => fault.with_code(code),
            None => fault,
        }
    }
}

/// Parse the ARM error envelope, keeping the raw body when it is not one
fn parse_fault(status: StatusCode, text: &str) -> RemoteFault {
    let fallback = if text.trim().is_empty() {
        status.canonical_reason().unwrap_or("no response body")
    } else {
        text
    };

    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(ErrorEnvelope { error: Some(body) }) => body.into_fault(status.as_u16(), fallback),
        _ => RemoteFault::new(status.as_u16(), fallback),
    }
}

/// Body of an `Azure-AsyncOperation` status resource
#[derive(Debug, Deserialize)]
struct AsyncOperation {
    status: String,
    error: Option<ErrorBody>,
}

impl AsyncOperation {
    fn into_status(self, http_status: u16, hint: Option<Duration>) -> OperationStatus {
        let fallback = format!("operation {}", self.status);
        let fault = |error: Option<ErrorBody>| match error {
            Some(body) => body.into_fault(http_status, &fallback),
            None => RemoteFault::new(http_status, fallback.as_str()),
        };

        match self.status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded(None),
            "failed" => OperationStatus::Failed(fault(self.error)),
            "canceled" | "cancelled" => OperationStatus::Canceled(fault(self.error)),
            _ => OperationStatus::InProgress { retry_after: hint },
        }
    }
}
