//! Remote API client abstraction
//!
//! Every cloud backend (the Azure Resource Manager binding, test doubles)
//! implements [`RemoteClient`]. Payloads are JSON; typed request and response
//! shapes live with each resource kind's [`AttributeMapper`].
//!
//! [`AttributeMapper`]: crate::mapper::AttributeMapper

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A network, transport or authentication failure talking to the API
///
/// Distinct from a well-formed error response, which is a [`RemoteFault`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, TransportError>;

/// An error reported by the remote API, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFault {
    /// HTTP status of the response that carried the error
    pub status: u16,
    /// Service error code, e.g. `ResourceGroupNotFound`
    pub code: Option<String>,
    pub message: String,
}

impl RemoteFault {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Classified response of a GET
#[derive(Debug, Clone, PartialEq)]
pub enum GetResponse {
    Found(serde_json::Value),
    NotFound,
    Failed(RemoteFault),
}

/// Classified response of a PUT or DELETE
#[derive(Debug)]
pub enum MutationResponse {
    /// The API completed the request synchronously
    Completed(Option<serde_json::Value>),
    /// The API accepted the request; completion must be polled
    Accepted(OperationHandle),
    /// Only produced by DELETE: nothing to delete
    NotFound,
    Failed(RemoteFault),
}

/// Status of an in-flight long-running operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    InProgress { retry_after: Option<Duration> },
    Succeeded(Option<serde_json::Value>),
    Failed(RemoteFault),
    Canceled(RemoteFault),
}

/// Where the status of an operation is polled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "url")]
pub enum PollLocation {
    /// A status resource whose body carries `status` and `error`
    AsyncOperation(String),
    /// A location that answers 202 until done
    Location(String),
}

impl PollLocation {
    pub fn url(&self) -> &str {
        match self {
            PollLocation::AsyncOperation(url) | PollLocation::Location(url) => url,
        }
    }
}

/// Resumable reference to an in-flight long-running operation
///
/// Deliberately not `Clone`: one handle is polled by exactly one waiter at a
/// time. Polling progress lives in the handle so a second wait after a
/// timeout resumes where the first left off.
#[derive(Debug)]
pub struct OperationHandle {
    location: PollLocation,
    retry_after: Option<Duration>,
    pub(crate) attempts: u32,
    pub(crate) terminal: Option<OperationStatus>,
}

impl OperationHandle {
    pub fn new(location: PollLocation) -> Self {
        Self {
            location,
            retry_after: None,
            attempts: 0,
            terminal: None,
        }
    }

    /// Server-suggested delay before the first status check
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn location(&self) -> &PollLocation {
        &self.location
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub(crate) fn set_retry_after(&mut self, retry_after: Option<Duration>) {
        if retry_after.is_some() {
            self.retry_after = retry_after;
        }
    }

    /// Number of status checks issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

/// Remote cloud-management API
///
/// Implementations classify HTTP statuses and retry transport failures with
/// bounded backoff themselves; an `Err` means those retries were exhausted.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch an object
    async fn get(&self, id: &str, api_version: &str) -> ClientResult<GetResponse>;

    /// Create or replace an object
    async fn create_or_update(
        &self,
        id: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse>;

    /// Partially update an object
    ///
    /// Backends without PATCH support fall back to a full PUT.
    async fn update(
        &self,
        id: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse> {
        self.create_or_update(id, api_version, body).await
    }

    /// Delete an object
    async fn delete(&self, id: &str, api_version: &str) -> ClientResult<MutationResponse>;

    /// Check the status of a long-running operation once
    async fn poll(&self, handle: &OperationHandle) -> ClientResult<OperationStatus>;
}
