//! Cloud reconciliation error types

use crate::client::TransportError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The lifecycle operation an error was raised from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Operation {
    /// Whether the operation changes remote state
    pub fn is_mutating(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "creating"),
            Operation::Read => write!(f, "reading"),
            Operation::Update => write!(f, "updating"),
            Operation::Delete => write!(f, "deleting"),
            Operation::Import => write!(f, "importing"),
        }
    }
}

/// Cloud reconciliation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Malformed ID {input:?}: {reason}")]
    MalformedId { input: String, reason: String },

    #[error("Invalid value for {field:?}: {reason}")]
    Validation { field: String, reason: String },

    #[error(
        "A resource with the ID {id:?} already exists - to be managed via armada this resource needs to be imported into the state ({kind})"
    )]
    AlreadyExists { kind: String, id: String },

    #[error("{operation} {id}: unexpected status {status}{}: {message}", code_suffix(.code))]
    RemoteFailed {
        operation: Operation,
        id: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{operation} {id}: timed out after {timeout:?}; the remote operation may still be in progress")]
    TimedOut {
        operation: Operation,
        id: String,
        timeout: Duration,
    },

    #[error("deleting {id}: delete completed but its absence was not confirmed within {timeout:?}")]
    DeleteNotConfirmed { id: String, timeout: Duration },

    #[error("updating {id}: {fields:?} cannot be changed in place and require replacement")]
    ReplacementRequired { id: String, fields: Vec<String> },

    #[error("{kind} {id:?} was not found")]
    NotFound { kind: String, id: String },

    #[error("{operation} {id}: canceled")]
    Canceled { operation: Operation, id: String },

    #[error("{operation} {id}: {source}")]
    Transport {
        operation: Operation,
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("decoding {kind} response: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn malformed_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the remote side may still be acting on a mutating request.
    ///
    /// Callers should re-run Read to resolve the ambiguity. A read that timed
    /// out or was canceled changed nothing and is not ambiguous.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            CloudError::TimedOut { operation, .. } | CloudError::Canceled { operation, .. } => {
                operation.is_mutating()
            }
            CloudError::DeleteNotConfirmed { .. } => true,
            _ => false,
        }
    }

    /// Whether the error was raised before any remote side effect
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CloudError::MalformedId { .. }
                | CloudError::Validation { .. }
                | CloudError::ReplacementRequired { .. }
                | CloudError::UnknownKind(_)
        )
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CloudError>;
