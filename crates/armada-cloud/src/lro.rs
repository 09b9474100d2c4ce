//! Long-running operation waiter
//!
//! Polls an [`OperationHandle`] until the remote operation reaches a terminal
//! state, sleeping between checks with exponential backoff. A timeout does
//! not cancel the remote operation; waiting again on the same handle resumes
//! polling instead of restarting.

use crate::client::{ClientResult, OperationHandle, OperationStatus, RemoteClient, RemoteFault};
use crate::policy::BackoffConfig;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Result of waiting on a long-running operation
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// Finished successfully, with the result payload when the API returned one
    Succeeded(Option<serde_json::Value>),
    /// Failed or was canceled on the remote side
    Failed(RemoteFault),
    /// The deadline elapsed; the operation may still complete remotely
    TimedOut,
    /// The caller's cancellation token fired
    Interrupted,
}

fn terminal_outcome(status: &OperationStatus) -> Option<WaitOutcome> {
    match status {
        OperationStatus::InProgress { .. } => None,
        OperationStatus::Succeeded(body) => Some(WaitOutcome::Succeeded(body.clone())),
        OperationStatus::Failed(fault) | OperationStatus::Canceled(fault) => {
            Some(WaitOutcome::Failed(fault.clone()))
        }
    }
}

/// Waits on long-running operations with one client and backoff policy
pub struct OperationWaiter<'a> {
    client: &'a dyn RemoteClient,
    backoff: &'a BackoffConfig,
}

impl<'a> OperationWaiter<'a> {
    pub fn new(client: &'a dyn RemoteClient, backoff: &'a BackoffConfig) -> Self {
        Self { client, backoff }
    }

    /// Poll until the operation is terminal, `timeout` elapses or `cancel` fires
    ///
    /// # Returns
    /// * `Ok(WaitOutcome)` - the outcome of this wait
    /// * `Err(TransportError)` - the client could not reach the API
    pub async fn wait(
        &self,
        handle: &mut OperationHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ClientResult<WaitOutcome> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = handle.terminal.as_ref().and_then(terminal_outcome) {
                return Ok(outcome);
            }

            if Instant::now() >= deadline {
                tracing::debug!(
                    url = handle.location().url(),
                    attempts = handle.attempts,
                    "gave up waiting for operation"
                );
                return Ok(WaitOutcome::TimedOut);
            }

            let status = tokio::select! {
                _ = cancel.cancelled() => return Ok(WaitOutcome::Interrupted),
                status = self.client.poll(handle) => status?,
            };
            handle.attempts = handle.attempts.saturating_add(1);

            match status {
                OperationStatus::InProgress { retry_after } => {
                    handle.set_retry_after(retry_after);
                }
                terminal => {
                    tracing::debug!(
                        url = handle.location().url(),
                        attempts = handle.attempts,
                        status = ?terminal,
                        "operation reached a terminal state"
                    );
                    handle.terminal = Some(terminal);
                    continue;
                }
            }

            let delay = self
                .backoff
                .delay_for_attempt(handle.attempts.saturating_sub(1), handle.retry_after());
            let remaining = deadline.saturating_duration_since(Instant::now());
            let pause = delay.min(remaining);

            tracing::debug!(
                url = handle.location().url(),
                attempt = handle.attempts,
                "operation in progress, next check in {:?}",
                pause
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(WaitOutcome::Interrupted),
                _ = sleep(pause) => {}
            }
        }
    }
}
