//! Resource reconciler
//!
//! Drives one remote object through Create, Read, Update and Delete using the
//! resource kind's mapper, the long-running operation waiter and, for deletes,
//! the eventual-consistency poller.

use crate::action::ChangeSet;
use crate::client::{GetResponse, MutationResponse, OperationHandle, RemoteFault};
use crate::context::CloudContext;
use crate::error::{CloudError, Operation, Result};
use crate::id::RemoteObjectId;
use crate::lro::{OperationWaiter, WaitOutcome};
use crate::mapper::{KindOptions, ResourceKind, UpdateMethod};
use crate::poller::{PollOutcome, PollStats, Presence, poll_until_stable};
use crate::value::{DesiredState, ObservedState};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A remote object the engine manages, with its last observed state
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: RemoteObjectId,
    pub observed: ObservedState,
}

/// What a lifecycle operation did
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Created(TrackedObject),
    Updated(TrackedObject),
    /// The change set was empty; nothing was sent
    Unchanged,
    Deleted {
        /// Stability poll counters, when the delete had to be confirmed
        confirmation: Option<PollStats>,
    },
    NotFound,
}

/// Reconciles objects of one resource kind
pub struct Reconciler<'a> {
    ctx: &'a CloudContext,
    kind: &'a dyn ResourceKind,
    options: KindOptions,
    cancel: CancellationToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(ctx: &'a CloudContext, kind: &'a dyn ResourceKind) -> Self {
        Self {
            ctx,
            kind,
            options: ctx.options_for(kind),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits when `cancel` fires; the remote side is not rolled back
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn kind(&self) -> &dyn ResourceKind {
        self.kind
    }

    pub fn options(&self) -> &KindOptions {
        &self.options
    }

    /// Create the object described by `desired`
    ///
    /// Refuses to take over an object that already exists remotely unless
    /// the kind opts into adoption. A refusal makes no mutating call.
    pub async fn create(&self, desired: &DesiredState) -> Result<ReconciliationOutcome> {
        let id = self.kind.resource_id(self.ctx.subscription_id(), desired)?;
        let body = self.kind.expand_body(desired)?;
        let deadline = Deadline::after(self.options.timeouts.create);

        // nothing has been sent yet: a stalled or canceled check is a failed read
        match self.get(&id, Operation::Read, deadline).await? {
            GetResponse::NotFound => {}
            GetResponse::Found(_) if self.options.adopt_existing => {
                tracing::info!(id = %id, "adopting existing {}", self.kind.kind());
            }
            GetResponse::Found(_) => {
                return Err(CloudError::AlreadyExists {
                    kind: self.kind.kind().to_string(),
                    id: id.to_string(),
                });
            }
            GetResponse::Failed(fault) => return Err(remote_failed(Operation::Create, &id, fault)),
        }

        tracing::info!(id = %id, "creating {}", self.kind.kind());
        let response = self
            .call(Operation::Create, &id, deadline, async {
                self.ctx
                    .client()
                    .create_or_update(&id.to_string(), self.kind.api_version(), &body)
                    .await
            })
            .await?;
        self.settle(Operation::Create, &id, response, deadline).await?;

        let observed = self.read_after_write(Operation::Create, &id).await?;
        tracing::info!(id = %id, "created {}", self.kind.kind());
        Ok(ReconciliationOutcome::Created(TrackedObject { id, observed }))
    }

    /// Fetch the current remote state
    ///
    /// # Returns
    /// * `Ok(Some(ObservedState))` - the object exists
    /// * `Ok(None)` - the object is gone; callers should stop tracking it
    pub async fn read(&self, id: &RemoteObjectId) -> Result<Option<ObservedState>> {
        let deadline = Deadline::after(self.options.timeouts.read);
        match self.get(id, Operation::Read, deadline).await? {
            GetResponse::Found(body) => Ok(Some(self.kind.flatten_body(id, body)?)),
            GetResponse::NotFound => {
                tracing::debug!(id = %id, "{} no longer exists", self.kind.kind());
                Ok(None)
            }
            GetResponse::Failed(fault) => Err(remote_failed(Operation::Read, id, fault)),
        }
    }

    /// Apply an in-place change set
    ///
    /// Fails without any remote call when a changed field forces replacement.
    pub async fn update(
        &self,
        id: &RemoteObjectId,
        desired: &DesiredState,
        changes: &ChangeSet,
    ) -> Result<ReconciliationOutcome> {
        if changes.requires_replacement() {
            return Err(CloudError::ReplacementRequired {
                id: id.to_string(),
                fields: changes.replacement_fields(),
            });
        }
        if changes.is_empty() {
            return Ok(ReconciliationOutcome::Unchanged);
        }
        self.kind.validate_change(changes)?;
        let body = self.kind.expand_update_body(desired, changes)?;
        let deadline = Deadline::after(self.options.timeouts.update);

        tracing::info!(
            id = %id,
            fields = ?changes.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
            "updating {}",
            self.kind.kind()
        );
        let response = self
            .call(Operation::Update, id, deadline, async {
                let raw = id.to_string();
                let api_version = self.kind.api_version();
                match self.options.update_method {
                    UpdateMethod::Put => {
                        self.ctx
                            .client()
                            .create_or_update(&raw, api_version, &body)
                            .await
                    }
                    UpdateMethod::Patch => self.ctx.client().update(&raw, api_version, &body).await,
                }
            })
            .await?;
        if matches!(response, MutationResponse::NotFound) {
            return Err(CloudError::NotFound {
                kind: self.kind.kind().to_string(),
                id: id.to_string(),
            });
        }
        self.settle(Operation::Update, id, response, deadline).await?;

        let observed = self.read_after_write(Operation::Update, id).await?;
        Ok(ReconciliationOutcome::Updated(TrackedObject {
            id: id.clone(),
            observed,
        }))
    }

    /// Delete the object and wait until it is consistently gone
    ///
    /// Deleting an object that does not exist succeeds.
    pub async fn delete(&self, id: &RemoteObjectId) -> Result<ReconciliationOutcome> {
        let deadline = Deadline::after(self.options.timeouts.delete);

        tracing::info!(id = %id, "deleting {}", self.kind.kind());
        let response = self
            .call(Operation::Delete, id, deadline, async {
                self.ctx
                    .client()
                    .delete(&id.to_string(), self.kind.api_version())
                    .await
            })
            .await?;
        if matches!(response, MutationResponse::NotFound) {
            tracing::debug!(id = %id, "{} was already gone", self.kind.kind());
            return Ok(ReconciliationOutcome::Deleted { confirmation: None });
        }
        self.settle(Operation::Delete, id, response, deadline).await?;

        if !self.options.confirm_delete {
            return Ok(ReconciliationOutcome::Deleted { confirmation: None });
        }

        let outcome = poll_until_stable(
            || self.presence(id, deadline),
            &Presence::NotFound,
            self.ctx.stability(),
            deadline.remaining(),
            &self.cancel,
        )
        .await;

        match outcome {
            PollOutcome::Reached(stats) => {
                tracing::info!(id = %id, polls = stats.polls, "deleted {}", self.kind.kind());
                Ok(ReconciliationOutcome::Deleted {
                    confirmation: Some(stats),
                })
            }
            PollOutcome::TimedOut(stats) => {
                tracing::warn!(
                    id = %id,
                    polls = stats.polls,
                    resets = stats.resets,
                    "delete of {} completed but the object is still observed",
                    self.kind.kind()
                );
                Err(not_confirmed(id, deadline))
            }
            PollOutcome::Failed(CloudError::TimedOut { .. }) => {
                tracing::warn!(
                    id = %id,
                    "delete of {} completed but checking for it did not finish in time",
                    self.kind.kind()
                );
                Err(not_confirmed(id, deadline))
            }
            PollOutcome::Interrupted(_) => Err(CloudError::Canceled {
                operation: Operation::Delete,
                id: id.to_string(),
            }),
            PollOutcome::Failed(e) => Err(e),
        }
    }

    /// Import an existing object by its ID
    ///
    /// The ID must match the kind's shape exactly; a missing object is an
    /// error rather than an empty import.
    pub async fn import(&self, raw_id: &str) -> Result<TrackedObject> {
        let id = RemoteObjectId::parse(raw_id, self.kind.id_shape())?;
        match self.read(&id).await? {
            Some(observed) => Ok(TrackedObject { id, observed }),
            None => Err(CloudError::NotFound {
                kind: self.kind.kind().to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// Read an object that is referenced but not managed (a data source)
    pub async fn lookup(&self, desired: &DesiredState) -> Result<TrackedObject> {
        let id = self.kind.resource_id(self.ctx.subscription_id(), desired)?;
        match self.read(&id).await? {
            Some(observed) => Ok(TrackedObject { id, observed }),
            None => Err(CloudError::NotFound {
                kind: self.kind.kind().to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// One confirmation probe, bounded by the read timeout and by what is
    /// left of the delete
    async fn presence(&self, id: &RemoteObjectId, delete: Deadline) -> Result<Presence> {
        let deadline = Deadline::after(self.options.timeouts.read).min(delete);
        match self.get(id, Operation::Delete, deadline).await? {
            GetResponse::Found(_) => Ok(Presence::Exists),
            GetResponse::NotFound => Ok(Presence::NotFound),
            GetResponse::Failed(fault) => Err(remote_failed(Operation::Delete, id, fault)),
        }
    }

    async fn get(
        &self,
        id: &RemoteObjectId,
        operation: Operation,
        deadline: Deadline,
    ) -> Result<GetResponse> {
        self.call(operation, id, deadline, async {
            self.ctx
                .client()
                .get(&id.to_string(), self.kind.api_version())
                .await
        })
        .await
    }

    /// Run one client call bounded by `deadline` and the cancellation token
    async fn call<T, F>(
        &self,
        operation: Operation,
        id: &RemoteObjectId,
        deadline: Deadline,
        request: F,
    ) -> Result<T>
    where
        F: std::future::Future<Output = crate::client::ClientResult<T>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CloudError::Canceled {
                operation,
                id: id.to_string(),
            }),
            _ = tokio::time::sleep_until(deadline.at) => Err(CloudError::TimedOut {
                operation,
                id: id.to_string(),
                timeout: deadline.timeout,
            }),
            result = request => result.map_err(|source| CloudError::Transport {
                operation,
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Turn a mutation response into success or a classified error, waiting
    /// on the long-running operation when the API accepted the request
    async fn settle(
        &self,
        operation: Operation,
        id: &RemoteObjectId,
        response: MutationResponse,
        deadline: Deadline,
    ) -> Result<()> {
        match response {
            MutationResponse::Completed(_) | MutationResponse::NotFound => Ok(()),
            MutationResponse::Failed(fault) => Err(remote_failed(operation, id, fault)),
            MutationResponse::Accepted(mut handle) => {
                self.wait(operation, id, &mut handle, deadline).await
            }
        }
    }

    async fn wait(
        &self,
        operation: Operation,
        id: &RemoteObjectId,
        handle: &mut OperationHandle,
        deadline: Deadline,
    ) -> Result<()> {
        let waiter = OperationWaiter::new(self.ctx.client(), self.ctx.backoff());
        let outcome = waiter
            .wait(handle, deadline.remaining(), &self.cancel)
            .await
            .map_err(|source| CloudError::Transport {
                operation,
                id: id.to_string(),
                source,
            })?;

        match outcome {
            WaitOutcome::Succeeded(_) => Ok(()),
            WaitOutcome::Failed(fault) => Err(remote_failed(operation, id, fault)),
            WaitOutcome::TimedOut => {
                tracing::warn!(
                    id = %id,
                    attempts = handle.attempts(),
                    "{} {} did not finish in time",
                    operation,
                    self.kind.kind()
                );
                Err(CloudError::TimedOut {
                    operation,
                    id: id.to_string(),
                    timeout: deadline.timeout,
                })
            }
            WaitOutcome::Interrupted => Err(CloudError::Canceled {
                operation,
                id: id.to_string(),
            }),
        }
    }

    /// Read back a written object; failures keep the mutating operation so
    /// an interrupted read-back stays ambiguous
    async fn read_after_write(
        &self,
        operation: Operation,
        id: &RemoteObjectId,
    ) -> Result<ObservedState> {
        let deadline = Deadline::after(self.options.timeouts.read);
        match self.get(id, operation, deadline).await? {
            GetResponse::Found(body) => self.kind.flatten_body(id, body),
            GetResponse::NotFound => Err(CloudError::RemoteFailed {
                operation,
                id: id.to_string(),
                status: 404,
                code: None,
                message: format!("{} was not found after {}", self.kind.kind(), operation),
            }),
            GetResponse::Failed(fault) => Err(remote_failed(operation, id, fault)),
        }
    }
}

/// When a call must finish, and the configured timeout it came from
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    fn min(self, other: Self) -> Self {
        if other.at < self.at { other } else { self }
    }
}

fn not_confirmed(id: &RemoteObjectId, deadline: Deadline) -> CloudError {
    CloudError::DeleteNotConfirmed {
        id: id.to_string(),
        timeout: deadline.timeout,
    }
}

fn remote_failed(operation: Operation, id: &RemoteObjectId, fault: RemoteFault) -> CloudError {
    CloudError::RemoteFailed {
        operation,
        id: id.to_string(),
        status: fault.status,
        code: fault.code,
        message: fault.message,
    }
}
