//! Planning and applying changes across many resources
//!
//! Every object is reconciled in its own future; the futures run
//! concurrently and operations on the same remote object are serialized by
//! [`ObjectLocks`]. A failure is recorded for its object and does not stop
//! the others.

use crate::action::{Action, ActionType, ApplyResult, Plan, plan_resource};
use crate::context::CloudContext;
use crate::error::{CloudError, Result};
use crate::id::RemoteObjectId;
use crate::lock::ObjectLocks;
use crate::mapper::ResourceKind;
use crate::reconciler::{ReconciliationOutcome, Reconciler, TrackedObject};
use crate::state::{GlobalState, ResourceState, ResourceStatus};
use crate::value::DesiredState;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A resource declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedResource {
    /// Key in the manifest and the state file
    pub name: String,
    pub kind: String,
    pub desired: DesiredState,
}

impl ManagedResource {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, desired: DesiredState) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            desired,
        }
    }
}

/// What to do when a delete completes but the object keeps showing up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnconfirmedDeletePolicy {
    /// Report the resource as failed and keep tracking it
    #[default]
    Fail,
    /// Stop tracking it and report a warning
    Warn,
}

/// Result of refreshing tracked resources
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    /// No longer exist remotely, or had an unparseable ID
    pub removed: Vec<String>,
    pub failed: Vec<(String, CloudError)>,
}

enum StateChange {
    Record(TrackedObject),
    Unconfirmed(RemoteObjectId),
    Remove,
}

enum Outcome {
    Done(String),
    Warned(String),
    Failed(CloudError),
}

struct Executed {
    change: Option<StateChange>,
    outcome: Outcome,
}

impl Executed {
    fn failed(change: Option<StateChange>, error: CloudError) -> Self {
        Self {
            change,
            outcome: Outcome::Failed(error),
        }
    }
}

/// Runs plans against the remote API
pub struct Provisioner {
    ctx: Arc<CloudContext>,
    locks: ObjectLocks,
    cancel: CancellationToken,
    unconfirmed_delete: UnconfirmedDeletePolicy,
}

impl Provisioner {
    pub fn new(ctx: Arc<CloudContext>) -> Self {
        Self {
            ctx,
            locks: ObjectLocks::new(),
            cancel: CancellationToken::new(),
            unconfirmed_delete: UnconfirmedDeletePolicy::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_unconfirmed_delete(mut self, policy: UnconfirmedDeletePolicy) -> Self {
        self.unconfirmed_delete = policy;
        self
    }

    pub fn context(&self) -> &CloudContext {
        &self.ctx
    }

    fn reconciler<'a>(&'a self, kind: &'a dyn ResourceKind) -> Reconciler<'a> {
        Reconciler::new(&self.ctx, kind).with_cancellation(self.cancel.clone())
    }

    /// Re-read every tracked resource and update the state in place
    ///
    /// Resources that no longer exist, or whose stored ID cannot be parsed,
    /// are dropped from the state.
    pub async fn refresh(&self, state: &mut GlobalState) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut pending = Vec::new();

        for (name, resource) in &state.resources {
            let kind = match self.ctx.kind(&resource.kind) {
                Ok(kind) => kind,
                Err(e) => {
                    report.failed.push((name.clone(), e));
                    continue;
                }
            };
            match resource.tracked(kind.as_ref()) {
                Ok(tracked) => pending.push((name.clone(), kind, tracked.id)),
                Err(e) => {
                    tracing::warn!(resource = %name, "dropping resource with unusable ID: {}", e);
                    report.removed.push(name.clone());
                }
            }
        }

        let reads = pending.iter().map(|(name, kind, id)| async move {
            let _guard = self.locks.acquire(id).await;
            let result = self.reconciler(kind.as_ref()).read(id).await;
            (name, kind, id, result)
        });

        for (name, kind, id, result) in join_all(reads).await {
            match result {
                Ok(Some(observed)) => {
                    let tracked = TrackedObject {
                        id: id.clone(),
                        observed,
                    };
                    state.record(name, kind.kind(), &tracked);
                    report.refreshed.push(name.clone());
                }
                Ok(None) => {
                    tracing::info!(resource = %name, "{} no longer exists", id);
                    report.removed.push(name.clone());
                }
                Err(e) => report.failed.push((name.clone(), e)),
            }
        }

        for name in &report.removed {
            state.remove_resource(name);
        }
        report
    }

    /// Compare configuration with the tracked state
    ///
    /// Makes no remote calls; run [`Provisioner::refresh`] first so the
    /// comparison is made against current remote state.
    pub fn plan(&self, resources: &[ManagedResource], state: &GlobalState) -> Result<Plan> {
        let mut actions = Vec::new();
        let mut configured = HashSet::new();
        let mut ids: HashMap<RemoteObjectId, &str> = HashMap::new();

        for resource in resources {
            let kind = self.ctx.kind(&resource.kind)?;
            configured.insert(resource.name.as_str());

            let tracked = match state.get_resource(&resource.name) {
                Some(existing) if existing.kind != resource.kind => {
                    return Err(CloudError::validation(
                        &resource.name,
                        format!(
                            "kind changed from {} to {}; destroy the resource first",
                            existing.kind, resource.kind
                        ),
                    ));
                }
                Some(existing) if existing.status == ResourceStatus::Unconfirmed => {
                    return Err(CloudError::StateError(format!(
                        "{} may or may not exist at {}; refresh before planning",
                        resource.name, existing.id
                    )));
                }
                Some(existing) => Some(existing.tracked(kind.as_ref())?),
                None => None,
            };

            let id = kind.resource_id(self.ctx.subscription_id(), &resource.desired)?;
            if let Some(other) = ids.insert(id.clone(), &resource.name) {
                return Err(CloudError::validation(
                    &resource.name,
                    format!("resolves to the same object as {} ({})", other, id),
                ));
            }

            actions.push(plan_resource(
                kind.as_ref(),
                self.ctx.subscription_id(),
                &resource.name,
                &resource.desired,
                tracked.as_ref(),
            )?);
        }

        for (name, resource) in &state.resources {
            if !configured.contains(name.as_str()) {
                actions.push(Action::delete(name, &resource.kind, &resource.id));
            }
        }

        Ok(Plan::new(actions))
    }

    /// Plan the deletion of tracked resources (all of them when `targets`
    /// is empty)
    pub fn plan_destroy(&self, state: &GlobalState, targets: &[String]) -> Result<Plan> {
        for target in targets {
            if state.get_resource(target).is_none() {
                return Err(CloudError::validation(target, "is not tracked in the state"));
            }
        }
        let actions = state
            .resources
            .iter()
            .filter(|(name, _)| targets.is_empty() || targets.contains(name))
            .map(|(name, resource)| Action::delete(name, &resource.kind, &resource.id))
            .collect();
        Ok(Plan::new(actions))
    }

    /// Execute every action of the plan and update the state
    pub async fn apply(&self, plan: &Plan, state: &mut GlobalState) -> ApplyResult {
        let start = Instant::now();
        let mut result = ApplyResult::new();

        let runs = plan
            .actions
            .iter()
            .filter(|a| a.action_type != ActionType::NoOp)
            .map(|action| async move { (action, self.execute(action).await) });

        for (action, executed) in join_all(runs).await {
            match executed.change {
                Some(StateChange::Record(tracked)) => state.record(&action.name, &action.kind, &tracked),
                Some(StateChange::Unconfirmed(id)) => state.set_resource(
                    action.name.clone(),
                    ResourceState::unconfirmed(&action.kind, &id),
                ),
                Some(StateChange::Remove) => {
                    state.remove_resource(&action.name);
                }
                None => {}
            }

            match executed.outcome {
                Outcome::Done(message) => {
                    tracing::info!(resource = %action.name, "{}", message);
                    result.add_success(action.name.clone(), message);
                }
                Outcome::Warned(message) => {
                    tracing::warn!(resource = %action.name, "{}", message);
                    result.add_warning(action.name.clone(), message);
                }
                Outcome::Failed(e) => {
                    tracing::error!(resource = %action.name, "{} failed: {}", action.action_type, e);
                    result.add_failure(action.name.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Start managing an existing remote object
    pub async fn import(
        &self,
        name: &str,
        kind_name: &str,
        raw_id: &str,
        state: &mut GlobalState,
    ) -> Result<TrackedObject> {
        if let Some(existing) = state.get_resource(name) {
            return Err(CloudError::validation(
                name,
                format!("is already managed as {}", existing.id),
            ));
        }
        let kind = self.ctx.kind(kind_name)?;
        let id = RemoteObjectId::parse(raw_id, kind.id_shape())?;

        let tracked = {
            let _guard = self.locks.acquire(&id).await;
            self.reconciler(kind.as_ref()).import(raw_id).await?
        };
        state.record(name, kind.kind(), &tracked);
        tracing::info!(resource = %name, "imported {}", tracked.id);
        Ok(tracked)
    }

    /// Read an object that is referenced but not managed
    pub async fn lookup(&self, kind_name: &str, desired: &DesiredState) -> Result<TrackedObject> {
        let kind = self.ctx.kind(kind_name)?;
        self.reconciler(kind.as_ref()).lookup(desired).await
    }

    async fn execute(&self, action: &Action) -> Executed {
        let kind = match self.ctx.kind(&action.kind) {
            Ok(kind) => kind,
            Err(e) => return Executed::failed(None, e),
        };
        let kind = kind.as_ref();

        match action.action_type {
            ActionType::Create => match &action.desired {
                Some(desired) => self.create(kind, desired).await,
                None => Executed::failed(None, missing_desired(action)),
            },
            ActionType::Update => {
                let (id, desired) = match self.existing(kind, action) {
                    Ok(found) => found,
                    Err(e) => return Executed::failed(None, e),
                };
                let _guard = self.locks.acquire(&id).await;
                match self.reconciler(kind).update(&id, desired, &action.changes).await {
                    Ok(ReconciliationOutcome::Updated(tracked)) => Executed {
                        change: Some(StateChange::Record(tracked)),
                        outcome: Outcome::Done(format!("updated {}", id)),
                    },
                    Ok(_) => Executed {
                        change: None,
                        outcome: Outcome::Done(format!("{} unchanged", id)),
                    },
                    Err(e) => Executed::failed(None, e),
                }
            }
            ActionType::Delete => match self.tracked_id(kind, action) {
                Ok(id) => self.delete(kind, &id).await,
                Err(e) => Executed::failed(None, e),
            },
            ActionType::Replace => {
                let (id, desired) = match self.existing(kind, action) {
                    Ok(found) => found,
                    Err(e) => return Executed::failed(None, e),
                };
                let deleted = self.delete(kind, &id).await;
                let warning = match deleted.outcome {
                    Outcome::Done(_) => None,
                    Outcome::Warned(message) => Some(message),
                    Outcome::Failed(e) => return Executed::failed(deleted.change, e),
                };

                let mut created = self.create(kind, desired).await;
                // the old object is gone even if the create failed
                created.change.get_or_insert(StateChange::Remove);
                if let Some(warning) = warning {
                    created.outcome = match created.outcome {
                        Outcome::Done(message) | Outcome::Warned(message) => {
                            Outcome::Warned(format!("{}; {}", warning, message))
                        }
                        failed => failed,
                    };
                }
                created
            }
            ActionType::NoOp => Executed {
                change: None,
                outcome: Outcome::Done("no changes".to_string()),
            },
        }
    }

    async fn create(&self, kind: &dyn ResourceKind, desired: &DesiredState) -> Executed {
        let id = match kind.resource_id(self.ctx.subscription_id(), desired) {
            Ok(id) => id,
            Err(e) => return Executed::failed(None, e),
        };
        let _guard = self.locks.acquire(&id).await;
        match self.reconciler(kind).create(desired).await {
            Ok(ReconciliationOutcome::Created(tracked)) => Executed {
                outcome: Outcome::Done(format!("created {}", tracked.id)),
                change: Some(StateChange::Record(tracked)),
            },
            Ok(other) => Executed::failed(
                None,
                CloudError::StateError(format!("unexpected create outcome {:?}", other)),
            ),
            Err(e) if e.is_ambiguous() => {
                Executed::failed(Some(StateChange::Unconfirmed(id)), e)
            }
            Err(e) => Executed::failed(None, e),
        }
    }

    async fn delete(&self, kind: &dyn ResourceKind, id: &RemoteObjectId) -> Executed {
        let _guard = self.locks.acquire(id).await;
        match self.reconciler(kind).delete(id).await {
            Ok(_) => Executed {
                change: Some(StateChange::Remove),
                outcome: Outcome::Done(format!("destroyed {}", id)),
            },
            Err(e @ CloudError::DeleteNotConfirmed { .. })
                if self.unconfirmed_delete == UnconfirmedDeletePolicy::Warn =>
            {
                Executed {
                    change: Some(StateChange::Remove),
                    outcome: Outcome::Warned(e.to_string()),
                }
            }
            Err(e) => Executed::failed(None, e),
        }
    }

    fn tracked_id(&self, kind: &dyn ResourceKind, action: &Action) -> Result<RemoteObjectId> {
        let raw = action.resource_id.as_deref().ok_or_else(|| {
            CloudError::StateError(format!("{} has no tracked ID", action.name))
        })?;
        RemoteObjectId::parse_insensitively(raw, kind.id_shape())
    }

    fn existing<'a>(
        &self,
        kind: &dyn ResourceKind,
        action: &'a Action,
    ) -> Result<(RemoteObjectId, &'a DesiredState)> {
        let id = self.tracked_id(kind, action)?;
        let desired = action
            .desired
            .as_ref()
            .ok_or_else(|| missing_desired(action))?;
        Ok((id, desired))
    }
}

fn missing_desired(action: &Action) -> CloudError {
    CloudError::StateError(format!(
        "{} action for {} has no desired state",
        action.action_type, action.name
    ))
}
