//! Armada Cloud reconciliation engine
//!
//! Drives declared cloud resources toward their desired state against a
//! remote management API whose mutations are asynchronous and whose reads are
//! eventually consistent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   armada CLI                     │
//! │           (plan / apply / import / ...)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 armada-cloud                     │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  Provisioner │  │  State Mgmt  │             │
//! │  └──────┬───────┘  └──────────────┘             │
//! │  ┌──────▼───────────────────────────────────┐   │
//! │  │ Reconciler ── OperationWaiter ── Poller  │   │
//! │  └──────┬───────────────────────────────────┘   │
//! │  ┌──────▼───────┐  ┌──────────────┐             │
//! │  │ ResourceKind │  │ RemoteClient │             │
//! │  └──────────────┘  └──────────────┘             │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼─────────────────▼───────┐
//! │        armada-cloud-azure       │
//! │  resource kinds + ARM client    │
//! └─────────────────────────────────┘
//! ```

pub mod action;
pub mod client;
pub mod context;
pub mod engine;
pub mod error;
pub mod id;
pub mod lock;
pub mod lro;
pub mod mapper;
pub mod policy;
pub mod poller;
pub mod reconciler;
pub mod state;
pub mod value;

// Re-exports
pub use action::{
    Action, ActionResult, ActionType, ApplyResult, ChangeSet, FieldChange, Plan, PlanSummary,
    diff, plan_resource,
};
pub use client::{
    ClientResult, GetResponse, MutationResponse, OperationHandle, OperationStatus, PollLocation,
    RemoteClient, RemoteFault, TransportError,
};
pub use context::{CloudContext, KindRegistry};
pub use engine::{ManagedResource, Provisioner, RefreshReport, UnconfirmedDeletePolicy};
pub use error::{CloudError, Operation, Result};
pub use id::{IdShape, RemoteObjectId, SegmentSpec, SegmentValue, validate_id};
pub use lock::ObjectLocks;
pub use lro::{OperationWaiter, WaitOutcome};
pub use mapper::{
    AttributeMapper, FieldPolicy, KindOptions, ResourceKind, UpdateMethod, erase, lookup_policy,
};
pub use policy::{BackoffConfig, ResourceTimeouts, RetryConfig, StabilityConfig};
pub use poller::{PollOutcome, PollStats, Presence, poll_until_stable};
pub use reconciler::{ReconciliationOutcome, Reconciler, TrackedObject};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
pub use value::{Attribute, DesiredState, ObservedState, Value};
