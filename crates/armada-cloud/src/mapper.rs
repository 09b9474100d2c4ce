//! Attribute mapping between configuration and typed API shapes
//!
//! Each resource kind implements [`AttributeMapper`] once: it knows how to
//! build the kind's ID from configuration, how to expand desired state into
//! a typed request, and how to flatten a typed response into observed state.
//! The engine works against the object-safe [`ResourceKind`], obtained with
//! [`erase`].

use crate::action::ChangeSet;
use crate::error::{CloudError, Result};
use crate::id::{IdShape, RemoteObjectId};
use crate::policy::ResourceTimeouts;
use crate::value::{DesiredState, ObservedState, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a change to a field is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Updated in place
    Mutable,
    /// The object must be destroyed and recreated
    ForcesReplacement,
    /// Set by the remote side only; never diffed
    ComputedOnly,
}

/// Look up a field in a static policy table, defaulting to `Mutable`
pub fn lookup_policy(table: &[(&str, FieldPolicy)], field: &str) -> FieldPolicy {
    table
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, policy)| *policy)
        .unwrap_or(FieldPolicy::Mutable)
}

/// HTTP verb used for in-place updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Full replacement of the object body
    Put,
    /// Partial update with only the changed fields
    Patch,
}

/// Per-kind reconciliation policy
#[derive(Debug, Clone)]
pub struct KindOptions {
    pub timeouts: ResourceTimeouts,
    /// Adopt an existing object on Create instead of failing with
    /// `AlreadyExists`
    pub adopt_existing: bool,
    /// Run the stability poll after a delete completes
    pub confirm_delete: bool,
    pub update_method: UpdateMethod,
}

impl Default for KindOptions {
    fn default() -> Self {
        Self {
            timeouts: ResourceTimeouts::default(),
            adopt_existing: false,
            confirm_delete: true,
            update_method: UpdateMethod::Put,
        }
    }
}

/// Typed mapping for one resource kind
pub trait AttributeMapper: Send + Sync + 'static {
    type Request: Serialize;
    type Response: DeserializeOwned;

    /// Type name used in configuration, e.g. `azure_availability_set`
    fn kind(&self) -> &'static str;

    fn api_version(&self) -> &'static str;

    fn id_shape(&self) -> &'static IdShape;

    /// Attributes that make up the object's ID
    fn id_fields(&self) -> &'static [&'static str];

    /// Compute the candidate ID from configuration
    fn resource_id(&self, subscription_id: &str, desired: &DesiredState)
    -> Result<RemoteObjectId>;

    fn expand(&self, desired: &DesiredState) -> Result<Self::Request>;

    /// Build the request body for an in-place update
    fn expand_update(&self, desired: &DesiredState, changes: &ChangeSet) -> Result<Self::Request> {
        let _ = changes;
        self.expand(desired)
    }

    fn flatten(&self, id: &RemoteObjectId, response: Self::Response) -> ObservedState;

    fn field_policy(&self, field: &str) -> FieldPolicy;

    /// Whether a desired and an observed value should be considered equal
    /// even though they differ structurally (e.g. normalized locations)
    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        let _ = (field, desired, observed);
        false
    }

    /// Reject changes that the API would refuse, before any remote call
    fn validate_change(&self, changes: &ChangeSet) -> Result<()> {
        let _ = changes;
        Ok(())
    }

    fn options(&self) -> KindOptions {
        KindOptions::default()
    }
}

/// Object-safe view of an [`AttributeMapper`] working on JSON bodies
pub trait ResourceKind: Send + Sync {
    fn kind(&self) -> &'static str;
    fn api_version(&self) -> &'static str;
    fn id_shape(&self) -> &'static IdShape;
    fn id_fields(&self) -> &'static [&'static str];
    fn resource_id(&self, subscription_id: &str, desired: &DesiredState)
    -> Result<RemoteObjectId>;
    fn expand_body(&self, desired: &DesiredState) -> Result<serde_json::Value>;
    fn expand_update_body(
        &self,
        desired: &DesiredState,
        changes: &ChangeSet,
    ) -> Result<serde_json::Value>;
    fn flatten_body(&self, id: &RemoteObjectId, body: serde_json::Value) -> Result<ObservedState>;
    fn field_policy(&self, field: &str) -> FieldPolicy;
    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool;
    fn validate_change(&self, changes: &ChangeSet) -> Result<()>;
    fn options(&self) -> KindOptions;
}

struct Erased<M>(M);

impl<M: AttributeMapper> ResourceKind for Erased<M> {
    fn kind(&self) -> &'static str {
        self.0.kind()
    }

    fn api_version(&self) -> &'static str {
        self.0.api_version()
    }

    fn id_shape(&self) -> &'static IdShape {
        self.0.id_shape()
    }

    fn id_fields(&self) -> &'static [&'static str] {
        self.0.id_fields()
    }

    fn resource_id(
        &self,
        subscription_id: &str,
        desired: &DesiredState,
    ) -> Result<RemoteObjectId> {
        self.0.resource_id(subscription_id, desired)
    }

    fn expand_body(&self, desired: &DesiredState) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.0.expand(desired)?)?)
    }

    fn expand_update_body(
        &self,
        desired: &DesiredState,
        changes: &ChangeSet,
    ) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.0.expand_update(desired, changes)?)?)
    }

    fn flatten_body(&self, id: &RemoteObjectId, body: serde_json::Value) -> Result<ObservedState> {
        let response = serde_json::from_value::<M::Response>(body).map_err(|source| {
            CloudError::Decode {
                kind: self.0.kind().to_string(),
                source,
            }
        })?;
        Ok(self.0.flatten(id, response))
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        self.0.field_policy(field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        self.0.suppress_diff(field, desired, observed)
    }

    fn validate_change(&self, changes: &ChangeSet) -> Result<()> {
        self.0.validate_change(changes)
    }

    fn options(&self) -> KindOptions {
        self.0.options()
    }
}

/// Wrap a typed mapper for use by the engine
pub fn erase<M: AttributeMapper>(mapper: M) -> Arc<dyn ResourceKind> {
    Arc::new(Erased(mapper))
}
