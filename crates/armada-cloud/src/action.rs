//! Planned actions and field-level change sets

use crate::error::Result;
use crate::mapper::{FieldPolicy, ResourceKind};
use crate::reconciler::TrackedObject;
use crate::value::{Attribute, DesiredState, ObservedState, Value};
use serde::{Deserialize, Serialize};

/// One attribute whose desired value differs from the observed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub policy: FieldPolicy,
    pub before: Value,
    /// `Null` when the attribute was removed from configuration
    pub after: Value,
}

/// The set of attributes that differ between desired and observed state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: FieldChange) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Fields that cannot be changed in place
    pub fn replacement_fields(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|c| c.policy == FieldPolicy::ForcesReplacement)
            .map(|c| c.field.clone())
            .collect()
    }

    pub fn requires_replacement(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.policy == FieldPolicy::ForcesReplacement)
    }
}

impl FromIterator<FieldChange> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = FieldChange>>(iter: T) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

fn values_match(desired: &Value, observed: &Value) -> bool {
    desired == observed || (desired.is_empty_like() && observed.is_empty_like())
}

/// Compare desired against observed state, ignoring the fields in `skip`
///
/// Attributes left to the remote side (`Computed`) and computed-only fields
/// never produce a change.
pub fn diff(
    kind: &dyn ResourceKind,
    desired: &DesiredState,
    observed: &ObservedState,
    skip: &[&str],
) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (field, attribute) in desired.iter() {
        if skip.contains(&field.as_str()) {
            continue;
        }
        let policy = kind.field_policy(field);
        if policy == FieldPolicy::ComputedOnly {
            continue;
        }
        let after = match attribute {
            Attribute::Set(value) => value.clone(),
            Attribute::Removed => Value::Null,
            Attribute::Computed => continue,
        };
        let before = observed.get(field).cloned().unwrap_or_default();
        if values_match(&after, &before) || kind.suppress_diff(field, &after, &before) {
            continue;
        }
        changes.push(FieldChange {
            field: field.clone(),
            policy,
            before,
            after,
        });
    }

    changes
}

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Key of the resource in the manifest and the state file
    pub name: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource kind (e.g., "azure_availability_set")
    pub kind: String,

    /// Remote object ID, when it can be computed
    pub resource_id: Option<String>,

    /// Description of the action
    pub description: String,

    /// Attributes that differ from the last observed state
    pub changes: ChangeSet,

    /// Desired state to apply; absent for deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<DesiredState>,
}

impl Action {
    /// Remove a tracked object that is no longer configured
    pub fn delete(name: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        let name = name.into();
        let kind = kind.into();
        Self {
            description: format!("{} {} will be destroyed", kind, name),
            name,
            action_type: ActionType::Delete,
            kind,
            resource_id: Some(id.into()),
            changes: ChangeSet::new(),
            desired: None,
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete the resource and create it again
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Decide what to do with one configured resource
///
/// The candidate ID is computed from configuration and compared with the
/// tracked ID under the identity model's case-insensitive equality, so a
/// resource group echoed back in different casing is not a change.
pub fn plan_resource(
    kind: &dyn ResourceKind,
    subscription_id: &str,
    name: &str,
    desired: &DesiredState,
    tracked: Option<&TrackedObject>,
) -> Result<Action> {
    let id = kind.resource_id(subscription_id, desired)?;
    // surface validation errors at plan time, before any remote call
    kind.expand_body(desired)?;

    let Some(tracked) = tracked else {
        return Ok(Action {
            name: name.to_string(),
            action_type: ActionType::Create,
            kind: kind.kind().to_string(),
            resource_id: Some(id.to_string()),
            description: format!("{} {} will be created", kind.kind(), name),
            changes: ChangeSet::new(),
            desired: Some(desired.clone()),
        });
    };

    let changes = if id == tracked.id {
        diff(kind, desired, &tracked.observed, kind.id_fields())
    } else {
        let mut changes: ChangeSet = diff(kind, desired, &tracked.observed, &[])
            .iter()
            .cloned()
            .map(|mut change| {
                if kind.id_fields().contains(&change.field.as_str()) {
                    change.policy = FieldPolicy::ForcesReplacement;
                }
                change
            })
            .collect();
        if !changes.requires_replacement() {
            changes.push(FieldChange {
                field: "id".to_string(),
                policy: FieldPolicy::ForcesReplacement,
                before: Value::from(tracked.id.to_string()),
                after: Value::from(id.to_string()),
            });
        }
        changes
    };
    kind.validate_change(&changes)?;

    let (action_type, description) = if changes.is_empty() {
        (ActionType::NoOp, format!("{} {} is up to date", kind.kind(), name))
    } else if changes.requires_replacement() {
        (
            ActionType::Replace,
            format!(
                "{} {} must be replaced ({})",
                kind.kind(),
                name,
                changes.replacement_fields().join(", ")
            ),
        )
    } else {
        (
            ActionType::Update,
            format!("{} {} will be updated in place", kind.kind(), name),
        )
    };

    Ok(Action {
        name: name.to_string(),
        action_type,
        kind: kind.kind().to_string(),
        resource_id: Some(tracked.id.to_string()),
        description,
        changes,
        desired: Some(desired.clone()),
    })
}

/// Result of applying actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Actions that completed with a caveat (e.g. unconfirmed deletes)
    pub warnings: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, name: String, message: String) {
        self.succeeded.push(ActionResult {
            name,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, name: String, error: String) {
        self.failed.push(ActionResult {
            name,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }

    pub fn add_warning(&mut self, name: String, message: String) {
        self.warnings.push(ActionResult {
            name,
            success: true,
            message,
            error: None,
        });
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Resource the action was applied to
    pub name: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
