//! Helpers shared by the ARM resource kinds

use armada_cloud::{
    CloudError, DesiredState, IdShape, ObservedState, RemoteObjectId, Result, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

/// Reference to another ARM object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubResource {
    #[serde(default)]
    pub id: String,
}

/// `West Europe` and `westeurope` are the same region
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_ascii_lowercase()
}

/// Required, normalized `location` attribute
pub fn location(desired: &DesiredState) -> Result<String> {
    Ok(normalize_location(&desired.string("location")?))
}

pub fn tags(desired: &DesiredState) -> Result<Tags> {
    let tags = desired.string_map("tags")?;
    for key in tags.keys() {
        if key.len() > 512 {
            return Err(CloudError::validation(
                "tags",
                format!("key {:?} is longer than 512 characters", key),
            ));
        }
    }
    Ok(tags)
}

/// Build an ID from the resource group and name attributes
pub fn group_scoped_id(
    shape: &'static IdShape,
    subscription_id: &str,
    desired: &DesiredState,
) -> Result<RemoteObjectId> {
    let resource_group = desired.string("resource_group_name")?;
    let name = desired.string("name")?;
    RemoteObjectId::new(shape, &[subscription_id, &resource_group, &name])
}

/// Optional attribute holding the ID of another object, validated against
/// its shape and reformatted canonically
pub fn reference(
    desired: &DesiredState,
    field: &str,
    shape: &'static IdShape,
) -> Result<Option<String>> {
    desired
        .optional_string(field)?
        .map(|raw| {
            RemoteObjectId::parse(&raw, shape)
                .map(|id| id.to_string())
                .map_err(|e| CloudError::validation(field, e.to_string()))
        })
        .transpose()
}

/// Canonical form of an ID echoed back by the API, or the raw string if it
/// does not match the expected shape
pub fn canonical_reference(raw: &str, shape: &'static IdShape) -> String {
    RemoteObjectId::parse_insensitively(raw, shape)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Attributes every group-scoped object flattens the same way
pub fn base_attributes(
    id: &RemoteObjectId,
    location: Option<&str>,
    tags: Option<Tags>,
) -> ObservedState {
    let mut observed = ObservedState::new();
    observed.insert("id".to_string(), Value::from(id.to_string()));
    observed.insert("name".to_string(), Value::from(id.leaf_name()));
    observed.insert(
        "resource_group_name".to_string(),
        Value::from(id.resource_group().map(str::to_string)),
    );
    observed.insert(
        "location".to_string(),
        Value::from(location.map(normalize_location)),
    );
    observed.insert("tags".to_string(), Value::from(tags.unwrap_or_default()));
    observed
}

/// Diff suppression for fields every kind shares
pub fn suppress_common(field: &str, desired: &Value, observed: &Value) -> bool {
    match (field, desired, observed) {
        ("location", Value::String(a), Value::String(b)) => {
            normalize_location(a) == normalize_location(b)
        }
        _ => false,
    }
}

/// Case-insensitive comparison of two string values
pub fn eq_ignore_case(desired: &Value, observed: &Value) -> bool {
    matches!((desired, observed), (Value::String(a), Value::String(b)) if a.eq_ignore_ascii_case(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AVAILABILITY_SET, PROXIMITY_PLACEMENT_GROUP};

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("westeurope"), "westeurope");
        assert!(suppress_common(
            "location",
            &Value::from("West Europe"),
            &Value::from("westeurope")
        ));
        assert!(!suppress_common(
            "location",
            &Value::from("West US"),
            &Value::from("westeurope")
        ));
    }

    #[test]
    fn test_reference_is_validated() {
        let ppg = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Compute/proximityPlacementGroups/ppg1";
        let desired = DesiredState::new().with("proximity_placement_group_id", ppg);
        assert_eq!(
            reference(&desired, "proximity_placement_group_id", &PROXIMITY_PLACEMENT_GROUP).unwrap(),
            Some(ppg.to_string())
        );

        let err = reference(&desired, "proximity_placement_group_id", &AVAILABILITY_SET).unwrap_err();
        assert!(matches!(err, CloudError::Validation { .. }));
    }

    #[test]
    fn test_base_attributes() {
        let id = RemoteObjectId::new(&AVAILABILITY_SET, &["0000", "RG1", "set1"]).unwrap();
        let observed = base_attributes(&id, Some("West Europe"), None);
        assert_eq!(observed["name"], Value::from("set1"));
        assert_eq!(observed["resource_group_name"], Value::from("RG1"));
        assert_eq!(observed["location"], Value::from("westeurope"));
        assert_eq!(observed["tags"], Value::Map(BTreeMap::new()));
    }
}
