//! `azure_proximity_placement_group`

use crate::common::{self, Tags};
use crate::ids::PROXIMITY_PLACEMENT_GROUP;
use armada_cloud::{
    AttributeMapper, DesiredState, FieldPolicy, IdShape, ObservedState, RemoteObjectId, Result,
    Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProximityPlacementGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ProximityPlacementGroupProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityPlacementGroupProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_placement_group_type: Option<String>,
}

pub struct ProximityPlacementGroups;

impl AttributeMapper for ProximityPlacementGroups {
    type Request = ProximityPlacementGroup;
    type Response = ProximityPlacementGroup;

    fn kind(&self) -> &'static str {
        "azure_proximity_placement_group"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &PROXIMITY_PLACEMENT_GROUP
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        common::group_scoped_id(&PROXIMITY_PLACEMENT_GROUP, subscription_id, desired)
    }

    fn expand(&self, desired: &DesiredState) -> Result<ProximityPlacementGroup> {
        Ok(ProximityPlacementGroup {
            location: Some(common::location(desired)?),
            properties: Some(ProximityPlacementGroupProperties {
                proximity_placement_group_type: Some("Standard".to_string()),
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: ProximityPlacementGroup) -> ObservedState {
        common::base_attributes(id, response.location.as_deref(), response.tags)
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        common::suppress_common(field, desired, observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_cloud::{ActionType, TrackedObject, erase, plan_resource};
    use serde_json::json;

    #[test]
    fn test_tag_change_is_an_update() {
        let kind = erase(ProximityPlacementGroups);
        let desired = DesiredState::new()
            .with("name", "ppg1")
            .with("resource_group_name", "rg1")
            .with("location", "West Europe");
        let id = kind.resource_id("0000", &desired).unwrap();
        let observed = kind
            .flatten_body(&id, json!({"location": "westeurope", "tags": {"env": "dev"}}))
            .unwrap();
        let tracked = TrackedObject { id, observed };

        let mut tags = std::collections::BTreeMap::new();
        tags.insert("env".to_string(), "prod".to_string());
        let action = plan_resource(
            kind.as_ref(),
            "0000",
            "ppg",
            &desired.with("tags", tags),
            Some(&tracked),
        )
        .unwrap();

        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.changes.len(), 1);
        assert!(action.changes.contains("tags"));
    }
}
