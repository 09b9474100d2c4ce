//! `azure_availability_set`

use crate::common::{self, SubResource, Tags};
use crate::ids::{AVAILABILITY_SET, PROXIMITY_PLACEMENT_GROUP};
use armada_cloud::{
    AttributeMapper, DesiredState, FieldPolicy, IdShape, ObservedState, RemoteObjectId, Result,
    Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("platform_fault_domain_count", FieldPolicy::ForcesReplacement),
    ("platform_update_domain_count", FieldPolicy::ForcesReplacement),
    ("managed", FieldPolicy::ForcesReplacement),
    ("proximity_placement_group_id", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<AvailabilitySetProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sku {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fault_domain_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_update_domain_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_placement_group: Option<SubResource>,
}

/// Availability sets spread VMs across fault and update domains
pub struct AvailabilitySets;

impl AttributeMapper for AvailabilitySets {
    type Request = AvailabilitySet;
    type Response = AvailabilitySet;

    fn kind(&self) -> &'static str {
        "azure_availability_set"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &AVAILABILITY_SET
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        common::group_scoped_id(&AVAILABILITY_SET, subscription_id, desired)
    }

    fn expand(&self, desired: &DesiredState) -> Result<AvailabilitySet> {
        let managed = desired.bool_or("managed", true)?;
        let proximity_placement_group = common::reference(
            desired,
            "proximity_placement_group_id",
            &PROXIMITY_PLACEMENT_GROUP,
        )?
        .map(|id| SubResource { id });

        Ok(AvailabilitySet {
            location: Some(common::location(desired)?),
            sku: Some(Sku {
                name: Some(if managed { "Aligned" } else { "Classic" }.to_string()),
            }),
            properties: Some(AvailabilitySetProperties {
                platform_fault_domain_count: Some(
                    desired
                        .int_in_range("platform_fault_domain_count", 1, 3)?
                        .unwrap_or(3),
                ),
                platform_update_domain_count: Some(
                    desired
                        .int_in_range("platform_update_domain_count", 1, 20)?
                        .unwrap_or(5),
                ),
                proximity_placement_group,
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: AvailabilitySet) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        let properties = response.properties.unwrap_or_default();
        let managed = response
            .sku
            .and_then(|sku| sku.name)
            .is_some_and(|name| name.eq_ignore_ascii_case("Aligned"));

        observed.insert(
            "platform_fault_domain_count".to_string(),
            Value::from(properties.platform_fault_domain_count),
        );
        observed.insert(
            "platform_update_domain_count".to_string(),
            Value::from(properties.platform_update_domain_count),
        );
        observed.insert("managed".to_string(), Value::from(managed));
        observed.insert(
            "proximity_placement_group_id".to_string(),
            Value::from(
                properties
                    .proximity_placement_group
                    .map(|ppg| common::canonical_reference(&ppg.id, &PROXIMITY_PLACEMENT_GROUP)),
            ),
        );
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        match field {
            "proximity_placement_group_id" => common::eq_ignore_case(desired, observed),
            _ => common::suppress_common(field, desired, observed),
        }
    }
}
