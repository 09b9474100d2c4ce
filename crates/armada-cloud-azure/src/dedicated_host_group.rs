//! `azure_dedicated_host_group`

use crate::common::{self, Tags};
use crate::ids::DEDICATED_HOST_GROUP;
use armada_cloud::{
    AttributeMapper, ChangeSet, CloudError, DesiredState, FieldPolicy, IdShape, KindOptions,
    ObservedState, RemoteObjectId, Result, UpdateMethod, Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

const ZONES: &[&str] = &["1", "2", "3"];

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("platform_fault_domain_count", FieldPolicy::ForcesReplacement),
    ("zone", FieldPolicy::ForcesReplacement),
    ("automatic_placement_enabled", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedicatedHostGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DedicatedHostGroupProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedicatedHostGroupProperties {
    pub platform_fault_domain_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_automatic_placement: Option<bool>,
}

pub struct DedicatedHostGroups;

impl AttributeMapper for DedicatedHostGroups {
    type Request = DedicatedHostGroup;
    type Response = DedicatedHostGroup;

    fn kind(&self) -> &'static str {
        "azure_dedicated_host_group"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &DEDICATED_HOST_GROUP
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        common::group_scoped_id(&DEDICATED_HOST_GROUP, subscription_id, desired)
    }

    fn expand(&self, desired: &DesiredState) -> Result<DedicatedHostGroup> {
        let fault_domains = desired
            .int_in_range("platform_fault_domain_count", 1, 3)?
            .ok_or_else(|| CloudError::validation("platform_fault_domain_count", "is required"))?;

        Ok(DedicatedHostGroup {
            location: Some(common::location(desired)?),
            zones: desired.string_one_of("zone", ZONES)?.map(|zone| vec![zone]),
            properties: Some(DedicatedHostGroupProperties {
                platform_fault_domain_count: Some(fault_domains),
                support_automatic_placement: Some(
                    desired.bool_or("automatic_placement_enabled", false)?,
                ),
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    fn expand_update(
        &self,
        desired: &DesiredState,
        _changes: &ChangeSet,
    ) -> Result<DedicatedHostGroup> {
        Ok(DedicatedHostGroup {
            tags: Some(common::tags(desired)?),
            ..DedicatedHostGroup::default()
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: DedicatedHostGroup) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        let properties = response.properties.unwrap_or_default();

        observed.insert(
            "zone".to_string(),
            Value::from(response.zones.and_then(|zones| zones.into_iter().next())),
        );
        observed.insert(
            "platform_fault_domain_count".to_string(),
            Value::from(properties.platform_fault_domain_count),
        );
        observed.insert(
            "automatic_placement_enabled".to_string(),
            Value::from(properties.support_automatic_placement.unwrap_or(false)),
        );
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        common::suppress_common(field, desired, observed)
    }

    /// Hosts are detached asynchronously after their own delete completes
    fn options(&self) -> KindOptions {
        KindOptions {
            update_method: UpdateMethod::Patch,
            confirm_delete: true,
            ..KindOptions::default()
        }
    }
}
