//! `azure_dedicated_host`
//!
//! A host lives inside a host group; its ID is built from the group's ID
//! plus the host name.

use crate::common::{self, Tags};
use crate::ids::{DEDICATED_HOST, DEDICATED_HOST_GROUP};
use armada_cloud::{
    AttributeMapper, ChangeSet, CloudError, DesiredState, FieldPolicy, IdShape, KindOptions,
    ObservedState, RemoteObjectId, Result, UpdateMethod, Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

const LICENSE_TYPES: &[&str] = &["None", "Windows_Server_Hybrid", "Windows_Server_Perpetual"];

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("dedicated_host_group_id", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("sku_name", FieldPolicy::ForcesReplacement),
    ("platform_fault_domain", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedicatedHost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<HostSku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DedicatedHostProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSku {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedicatedHostProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fault_domain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_replace_on_failure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
}

pub struct DedicatedHosts;

fn host_group(desired: &DesiredState) -> Result<RemoteObjectId> {
    let raw = desired.string("dedicated_host_group_id")?;
    RemoteObjectId::parse(&raw, &DEDICATED_HOST_GROUP)
        .map_err(|e| CloudError::validation("dedicated_host_group_id", e.to_string()))
}

impl AttributeMapper for DedicatedHosts {
    type Request = DedicatedHost;
    type Response = DedicatedHost;

    fn kind(&self) -> &'static str {
        "azure_dedicated_host"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &DEDICATED_HOST
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "dedicated_host_group_id"]
    }

    /// The subscription comes from the host group ID, not the context
    fn resource_id(&self, _subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        let group = host_group(desired)?;
        let name = desired.string("name")?;
        let mut values: Vec<&str> = group
            .segments()
            .filter(|(keyword, _)| *keyword != "providers")
            .map(|(_, value)| value)
            .collect();
        values.push(&name);
        RemoteObjectId::new(&DEDICATED_HOST, &values)
    }

    fn expand(&self, desired: &DesiredState) -> Result<DedicatedHost> {
        host_group(desired)?;
        let platform_fault_domain = desired
            .int_in_range("platform_fault_domain", 0, 2)?
            .ok_or_else(|| CloudError::validation("platform_fault_domain", "is required"))?;

        Ok(DedicatedHost {
            location: Some(common::location(desired)?),
            sku: Some(HostSku {
                name: Some(desired.string("sku_name")?),
            }),
            properties: Some(DedicatedHostProperties {
                platform_fault_domain: Some(platform_fault_domain),
                auto_replace_on_failure: Some(desired.bool_or("auto_replace_on_failure", true)?),
                license_type: Some(
                    desired
                        .string_one_of("license_type", LICENSE_TYPES)?
                        .unwrap_or_else(|| "None".to_string()),
                ),
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    fn expand_update(&self, desired: &DesiredState, changes: &ChangeSet) -> Result<DedicatedHost> {
        let mut properties = DedicatedHostProperties::default();
        if changes.contains("auto_replace_on_failure") {
            properties.auto_replace_on_failure =
                Some(desired.bool_or("auto_replace_on_failure", true)?);
        }
        if changes.contains("license_type") {
            properties.license_type = Some(
                desired
                    .string_one_of("license_type", LICENSE_TYPES)?
                    .unwrap_or_else(|| "None".to_string()),
            );
        }
        Ok(DedicatedHost {
            properties: Some(properties),
            tags: changes
                .contains("tags")
                .then(|| common::tags(desired))
                .transpose()?,
            ..DedicatedHost::default()
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: DedicatedHost) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        observed.remove("resource_group_name");
        let properties = response.properties.unwrap_or_default();

        observed.insert(
            "dedicated_host_group_id".to_string(),
            Value::from(
                id.scope(&DEDICATED_HOST_GROUP)
                    .ok()
                    .map(|group| group.to_string()),
            ),
        );
        observed.insert(
            "sku_name".to_string(),
            Value::from(response.sku.and_then(|sku| sku.name)),
        );
        observed.insert(
            "platform_fault_domain".to_string(),
            Value::from(properties.platform_fault_domain),
        );
        observed.insert(
            "auto_replace_on_failure".to_string(),
            Value::from(properties.auto_replace_on_failure),
        );
        observed.insert(
            "license_type".to_string(),
            Value::from(properties.license_type),
        );
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        match field {
            "dedicated_host_group_id" | "sku_name" => common::eq_ignore_case(desired, observed),
            _ => common::suppress_common(field, desired, observed),
        }
    }

    /// The host group keeps reporting a deleted host for a while
    fn options(&self) -> KindOptions {
        KindOptions {
            update_method: UpdateMethod::Patch,
            confirm_delete: true,
            ..KindOptions::default()
        }
    }
}
