//! `azure_managed_disk`
//!
//! Storage type, size and OS type are updated in place with a PATCH; the
//! creation source of a disk can only change by replacing it. Disks can grow
//! but never shrink.

use crate::common::{self, Tags};
use crate::ids::{MANAGED_DISK, SHARED_IMAGE_VERSION};
use armada_cloud::{
    AttributeMapper, ChangeSet, CloudError, DesiredState, FieldPolicy, IdShape, KindOptions,
    ObservedState, RemoteObjectId, Result, UpdateMethod, Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

pub const STORAGE_ACCOUNT_TYPES: &[&str] = &[
    "Standard_LRS",
    "StandardSSD_ZRS",
    "Premium_LRS",
    "PremiumV2_LRS",
    "Premium_ZRS",
    "StandardSSD_LRS",
    "UltraSSD_LRS",
];

pub const CREATE_OPTIONS: &[&str] = &[
    "Copy",
    "Empty",
    "FromImage",
    "Import",
    "ImportSecure",
    "Restore",
    "Upload",
];

const OS_TYPES: &[&str] = &["Windows", "Linux"];

const MAX_DISK_SIZE_GB: i64 = 32767;

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("create_option", FieldPolicy::ForcesReplacement),
    ("source_uri", FieldPolicy::ForcesReplacement),
    ("source_resource_id", FieldPolicy::ForcesReplacement),
    ("storage_account_id", FieldPolicy::ForcesReplacement),
    ("image_reference_id", FieldPolicy::ForcesReplacement),
    ("gallery_image_reference_id", FieldPolicy::ForcesReplacement),
    ("upload_size_bytes", FieldPolicy::ForcesReplacement),
    ("disk_state", FieldPolicy::ComputedOnly),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<DiskSku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DiskProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskSku {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_data: Option<CreationData>,
    #[serde(rename = "diskSizeGB", skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(skip_serializing)]
    pub disk_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationData {
    pub create_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<ImageReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_image_reference: Option<ImageReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageReference {
    pub id: Option<String>,
}

pub struct ManagedDisks;

impl ManagedDisks {
    fn creation_data(&self, desired: &DesiredState) -> Result<CreationData> {
        let create_option = desired
            .string_one_of("create_option", CREATE_OPTIONS)?
            .ok_or_else(|| CloudError::validation("create_option", "is required"))?;
        let required = |field: &str| {
            desired.optional_string(field)?.ok_or_else(|| {
                CloudError::validation(
                    field,
                    format!("must be specified when `create_option` is set to `{}`", create_option),
                )
            })
        };

        let mut data = CreationData::default();
        match create_option.as_str() {
            "Empty" => {
                if !desired.is_set("disk_size_gb") {
                    return Err(CloudError::validation(
                        "disk_size_gb",
                        "must be specified when `create_option` is set to `Empty`",
                    ));
                }
            }
            "Import" | "ImportSecure" => {
                data.source_uri = Some(required("source_uri")?);
                data.storage_account_id = Some(required("storage_account_id")?);
            }
            "Copy" | "Restore" => {
                data.source_resource_id = Some(required("source_resource_id")?);
            }
            "FromImage" => {
                let gallery = common::reference(
                    desired,
                    "gallery_image_reference_id",
                    &SHARED_IMAGE_VERSION,
                )?;
                match (desired.optional_string("image_reference_id")?, gallery) {
                    (Some(_), Some(_)) => {
                        return Err(CloudError::validation(
                            "image_reference_id",
                            "conflicts with `gallery_image_reference_id`",
                        ));
                    }
                    (Some(id), None) => data.image_reference = Some(ImageReference { id: Some(id) }),
                    (None, Some(id)) => {
                        data.gallery_image_reference = Some(ImageReference { id: Some(id) })
                    }
                    (None, None) => {
                        return Err(CloudError::validation(
                            "image_reference_id",
                            "`image_reference_id` or `gallery_image_reference_id` must be specified when `create_option` is set to `FromImage`",
                        ));
                    }
                }
            }
            "Upload" => {
                let size = desired.optional_int("upload_size_bytes")?.filter(|s| *s >= 1);
                data.upload_size_bytes = Some(size.ok_or_else(|| {
                    CloudError::validation(
                        "upload_size_bytes",
                        "must be specified when `create_option` is set to `Upload`",
                    )
                })?);
            }
            _ => {}
        }
        data.create_option = Some(create_option);
        Ok(data)
    }
}

impl AttributeMapper for ManagedDisks {
    type Request = Disk;
    type Response = Disk;

    fn kind(&self) -> &'static str {
        "azure_managed_disk"
    }

    fn api_version(&self) -> &'static str {
        "2023-10-02"
    }

    fn id_shape(&self) -> &'static IdShape {
        &MANAGED_DISK
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        common::group_scoped_id(&MANAGED_DISK, subscription_id, desired)
    }

    fn expand(&self, desired: &DesiredState) -> Result<Disk> {
        let storage_account_type = desired
            .string_one_of("storage_account_type", STORAGE_ACCOUNT_TYPES)?
            .ok_or_else(|| CloudError::validation("storage_account_type", "is required"))?;

        Ok(Disk {
            location: Some(common::location(desired)?),
            sku: Some(DiskSku {
                name: Some(storage_account_type),
            }),
            properties: Some(DiskProperties {
                creation_data: Some(self.creation_data(desired)?),
                disk_size_gb: desired.int_in_range("disk_size_gb", 1, MAX_DISK_SIZE_GB)?,
                os_type: desired.string_one_of("os_type", OS_TYPES)?,
                disk_state: None,
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    /// Only the changed fields are sent
    fn expand_update(&self, desired: &DesiredState, changes: &ChangeSet) -> Result<Disk> {
        let mut update = Disk::default();
        let mut properties = DiskProperties::default();

        if changes.contains("storage_account_type") {
            update.sku = Some(DiskSku {
                name: desired.string_one_of("storage_account_type", STORAGE_ACCOUNT_TYPES)?,
            });
        }
        if changes.contains("disk_size_gb") {
            properties.disk_size_gb = desired.int_in_range("disk_size_gb", 1, MAX_DISK_SIZE_GB)?;
        }
        if changes.contains("os_type") {
            properties.os_type = desired.string_one_of("os_type", OS_TYPES)?;
        }
        if changes.contains("tags") {
            update.tags = Some(common::tags(desired)?);
        }
        update.properties = Some(properties);
        Ok(update)
    }

    fn flatten(&self, id: &RemoteObjectId, response: Disk) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        let properties = response.properties.unwrap_or_default();
        let creation = properties.creation_data.unwrap_or_default();

        observed.insert(
            "storage_account_type".to_string(),
            Value::from(response.sku.and_then(|sku| sku.name)),
        );
        observed.insert("create_option".to_string(), Value::from(creation.create_option));
        observed.insert("source_uri".to_string(), Value::from(creation.source_uri));
        observed.insert(
            "source_resource_id".to_string(),
            Value::from(creation.source_resource_id),
        );
        observed.insert(
            "storage_account_id".to_string(),
            Value::from(creation.storage_account_id),
        );
        observed.insert(
            "image_reference_id".to_string(),
            Value::from(creation.image_reference.and_then(|r| r.id)),
        );
        observed.insert(
            "gallery_image_reference_id".to_string(),
            Value::from(
                creation
                    .gallery_image_reference
                    .and_then(|r| r.id)
                    .map(|raw| common::canonical_reference(&raw, &SHARED_IMAGE_VERSION)),
            ),
        );
        observed.insert(
            "upload_size_bytes".to_string(),
            Value::from(creation.upload_size_bytes),
        );
        observed.insert("disk_size_gb".to_string(), Value::from(properties.disk_size_gb));
        observed.insert("os_type".to_string(), Value::from(properties.os_type));
        observed.insert("disk_state".to_string(), Value::from(properties.disk_state));
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        match field {
            "storage_account_type"
            | "source_resource_id"
            | "storage_account_id"
            | "image_reference_id"
            | "gallery_image_reference_id" => common::eq_ignore_case(desired, observed),
            _ => common::suppress_common(field, desired, observed),
        }
    }

    fn validate_change(&self, changes: &ChangeSet) -> Result<()> {
        if let Some(change) = changes.get("disk_size_gb")
            && let (Some(before), Some(after)) = (change.before.as_int(), change.after.as_int())
            && after < before
        {
            return Err(CloudError::validation(
                "disk_size_gb",
                "New size must be greater than original size. Shrinking disks is not supported on Azure",
            ));
        }
        Ok(())
    }

    fn options(&self) -> KindOptions {
        KindOptions {
            update_method: UpdateMethod::Patch,
            ..KindOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_cloud::{ActionType, TrackedObject, erase, plan_resource};
    use serde_json::json;

    fn desired() -> DesiredState {
        DesiredState::new()
            .with("name", "disk1")
            .with("resource_group_name", "rg1")
            .with("location", "westeurope")
            .with("storage_account_type", "Standard_LRS")
            .with("create_option", "Empty")
            .with("disk_size_gb", 10)
    }

    fn tracked(disk_size_gb: i64, storage_account_type: &str) -> TrackedObject {
        let id = ManagedDisks.resource_id("0000", &desired()).unwrap();
        let response: Disk = serde_json::from_value(json!({
            "location": "westeurope",
            "sku": {"name": storage_account_type},
            "properties": {
                "creationData": {"createOption": "Empty"},
                "diskSizeGB": disk_size_gb,
                "diskState": "Unattached"
            }
        }))
        .unwrap();
        let observed = ManagedDisks.flatten(&id, response);
        TrackedObject { id, observed }
    }

    #[test]
    fn test_expand_empty_disk() {
        let body = serde_json::to_value(ManagedDisks.expand(&desired()).unwrap()).unwrap();
        assert_eq!(body["sku"]["name"], "Standard_LRS");
        assert_eq!(body["properties"]["creationData"]["createOption"], "Empty");
        assert_eq!(body["properties"]["diskSizeGB"], 10);
        assert!(body["properties"].get("diskState").is_none());
    }

    #[test]
    fn test_expand_requires_sources() {
        let copy = desired().with("create_option", "Copy");
        let err = ManagedDisks.expand(&copy).unwrap_err();
        assert!(err.to_string().contains("source_resource_id"));

        let empty = DesiredState::new()
            .with("name", "disk1")
            .with("resource_group_name", "rg1")
            .with("location", "westeurope")
            .with("storage_account_type", "Standard_LRS")
            .with("create_option", "Empty");
        assert!(ManagedDisks.expand(&empty).is_err());

        let unknown = desired().with("storage_account_type", "Magnetic");
        assert!(ManagedDisks.expand(&unknown).is_err());
    }

    #[test]
    fn test_grow_is_an_in_place_update() {
        let kind = erase(ManagedDisks);
        let action = plan_resource(
            kind.as_ref(),
            "0000",
            "data",
            &desired().with("disk_size_gb", 20),
            Some(&tracked(10, "Standard_LRS")),
        )
        .unwrap();
        assert_eq!(action.action_type, ActionType::Update);

        let body = kind
            .expand_update_body(&desired().with("disk_size_gb", 20), &action.changes)
            .unwrap();
        assert_eq!(body, json!({"properties": {"diskSizeGB": 20}}));
    }

    #[test]
    fn test_shrink_is_rejected_at_plan_time() {
        let kind = erase(ManagedDisks);
        let err = plan_resource(
            kind.as_ref(),
            "0000",
            "data",
            &desired().with("disk_size_gb", 5),
            Some(&tracked(10, "Standard_LRS")),
        )
        .unwrap_err();
        assert!(matches!(err, CloudError::Validation { .. }));
        assert!(err.to_string().contains("Shrinking disks is not supported on Azure"));
    }

    #[test]
    fn test_storage_type_casing_is_not_a_change() {
        let kind = erase(ManagedDisks);
        let action = plan_resource(
            kind.as_ref(),
            "0000",
            "data",
            &desired(),
            Some(&tracked(10, "standard_lrs")),
        )
        .unwrap();
        assert_eq!(action.action_type, ActionType::NoOp, "{:?}", action.changes);
    }

    #[test]
    fn test_create_option_forces_replacement() {
        let kind = erase(ManagedDisks);
        let action = plan_resource(
            kind.as_ref(),
            "0000",
            "data",
            &desired()
                .with("create_option", "Copy")
                .with("source_resource_id", "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Compute/disks/other"),
            Some(&tracked(10, "Standard_LRS")),
        )
        .unwrap();
        assert_eq!(action.action_type, ActionType::Replace);
        assert!(action.changes.replacement_fields().contains(&"create_option".to_string()));
    }
}
