//! `azure_shared_image_version`
//!
//! Used both as a managed resource and as a data source: a lookup reads an
//! existing version by gallery, image and version name and flattens it the
//! same way a managed read does.

use crate::common::{self, Tags};
use crate::ids::{MANAGED_IMAGE, SHARED_IMAGE_VERSION};
use armada_cloud::{
    AttributeMapper, CloudError, DesiredState, FieldPolicy, IdShape, ObservedState,
    RemoteObjectId, Result, Value, lookup_policy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REPLICA_STORAGE_TYPES: &[&str] = &["Standard_LRS", "Standard_ZRS", "Premium_LRS"];

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("gallery_name", FieldPolicy::ForcesReplacement),
    ("image_name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("managed_image_id", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ImageVersionProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVersionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishing_profile: Option<PublishingProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_from_latest: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_regions: Option<Vec<TargetRegion>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRegion {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_replica_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ImageSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSource {
    pub id: Option<String>,
}

pub struct SharedImageVersions;

/// `1.0.0`-style version names
fn validate_version_name(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(CloudError::validation(
            "name",
            format!("{:?} must be a version of the form Major.Minor.Patch", name),
        ))
    }
}

fn target_regions(desired: &DesiredState, location: &str) -> Result<Vec<TargetRegion>> {
    let Some(value) = desired.value("target_regions") else {
        return Ok(vec![TargetRegion {
            name: location.to_string(),
            regional_replica_count: Some(1),
            storage_account_type: None,
        }]);
    };
    let Value::List(items) = value else {
        return Err(CloudError::validation(
            "target_regions",
            format!("expected list but got {}", value.type_name()),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = format!("target_regions.{}", i);
            let Value::Map(map) = item else {
                return Err(CloudError::validation(field, "expected a map"));
            };
            let region = DesiredState::from_values(map.clone());
            let replicas = region
                .int_in_range("regional_replica_count", 1, 100)
                .map_err(|e| CloudError::validation(&field, e.to_string()))?;
            let storage = region
                .string_one_of("storage_account_type", REPLICA_STORAGE_TYPES)
                .map_err(|e| CloudError::validation(&field, e.to_string()))?;
            Ok(TargetRegion {
                name: common::normalize_location(
                    &region
                        .string("name")
                        .map_err(|e| CloudError::validation(&field, e.to_string()))?,
                ),
                regional_replica_count: Some(replicas.unwrap_or(1)),
                storage_account_type: storage,
            })
        })
        .collect()
}

fn flatten_region(region: TargetRegion) -> Value {
    let mut map = BTreeMap::new();
    map.insert(
        "name".to_string(),
        Value::from(common::normalize_location(&region.name)),
    );
    map.insert(
        "regional_replica_count".to_string(),
        Value::from(region.regional_replica_count),
    );
    map.insert(
        "storage_account_type".to_string(),
        Value::from(region.storage_account_type),
    );
    Value::Map(map)
}

/// Region lists match when every configured region is present with the same
/// settings; settings left unset in configuration are not compared
fn regions_match(desired: &Value, observed: &Value) -> bool {
    let (Value::List(desired), Value::List(observed)) = (desired, observed) else {
        return false;
    };
    let field = |region: &Value, key: &str| match region {
        Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
        _ => Value::Null,
    };
    let region_name = |region: &Value| {
        field(region, "name")
            .as_str()
            .map(common::normalize_location)
    };

    desired.len() == observed.len()
        && desired.iter().all(|wanted| {
            observed.iter().any(|seen| {
                region_name(wanted).is_some()
                    && region_name(wanted) == region_name(seen)
                    && ["regional_replica_count", "storage_account_type"]
                        .iter()
                        .all(|key| {
                            let wanted = field(wanted, key);
                            wanted.is_null()
                                || wanted == field(seen, key)
                                || common::eq_ignore_case(&wanted, &field(seen, key))
                        })
            })
        })
}

impl AttributeMapper for SharedImageVersions {
    type Request = ImageVersion;
    type Response = ImageVersion;

    fn kind(&self) -> &'static str {
        "azure_shared_image_version"
    }

    fn api_version(&self) -> &'static str {
        "2023-07-03"
    }

    fn id_shape(&self) -> &'static IdShape {
        &SHARED_IMAGE_VERSION
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "gallery_name", "image_name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        RemoteObjectId::new(
            &SHARED_IMAGE_VERSION,
            &[
                subscription_id,
                &desired.string("resource_group_name")?,
                &desired.string("gallery_name")?,
                &desired.string("image_name")?,
                &desired.string("name")?,
            ],
        )
    }

    fn expand(&self, desired: &DesiredState) -> Result<ImageVersion> {
        validate_version_name(&desired.string("name")?)?;
        let location = common::location(desired)?;
        let managed_image_id = common::reference(desired, "managed_image_id", &MANAGED_IMAGE)?
            .ok_or_else(|| CloudError::validation("managed_image_id", "is required"))?;

        Ok(ImageVersion {
            properties: Some(ImageVersionProperties {
                publishing_profile: Some(PublishingProfile {
                    exclude_from_latest: Some(desired.bool_or("exclude_from_latest", false)?),
                    target_regions: Some(target_regions(desired, &location)?),
                }),
                storage_profile: Some(StorageProfile {
                    source: Some(ImageSource {
                        id: Some(managed_image_id),
                    }),
                }),
            }),
            location: Some(location),
            tags: Some(common::tags(desired)?),
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: ImageVersion) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        let properties = response.properties.unwrap_or_default();
        let publishing = properties.publishing_profile.unwrap_or_default();
        let source = properties
            .storage_profile
            .and_then(|storage| storage.source)
            .and_then(|source| source.id);

        observed.insert(
            "gallery_name".to_string(),
            Value::from(id.segment("galleryName").map(str::to_string)),
        );
        observed.insert(
            "image_name".to_string(),
            Value::from(id.segment("imageName").map(str::to_string)),
        );
        observed.insert(
            "managed_image_id".to_string(),
            Value::from(source.map(|raw| common::canonical_reference(&raw, &MANAGED_IMAGE))),
        );
        observed.insert(
            "exclude_from_latest".to_string(),
            Value::from(publishing.exclude_from_latest.unwrap_or(false)),
        );
        observed.insert(
            "target_regions".to_string(),
            Value::List(
                publishing
                    .target_regions
                    .unwrap_or_default()
                    .into_iter()
                    .map(flatten_region)
                    .collect(),
            ),
        );
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        match field {
            "target_regions" => regions_match(desired, observed),
            "managed_image_id" => common::eq_ignore_case(desired, observed),
            _ => common::suppress_common(field, desired, observed),
        }
    }
}
