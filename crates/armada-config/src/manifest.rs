//! Declared resources and data sources
//!
//! ```yaml
//! resources:
//!   web_set:
//!     type: azure_availability_set
//!     name: web-set
//!     resource_group_name: rg1
//!     location: West Europe
//!     platform_fault_domain_count: 2
//!
//! data:
//!   base_image:
//!     type: azure_shared_image_version
//!     name: 1.0.0
//!     gallery_name: gallery1
//!     image_name: ubuntu
//!     resource_group_name: rg1
//! ```
//!
//! An attribute set to `null` is marked as removed, so the planner compares
//! it against the observed value instead of ignoring it.

use crate::error::{ConfigError, Result};
use armada_cloud::{DesiredState, ManagedResource, Value};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Objects to create and keep in sync
    pub resources: Vec<ManagedResource>,

    /// Existing objects that are only read
    pub data: Vec<ManagedResource>,
}

impl Manifest {
    pub fn resource(&self, name: &str) -> Option<&ManagedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn data_source(&self, name: &str) -> Option<&ManagedResource> {
        self.data.iter().find(|r| r.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.data.is_empty()
    }
}

/// One entry under `resources` or `data` as written in YAML
#[derive(Debug, Deserialize)]
pub(crate) struct RawResource {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    attributes: BTreeMap<String, serde_yaml::Value>,
}

pub(crate) fn build(
    resources: BTreeMap<String, RawResource>,
    data: BTreeMap<String, RawResource>,
) -> Result<Manifest> {
    Ok(Manifest {
        resources: convert_all(resources)?,
        data: convert_all(data)?,
    })
}

fn convert_all(entries: BTreeMap<String, RawResource>) -> Result<Vec<ManagedResource>> {
    entries
        .into_iter()
        .map(|(name, raw)| convert(name, raw))
        .collect()
}

fn convert(name: String, raw: RawResource) -> Result<ManagedResource> {
    validate_name(&name)?;
    if raw.kind.trim().is_empty() {
        return Err(ConfigError::InvalidResource {
            name,
            reason: "type must not be empty".to_string(),
        });
    }

    let mut desired = DesiredState::new();
    for (field, value) in raw.attributes {
        if value.is_null() {
            desired.mark_removed(field);
            continue;
        }
        let value = to_value(&value).map_err(|reason| ConfigError::InvalidValue {
            resource: name.clone(),
            field: field.clone(),
            reason,
        })?;
        desired.set(field, value);
    }

    Ok(ManagedResource::new(name, raw.kind, desired))
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidResource {
            name: name.to_string(),
            reason: "names may only contain letters, digits, '_' and '-'".to_string(),
        })
    }
}

fn to_value(value: &serde_yaml::Value) -> std::result::Result<Value, String> {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Bool(*b)),
        Yaml::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| format!("{} is not a 64-bit integer", n)),
        Yaml::String(s) => Ok(Value::String(s.clone())),
        Yaml::Sequence(items) => items
            .iter()
            .map(to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        Yaml::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, item) in mapping {
                map.insert(map_key(key)?, to_value(item)?);
            }
            Ok(Value::Map(map))
        }
        Yaml::Tagged(tagged) => Err(format!("tagged values ({}) are not supported", tagged.tag)),
    }
}

fn map_key(key: &serde_yaml::Value) -> std::result::Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        _ => Err("map keys must be scalars".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_cloud::Attribute;

    fn parse(yaml: &str) -> Result<Manifest> {
        let resources: BTreeMap<String, RawResource> = serde_yaml::from_str(yaml)?;
        build(resources, BTreeMap::new())
    }

    #[test]
    fn test_attribute_types() {
        let manifest = parse(
            r#"
disk:
  type: azure_managed_disk
  name: data1
  disk_size_gb: 128
  zoned: false
  zones: ["1", "2"]
  tags:
    env: prod
    tier: 2
"#,
        )
        .unwrap();

        let disk = manifest.resource("disk").unwrap();
        assert_eq!(disk.kind, "azure_managed_disk");
        assert_eq!(disk.desired.int("disk_size_gb").unwrap(), 128);
        assert!(!disk.desired.bool_or("zoned", true).unwrap());
        assert_eq!(disk.desired.string_list("zones").unwrap(), vec!["1", "2"]);

        let tags = disk.desired.value("tags").unwrap();
        let Value::Map(tags) = tags else {
            panic!("tags should be a map");
        };
        assert_eq!(tags["tier"], Value::Int(2));
        assert!(!disk.desired.is_set("type"));
    }

    #[test]
    fn test_null_marks_removed() {
        let manifest = parse(
            r#"
set:
  type: azure_availability_set
  name: set1
  proximity_placement_group_id: ~
"#,
        )
        .unwrap();
        let set = manifest.resource("set").unwrap();
        assert_eq!(
            set.desired.attribute("proximity_placement_group_id"),
            &Attribute::Removed
        );
    }

    #[test]
    fn test_rejects_floats() {
        let err = parse(
            r#"
disk:
  type: azure_managed_disk
  disk_size_gb: 12.5
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref resource, ref field, .. }
                if resource == "disk" && field == "disk_size_gb"
        ));
    }

    #[test]
    fn test_rejects_bad_names() {
        let err = parse(
            r#"
"web set":
  type: azure_availability_set
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidResource { .. }));
    }

    #[test]
    fn test_type_is_required() {
        assert!(parse("disk:\n  name: data1\n").is_err());
    }
}
