//! `azure_ssh_public_key`

use crate::common::{self, Tags};
use crate::ids::SSH_PUBLIC_KEY;
use armada_cloud::{
    AttributeMapper, ChangeSet, CloudError, DesiredState, FieldPolicy, IdShape, KindOptions,
    ObservedState, RemoteObjectId, Result, UpdateMethod, Value, lookup_policy,
};
use serde::{Deserialize, Serialize};

const KEY_PREFIXES: &[&str] = &["ssh-rsa ", "ssh-ed25519 ", "ecdsa-sha2-"];

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("public_key", FieldPolicy::ForcesReplacement),
    ("id", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshPublicKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SshPublicKeyProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKeyProperties {
    pub public_key: Option<String>,
}

pub struct SshPublicKeys;

fn public_key(desired: &DesiredState) -> Result<String> {
    let key = desired.string("public_key")?;
    let key = key.trim();
    if !KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(CloudError::validation(
            "public_key",
            "must be an OpenSSH public key (ssh-rsa, ssh-ed25519 or ecdsa-sha2-*)",
        ));
    }
    Ok(key.to_string())
}

impl AttributeMapper for SshPublicKeys {
    type Request = SshPublicKey;
    type Response = SshPublicKey;

    fn kind(&self) -> &'static str {
        "azure_ssh_public_key"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &SSH_PUBLIC_KEY
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        common::group_scoped_id(&SSH_PUBLIC_KEY, subscription_id, desired)
    }

    fn expand(&self, desired: &DesiredState) -> Result<SshPublicKey> {
        Ok(SshPublicKey {
            location: Some(common::location(desired)?),
            properties: Some(SshPublicKeyProperties {
                public_key: Some(public_key(desired)?),
            }),
            tags: Some(common::tags(desired)?),
        })
    }

    /// Tags are the only field that can change in place
    fn expand_update(&self, desired: &DesiredState, _changes: &ChangeSet) -> Result<SshPublicKey> {
        Ok(SshPublicKey {
            tags: Some(common::tags(desired)?),
            ..SshPublicKey::default()
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: SshPublicKey) -> ObservedState {
        let mut observed = common::base_attributes(id, response.location.as_deref(), response.tags);
        observed.insert(
            "public_key".to_string(),
            Value::from(response.properties.and_then(|p| p.public_key)),
        );
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    /// The API normalizes trailing whitespace and line breaks in keys
    fn suppress_diff(&self, field: &str, desired: &Value, observed: &Value) -> bool {
        match (field, desired, observed) {
            ("public_key", Value::String(a), Value::String(b)) => {
                a.split_whitespace().eq(b.split_whitespace())
            }
            _ => common::suppress_common(field, desired, observed),
        }
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

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGx3 user@host";

    fn desired(key: &str) -> DesiredState {
        DesiredState::new()
            .with("name", "key1")
            .with("resource_group_name", "rg1")
            .with("location", "westeurope")
            .with("public_key", key)
    }

    #[test]
    fn test_expand_validates_key() {
        assert!(SshPublicKeys.expand(&desired(KEY)).is_ok());
        let err = SshPublicKeys.expand(&desired("not a key")).unwrap_err();
        assert!(matches!(err, CloudError::Validation { .. }));
    }

    #[test]
    fn test_whitespace_in_key_is_not_a_change() {
        assert!(SshPublicKeys.suppress_diff(
            "public_key",
            &Value::from(format!("{}\n", KEY)),
            &Value::from(KEY),
        ));
        assert!(!SshPublicKeys.suppress_diff(
            "public_key",
            &Value::from(KEY.replace("user@host", "other@host")),
            &Value::from(KEY),
        ));
    }

    #[test]
    fn test_update_body_only_carries_tags() {
        let body = serde_json::to_value(
            SshPublicKeys
                .expand_update(&desired(KEY), &ChangeSet::new())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(body, serde_json::json!({"tags": {}}));
    }
}
