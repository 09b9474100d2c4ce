//! Shared fixtures: an in-memory remote API and a small resource kind

#![allow(dead_code)]

use armada_cloud::{
    AttributeMapper, ClientResult, CloudContext, DesiredState, FieldPolicy, GetResponse, IdShape,
    KindOptions, KindRegistry, MutationResponse, ObservedState, OperationHandle, OperationStatus,
    PollLocation, RemoteClient, RemoteFault, RemoteObjectId, Result, SegmentSpec,
    StabilityConfig, UpdateMethod, Value, lookup_policy,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// A request the fake received
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(String),
    Put(String, serde_json::Value),
    Patch(String, serde_json::Value),
    Delete(String),
    Poll(String),
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, serde_json::Value>,
    calls: Vec<Call>,
    get_scripts: HashMap<String, VecDeque<bool>>,
    stalled_gets: HashSet<String>,
    put_faults: HashMap<String, RemoteFault>,
    operations: HashMap<String, u32>,
    async_polls: Option<u32>,
    next_operation: u32,
}

/// In-memory remote API that records every call
#[derive(Default)]
pub struct FakeCloud {
    inner: Mutex<Inner>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer mutations with 202 and report completion after `polls` checks
    pub fn with_async_operations(self: Arc<Self>, polls: u32) -> Arc<Self> {
        self.inner.lock().unwrap().async_polls = Some(polls);
        self
    }

    pub fn insert(&self, id: &str, body: serde_json::Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(id.to_ascii_lowercase(), with_identity(id, body));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .objects
            .contains_key(&id.to_ascii_lowercase())
    }

    pub fn body(&self, id: &str) -> Option<serde_json::Value> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&id.to_ascii_lowercase())
            .cloned()
    }

    /// Override the next GETs of `id`: `true` answers found, `false` not found
    pub fn script_gets(&self, id: &str, presence: Vec<bool>) {
        self.inner
            .lock()
            .unwrap()
            .get_scripts
            .insert(id.to_ascii_lowercase(), presence.into());
    }

    /// Make every later GET of `id` hang for an hour before answering
    pub fn stall_gets(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .stalled_gets
            .insert(id.to_ascii_lowercase());
    }

    pub fn fail_puts(&self, id: &str, fault: RemoteFault) {
        self.inner
            .lock()
            .unwrap()
            .put_faults
            .insert(id.to_ascii_lowercase(), fault);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Put(..) | Call::Patch(..) | Call::Delete(_)))
            .collect()
    }

    pub fn polls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Poll(_)))
            .count()
    }

    fn complete(inner: &mut Inner) -> MutationResponse {
        match inner.async_polls {
            None => MutationResponse::Completed(None),
            Some(polls) => {
                inner.next_operation += 1;
                let url = format!(
                    "https://management.example/operations/{}",
                    inner.next_operation
                );
                inner.operations.insert(url.clone(), polls);
                MutationResponse::Accepted(OperationHandle::new(PollLocation::AsyncOperation(url)))
            }
        }
    }
}

fn with_identity(id: &str, mut body: serde_json::Value) -> serde_json::Value {
    if let Some(map) = body.as_object_mut() {
        map.insert("id".to_string(), serde_json::json!(id));
        let name = id.rsplit('/').next().unwrap_or_default();
        map.insert("name".to_string(), serde_json::json!(name));
    }
    body
}

/// JSON merge patch: objects merge recursively, everything else replaces
fn merge(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(fields), Some(updates)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in updates {
            merge(fields.entry(k.clone()).or_insert(serde_json::Value::Null), v);
        }
        return;
    }
    *target = patch.clone();
}

#[async_trait]
impl RemoteClient for FakeCloud {
    async fn get(&self, id: &str, _api_version: &str) -> ClientResult<GetResponse> {
        let key = id.to_ascii_lowercase();
        let stalled = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Get(id.to_string()));
            inner.stalled_gets.contains(&key)
        };
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut inner = self.inner.lock().unwrap();

        let scripted = inner.get_scripts.get_mut(&key).and_then(|s| s.pop_front());
        let response = match scripted {
            Some(true) => GetResponse::Found(
                inner
                    .objects
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| with_identity(id, serde_json::json!({}))),
            ),
            Some(false) => GetResponse::NotFound,
            None => match inner.objects.get(&key) {
                Some(body) => GetResponse::Found(body.clone()),
                None => GetResponse::NotFound,
            },
        };
        Ok(response)
    }

    async fn create_or_update(
        &self,
        id: &str,
        _api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Put(id.to_string(), body.clone()));
        let key = id.to_ascii_lowercase();

        if let Some(fault) = inner.put_faults.get(&key) {
            return Ok(MutationResponse::Failed(fault.clone()));
        }
        inner.objects.insert(key, with_identity(id, body.clone()));
        Ok(Self::complete(&mut inner))
    }

    async fn update(
        &self,
        id: &str,
        _api_version: &str,
        body: &serde_json::Value,
    ) -> ClientResult<MutationResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Patch(id.to_string(), body.clone()));
        let key = id.to_ascii_lowercase();

        let Some(existing) = inner.objects.get_mut(&key) else {
            return Ok(MutationResponse::NotFound);
        };
        merge(existing, body);
        Ok(Self::complete(&mut inner))
    }

    async fn delete(&self, id: &str, _api_version: &str) -> ClientResult<MutationResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Delete(id.to_string()));

        if inner.objects.remove(&id.to_ascii_lowercase()).is_none() {
            return Ok(MutationResponse::NotFound);
        }
        Ok(Self::complete(&mut inner))
    }

    async fn poll(&self, handle: &OperationHandle) -> ClientResult<OperationStatus> {
        let mut inner = self.inner.lock().unwrap();
        let url = handle.location().url().to_string();
        inner.calls.push(Call::Poll(url.clone()));

        let remaining = inner.operations.entry(url).or_insert(0);
        if *remaining == 0 {
            return Ok(OperationStatus::Succeeded(None));
        }
        *remaining -= 1;
        Ok(OperationStatus::InProgress { retry_after: None })
    }
}

pub static WIDGET_SET_SHAPE: IdShape = IdShape::new(
    "Widget Set",
    &[
        SegmentSpec::user("subscriptions", "subscriptionId"),
        SegmentSpec::user("resourceGroups", "resourceGroupName"),
        SegmentSpec::fixed("providers", "namespace", "Example.Compute"),
        SegmentSpec::user("widgetSets", "widgetSetName"),
    ],
);

const POLICIES: &[(&str, FieldPolicy)] = &[
    ("name", FieldPolicy::ForcesReplacement),
    ("resource_group_name", FieldPolicy::ForcesReplacement),
    ("location", FieldPolicy::ForcesReplacement),
    ("platform_fault_domain_count", FieldPolicy::ForcesReplacement),
    ("provisioning_state", FieldPolicy::ComputedOnly),
];

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fault_domain_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WidgetSetBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: WidgetSetProperties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A minimal availability-set-like resource kind
#[derive(Default)]
pub struct WidgetSets {
    pub adopt_existing: bool,
}

impl AttributeMapper for WidgetSets {
    type Request = WidgetSetBody;
    type Response = WidgetSetBody;

    fn kind(&self) -> &'static str {
        "fake_widget_set"
    }

    fn api_version(&self) -> &'static str {
        "2024-03-01"
    }

    fn id_shape(&self) -> &'static IdShape {
        &WIDGET_SET_SHAPE
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["name", "resource_group_name"]
    }

    fn resource_id(&self, subscription_id: &str, desired: &DesiredState) -> Result<RemoteObjectId> {
        RemoteObjectId::new(
            &WIDGET_SET_SHAPE,
            &[
                subscription_id,
                &desired.string("resource_group_name")?,
                &desired.string("name")?,
            ],
        )
    }

    fn expand(&self, desired: &DesiredState) -> Result<Self::Request> {
        Ok(WidgetSetBody {
            location: Some(desired.string("location")?),
            properties: WidgetSetProperties {
                platform_fault_domain_count: Some(
                    desired
                        .int_in_range("platform_fault_domain_count", 1, 3)?
                        .unwrap_or(3),
                ),
                provisioning_state: None,
            },
            tags: desired.string_map("tags")?,
        })
    }

    fn expand_update(
        &self,
        desired: &DesiredState,
        _changes: &armada_cloud::ChangeSet,
    ) -> Result<Self::Request> {
        Ok(WidgetSetBody {
            tags: desired.string_map("tags")?,
            ..Default::default()
        })
    }

    fn flatten(&self, id: &RemoteObjectId, response: Self::Response) -> ObservedState {
        let mut observed = ObservedState::new();
        observed.insert("name".into(), id.leaf_name().into());
        observed.insert(
            "resource_group_name".into(),
            id.resource_group().unwrap_or_default().into(),
        );
        observed.insert("location".into(), response.location.into());
        observed.insert(
            "platform_fault_domain_count".into(),
            response.properties.platform_fault_domain_count.into(),
        );
        observed.insert(
            "provisioning_state".into(),
            response.properties.provisioning_state.into(),
        );
        observed.insert("tags".into(), Value::from(response.tags));
        observed
    }

    fn field_policy(&self, field: &str) -> FieldPolicy {
        lookup_policy(POLICIES, field)
    }

    fn options(&self) -> KindOptions {
        KindOptions {
            adopt_existing: self.adopt_existing,
            update_method: UpdateMethod::Patch,
            ..KindOptions::default()
        }
    }
}

pub fn registry() -> KindRegistry {
    KindRegistry::new().with(WidgetSets::default())
}

pub fn context(client: Arc<FakeCloud>) -> CloudContext {
    CloudContext::new(client, SUBSCRIPTION, registry()).with_stability(StabilityConfig {
        stable_count: 5,
        poll_interval: Duration::from_secs(10),
    })
}

pub fn widget_set(name: &str, fault_domains: i64) -> DesiredState {
    DesiredState::new()
        .with("name", name)
        .with("resource_group_name", "rg1")
        .with("location", "westeurope")
        .with("platform_fault_domain_count", fault_domains)
}

pub fn widget_set_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg1/providers/Example.Compute/widgetSets/{}",
        SUBSCRIPTION, name
    )
}
