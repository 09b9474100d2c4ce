//! Shared, read-only services used by every reconciliation

use crate::client::RemoteClient;
use crate::error::{CloudError, Result};
use crate::mapper::{AttributeMapper, KindOptions, ResourceKind, erase};
use crate::policy::{BackoffConfig, ResourceTimeouts, StabilityConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resource kinds known to the engine, by configuration type name
#[derive(Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, Arc<dyn ResourceKind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: AttributeMapper>(&mut self, mapper: M) {
        let kind = erase(mapper);
        self.kinds.insert(kind.kind(), kind);
    }

    pub fn with<M: AttributeMapper>(mut self, mapper: M) -> Self {
        self.register(mapper);
        self
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ResourceKind>> {
        self.kinds
            .get(kind)
            .cloned()
            .ok_or_else(|| CloudError::UnknownKind(kind.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds.keys()).finish()
    }
}

/// Client, credentials scope and polling policies
///
/// Built once at startup and never mutated; reconcilers borrow it.
pub struct CloudContext {
    client: Arc<dyn RemoteClient>,
    subscription_id: String,
    kinds: KindRegistry,
    backoff: BackoffConfig,
    stability: StabilityConfig,
    timeouts: Option<ResourceTimeouts>,
}

impl CloudContext {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        subscription_id: impl Into<String>,
        kinds: KindRegistry,
    ) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
            kinds,
            backoff: BackoffConfig::default(),
            stability: StabilityConfig::default(),
            timeouts: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_stability(mut self, stability: StabilityConfig) -> Self {
        self.stability = stability;
        self
    }

    /// Override every kind's default timeouts
    pub fn with_timeouts(mut self, timeouts: ResourceTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn client(&self) -> &dyn RemoteClient {
        self.client.as_ref()
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub fn kind(&self, name: &str) -> Result<Arc<dyn ResourceKind>> {
        self.kinds.get(name)
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    pub fn stability(&self) -> &StabilityConfig {
        &self.stability
    }

    /// Kind options with the context-wide timeout override applied
    pub fn options_for(&self, kind: &dyn ResourceKind) -> KindOptions {
        let mut options = kind.options();
        if let Some(timeouts) = self.timeouts {
            options.timeouts = timeouts;
        }
        options
    }
}
