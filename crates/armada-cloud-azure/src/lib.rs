//! Azure Resource Manager binding for Armada
//!
//! Provides an HTTP [`RemoteClient`](armada_cloud::RemoteClient) for the ARM
//! REST API and the compute resource kinds that plug into the
//! reconciliation engine.
//!
//! # Resource kinds
//!
//! - `azure_availability_set`
//! - `azure_proximity_placement_group`
//! - `azure_managed_disk`
//! - `azure_ssh_public_key`
//! - `azure_dedicated_host_group`
//! - `azure_dedicated_host`
//! - `azure_shared_image_version` (also usable as a data source)
//!
//! # Example
//!
//! ```ignore
//! use armada_cloud::{CloudContext, Provisioner};
//! use armada_cloud_azure::{ArmClient, ArmConfig, DEFAULT_TOKEN_ENV};
//! use std::sync::Arc;
//!
//! let client = ArmClient::new(ArmConfig::from_env(DEFAULT_TOKEN_ENV)?)?;
//! let ctx = CloudContext::new(Arc::new(client), subscription_id, armada_cloud_azure::registry());
//! let provisioner = Provisioner::new(Arc::new(ctx));
//! ```

pub mod availability_set;
pub mod client;
pub mod common;
pub mod dedicated_host;
pub mod dedicated_host_group;
pub mod error;
pub mod ids;
pub mod managed_disk;
pub mod proximity_placement_group;
pub mod shared_image_version;
pub mod ssh_public_key;

pub use availability_set::AvailabilitySets;
pub use client::{ARM_ENDPOINT, ArmClient, ArmConfig, DEFAULT_TOKEN_ENV};
pub use dedicated_host::DedicatedHosts;
pub use dedicated_host_group::DedicatedHostGroups;
pub use error::{AzureError, Result};
pub use managed_disk::ManagedDisks;
pub use proximity_placement_group::ProximityPlacementGroups;
pub use shared_image_version::SharedImageVersions;
pub use ssh_public_key::SshPublicKeys;

use armada_cloud::KindRegistry;

/// Registry with every Azure resource kind
pub fn registry() -> KindRegistry {
    KindRegistry::new()
        .with(AvailabilitySets)
        .with(ProximityPlacementGroups)
        .with(ManagedDisks)
        .with(SshPublicKeys)
        .with(DedicatedHostGroups)
        .with(DedicatedHosts)
        .with(SharedImageVersions)
}
