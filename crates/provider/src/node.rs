//! Node view of vendor resources

use provisioner_common::{translate, CanonicalStatus, Resource, ResourceId, ResourceKind};
use serde::Serialize;

/// Vendor-neutral description of a provisioned resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetadata {
    pub id: ResourceId,
    pub name: String,
    pub hostname: String,
    /// Group the node was launched into, if its hostname follows the
    /// `<group>-<hex>` convention
    pub group: Option<String>,
    pub status: CanonicalStatus,
    pub public_addresses: Vec<String>,
    pub private_addresses: Vec<String>,
    pub location: Option<String>,
}

impl NodeMetadata {
    pub fn from_resource(resource: &Resource, kind: ResourceKind) -> Self {
        Self {
            id: resource.id,
            name: resource.hostname.clone(),
            hostname: resource.hostname.clone(),
            group: group_of(&resource.hostname),
            status: translate(kind, resource.status.as_deref()),
            // both are missing on discarded orders
            public_addresses: resource.primary_ip.iter().cloned().collect(),
            private_addresses: resource.primary_backend_ip.iter().cloned().collect(),
            location: resource.datacenter.as_ref().map(|dc| dc.name.clone()),
        }
    }
}

/// Prefix of a `<group>-<hex>` hostname
pub fn group_of(hostname: &str) -> Option<String> {
    let (group, suffix) = hostname.rsplit_once('-')?;
    if group.is_empty() || suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(group.to_string())
}
