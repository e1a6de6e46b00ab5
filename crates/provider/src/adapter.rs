//! Provisioning orchestrator
//!
//! Sequences the create and destroy workflows over the vendor collaborator.
//! Every stage is a bounded wait with its own envelope from
//! [`PollingConfig`](provisioner_common::PollingConfig); a stage that runs out
//! of time aborts the call with [`Error::StageTimeout`] and no later stage
//! runs.

use std::sync::Arc;

use provisioner_common::{
    Datacenter, Error, LoginCredentials, Order, OrderReceipt, OrderStatus, ProvisionerConfig,
    Resource, ResourceDraft, ResourceId, ResourceKind, Result, Stage, StagePolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::catalog::CatalogCache;
use crate::client::VendorClient;
use crate::node::NodeMetadata;
use crate::poller;
use crate::probes::{
    LoginDetailsPresent, ResourceProbe, TransactionTracker, TransactionsEnded, TransactionsStarted,
};
use crate::profiles::{self, HardwareProfile, Image};

/// Parameters of a new resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub hostname: String,
    /// Falls back to the configured domain
    pub domain: Option<String>,
    /// Datacenter name, e.g. `dal05`
    pub location: String,
    pub image_id: String,
    pub hardware_id: String,
}

/// A ready resource together with its initial login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAndCredentials {
    pub resource: Resource,
    pub node_id: String,
    pub credentials: LoginCredentials,
}

/// Orchestrates resource lifecycles against a vendor
pub struct Provisioner {
    client: Arc<dyn VendorClient>,
    catalog: CatalogCache,
    config: ProvisionerConfig,
}

impl Provisioner {
    pub fn new(client: Arc<dyn VendorClient>, config: ProvisionerConfig) -> Result<Self> {
        config.validate()?;
        let catalog = CatalogCache::new(
            client.clone(),
            config.package_name(),
            config.catalog_ttl(),
            config.polling.catalog_retry,
        );
        Ok(Self {
            client,
            catalog,
            config,
        })
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn kind(&self) -> ResourceKind {
        self.config.kind
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    /// Order a resource and wait until it can be logged into
    pub async fn create_node(&self, request: &CreateRequest) -> Result<NodeAndCredentials> {
        let package = self.catalog.get().await?;
        if !package.datacenters.iter().any(|dc| dc.name == request.location) {
            return Err(Error::not_found("location", &request.location));
        }

        let uplink = match self.config.kind {
            ResourceKind::BareMetal => None,
            ResourceKind::VirtualGuest => {
                let price = profiles::uplink_price(&package, self.config.port_speed);
                if price.is_none() {
                    let speed = self.config.port_speed.map_or_else(|| "any".to_string(), |s| s.to_string());
                    return Err(Error::not_found("port speed", speed));
                }
                price
            }
        };

        let domain = request
            .domain
            .clone()
            .unwrap_or_else(|| self.config.domain.clone());
        let order = Order {
            package_id: package.id,
            location: request.location.clone(),
            prices: profiles::order_prices(
                &request.image_id,
                &request.hardware_id,
                uplink,
                &self.config.prices,
            )?,
            quantity: 1,
            use_hourly_pricing: true,
            resource: ResourceDraft {
                hostname: request.hostname.clone(),
                domain,
            },
        };

        debug!(
            ">> ordering new {} domain({}) hostname({})",
            self.config.kind, order.resource.domain, order.resource.hostname
        );
        let receipt = self.client.submit_order(&order).await?;
        trace!("<< order {} accepted", receipt.order_id);

        info!("Waiting for {}({}) order approval", self.config.kind, request.hostname);
        let resource = self.await_discovery(&receipt).await?;
        let id = resource.id;
        let label = format!("{}({})", resource.hostname, id);
        trace!("<< discovered {}", label);

        info!("Waiting for {} transactions to complete", label);
        let tracker = TransactionTracker::new(self.client.clone());
        let polling = &self.config.polling;
        self.await_stage(
            Stage::TransactionsStarted,
            &label,
            id,
            &TransactionsStarted(&tracker),
            &polling.transactions_started,
        )
        .await?;
        self.await_stage(
            Stage::TransactionsEnded,
            &label,
            id,
            &TransactionsEnded(&tracker),
            &polling.transactions_ended,
        )
        .await?;

        self.await_stage(
            Stage::LoginDetails,
            &label,
            id,
            &LoginDetailsPresent::new(self.client.clone()),
            &polling.login_details,
        )
        .await?;

        let resource = self
            .client
            .get_resource(id)
            .await?
            .ok_or_else(|| Error::not_found("resource", id))?;
        let credentials = resource
            .first_password()
            .map(LoginCredentials::from)
            .ok_or_else(|| Error::Vendor(format!("{} lost its login details", label)))?;

        info!("Resource {} is ready", label);
        Ok(NodeAndCredentials {
            node_id: id.to_string(),
            resource,
            credentials,
        })
    }

    /// Cancel a resource's billing and wait for decommissioning to finish.
    ///
    /// Unknown ids are a no-op.
    pub async fn destroy_node(&self, id: ResourceId) -> Result<()> {
        let Some(resource) = self.client.get_resource(id).await? else {
            debug!("Resource {} does not exist, nothing to destroy", id);
            return Ok(());
        };
        let Some(billing_item_id) = resource.billing_item_id else {
            return Err(Error::NotBillable { id });
        };

        debug!(">> canceling service for {} billingItem({})", id, billing_item_id);
        if !self.client.cancel_billing_item(billing_item_id).await? {
            return Err(Error::Vendor(format!(
                "billing item {} of resource {} was not cancelled",
                billing_item_id, id
            )));
        }

        let label = format!("{}({})", resource.hostname, id);
        let tracker = TransactionTracker::new(self.client.clone());
        let polling = &self.config.polling;
        self.await_stage(
            Stage::TransactionsStarted,
            &label,
            id,
            &TransactionsStarted(&tracker),
            &polling.transactions_started,
        )
        .await?;
        self.await_stage(
            Stage::TransactionsEnded,
            &label,
            id,
            &TransactionsEnded(&tracker),
            &polling.transactions_ended,
        )
        .await?;

        info!("Resource {} destroyed", label);
        Ok(())
    }

    /// Billable resources in the account
    pub async fn list_nodes(&self) -> Result<Vec<Resource>> {
        let resources = self.client.list_resources().await?;
        Ok(resources
            .into_iter()
            .filter(|resource| {
                if resource.has_billing_item() {
                    return true;
                }
                trace!("Skipping resource {}, it has no billing item", resource.id);
                false
            })
            .collect())
    }

    pub async fn list_nodes_by_ids(&self, ids: &[ResourceId]) -> Result<Vec<Resource>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.into_iter().filter(|r| ids.contains(&r.id)).collect())
    }

    pub async fn get_node(&self, id: ResourceId) -> Result<Option<Resource>> {
        self.client.get_resource(id).await
    }

    pub fn node_metadata(&self, resource: &Resource) -> NodeMetadata {
        NodeMetadata::from_resource(resource, self.config.kind)
    }

    pub async fn list_hardware_profiles(&self) -> Result<Vec<HardwareProfile>> {
        let package = self.catalog.get().await?;
        Ok(profiles::hardware_profiles(&package, self.config.kind, self.config.port_speed))
    }

    pub async fn list_images(&self) -> Result<Vec<Image>> {
        let package = self.catalog.get().await?;
        Ok(profiles::images(&package))
    }

    pub async fn get_image(&self, id: &str) -> Result<Option<Image>> {
        let package = self.catalog.get().await?;
        Ok(profiles::find_image(&package, id))
    }

    pub async fn list_locations(&self) -> Result<Vec<Datacenter>> {
        let package = self.catalog.get().await?;
        Ok(package.datacenters.clone())
    }

    pub async fn reboot_node(&self, id: ResourceId) -> Result<()> {
        self.require_lifecycle("reboot")?;
        self.client.reboot(id).await
    }

    pub async fn suspend_node(&self, id: ResourceId) -> Result<()> {
        self.require_lifecycle("suspend")?;
        self.client.pause(id).await
    }

    pub async fn resume_node(&self, id: ResourceId) -> Result<()> {
        self.require_lifecycle("resume")?;
        self.client.resume(id).await
    }

    fn require_lifecycle(&self, operation: &'static str) -> Result<()> {
        match self.config.kind {
            ResourceKind::VirtualGuest => Ok(()),
            kind @ ResourceKind::BareMetal => Err(Error::UnsupportedOperation { operation, kind }),
        }
    }

    /// Wait for the order to be approved and the resource to be listed.
    ///
    /// A resource echoed in the receipt is matched by id, otherwise the
    /// first listing with the ordered hostname wins.
    async fn await_discovery(&self, receipt: &OrderReceipt) -> Result<Resource> {
        let echoed = receipt.resources.first().map(|r| r.id);
        if let Some(id) = echoed {
            debug!("Order {} echoed resource {}", receipt.order_id, id);
        }

        let policy = &self.config.polling.order_approved;
        let client = self.client.as_ref();
        let order_id = receipt.order_id;
        let hostname = receipt.order.resource.hostname.as_str();

        let found = poller::poll_until(policy, move || async move {
            let order = client.billing_order(order_id).await?;
            if order.status != OrderStatus::Approved {
                debug!("Order {} is not approved yet ({:?})", order_id, order.status);
                return Ok(None);
            }
            let listed = client
                .list_resources()
                .await?
                .into_iter()
                .find(|r| match echoed {
                    Some(id) => r.id == id,
                    None => r.hostname == hostname,
                });
            if listed.is_none() {
                debug!("Resource {} is not listed yet", hostname);
            }
            Ok(listed)
        })
        .await?;

        debug!(">> {} order approval result({})", hostname, found.is_some());
        found.ok_or_else(|| Error::StageTimeout {
            stage: Stage::OrderApproved,
            resource: hostname.to_string(),
            waited_ms: policy.max_wait_ms,
        })
    }

    async fn await_stage(
        &self,
        stage: Stage,
        label: &str,
        id: ResourceId,
        probe: &dyn ResourceProbe,
        policy: &StagePolicy,
    ) -> Result<()> {
        debug!(">> waiting for {} {}", label, stage);
        let done = poller::await_condition(policy, move || probe.test(id)).await?;
        debug!("<< {} {} result({})", label, stage, done);

        if done {
            Ok(())
        } else {
            Err(Error::StageTimeout {
                stage,
                resource: label.to_string(),
                waited_ms: policy.max_wait_ms,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedVendor;

    fn provisioner(sim: &Arc<SimulatedVendor>, kind: ResourceKind) -> Provisioner {
        let config = ProvisionerConfig {
            kind,
            ..Default::default()
        };
        Provisioner::new(sim.clone(), config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let sim = Arc::new(SimulatedVendor::new());
        let mut config = ProvisionerConfig::default();
        config.polling.login_details.max_wait_ms = 500;
        assert!(matches!(
            Provisioner::new(sim, config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_unsupported_for_bare_metal() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal));
        let provisioner = provisioner(&sim, ResourceKind::BareMetal);

        for result in [
            provisioner.reboot_node(ResourceId(1)).await,
            provisioner.suspend_node(ResourceId(1)).await,
            provisioner.resume_node(ResourceId(1)).await,
        ] {
            assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
        }
        assert_eq!(sim.calls().lifecycle, 0);
    }

    #[tokio::test]
    async fn test_lifecycle_delegates_for_virtual_guests() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::VirtualGuest));
        let mut resource = Resource::new(ResourceId(4), "vm-0a", "example.com");
        resource.billing_item_id = Some(41);
        resource.status = Some("RUNNING".into());
        sim.insert_resource(resource);
        let provisioner = provisioner(&sim, ResourceKind::VirtualGuest);

        provisioner.suspend_node(ResourceId(4)).await.unwrap();
        let node = provisioner.node_metadata(&sim.resource(ResourceId(4)).unwrap());
        assert_eq!(node.status, provisioner_common::CanonicalStatus::Suspended);

        provisioner.resume_node(ResourceId(4)).await.unwrap();
        provisioner.reboot_node(ResourceId(4)).await.unwrap();
        assert_eq!(sim.calls().lifecycle, 3);
    }

    #[tokio::test]
    async fn test_catalog_listings() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal));
        let provisioner = provisioner(&sim, ResourceKind::BareMetal);

        assert_eq!(provisioner.list_hardware_profiles().await.unwrap().len(), 4);
        assert_eq!(provisioner.list_images().await.unwrap().len(), 2);
        assert!(provisioner.get_image("17438").await.unwrap().is_some());
        let locations = provisioner.list_locations().await.unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(sim.calls().package_detail, 1);
    }

    #[tokio::test]
    async fn test_virtual_guest_catalog_listings() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::VirtualGuest));
        let provisioner = provisioner(&sim, ResourceKind::VirtualGuest);

        assert_eq!(provisioner.catalog().package_name(), "Cloud Server");
        let listed = provisioner.list_hardware_profiles().await.unwrap();
        assert_eq!(listed.len(), 8);
        assert!(listed.iter().all(|p| p.items[0].has_category(profiles::CATEGORY_GUEST_CORES)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_virtual_guest_order_carries_uplink_price() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::VirtualGuest));
        let provisioner = provisioner(&sim, ResourceKind::VirtualGuest);

        let request = CreateRequest {
            hostname: "vm1".into(),
            domain: None,
            location: "dal05".into(),
            image_id: "17438".into(),
            hardware_id: "1640,1644,2202".into(),
        };
        let created = provisioner.create_node(&request).await.unwrap();
        assert_eq!(created.resource.status.as_deref(), Some("RUNNING"));

        let orders = sim.submitted_orders();
        let ids: Vec<u64> = orders[0].prices.iter().take(5).map(|p| p.id).collect();
        assert_eq!(ids, vec![17438, 1640, 1644, 2202, 272]);
    }

    #[tokio::test]
    async fn test_virtual_guest_without_matching_uplink_is_rejected() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::VirtualGuest));
        let config = ProvisionerConfig {
            kind: ResourceKind::VirtualGuest,
            port_speed: Some(40_000),
            ..Default::default()
        };
        let provisioner = Provisioner::new(sim.clone(), config).unwrap();

        let request = CreateRequest {
            hostname: "vm1".into(),
            domain: None,
            location: "dal05".into(),
            image_id: "17438".into(),
            hardware_id: "1640,1644,2202".into(),
        };
        assert!(matches!(
            provisioner.create_node(&request).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(sim.calls().submit_order, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_location_before_ordering() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal));
        let provisioner = provisioner(&sim, ResourceKind::BareMetal);

        let request = CreateRequest {
            hostname: "web1".into(),
            domain: None,
            location: "ams01".into(),
            image_id: "17438".into(),
            hardware_id: "1921,1267,272".into(),
        };
        assert!(matches!(
            provisioner.create_node(&request).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(sim.calls().submit_order, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_profile_before_ordering() {
        let sim = Arc::new(SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal));
        let provisioner = provisioner(&sim, ResourceKind::BareMetal);

        let request = CreateRequest {
            hostname: "web1".into(),
            domain: None,
            location: "dal05".into(),
            image_id: "17438".into(),
            hardware_id: "large".into(),
        };
        assert!(matches!(
            provisioner.create_node(&request).await,
            Err(Error::InvalidProfile(_))
        ));
        assert_eq!(sim.calls().submit_order, 0);
    }
}
