//! Vendor API collaborator
//!
//! The orchestrator only ever talks to the vendor through this trait. REST
//! bindings, payload marshaling and transport retries live behind it.

use async_trait::async_trait;
use provisioner_common::{
    BillingOrder, Order, OrderReceipt, PackageRef, ProductPackage, Resource, ResourceId, Result,
    Transaction,
};

/// Operations consumed from the vendor API
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Place an order; the receipt may or may not echo the new resource
    async fn submit_order(&self, order: &Order) -> Result<OrderReceipt>;

    /// Current approval state of a submitted order
    async fn billing_order(&self, order_id: u64) -> Result<BillingOrder>;

    /// Fetch one resource, `None` when the id is unknown
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>>;

    /// Account resource directory; eventually consistent
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// The transaction currently active on a resource, if any
    async fn active_transaction(&self, id: ResourceId) -> Result<Option<Transaction>>;

    /// Cancel the billing item backing a resource
    async fn cancel_billing_item(&self, billing_item_id: u64) -> Result<bool>;

    async fn active_package_by_name(&self, name: &str) -> Result<PackageRef>;

    /// Items and datacenters of a catalog package
    async fn package_detail(&self, package_id: u64) -> Result<ProductPackage>;

    async fn reboot(&self, id: ResourceId) -> Result<()>;

    async fn pause(&self, id: ResourceId) -> Result<()>;

    async fn resume(&self, id: ResourceId) -> Result<()>;
}
