//! In-memory simulated vendor
//!
//! Models the eventually consistent behaviour of the real API closely enough
//! to drive every workflow end to end: new resources hide from the directory
//! for a while, orders wait for approval, and transactions are replayed from a
//! per-resource script. When a script runs out the resource either finishes
//! provisioning (addresses and a password appear) or disappears, if it was
//! being decommissioned. State can be persisted as JSON so the CLI keeps its
//! resources between runs.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use provisioner_common::{
    BillingOrder, Datacenter, Error, ItemPrice, OperatingSystem, Order, OrderReceipt, OrderStatus,
    PackageRef, Password, ProductItem, ProductPackage, Resource, ResourceId, ResourceKind, Result,
    Transaction,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::VendorClient;

/// Injected catalog failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogFault {
    Timeout,
    Unauthorized,
}

/// Number of calls made to each collaborator operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounts {
    pub submit_order: u32,
    pub billing_order: u32,
    pub get_resource: u32,
    pub list_resources: u32,
    pub active_transaction: u32,
    pub cancel_billing_item: u32,
    pub package_by_name: u32,
    pub package_detail: u32,
    pub lifecycle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CycleOutcome {
    Provisioned,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Script {
    entries: VecDeque<Option<Transaction>>,
    outcome: CycleOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimResource {
    resource: Resource,
    /// Directory listings that will still omit this resource
    hidden_for: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimOrder {
    id: u64,
    /// Approval checks left before the order reports approved
    pending_for: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimState {
    kind: ResourceKind,
    resources: Vec<SimResource>,
    orders: Vec<SimOrder>,
    scripts: HashMap<u64, Script>,
    reserved_ids: HashMap<String, u64>,
    catalog: Option<ProductPackage>,
    next_resource_id: u64,
    next_order_id: u64,
    next_transaction_id: u64,
    discovery_delay: u32,
    approval_delay: u32,
    echo_receipts: bool,
    #[serde(default)]
    withhold_passwords: bool,
    #[serde(skip)]
    catalog_faults: VecDeque<CatalogFault>,
    #[serde(skip)]
    catalog_latency_ms: u64,
    #[serde(skip)]
    calls: CallCounts,
    #[serde(skip)]
    submitted: Vec<Order>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            kind: ResourceKind::BareMetal,
            resources: Vec::new(),
            orders: Vec::new(),
            scripts: HashMap::new(),
            reserved_ids: HashMap::new(),
            catalog: None,
            next_resource_id: 1,
            next_order_id: 1000,
            next_transaction_id: 1,
            discovery_delay: 0,
            approval_delay: 0,
            echo_receipts: false,
            withhold_passwords: false,
            catalog_faults: VecDeque::new(),
            catalog_latency_ms: 0,
            calls: CallCounts::default(),
            submitted: Vec::new(),
        }
    }
}

impl SimState {
    fn find(&self, id: ResourceId) -> Option<&SimResource> {
        self.resources.iter().find(|r| r.resource.id == id)
    }

    fn find_mut(&mut self, id: ResourceId) -> Option<&mut SimResource> {
        self.resources.iter_mut().find(|r| r.resource.id == id)
    }

    fn transaction(&mut self, name: &str) -> Transaction {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        Transaction {
            id,
            name: name.to_string(),
            elapsed_seconds: 0,
            average_duration: 1.5,
        }
    }

    fn provisioning_script(&mut self) -> Script {
        let provision = self.transaction("PROVISION_SERVER");
        let reload = self.transaction("OS_RELOAD");
        Script {
            entries: VecDeque::from(vec![
                Some(provision),
                Some(reload.clone()),
                Some(reload),
                None,
            ]),
            outcome: CycleOutcome::Provisioned,
        }
    }

    fn decommission_script(&mut self) -> Script {
        let reclaim = self.transaction("RECLAIM_WAIT");
        Script {
            entries: VecDeque::from(vec![Some(reclaim.clone()), Some(reclaim), None]),
            outcome: CycleOutcome::Removed,
        }
    }

    fn finish_cycle(&mut self, id: ResourceId, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Provisioned => {
                let (kind, with_password) = (self.kind, !self.withhold_passwords);
                if let Some(sim) = self.find_mut(id) {
                    provision(&mut sim.resource, kind, with_password);
                }
            }
            CycleOutcome::Removed => {
                self.resources.retain(|r| r.resource.id != id);
            }
        }
    }
}

fn provision(resource: &mut Resource, kind: ResourceKind, with_password: bool) {
    let octet = resource.id.0 % 250 + 2;
    resource.primary_ip = Some(format!("198.51.100.{octet}"));
    resource.primary_backend_ip = Some(format!("10.0.0.{octet}"));
    if with_password {
        resource.operating_system = Some(OperatingSystem {
            passwords: vec![Password {
                username: "root".to_string(),
                password: format!("pw-{}-{}", resource.hostname, resource.id),
            }],
        });
    }
    resource.status = Some(match kind {
        ResourceKind::BareMetal => "ACTIVE".to_string(),
        ResourceKind::VirtualGuest => "RUNNING".to_string(),
    });
}

/// Simulated vendor API
#[derive(Default)]
pub struct SimulatedVendor {
    state: Mutex<SimState>,
}

impl SimulatedVendor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(kind: ResourceKind) -> Self {
        let sim = Self::new();
        sim.state.lock().kind = kind;
        sim
    }

    /// Simulator seeded with the [`demo_catalog`] for `kind`
    pub fn with_demo_catalog(kind: ResourceKind) -> Self {
        let sim = Self::with_kind(kind);
        sim.set_catalog(demo_catalog(kind));
        sim
    }

    /// Load persisted state, or start empty with the demo catalog
    pub fn load(path: &Path, kind: ResourceKind) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::with_demo_catalog(kind));
        }
        let content = std::fs::read_to_string(path)?;
        let mut state: SimState = serde_json::from_str(&content)?;
        state.kind = kind;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.state.lock())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn set_catalog(&self, package: ProductPackage) {
        self.state.lock().catalog = Some(package);
    }

    /// Assign `id` to the next order for `hostname`
    pub fn reserve_id(&self, hostname: &str, id: ResourceId) {
        self.state.lock().reserved_ids.insert(hostname.to_string(), id.0);
    }

    /// Replace the transaction feed of a resource. The resource finishes
    /// provisioning when the last entry is consumed.
    pub fn script_transactions(&self, id: ResourceId, entries: Vec<Option<Transaction>>) {
        self.state.lock().scripts.insert(
            id.0,
            Script {
                entries: entries.into(),
                outcome: CycleOutcome::Provisioned,
            },
        );
    }

    /// New resources stay out of the directory for this many listings
    pub fn set_discovery_delay(&self, listings: u32) {
        self.state.lock().discovery_delay = listings;
    }

    /// Orders report pending approval for this many checks
    pub fn set_approval_delay(&self, checks: u32) {
        self.state.lock().approval_delay = checks;
    }

    /// Echo the new resource's initial snapshot in order receipts
    pub fn set_echo_receipts(&self, echo: bool) {
        self.state.lock().echo_receipts = echo;
    }

    /// Provision resources without ever publishing a root password
    pub fn set_withhold_passwords(&self, withhold: bool) {
        self.state.lock().withhold_passwords = withhold;
    }

    pub fn push_catalog_fault(&self, fault: CatalogFault) {
        self.state.lock().catalog_faults.push_back(fault);
    }

    pub fn set_catalog_latency(&self, latency: Duration) {
        self.state.lock().catalog_latency_ms = latency.as_millis() as u64;
    }

    pub fn insert_resource(&self, resource: Resource) {
        let mut state = self.state.lock();
        state.resources.retain(|r| r.resource.id != resource.id);
        state.resources.push(SimResource {
            resource,
            hidden_for: 0,
        });
    }

    /// Assign addresses and a password right away
    pub fn complete_provisioning(&self, id: ResourceId) {
        self.state.lock().finish_cycle(id, CycleOutcome::Provisioned);
    }

    pub fn resource(&self, id: ResourceId) -> Option<Resource> {
        self.state.lock().find(id).map(|r| r.resource.clone())
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls.clone()
    }

    /// Orders received since this simulator was created or loaded
    pub fn submitted_orders(&self) -> Vec<Order> {
        self.state.lock().submitted.clone()
    }
}

#[async_trait]
impl VendorClient for SimulatedVendor {
    async fn submit_order(&self, order: &Order) -> Result<OrderReceipt> {
        let mut state = self.state.lock();
        state.calls.submit_order += 1;
        state.submitted.push(order.clone());

        let hostname = order.resource.hostname.clone();
        let id = match state.reserved_ids.remove(&hostname) {
            Some(id) => id,
            None => {
                let id = state.next_resource_id;
                state.next_resource_id += 1;
                id
            }
        };
        let id = ResourceId(id);

        let mut resource = Resource::new(id, hostname, order.resource.domain.clone());
        resource.billing_item_id = Some(id.0 * 10 + 1);
        resource.status = Some(match state.kind {
            ResourceKind::BareMetal => "DEPLOY".to_string(),
            ResourceKind::VirtualGuest => "HALTED".to_string(),
        });
        resource.datacenter = state
            .catalog
            .as_ref()
            .and_then(|c| c.datacenters.iter().find(|d| d.name == order.location))
            .cloned();

        let hidden_for = state.discovery_delay;
        state.resources.push(SimResource {
            resource: resource.clone(),
            hidden_for,
        });

        if !state.scripts.contains_key(&id.0) {
            let script = state.provisioning_script();
            state.scripts.insert(id.0, script);
        }

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        let pending_for = state.approval_delay;
        state.orders.push(SimOrder {
            id: order_id,
            pending_for,
        });

        debug!("Simulated order {} for {} ({})", order_id, resource.hostname, id);

        Ok(OrderReceipt {
            order_id,
            order: order.clone(),
            resources: if state.echo_receipts { vec![resource] } else { Vec::new() },
        })
    }

    async fn billing_order(&self, order_id: u64) -> Result<BillingOrder> {
        let mut state = self.state.lock();
        state.calls.billing_order += 1;

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| Error::not_found("order", order_id))?;

        let status = if order.pending_for > 0 {
            order.pending_for -= 1;
            OrderStatus::PendingApproval
        } else {
            OrderStatus::Approved
        };
        Ok(BillingOrder { id: order_id, status })
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        let mut state = self.state.lock();
        state.calls.get_resource += 1;
        Ok(state.find(id).map(|r| r.resource.clone()))
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut state = self.state.lock();
        state.calls.list_resources += 1;

        let mut listed = Vec::new();
        for sim in state.resources.iter_mut() {
            if sim.hidden_for > 0 {
                sim.hidden_for -= 1;
            } else {
                listed.push(sim.resource.clone());
            }
        }
        Ok(listed)
    }

    async fn active_transaction(&self, id: ResourceId) -> Result<Option<Transaction>> {
        let mut state = self.state.lock();
        state.calls.active_transaction += 1;

        let Some(script) = state.scripts.get_mut(&id.0) else {
            return Ok(None);
        };
        let entry = script.entries.pop_front().flatten();
        if script.entries.is_empty() {
            let outcome = script.outcome;
            state.scripts.remove(&id.0);
            state.finish_cycle(id, outcome);
        }
        Ok(entry)
    }

    async fn cancel_billing_item(&self, billing_item_id: u64) -> Result<bool> {
        let mut state = self.state.lock();
        state.calls.cancel_billing_item += 1;

        let Some(id) = state
            .resources
            .iter()
            .find(|r| r.resource.billing_item_id == Some(billing_item_id))
            .map(|r| r.resource.id)
        else {
            return Ok(false);
        };

        match state.scripts.get_mut(&id.0) {
            Some(script) => script.outcome = CycleOutcome::Removed,
            None => {
                let script = state.decommission_script();
                state.scripts.insert(id.0, script);
            }
        }
        if let Some(sim) = state.find_mut(id) {
            sim.resource.status = Some("RECLAIM".to_string());
        }
        Ok(true)
    }

    async fn active_package_by_name(&self, name: &str) -> Result<PackageRef> {
        let (fault, latency) = {
            let mut state = self.state.lock();
            state.calls.package_by_name += 1;
            (state.catalog_faults.pop_front(), state.catalog_latency_ms)
        };

        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        match fault {
            Some(CatalogFault::Timeout) => return Err(Error::Timeout { seconds: 30 }),
            Some(CatalogFault::Unauthorized) => {
                return Err(Error::Unauthorized("invalid API key".to_string()))
            }
            None => {}
        }

        let state = self.state.lock();
        state
            .catalog
            .as_ref()
            .filter(|c| c.name == name)
            .map(|c| PackageRef {
                id: c.id,
                name: c.name.clone(),
            })
            .ok_or_else(|| Error::not_found("package", name))
    }

    async fn package_detail(&self, package_id: u64) -> Result<ProductPackage> {
        let mut state = self.state.lock();
        state.calls.package_detail += 1;
        state
            .catalog
            .clone()
            .filter(|c| c.id == package_id)
            .ok_or_else(|| Error::not_found("package", package_id))
    }

    async fn reboot(&self, id: ResourceId) -> Result<()> {
        self.set_power(id, "RUNNING")
    }

    async fn pause(&self, id: ResourceId) -> Result<()> {
        self.set_power(id, "PAUSED")
    }

    async fn resume(&self, id: ResourceId) -> Result<()> {
        self.set_power(id, "RUNNING")
    }
}

impl SimulatedVendor {
    fn set_power(&self, id: ResourceId, power: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.lifecycle += 1;
        let sim = state
            .find_mut(id)
            .ok_or_else(|| Error::not_found("resource", id))?;
        sim.resource.status = Some(power.to_string());
        Ok(())
    }
}

fn item(id: u64, description: &str, category: &str, capacity: Option<f64>, price: u64) -> ProductItem {
    ProductItem {
        id,
        description: description.to_string(),
        units: None,
        capacity,
        categories: vec![category.to_string()],
        prices: vec![ItemPrice { id: price }],
    }
}

fn demo_datacenters() -> Vec<Datacenter> {
    vec![
        Datacenter {
            id: 3,
            name: "dal05".to_string(),
            long_name: Some("Dallas 5".to_string()),
        },
        Datacenter {
            id: 4,
            name: "sea01".to_string(),
            long_name: Some("Seattle".to_string()),
        },
    ]
}

fn demo_shared_items() -> Vec<ProductItem> {
    vec![
        item(20, "10 Mbps Public & Private Networks", "port_speed", Some(10.0), 272),
        item(21, "100 Mbps Public & Private Networks", "port_speed", Some(100.0), 273),
        item(22, "1 Gbps Public & Private Networks", "port_speed", Some(1000.0), 274),
        item(30, "Ubuntu Linux 12.04 LTS Precise Pangolin - Minimal Install (64 bit)", "os", None, 17438),
        item(31, "CentOS 6.0 - Minimal Install (64 bit)", "os", None, 13942),
    ]
}

/// Small catalog for local runs and tests, one package per kind
pub fn demo_catalog(kind: ResourceKind) -> ProductPackage {
    let (id, name, mut items) = match kind {
        ResourceKind::BareMetal => (
            50,
            "Bare Metal Instance",
            vec![
                item(1, "Single Xeon 1270 - 4 Cores / 8GB RAM", "server_core", Some(4.0), 1921),
                item(2, "Dual Xeon 5620 - 8 Cores / 16GB RAM", "server_core", Some(8.0), 1922),
                item(10, "500GB SATA II", "disk0", Some(500.0), 1267),
                item(11, "2TB SATA II", "disk0", Some(2000.0), 1268),
            ],
        ),
        ResourceKind::VirtualGuest => (
            46,
            "Cloud Server",
            vec![
                item(40, "1 x 2.0 GHz Core", "guest_core", Some(1.0), 1640),
                item(41, "2 x 2.0 GHz Cores", "guest_core", Some(2.0), 1642),
                item(50, "1 GB", "ram", Some(1.0), 1644),
                item(51, "4 GB", "ram", Some(4.0), 1647),
                item(60, "25 GB (SAN)", "guest_disk0", Some(25.0), 2202),
                item(61, "100 GB (SAN)", "guest_disk0", Some(100.0), 2203),
            ],
        ),
    };
    items.extend(demo_shared_items());

    ProductPackage {
        id,
        name: name.to_string(),
        items,
        datacenters: demo_datacenters(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioner_common::ResourceDraft;

    fn order(hostname: &str) -> Order {
        Order {
            package_id: 50,
            location: "dal05".to_string(),
            prices: vec![ItemPrice { id: 1921 }],
            quantity: 1,
            use_hourly_pricing: true,
            resource: ResourceDraft {
                hostname: hostname.to_string(),
                domain: "example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_discovery_delay_hides_new_resource() {
        let sim = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        sim.set_discovery_delay(2);
        sim.submit_order(&order("web1")).await.unwrap();

        assert!(sim.list_resources().await.unwrap().is_empty());
        assert!(sim.list_resources().await.unwrap().is_empty());
        assert_eq!(sim.list_resources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_script_provisions_resource() {
        let sim = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        sim.reserve_id("web1", ResourceId(77));
        sim.submit_order(&order("web1")).await.unwrap();

        let mut seen = Vec::new();
        while let Some(tx) = sim.active_transaction(ResourceId(77)).await.unwrap() {
            seen.push(tx.name);
        }
        assert_eq!(seen, vec!["PROVISION_SERVER", "OS_RELOAD", "OS_RELOAD"]);

        let resource = sim.resource(ResourceId(77)).unwrap();
        assert!(resource.has_login_details());
        assert_eq!(resource.status.as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn test_cancel_removes_after_reclaim() {
        let sim = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        sim.reserve_id("web1", ResourceId(8));
        sim.script_transactions(ResourceId(8), vec![None]);
        sim.submit_order(&order("web1")).await.unwrap();
        sim.active_transaction(ResourceId(8)).await.unwrap();

        assert!(sim.cancel_billing_item(81).await.unwrap());
        while sim.active_transaction(ResourceId(8)).await.unwrap().is_some() {}
        assert!(sim.resource(ResourceId(8)).is_none());
        assert!(!sim.cancel_billing_item(81).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");

        let sim = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        sim.submit_order(&order("web1")).await.unwrap();
        sim.save(&path).unwrap();

        let reloaded = SimulatedVendor::load(&path, ResourceKind::BareMetal).unwrap();
        let listed = reloaded.list_resources().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].hostname, "web1");
        assert!(reloaded.active_transaction(listed[0].id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_demo_catalog_follows_kind() {
        let metal = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        let package = metal.active_package_by_name("Bare Metal Instance").await.unwrap();
        assert_eq!(package.id, 50);
        assert!(metal.active_package_by_name("Cloud Server").await.is_err());

        let guest = SimulatedVendor::with_demo_catalog(ResourceKind::VirtualGuest);
        let package = guest.active_package_by_name("Cloud Server").await.unwrap();
        let detail = guest.package_detail(package.id).await.unwrap();
        assert_eq!(detail.id, 46);
        assert_eq!(detail.items_in("guest_core").count(), 2);
        assert_eq!(detail.items_in("server_core").count(), 0);
    }

    #[tokio::test]
    async fn test_withheld_passwords_leave_no_login_details() {
        let sim = SimulatedVendor::with_demo_catalog(ResourceKind::BareMetal);
        sim.set_withhold_passwords(true);
        sim.reserve_id("web1", ResourceId(5));
        sim.submit_order(&order("web1")).await.unwrap();
        sim.complete_provisioning(ResourceId(5));

        let resource = sim.resource(ResourceId(5)).unwrap();
        assert!(resource.primary_ip.is_some());
        assert!(!resource.has_login_details());
    }
}
