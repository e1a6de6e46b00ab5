//! Core types for the provisioner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::status::normalize_key;

/// Vendor-assigned resource identifier, stable for the resource's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ResourceId)
            .map_err(|_| crate::Error::InvalidId(s.to_string()))
    }
}

/// Kind of compute resource managed by a provisioner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    BareMetal,
    VirtualGuest,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::BareMetal => write!(f, "bare metal"),
            ResourceKind::VirtualGuest => write!(f, "virtual guest"),
        }
    }
}

/// A bounded wait in the create or destroy workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    OrderApproved,
    TransactionsStarted,
    TransactionsEnded,
    LoginDetails,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::OrderApproved => write!(f, "order approval and discovery"),
            Stage::TransactionsStarted => write!(f, "transactions to start"),
            Stage::TransactionsEnded => write!(f, "transactions to end"),
            Stage::LoginDetails => write!(f, "login details"),
        }
    }
}

/// Initial password record attached to an operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    pub username: String,
    pub password: String,
}

/// Operating system record; populated once provisioning completes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    #[serde(default)]
    pub passwords: Vec<Password>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: u64,
    pub name: String,
    pub long_name: Option<String>,
}

/// A bare-metal server or virtual guest as observed through the vendor API.
///
/// Snapshots are refreshed between polls and are never mutated by the
/// orchestrator itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub hostname: String,
    pub domain: String,
    pub primary_ip: Option<String>,
    pub primary_backend_ip: Option<String>,
    /// Absent until the resource is billable; discarded quotes never get one
    pub billing_item_id: Option<u64>,
    pub operating_system: Option<OperatingSystem>,
    pub datacenter: Option<Datacenter>,
    /// Vendor status key (hardware status or power state, depending on kind)
    pub status: Option<String>,
}

impl Resource {
    pub fn new(id: ResourceId, hostname: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            domain: domain.into(),
            primary_ip: None,
            primary_backend_ip: None,
            billing_item_id: None,
            operating_system: None,
            datacenter: None,
            status: None,
        }
    }

    pub fn has_billing_item(&self) -> bool {
        self.billing_item_id.is_some()
    }

    pub fn fqdn(&self) -> String {
        if self.domain.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}.{}", self.hostname, self.domain)
        }
    }

    /// Both addresses assigned and at least one password available
    pub fn has_login_details(&self) -> bool {
        self.primary_ip.is_some() && self.primary_backend_ip.is_some() && self.first_password().is_some()
    }

    pub fn first_password(&self) -> Option<&Password> {
        self.operating_system.as_ref()?.passwords.first()
    }
}

/// Hostname/domain of a resource that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDraft {
    pub hostname: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemPrice {
    pub id: u64,
}

/// Request to provision one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub package_id: u64,
    pub location: String,
    pub prices: Vec<ItemPrice>,
    pub quantity: u32,
    pub use_hourly_pricing: bool,
    pub resource: ResourceDraft,
}

/// Vendor acknowledgment of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: u64,
    pub order: Order,
    /// Resources echoed back by the vendor; frequently empty or stale
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Approved,
    PendingApproval,
    Unrecognized,
}

impl OrderStatus {
    pub fn from_value(value: &str) -> Self {
        match normalize_key(value).as_str() {
            "APPROVED" => OrderStatus::Approved,
            "PENDING_APPROVAL" => OrderStatus::PendingApproval,
            _ => OrderStatus::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingOrder {
    pub id: u64,
    pub status: OrderStatus,
}

/// One unit of vendor-side work currently active on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub name: String,
    pub elapsed_seconds: u64,
    /// Average completion time in minutes
    pub average_duration: f64,
}

impl Transaction {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            elapsed_seconds: 0,
            average_duration: 0.0,
        }
    }

    /// Same unit of work, ignoring the fields that change while it runs
    pub fn same_as(&self, other: &Transaction) -> bool {
        self.id == other.id && self.name == other.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub id: u64,
    pub name: String,
}

/// Catalog item, e.g. a CPU/RAM unit, a disk or an operating system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: u64,
    pub description: String,
    pub units: Option<String>,
    pub capacity: Option<f64>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub prices: Vec<ItemPrice>,
}

impl ProductItem {
    pub fn has_category(&self, code: &str) -> bool {
        self.categories.iter().any(|c| c == code)
    }

    pub fn first_price(&self) -> Option<ItemPrice> {
        self.prices.first().copied()
    }
}

/// Full package detail: orderable items and the datacenters they ship to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPackage {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ProductItem>,
    #[serde(default)]
    pub datacenters: Vec<Datacenter>,
}

impl ProductPackage {
    pub fn items_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a ProductItem> + 'a {
        self.items.iter().filter(move |item| item.has_category(category))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub user: String,
    pub password: String,
}

impl From<&Password> for LoginCredentials {
    fn from(pw: &Password) -> Self {
        Self {
            user: pw.username.clone(),
            password: pw.password.clone(),
        }
    }
}
