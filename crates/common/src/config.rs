//! Provisioner configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::types::ResourceKind;
use crate::{Error, Result};

/// Provisioner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Kind of resource this provisioner orders
    pub kind: ResourceKind,

    /// Name of the catalog package resources are ordered from; defaults
    /// per kind, see [`ProvisionerConfig::package_name`]
    pub package_name: Option<String>,

    /// Uplink port speed in Mbps (10, 100, 1000); `None` offers every speed
    pub port_speed: Option<u32>,

    /// Baseline price ids added to every order
    pub prices: Vec<u64>,

    /// How long a fetched catalog stays fresh
    pub catalog_ttl_secs: u64,

    /// Domain applied when a create request does not name one
    pub domain: String,

    /// Per-stage polling envelopes
    pub polling: PollingConfig,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            kind: ResourceKind::BareMetal,
            package_name: None,
            port_speed: Some(10),
            prices: vec![
                21,   // 1 IP Address
                55,   // Host Ping
                57,   // Email and Ticket
                58,   // Automated Notification
                1800, // 0 GB Bandwidth
                905,  // Reboot / Remote Console
                418,  // Nessus Vulnerability Assessment & Reporting
                420,  // Unlimited SSL VPN Users & 1 PPTP VPN User per account
            ],
            catalog_ttl_secs: 60,
            domain: "example.com".to_string(),
            polling: PollingConfig::default(),
        }
    }
}

/// Bounded wait for one stage: total budget plus backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePolicy {
    pub max_wait_ms: u64,
    pub base_period_ms: u64,
    pub cap_period_ms: u64,
}

impl StagePolicy {
    pub const fn new(max_wait_ms: u64, base_period_ms: u64, cap_period_ms: u64) -> Self {
        Self {
            max_wait_ms,
            base_period_ms,
            cap_period_ms,
        }
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn base_period(&self) -> Duration {
        Duration::from_millis(self.base_period_ms)
    }

    pub fn cap_period(&self) -> Duration {
        Duration::from_millis(self.cap_period_ms)
    }

    fn validate(&self, stage: &str) -> Result<()> {
        if self.base_period_ms == 0 {
            return Err(Error::InvalidConfig(format!(
                "{stage}: base period must be greater than zero"
            )));
        }
        if self.base_period_ms > self.cap_period_ms {
            return Err(Error::InvalidConfig(format!(
                "{stage}: base period {}ms exceeds cap period {}ms",
                self.base_period_ms, self.cap_period_ms
            )));
        }
        Ok(())
    }
}

/// Polling configuration for each workflow gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Order approval and resource discovery
    pub order_approved: StagePolicy,

    /// First provisioning transaction becoming active
    pub transactions_started: StagePolicy,

    /// Last provisioning transaction finishing
    pub transactions_ended: StagePolicy,

    /// Addresses and passwords showing up on the resource
    pub login_details: StagePolicy,

    /// Retry envelope for transient catalog failures
    pub catalog_retry: StagePolicy,
}

const HOUR_MS: u64 = 60 * 60 * 1000;

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            order_approved: StagePolicy::new(5 * HOUR_MS, 5_000, 10_000),
            transactions_started: StagePolicy::new(5 * HOUR_MS, 5_000, 10_000),
            transactions_ended: StagePolicy::new(10 * HOUR_MS, 5_000, 10_000),
            login_details: StagePolicy::new(HOUR_MS, 50, 1_000),
            catalog_retry: StagePolicy::new(60_000, 1_000, 5_000),
        }
    }
}

impl ProvisionerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.package_name().trim().is_empty() {
            return Err(Error::InvalidConfig("package_name must not be empty".into()));
        }
        if self.polling.login_details.max_wait_ms <= 500 {
            return Err(Error::InvalidConfig(
                "login_details.max_wait_ms must be in milliseconds and greater than 500".into(),
            ));
        }

        let p = &self.polling;
        p.order_approved.validate("order_approved")?;
        p.transactions_started.validate("transactions_started")?;
        p.transactions_ended.validate("transactions_ended")?;
        p.login_details.validate("login_details")?;
        p.catalog_retry.validate("catalog_retry")?;
        Ok(())
    }

    /// Configured package name, or the standard package for the kind
    pub fn package_name(&self) -> &str {
        match (&self.package_name, self.kind) {
            (Some(name), _) => name,
            (None, ResourceKind::BareMetal) => "Bare Metal Instance",
            (None, ResourceKind::VirtualGuest) => "Cloud Server",
        }
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}
