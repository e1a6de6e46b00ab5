//! Provisioner Common Library
//!
//! Shared domain types, error taxonomy, status translation and configuration
//! for the provisioning orchestrator.

pub mod config;
pub mod error;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use config::{PollingConfig, ProvisionerConfig, StagePolicy};
pub use error::{Error, Result};
pub use status::{translate, CanonicalStatus, HardwareStatus, PowerState};
pub use types::*;

/// Provisioner version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".provisioner")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Default path of the simulated vendor state
pub fn default_sim_state_path() -> std::path::PathBuf {
    default_store_path().join("sim-state.json")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
