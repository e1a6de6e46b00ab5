//! CLI Commands

pub mod catalog;
pub mod config;
pub mod node;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use provisioner_common::{default_sim_state_path, ProvisionerConfig};
use provisioner_provider::{Provisioner, SimulatedVendor};
use tracing::debug;

/// Orchestrator wired to the local simulated vendor
pub struct Session {
    pub provisioner: Provisioner,
    sim: Arc<SimulatedVendor>,
    state_path: PathBuf,
}

impl Session {
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = ProvisionerConfig::load(config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?;

        let state_path = default_sim_state_path();
        debug!("Simulated vendor state at {}", state_path.display());
        let sim = Arc::new(
            SimulatedVendor::load(&state_path, config.kind)
                .with_context(|| format!("loading vendor state from {}", state_path.display()))?,
        );
        let provisioner = Provisioner::new(sim.clone(), config)?;

        Ok(Self {
            provisioner,
            sim,
            state_path,
        })
    }

    /// Persist vendor state for the next invocation
    pub fn close(self) -> Result<()> {
        self.sim
            .save(&self.state_path)
            .with_context(|| format!("saving vendor state to {}", self.state_path.display()))
    }
}
