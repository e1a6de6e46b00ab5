//! Provisioner orchestration engine
//!
//! Drives resources through the create and destroy workflows of an
//! asynchronous, eventually consistent vendor API. Each workflow is a
//! sequence of bounded waits on externally observable milestones.

pub mod adapter;
pub mod catalog;
pub mod client;
pub mod node;
pub mod poller;
pub mod probes;
pub mod profiles;
pub mod sim;

pub use adapter::{CreateRequest, NodeAndCredentials, Provisioner};
pub use catalog::CatalogCache;
pub use client::VendorClient;
pub use node::NodeMetadata;
pub use probes::{ResourceProbe, TransactionTracker};
pub use profiles::{HardwareProfile, Image};
pub use sim::SimulatedVendor;
