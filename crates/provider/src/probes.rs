//! Resource probes
//!
//! Each gate of the create and destroy workflows is a [`ResourceProbe`]: a
//! single question asked of the vendor about one resource id, re-asked by the
//! bounded poller until it holds.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use provisioner_common::{ResourceId, Result, Transaction};
use tracing::{debug, info};

use crate::client::VendorClient;

/// Log target for transaction progress
pub const TRANSACTION_TARGET: &str = "provisioner::transaction";

#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn test(&self, id: ResourceId) -> Result<bool>;
}

/// Follows the active-transaction feed of the resources it is asked about.
///
/// Only the current transaction of a resource is visible, so completion is
/// inferred: a transaction was seen and now none is active. State is keyed by
/// resource id. Use one tracker per create or destroy call.
pub struct TransactionTracker {
    client: Arc<dyn VendorClient>,
    last_seen: DashMap<ResourceId, Transaction>,
}

impl TransactionTracker {
    pub fn new(client: Arc<dyn VendorClient>) -> Self {
        Self {
            client,
            last_seen: DashMap::new(),
        }
    }

    /// True as soon as any transaction is active on the resource.
    ///
    /// The observed transaction seeds the completion check, so a cycle that
    /// finishes between the two gates is not missed.
    pub async fn started(&self, id: ResourceId) -> Result<bool> {
        match self.client.active_transaction(id).await? {
            Some(active) => {
                info!(
                    target: TRANSACTION_TARGET,
                    "Resource {} started transaction {}", id, active.name
                );
                self.last_seen.entry(id).or_insert(active);
                Ok(true)
            }
            None => {
                debug!(
                    target: TRANSACTION_TARGET,
                    "Resource {} has not started any transactions yet", id
                );
                Ok(false)
            }
        }
    }

    /// True exactly once per cycle: on the first poll with no active
    /// transaction after one has been observed.
    pub async fn ended(&self, id: ResourceId) -> Result<bool> {
        let Some(active) = self.client.active_transaction(id).await? else {
            return Ok(match self.last_seen.remove(&id) {
                Some((_, previous)) => {
                    info!(
                        target: TRANSACTION_TARGET,
                        "Successfully completed all transactions for resource {} (last was {} after {}s)",
                        id,
                        previous.name,
                        previous.elapsed_seconds
                    );
                    true
                }
                None => false,
            });
        };

        match self.last_seen.insert(id, active.clone()) {
            Some(previous) if !previous.same_as(&active) => {
                info!(
                    target: TRANSACTION_TARGET,
                    "Successfully completed transaction {} in {} seconds",
                    previous.name,
                    previous.elapsed_seconds
                );
                info!(
                    target: TRANSACTION_TARGET,
                    "Current transaction is {}. Average completion time is {} minutes",
                    active.name,
                    active.average_duration
                );
            }
            Some(_) => {}
            None => {
                info!(
                    target: TRANSACTION_TARGET,
                    "Current transaction is {}. Average completion time is {} minutes",
                    active.name,
                    active.average_duration
                );
            }
        }
        Ok(false)
    }

    /// Last transaction observed for a resource in this session
    pub fn last_seen(&self, id: ResourceId) -> Option<Transaction> {
        self.last_seen.get(&id).map(|entry| entry.value().clone())
    }
}

/// Has any transaction started on the resource
pub struct TransactionsStarted<'a>(pub &'a TransactionTracker);

#[async_trait]
impl ResourceProbe for TransactionsStarted<'_> {
    async fn test(&self, id: ResourceId) -> Result<bool> {
        self.0.started(id).await
    }
}

/// Has the transaction cycle of the resource fully ended
pub struct TransactionsEnded<'a>(pub &'a TransactionTracker);

#[async_trait]
impl ResourceProbe for TransactionsEnded<'_> {
    async fn test(&self, id: ResourceId) -> Result<bool> {
        self.0.ended(id).await
    }
}

/// Fresh snapshot has both addresses and at least one password
pub struct LoginDetailsPresent {
    client: Arc<dyn VendorClient>,
}

impl LoginDetailsPresent {
    pub fn new(client: Arc<dyn VendorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceProbe for LoginDetailsPresent {
    async fn test(&self, id: ResourceId) -> Result<bool> {
        let ready = self
            .client
            .get_resource(id)
            .await?
            .map_or(false, |resource| resource.has_login_details());
        if !ready {
            debug!("Resource {} has no login details yet", id);
        }
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedVendor;

    fn t(id: u64, name: &str) -> Option<Transaction> {
        Some(Transaction::new(id, name))
    }

    #[tokio::test]
    async fn test_ended_requires_observed_transaction() {
        let sim = Arc::new(SimulatedVendor::new());
        sim.script_transactions(ResourceId(1), vec![None, None]);
        let tracker = TransactionTracker::new(sim.clone());

        assert!(!tracker.ended(ResourceId(1)).await.unwrap());
        assert!(!tracker.ended(ResourceId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_ended_true_once_per_cycle() {
        let sim = Arc::new(SimulatedVendor::new());
        sim.script_transactions(
            ResourceId(1),
            vec![t(1, "PROVISION"), t(1, "PROVISION"), t(2, "OS_RELOAD"), None, None],
        );
        let tracker = TransactionTracker::new(sim.clone());
        let id = ResourceId(1);

        assert!(!tracker.ended(id).await.unwrap());
        assert!(!tracker.ended(id).await.unwrap());
        assert!(!tracker.ended(id).await.unwrap());
        assert_eq!(tracker.last_seen(id).unwrap().name, "OS_RELOAD");
        assert!(tracker.ended(id).await.unwrap());
        assert!(tracker.last_seen(id).is_none());
        assert!(!tracker.ended(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_started_seeds_completion() {
        let sim = Arc::new(SimulatedVendor::new());
        sim.script_transactions(ResourceId(9), vec![None, t(4, "RECLAIM"), None]);
        let tracker = TransactionTracker::new(sim.clone());
        let id = ResourceId(9);

        assert!(!tracker.started(id).await.unwrap());
        assert!(tracker.started(id).await.unwrap());
        // the cycle finished before the completion gate first looked
        assert!(tracker.ended(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_resources_do_not_share_state() {
        let sim = Arc::new(SimulatedVendor::new());
        sim.script_transactions(ResourceId(100), vec![t(1, "PROVISION"), None]);
        sim.script_transactions(ResourceId(200), vec![t(2, "PROVISION"), t(2, "PROVISION"), None]);
        let tracker = TransactionTracker::new(sim.clone());

        assert!(!tracker.ended(ResourceId(100)).await.unwrap());
        assert!(!tracker.ended(ResourceId(200)).await.unwrap());
        assert!(tracker.ended(ResourceId(100)).await.unwrap());
        assert!(!tracker.ended(ResourceId(200)).await.unwrap());
        assert_eq!(tracker.last_seen(ResourceId(200)).unwrap().id, 2);
        assert!(tracker.ended(ResourceId(200)).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_details_probe() {
        let sim = Arc::new(SimulatedVendor::new());
        let probe = LoginDetailsPresent::new(sim.clone());

        // unknown resources are simply not ready
        assert!(!probe.test(ResourceId(3)).await.unwrap());

        let mut resource = provisioner_common::Resource::new(ResourceId(3), "db1", "example.com");
        resource.billing_item_id = Some(30);
        sim.insert_resource(resource.clone());
        assert!(!probe.test(ResourceId(3)).await.unwrap());

        sim.complete_provisioning(ResourceId(3));
        assert!(probe.test(ResourceId(3)).await.unwrap());
    }
}
