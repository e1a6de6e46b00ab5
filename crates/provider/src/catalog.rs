//! Catalog cache
//!
//! The product package (items plus datacenters) is expensive to fetch and
//! rarely changes. It is memoized for a configurable TTL behind a
//! single-flight refresh: while one fetch is running every other caller
//! awaits the same shared future instead of starting its own.
//!
//! Transient failures are retried inside the refresh using the catalog retry
//! envelope. Authorization failures end the refresh at once and are handed
//! to every caller waiting on it.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use provisioner_common::{Error, ProductPackage, Result, StagePolicy};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::VendorClient;
use crate::poller;

/// Outcome of one refresh, shared by every caller that awaited it
#[derive(Debug, Clone)]
enum RefreshError {
    Unauthorized(String),
    Unavailable(String),
}

type RefreshResult = std::result::Result<Arc<ProductPackage>, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

#[derive(Default)]
struct CacheState {
    cached: Option<(Arc<ProductPackage>, Instant)>,
    in_flight: Option<(u64, SharedRefresh)>,
    generation: u64,
}

/// Single-flight, TTL-bounded memo of the catalog package
pub struct CatalogCache {
    client: Arc<dyn VendorClient>,
    package_name: String,
    ttl: Duration,
    retry: StagePolicy,
    state: Mutex<CacheState>,
}

impl CatalogCache {
    pub fn new(
        client: Arc<dyn VendorClient>,
        package_name: impl Into<String>,
        ttl: Duration,
        retry: StagePolicy,
    ) -> Self {
        Self {
            client,
            package_name: package_name.into(),
            ttl,
            retry,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Current package, refreshing it if the cached copy has expired
    pub async fn get(&self) -> Result<Arc<ProductPackage>> {
        let (generation, refresh) = {
            let mut state = self.state.lock();
            if let Some((package, fetched_at)) = &state.cached {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(package.clone());
                }
            }

            let joined = state
                .in_flight
                .as_ref()
                .map(|(generation, refresh)| (*generation, refresh.clone()));
            match joined {
                Some(joined) => {
                    debug!("Joining in-flight catalog refresh");
                    joined
                }
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let refresh = Self::refresh(
                        self.client.clone(),
                        self.package_name.clone(),
                        self.retry,
                    )
                    .boxed()
                    .shared();
                    state.in_flight = Some((generation, refresh.clone()));
                    (generation, refresh)
                }
            }
        };

        let outcome = refresh.await;

        {
            let mut state = self.state.lock();
            if matches!(&state.in_flight, Some((g, _)) if *g == generation) {
                state.in_flight = None;
                if let Ok(package) = &outcome {
                    state.cached = Some((package.clone(), Instant::now()));
                }
            }
        }

        outcome.map_err(|e| match e {
            RefreshError::Unauthorized(msg) => Error::CatalogAuthorization(msg),
            RefreshError::Unavailable(reason) => Error::CatalogUnavailable {
                package: self.package_name.clone(),
                reason,
            },
        })
    }

    /// Drop the cached package; the next caller refetches
    pub fn invalidate(&self) {
        self.state.lock().cached = None;
    }

    async fn refresh(
        client: Arc<dyn VendorClient>,
        package_name: String,
        retry: StagePolicy,
    ) -> RefreshResult {
        info!("Refreshing catalog package '{}'", package_name);
        let client = client.as_ref();
        let name = package_name.as_str();

        let fetched = poller::poll_until(&retry, move || async move {
            match fetch_package(client, name).await {
                Ok(package) => Ok(Some(package)),
                Err(e) if e.is_authorization() => Err(e),
                Err(e) if e.is_transient() => {
                    warn!("Catalog fetch for '{}' failed, retrying: {}", name, e);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await;

        match fetched {
            Ok(Some(package)) => {
                debug!(
                    "Catalog package '{}' has {} items in {} datacenters",
                    name,
                    package.items.len(),
                    package.datacenters.len()
                );
                Ok(Arc::new(package))
            }
            Ok(None) => Err(RefreshError::Unavailable(format!(
                "still failing after {}ms",
                retry.max_wait_ms
            ))),
            Err(e) if e.is_authorization() => {
                warn!("Catalog fetch for '{}' is not authorized: {}", name, e);
                Err(RefreshError::Unauthorized(e.to_string()))
            }
            Err(e) => Err(RefreshError::Unavailable(e.to_string())),
        }
    }
}

async fn fetch_package(client: &dyn VendorClient, name: &str) -> Result<ProductPackage> {
    let package = client.active_package_by_name(name).await?;
    client.package_detail(package.id).await
}
