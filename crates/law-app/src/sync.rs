//! Registry Synchronizer
//!
//! Rebuilds the full user list from three dependent reads:
//!
//! ```text
//! enumerate_addresses ──► [a0, a1, .. an]
//!                          │    │        │      (up to lookup_concurrency chains in flight)
//!                          ▼    ▼        ▼
//!                   username_of(ai) ──► balance_of(name_i)
//! ```
//!
//! Each address runs its own chain (username before balance). Chains for
//! different addresses run concurrently; results are reassembled in
//! enumeration order no matter which chain finishes first. Any failure aborts
//! the whole refresh and the previously published snapshot stays visible.
//!
//! A synchronizer bound to a [`SessionGeneration`] publishes only while that
//! generation is current; the check and the publish happen under one lock.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use law_core::{
    Address, Amount, BoxedLedgerClient, Dynamic, LedgerClient, LedgerError, RegistryError,
    RegistrySnapshot, UserRecord, Username,
};
use tracing::{debug, info, warn};

use crate::metrics::RegistryMetrics;
use crate::session::SessionGeneration;

/// Rebuilds and publishes the registry snapshot.
#[derive(Clone)]
pub struct RegistrySynchronizer {
    ledger: BoxedLedgerClient,
    snapshot: Dynamic<Arc<RegistrySnapshot>>,
    metrics: Arc<RegistryMetrics>,
    lookup_concurrency: usize,
    generation: Option<SessionGeneration>,
}

impl RegistrySynchronizer {
    /// Create a synchronizer publishing into `snapshot`.
    pub fn new(
        ledger: BoxedLedgerClient,
        snapshot: Dynamic<Arc<RegistrySnapshot>>,
        metrics: Arc<RegistryMetrics>,
        lookup_concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            snapshot,
            metrics,
            lookup_concurrency: lookup_concurrency.max(1),
            generation: None,
        }
    }

    /// Publish only while `generation` is current.
    #[must_use]
    pub fn bound_to(mut self, generation: SessionGeneration) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Whether the session this synchronizer belongs to is still current.
    /// Always true for an unbound synchronizer.
    pub fn is_current(&self) -> bool {
        self.generation
            .as_ref()
            .map_or(true, SessionGeneration::is_current)
    }

    /// Read the registry without publishing anything.
    pub async fn fetch(&self) -> Result<RegistrySnapshot, RegistryError> {
        let addresses = self
            .ledger
            .enumerate_addresses()
            .await
            .map_err(RegistryError::sync_failed)?;
        debug!(addresses = addresses.len(), "enumerated registry");

        let ledger: &dyn LedgerClient = self.ledger.as_ref();
        let records: Vec<UserRecord> = stream::iter(
            addresses
                .into_iter()
                .map(|address| lookup_user(ledger, address)),
        )
        .buffered(self.lookup_concurrency)
        .try_collect()
        .await
        .map_err(RegistryError::sync_failed)?;

        RegistrySnapshot::from_records(records)
            .map_err(|e| RegistryError::sync_failed(LedgerError::decode(e.to_string())))
    }

    /// Fetch the registry and publish it as one atomic replacement.
    ///
    /// **Returns**: the version of the published snapshot. On failure nothing
    /// is published and the error is `SyncFailed`, or `SessionReplaced` if a
    /// reconnect retired this synchronizer's session.
    pub async fn refresh(&self) -> Result<u64, RegistryError> {
        match self.fetch().await {
            Ok(snapshot) => {
                let users = snapshot.len();
                let fresh = Arc::new(snapshot);
                let published = self.snapshot.update_if(|current| {
                    if !self.is_current() {
                        return false;
                    }
                    *current = fresh;
                    true
                });
                let Some(version) = published else {
                    self.metrics.record_refresh(false);
                    warn!(users, "session replaced; discarding fetched snapshot");
                    return Err(RegistryError::SessionReplaced);
                };
                self.metrics.record_refresh(true);
                info!(users, version, "snapshot published");
                Ok(version)
            }
            Err(e) => {
                self.metrics.record_refresh(false);
                warn!(error = %e, "refresh failed; keeping previous snapshot");
                Err(e)
            }
        }
    }
}

/// One address's lookup chain: username first, then the balance for it.
async fn lookup_user(
    ledger: &dyn LedgerClient,
    raw_address: String,
) -> Result<UserRecord, LedgerError> {
    let address = Address::parse(&raw_address)
        .map_err(|e| LedgerError::decode(format!("address {raw_address:?}: {}", e.message)))?;

    // The ledger is keyed by its own spelling of the address.
    let raw_username = ledger.username_of(&raw_address).await?;
    let username = Username::parse(&raw_username)
        .map_err(|e| LedgerError::decode(format!("username for {address}: {}", e.message)))?;

    let raw_balance = ledger.balance_of(username.as_str()).await?;
    let balance = Amount::parse(&raw_balance)
        .map_err(|e| LedgerError::decode(format!("balance of {username}: {}", e.message)))?;

    debug!(%address, %username, %balance, "resolved user");
    Ok(UserRecord::new(username, address, balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_ledger::LocalLedger;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn seeded() -> LocalLedger {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        ledger.seed("alice", "0xA", "100").unwrap();
        ledger.seed("bob", "0xB", "50").unwrap();
        ledger
    }

    fn synchronizer(
        ledger: &LocalLedger,
    ) -> (RegistrySynchronizer, Dynamic<Arc<RegistrySnapshot>>) {
        let snapshot = Dynamic::new(Arc::new(RegistrySnapshot::empty()));
        let sync = RegistrySynchronizer::new(
            Arc::new(ledger.client(addr("0xA"))),
            snapshot.clone(),
            Arc::new(RegistryMetrics::new()),
            4,
        );
        (sync, snapshot)
    }

    #[tokio::test]
    async fn test_refresh_publishes_in_enumeration_order() {
        let ledger = seeded();
        let (sync, snapshot) = synchronizer(&ledger);

        let version = sync.refresh().await.unwrap();
        assert_eq!(version, 1);

        let published = snapshot.get();
        let names: Vec<_> = published.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);
        assert_eq!(published.find_by_username("bob").unwrap().balance, Amount::from(50));
    }

    #[tokio::test]
    async fn test_fetch_does_not_publish() {
        let ledger = seeded();
        let (sync, snapshot) = synchronizer(&ledger);
        let fetched = sync.fetch().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(snapshot.version(), 0);
        assert!(snapshot.get().is_empty());
    }

    #[tokio::test]
    async fn test_retired_generation_does_not_publish() {
        let ledger = seeded();
        let (sync, snapshot) = synchronizer(&ledger);
        let epoch = crate::session::SessionEpoch::new();
        let sync = sync.bound_to(epoch.advance());
        assert_eq!(sync.refresh().await, Ok(1));

        epoch.advance();
        assert!(!sync.is_current());
        assert_eq!(sync.refresh().await, Err(RegistryError::SessionReplaced));
        assert_eq!(snapshot.version(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        let (sync, snapshot) = synchronizer(&ledger);
        sync.refresh().await.unwrap();
        assert!(snapshot.get().is_empty());
        assert_eq!(snapshot.version(), 1);
    }
}
