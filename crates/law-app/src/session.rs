//! Connection session
//!
//! A [`Session`] is the authorized context for one end user: the signing
//! identity plus the ledger client bound to it. The synchronizer and the
//! orchestrator share the client read-only once the session exists.
//!
//! A [`SessionEpoch`] counts connects. Everything built for one session holds
//! the [`SessionGeneration`] it was built for. Work that finishes after a
//! reconnect sees a retired generation and stops observing its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use law_core::{Address, BoxedLedgerClient, LedgerConnector, RegistryError, SigningIdentity, Wallet};
use tracing::{debug, info, warn};

/// Authorized connection to the registry contract.
#[derive(Clone)]
pub struct Session {
    identity: SigningIdentity,
    contract: Address,
    ledger: BoxedLedgerClient,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Establish a session.
    ///
    /// **What it does**: asks `wallet` for a signing identity, then binds a
    /// ledger client for `contract` through `connector`
    /// **Returns**: the session, or `ConnectFailed` if no identity is
    /// available, the user declines, or the client cannot be constructed.
    /// Nothing is retried.
    pub async fn connect(
        wallet: &dyn Wallet,
        connector: &dyn LedgerConnector,
        contract: &Address,
    ) -> Result<Self, RegistryError> {
        debug!(contract = %contract, "requesting signing identity");
        let identity = wallet.request_identity().await.map_err(|e| {
            warn!(error = %e, "wallet did not provide an identity");
            RegistryError::from(e)
        })?;

        let ledger = connector.connect(&identity, contract).map_err(|e| {
            warn!(error = %e, signer = %identity.address, "failed to bind ledger client");
            RegistryError::connect_failed(e.to_string())
        })?;

        info!(signer = %identity.address, contract = %contract, "session established");
        Ok(Self::from_parts(identity, contract.clone(), ledger))
    }

    /// Assemble a session from an already-authorized client.
    pub fn from_parts(
        identity: SigningIdentity,
        contract: Address,
        ledger: BoxedLedgerClient,
    ) -> Self {
        Self {
            identity,
            contract,
            ledger,
        }
    }

    /// Signing identity of the session.
    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Contract the client is bound to.
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Shared ledger client.
    pub fn ledger(&self) -> BoxedLedgerClient {
        Arc::clone(&self.ledger)
    }
}

/// Connect counter shared by everything built from one [`AppCore`](crate::AppCore).
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch(Arc<AtomicU64>);

impl SessionEpoch {
    /// Epoch with no generation started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, retiring every earlier one.
    pub fn advance(&self) -> SessionGeneration {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        SessionGeneration {
            epoch: self.clone(),
            generation,
        }
    }

    /// Most recently started generation.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Generation a set of session services belongs to.
#[derive(Debug, Clone)]
pub struct SessionGeneration {
    epoch: SessionEpoch,
    generation: u64,
}

impl SessionGeneration {
    /// Generation number.
    pub fn value(&self) -> u64 {
        self.generation
    }

    /// Whether no later connect has happened.
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_ledger::{LocalConnector, LocalLedger, StaticWallet};
    use law_core::WalletError;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_connect_binds_identity() {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        let wallet = StaticWallet::new(SigningIdentity::new(addr("0xA")));
        let session = Session::connect(&wallet, &LocalConnector::new(ledger), &addr("0xC0"))
            .await
            .unwrap();
        assert_eq!(session.identity().address, addr("0xA"));
        assert_eq!(session.contract(), &addr("0xC0"));
    }

    #[tokio::test]
    async fn test_missing_identity_is_connect_failed() {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        let connector = LocalConnector::new(ledger);
        let err = Session::connect(&StaticWallet::empty(), &connector, &addr("0xC0"))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::from(WalletError::NoIdentity));
    }

    #[test]
    fn test_advancing_epoch_retires_generation() {
        let epoch = SessionEpoch::new();
        let first = epoch.advance();
        assert!(first.is_current());

        let second = epoch.advance();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.value(), 2);
    }

    #[tokio::test]
    async fn test_wrong_contract_is_connect_failed() {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        let wallet = StaticWallet::new(SigningIdentity::new(addr("0xA")));
        let err = Session::connect(&wallet, &LocalConnector::new(ledger), &addr("0xC1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ConnectFailed { .. }));
    }
}
