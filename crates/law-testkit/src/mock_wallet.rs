//! Mock wallet and connector

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use law_core::{
    Address, BoxedLedgerClient, LedgerConnector, LedgerError, SigningIdentity, Wallet, WalletError,
};

use crate::mock_ledger::MockLedger;

/// Wallet with a scripted answer and a request counter.
#[derive(Debug, Clone)]
pub struct MockWallet {
    answer: Result<SigningIdentity, WalletError>,
    requests: Arc<AtomicUsize>,
}

impl MockWallet {
    /// Wallet that hands out `address`.
    pub fn with_identity(address: &str) -> Self {
        Self::answering(Ok(SigningIdentity::new(Address::parse(address).unwrap())))
    }

    /// Wallet whose user declines every request.
    pub fn rejecting(message: &str) -> Self {
        Self::answering(Err(WalletError::Rejected {
            message: message.to_string(),
        }))
    }

    /// Wallet without any account.
    pub fn empty() -> Self {
        Self::answering(Err(WalletError::NoIdentity))
    }

    fn answering(answer: Result<SigningIdentity, WalletError>) -> Self {
        Self {
            answer,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of identity requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn request_identity(&self) -> Result<SigningIdentity, WalletError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Connector that hands out a shared [`MockLedger`] signed by the
/// connecting identity.
#[derive(Debug, Clone)]
pub struct MockConnector {
    ledger: MockLedger,
    failure: Option<LedgerError>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    /// Connector for `ledger`.
    pub fn new(ledger: MockLedger) -> Self {
        Self {
            ledger,
            failure: None,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connector that cannot reach the ledger.
    pub fn failing(ledger: MockLedger, error: LedgerError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(ledger)
        }
    }

    /// Number of connect attempts.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl LedgerConnector for MockConnector {
    fn connect(
        &self,
        identity: &SigningIdentity,
        _contract: &Address,
    ) -> Result<BoxedLedgerClient, LedgerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.ledger.set_signer(identity.address.clone());
        Ok(self.ledger.client())
    }
}
