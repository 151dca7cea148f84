//! # Ledger: the remote-procedure surface of the registry contract
//!
//! ```text
//! law-app (workflows)             runtime / testkit
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │ Session              │        │ LocalLedgerClient    │
//! │   ┌──────────────┐   │        │ MockLedger           │
//! │   │ LedgerClient │◄──┼────────│   implement          │
//! │   └──────────────┘   │        │   LedgerClient       │
//! └──────────────────────┘        └──────────────────────┘
//! ```
//!
//! Reads return raw strings exactly as the ledger reports them; decoding is
//! the caller's job so malformed responses surface as `LedgerError::Decode`
//! at the component boundary. Writes take validated values.
//!
//! A write returns a [`PendingTx`] as soon as the ledger accepts it; finality
//! is a separate suspension via [`LedgerClient::await_finality`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, WalletError};
use crate::types::{Address, Amount, OperationKind, Username};

/// Hash identifying a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Wrap a hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Borrow the hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle for a submitted, not yet final, transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Which contract call this transaction carries
    pub kind: OperationKind,
}

/// Proof that a transaction reached finality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block that included the transaction
    pub block_number: u64,
}

/// Bridge trait for the registry contract.
///
/// Every method is a suspension point. Implementations must be safe to call
/// concurrently from several logical tasks.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    // =========================================================================
    // Reads
    // =========================================================================

    /// All registered addresses in registration order.
    async fn enumerate_addresses(&self) -> Result<Vec<String>, LedgerError>;

    /// Username registered for `address`.
    async fn username_of(&self, address: &str) -> Result<String, LedgerError>;

    /// Balance of `username` as a base-10 integer string.
    async fn balance_of(&self, username: &str) -> Result<String, LedgerError>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Submit `registerUser(username, address, amount)`.
    async fn submit_register(
        &self,
        username: &Username,
        address: &Address,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError>;

    /// Submit `redeem(amount)` on behalf of the signer.
    async fn submit_redeem(&self, amount: &Amount) -> Result<PendingTx, LedgerError>;

    /// Submit `mint(username, amount)`.
    async fn submit_reward(
        &self,
        username: &Username,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError>;

    /// Wait until `tx` is final with at least `confirmations` confirmations.
    ///
    /// There is no way to abort this wait; dropping the future only stops
    /// observing the outcome.
    async fn await_finality(
        &self,
        tx: &PendingTx,
        confirmations: u64,
    ) -> Result<TxReceipt, LedgerError>;
}

/// Type alias for a shared ledger client
pub type BoxedLedgerClient = Arc<dyn LedgerClient>;

/// Identity used to sign transactions for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// Signer's chain address
    pub address: Address,
    /// Optional human label (wallet account name)
    pub label: Option<String>,
}

impl SigningIdentity {
    /// Identity without a label.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            label: None,
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Source of signing identities (browser wallet, keystore, hardware device).
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Ask the user for an identity. May suspend while the user decides.
    async fn request_identity(&self) -> Result<SigningIdentity, WalletError>;
}

/// Binds a signing identity to the contract and yields a client.
pub trait LedgerConnector: Send + Sync {
    /// Construct an authorized client for `contract` acting as `identity`.
    fn connect(
        &self,
        identity: &SigningIdentity,
        contract: &Address,
    ) -> Result<BoxedLedgerClient, LedgerError>;
}
