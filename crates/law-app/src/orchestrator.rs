//! Transaction Orchestrator
//!
//! Every mutating operation follows the same two-phase lifecycle:
//!
//! 1. [`TransactionOrchestrator::submit`] records the operation as
//!    `Submitted`, hands the call to the ledger and returns a
//!    [`FinalityToken`]. Requests are validated when they are built.
//! 2. [`FinalityToken::settle`] waits for finality, marks the operation
//!    `Confirmed` and triggers exactly one registry refresh.
//!
//! A failure at either phase marks the operation `Failed`, skips the refresh
//! and comes back as an [`OperationReport`]; it is never raised further.
//! Operations are independent of each other: nothing queues or orders them.

use std::fmt;
use std::sync::Arc;

use law_core::{
    Address, Amount, BoxedLedgerClient, LedgerError, OperationKind, PendingTx, RegistryError,
    TxHash, Username,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metrics::RegistryMetrics;
use crate::operations::{OperationEvent, OperationId, OperationLog, OperationStatus};
use crate::sync::RegistrySynchronizer;

/// A validated mutating request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationRequest {
    /// `registerUser(username, address, amount)`
    Register {
        /// Name to register
        username: Username,
        /// Address to bind to the name
        address: Address,
        /// Initial allocation
        amount: Amount,
    },
    /// `redeem(amount)` on behalf of the signer
    Redeem {
        /// Tokens to burn
        amount: Amount,
    },
    /// `mint(username, amount)`
    Reward {
        /// Recipient
        username: Username,
        /// Tokens to mint
        amount: Amount,
    },
}

impl OperationRequest {
    /// Validate a registration. Fails with `InvalidInput` on an empty username
    /// or address or an amount that is not a non-negative integer.
    pub fn register(username: &str, address: &str, amount: &str) -> Result<Self, RegistryError> {
        Ok(Self::Register {
            username: Username::parse(username)?,
            address: Address::parse(address)?,
            amount: Amount::parse(amount)?,
        })
    }

    /// Validate a redemption. Only the amount format is checked; the ledger
    /// decides whether the balance covers it.
    pub fn redeem(amount: &str) -> Result<Self, RegistryError> {
        Ok(Self::Redeem {
            amount: Amount::parse(amount)?,
        })
    }

    /// Validate a reward. Who may mint is up to the ledger.
    pub fn reward(username: &str, amount: &str) -> Result<Self, RegistryError> {
        Ok(Self::Reward {
            username: Username::parse(username)?,
            amount: Amount::parse(amount)?,
        })
    }

    /// Operation kind of this request.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Register { .. } => OperationKind::Register,
            Self::Redeem { .. } => OperationKind::Redeem,
            Self::Reward { .. } => OperationKind::Reward,
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register {
                username,
                address,
                amount,
            } => write!(f, "register({username}, {address}, {amount})"),
            Self::Redeem { amount } => write!(f, "redeem({amount})"),
            Self::Reward { username, amount } => write!(f, "reward({username}, {amount})"),
        }
    }
}

/// Final outcome of one operation, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    /// Invocation id in the operation log
    pub id: OperationId,
    /// Operation kind
    pub kind: OperationKind,
    /// Terminal status
    pub status: OperationStatus,
    /// Transaction hash, if the ledger accepted the submission
    pub tx_hash: Option<TxHash>,
    /// Outcome of the refresh triggered by confirmation: the published
    /// snapshot version, or why the refresh failed. `None` when no refresh ran.
    pub refresh: Option<Result<u64, RegistryError>>,
}

impl OperationReport {
    /// Whether the operation reached finality.
    pub fn is_confirmed(&self) -> bool {
        self.status == OperationStatus::Confirmed
    }

    /// Failure cause, if the operation failed.
    pub fn error(&self) -> Option<&RegistryError> {
        match &self.status {
            OperationStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Result of the submission phase.
#[derive(Debug)]
pub enum Submission {
    /// Accepted by the ledger; settle the token to observe finality
    Pending(FinalityToken),
    /// Refused at submission; the operation is already `Failed`
    Failed(OperationReport),
}

impl Submission {
    /// Settle a pending submission, or pass a failure report through.
    pub async fn settle(self) -> OperationReport {
        match self {
            Self::Pending(token) => token.settle().await,
            Self::Failed(report) => report,
        }
    }
}

/// Runs the submit / finality / refresh lifecycle.
#[derive(Clone)]
pub struct TransactionOrchestrator {
    ledger: BoxedLedgerClient,
    synchronizer: RegistrySynchronizer,
    operations: OperationLog,
    metrics: Arc<RegistryMetrics>,
    confirmations: u64,
}

impl TransactionOrchestrator {
    /// Create an orchestrator that refreshes through `synchronizer` after
    /// every confirmed operation.
    pub fn new(
        ledger: BoxedLedgerClient,
        synchronizer: RegistrySynchronizer,
        operations: OperationLog,
        metrics: Arc<RegistryMetrics>,
        confirmations: u64,
    ) -> Self {
        Self {
            ledger,
            synchronizer,
            operations,
            metrics,
            confirmations,
        }
    }

    /// Phase one: hand `request` to the ledger.
    pub async fn submit(&self, request: OperationRequest) -> Submission {
        let kind = request.kind();
        debug!(%request, "submitting operation");
        let id = self.operations.begin(request.clone());
        self.metrics.record_submitted();
        let submitted = match &request {
            OperationRequest::Register {
                username,
                address,
                amount,
            } => self.ledger.submit_register(username, address, amount).await,
            OperationRequest::Redeem { amount } => self.ledger.submit_redeem(amount).await,
            OperationRequest::Reward { username, amount } => {
                self.ledger.submit_reward(username, amount).await
            }
        };

        match submitted {
            Ok(pending) => {
                self.operations.attach_tx(id, pending.tx_hash.clone());
                info!(op = %id, %kind, tx = %pending.tx_hash, "operation submitted");
                Submission::Pending(FinalityToken {
                    id,
                    pending,
                    orchestrator: self.clone(),
                })
            }
            Err(cause) => Submission::Failed(self.fail(id, kind, None, cause)),
        }
    }

    /// Both phases in sequence.
    pub async fn execute(&self, request: OperationRequest) -> OperationReport {
        self.submit(request).await.settle().await
    }

    fn fail(
        &self,
        id: OperationId,
        kind: OperationKind,
        tx_hash: Option<TxHash>,
        cause: LedgerError,
    ) -> OperationReport {
        let error = RegistryError::operation_failed(kind, cause);
        self.operations.apply(id, OperationEvent::Failed(error.clone()));
        self.metrics.record_failed();
        warn!(op = %id, %kind, error = %error, "operation failed");
        OperationReport {
            id,
            kind,
            status: OperationStatus::Failed { error },
            tx_hash,
            refresh: None,
        }
    }
}

/// Handle for a submitted operation whose finality has not been observed.
///
/// Dropping the token stops observing the transaction. The transaction
/// itself is not cancelled and its record stays `Submitted`.
#[must_use = "an unsettled token never confirms its operation or refreshes the registry"]
pub struct FinalityToken {
    id: OperationId,
    pending: PendingTx,
    orchestrator: TransactionOrchestrator,
}

impl fmt::Debug for FinalityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalityToken")
            .field("id", &self.id)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl FinalityToken {
    /// Operation id in the log.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        self.pending.kind
    }

    /// Hash of the submitted transaction.
    pub fn tx_hash(&self) -> &TxHash {
        &self.pending.tx_hash
    }

    /// Phase two: wait for finality, then refresh.
    ///
    /// The operation stays `Confirmed` even if the refresh fails; that
    /// outcome is carried in [`OperationReport::refresh`]. If the session was
    /// replaced while waiting, no refresh is made and the report carries
    /// `SessionReplaced`.
    pub async fn settle(self) -> OperationReport {
        let Self {
            id,
            pending,
            orchestrator,
        } = self;
        let kind = pending.kind;

        let finality = orchestrator
            .ledger
            .await_finality(&pending, orchestrator.confirmations)
            .await;

        match finality {
            Ok(receipt) => {
                orchestrator.operations.apply(id, OperationEvent::Finalized);
                orchestrator.metrics.record_confirmed();
                info!(
                    op = %id,
                    %kind,
                    tx = %pending.tx_hash,
                    block = receipt.block_number,
                    "operation confirmed"
                );

                let refresh = if orchestrator.synchronizer.is_current() {
                    orchestrator.synchronizer.refresh().await
                } else {
                    debug!(op = %id, "session replaced; skipping refresh");
                    Err(RegistryError::SessionReplaced)
                };
                OperationReport {
                    id,
                    kind,
                    status: OperationStatus::Confirmed,
                    tx_hash: Some(pending.tx_hash),
                    refresh: Some(refresh),
                }
            }
            Err(cause) => orchestrator.fail(id, kind, Some(pending.tx_hash), cause),
        }
    }
}
