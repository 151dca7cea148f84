//! Error taxonomy for the registry client
//!
//! Three layers of errors exist:
//! - [`LedgerError`]: failures at the remote boundary (transport, revert, decode)
//! - [`WalletError`]: the signing identity could not be obtained
//! - [`RegistryError`]: what the component reports to its callers
//!
//! Every error is `Clone + PartialEq` so it can be stored inside published
//! operation records and compared in tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::OperationKind;

/// High-level error categories for frontend error handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// User input validation errors (correctable by user)
    Input,
    /// Configuration errors (correctable by modifying settings)
    Config,
    /// Authorization errors (identity missing or rejected)
    Capability,
    /// Remote ledger unreachable or returned garbage
    Network,
    /// A mutating operation was refused or failed on the ledger
    Operation,
}

impl ErrorCategory {
    /// Whether the user can fix the problem without outside help.
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Input | Self::Config | Self::Capability)
    }

    /// Short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Config => "Config",
            Self::Capability => "Permission",
            Self::Network => "Network",
            Self::Operation => "Operation",
        }
    }

    /// Hint shown next to the error message.
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Input => "Check your input and try again",
            Self::Config => "Review your configuration settings",
            Self::Capability => "Connect a wallet and approve the request",
            Self::Network => "Check the ledger connection and refresh",
            Self::Operation => "The ledger refused the operation; review it and resubmit",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Failure reported by the remote ledger or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    /// The request never produced a response
    #[error("transport error: {message}")]
    Transport {
        /// Transport failure description
        message: String,
    },

    /// The contract reverted the call
    #[error("reverted: {reason}")]
    Reverted {
        /// Revert reason as reported by the ledger
        reason: String,
    },

    /// The node refused to accept a submission
    #[error("submission rejected: {message}")]
    Rejected {
        /// Rejection description
        message: String,
    },

    /// A read returned a value that does not decode to the expected type
    #[error("malformed ledger response: {message}")]
    Decode {
        /// What failed to decode
        message: String,
    },

    /// Finality was requested for a transaction the ledger does not know
    #[error("unknown transaction {tx_hash}")]
    UnknownTransaction {
        /// Hash of the unknown transaction
        tx_hash: String,
    },
}

impl LedgerError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a revert error
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Create a submission rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Failure to obtain a signing identity from the wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// No wallet or account is available
    #[error("no signing identity available")]
    NoIdentity,

    /// The user declined the authorization request
    #[error("authorization rejected: {message}")]
    Rejected {
        /// Reason given by the wallet
        message: String,
    },
}

/// Local validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct InputError {
    /// Name of the offending field
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

impl InputError {
    /// Create an input error for `field`
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the registry component to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No session has been established yet
    #[error("not connected to the ledger")]
    NotConnected,

    /// The session could not be established
    #[error("connect failed: {reason}")]
    ConnectFailed {
        /// Why the connection failed
        reason: String,
    },

    /// Local validation rejected the request before any remote call
    #[error("invalid input for {field}: {message}")]
    InvalidInput {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// The session was replaced before the result could be published
    #[error("session replaced; result no longer observed")]
    SessionReplaced,

    /// A remote read in the refresh chain failed
    #[error("registry sync failed: {cause}")]
    SyncFailed {
        /// Underlying ledger failure
        cause: LedgerError,
    },

    /// Submission or finality wait failed for a mutating call
    #[error("{kind} failed: {cause}")]
    OperationFailed {
        /// Which operation failed
        kind: OperationKind,
        /// Underlying ledger failure
        cause: LedgerError,
    },
}

impl RegistryError {
    /// Create a connect failure
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            reason: reason.into(),
        }
    }

    /// Create a sync failure
    pub fn sync_failed(cause: LedgerError) -> Self {
        Self::SyncFailed { cause }
    }

    /// Create an operation failure
    pub fn operation_failed(kind: OperationKind, cause: LedgerError) -> Self {
        Self::OperationFailed { kind, cause }
    }

    /// Category used by frontends for display treatment.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConnected | Self::ConnectFailed { .. } | Self::SessionReplaced => {
                ErrorCategory::Capability
            }
            Self::InvalidInput { .. } => ErrorCategory::Input,
            Self::SyncFailed { .. } => ErrorCategory::Network,
            Self::OperationFailed { .. } => ErrorCategory::Operation,
        }
    }
}

impl From<InputError> for RegistryError {
    fn from(err: InputError) -> Self {
        Self::InvalidInput {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<WalletError> for RegistryError {
    fn from(err: WalletError) -> Self {
        Self::connect_failed(err.to_string())
    }
}
