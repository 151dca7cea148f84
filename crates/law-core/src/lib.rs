//! # LAW Core
//!
//! Pure domain layer for the LAW registry client. Nothing in this crate
//! performs I/O on its own; remote access is expressed through the
//! [`LedgerClient`], [`Wallet`] and [`LedgerConnector`] traits which runtime
//! crates (and the testkit) implement.
//!
//! ## Contents
//!
//! - [`types`]: usernames, addresses, arbitrary-precision amounts, user records
//!   and the ordered [`RegistrySnapshot`]
//! - [`ledger`]: the narrow remote-procedure surface of the ledger contract
//! - [`errors`]: the error taxonomy shared by every layer
//! - [`reactive`]: the observable [`Dynamic`] cell used to publish snapshots
//! - [`config`]: client configuration with file/env layering and validation

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod ledger;
pub mod reactive;
pub mod types;

pub use config::{ConfigError, RegistryConfig};
pub use errors::{ErrorCategory, InputError, LedgerError, RegistryError, WalletError};
pub use ledger::{
    BoxedLedgerClient, LedgerClient, LedgerConnector, PendingTx, SigningIdentity, TxHash, TxReceipt,
    Wallet,
};
pub use reactive::{Dynamic, Subscription};
pub use types::{
    Address, Amount, OperationKind, RegistrySnapshot, SnapshotError, UserRecord, Username,
};
