//! LAW Testing Infrastructure
//!
//! Deterministic stand-ins for the remote pieces of the registry client:
//! a scriptable [`MockLedger`], a [`MockWallet`] and a [`MockConnector`],
//! plus the fixtures most tests start from.
//!
//! ```toml
//! [dev-dependencies]
//! law-testkit = { path = "../law-testkit" }
//! ```

// Fixtures and mocks panic on bad seed data or a poisoned lock; either is a
// broken test, not a condition to recover from.
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mock_ledger;
pub mod mock_wallet;

pub use fixtures::*;
pub use mock_ledger::{CallCounts, MockLedger, MockLedgerBuilder};
pub use mock_wallet::{MockConnector, MockWallet};
