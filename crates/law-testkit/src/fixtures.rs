//! Common fixtures
//!
//! The standard registry used across tests: `alice` at `0xA` with 100 and
//! `bob` at `0xB` with 50, minted by [`OWNER`].

use law_app::AppCore;
use law_core::{Address, RegistryConfig};

use crate::mock_ledger::MockLedger;
use crate::mock_wallet::{MockConnector, MockWallet};

/// Contract address used by fixtures.
pub const CONTRACT: &str = "0xC0FFEE";

/// Minter address used by fixtures.
pub const OWNER: &str = "0x0WNER";

/// Parse an address literal.
pub fn addr(raw: &str) -> Address {
    Address::parse(raw).unwrap()
}

/// Config bound to [`CONTRACT`] that does not refresh on connect.
pub fn test_config() -> RegistryConfig {
    RegistryConfig {
        contract_address: CONTRACT.to_string(),
        refresh_on_connect: false,
        ..RegistryConfig::default()
    }
}

/// The alice/bob registry.
pub fn alice_and_bob() -> MockLedger {
    MockLedger::builder()
        .user("alice", "0xA", "100")
        .user("bob", "0xB", "50")
        .build()
}

/// A core connected to `ledger` as `signer`, with call counters reset.
pub async fn connected_core(ledger: &MockLedger, signer: &str) -> AppCore {
    let core = AppCore::new(test_config()).unwrap();
    core.connect(
        &MockWallet::with_identity(signer),
        &MockConnector::new(ledger.clone()),
    )
    .await
    .unwrap();
    ledger.reset_calls();
    core
}
