//! Scriptable ledger for deterministic testing
//!
//! [`MockLedger`] wraps a [`LocalLedger`] so the default behaviour is a real,
//! consistent contract. On top of it a test can:
//! - inject failures per call (by address, username or operation kind)
//! - delay individual calls with `tokio::time::sleep` to force completion order
//! - override raw read responses to simulate malformed or inconsistent data
//! - count every call and inspect the order in which calls completed
//!
//! Clones share state, so a test keeps one handle while the code under test
//! holds another.
//!
//! # Blocking Lock Usage
//!
//! Uses `std::sync::Mutex`; the lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use law_app::{LocalLedger, OperationRequest};
use law_core::{
    Address, Amount, BoxedLedgerClient, LedgerClient, LedgerError, OperationKind, PendingTx,
    TxReceipt, Username,
};

/// Number of calls issued per ledger method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `enumerate_addresses`
    pub enumerate_addresses: usize,
    /// `username_of`
    pub username_of: usize,
    /// `balance_of`
    pub balance_of: usize,
    /// `submit_register`
    pub submit_register: usize,
    /// `submit_redeem`
    pub submit_redeem: usize,
    /// `submit_reward`
    pub submit_reward: usize,
    /// `await_finality`
    pub await_finality: usize,
}

impl CallCounts {
    /// Read calls of any kind.
    pub fn reads(&self) -> usize {
        self.enumerate_addresses + self.username_of + self.balance_of
    }

    /// Submissions of any kind.
    pub fn submissions(&self) -> usize {
        self.submit_register + self.submit_redeem + self.submit_reward
    }

    /// Every remote call.
    pub fn total(&self) -> usize {
        self.reads() + self.submissions() + self.await_finality
    }
}

#[derive(Debug, Default)]
struct Faults {
    enumerate: Option<LedgerError>,
    username_of: HashMap<String, LedgerError>,
    balance_of: HashMap<String, LedgerError>,
    submit: HashMap<OperationKind, LedgerError>,
    finality: HashMap<OperationKind, LedgerError>,
}

#[derive(Debug, Default)]
struct Delays {
    username_of: HashMap<String, Duration>,
    balance_of: HashMap<String, Duration>,
    finality: HashMap<OperationKind, Duration>,
}

#[derive(Debug, Default)]
struct Overrides {
    addresses: Option<Vec<String>>,
    usernames: HashMap<String, String>,
    balances: HashMap<String, String>,
}

#[derive(Debug)]
struct MockState {
    signer: Address,
    faults: Faults,
    delays: Delays,
    overrides: Overrides,
    calls: CallCounts,
    completions: Vec<String>,
}

/// Ledger client with fault injection, latency and call accounting.
#[derive(Debug, Clone)]
pub struct MockLedger {
    ledger: LocalLedger,
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    /// Wrap `ledger`, signing as `signer`.
    pub fn new(ledger: LocalLedger, signer: Address) -> Self {
        Self {
            ledger,
            state: Arc::new(Mutex::new(MockState {
                signer,
                faults: Faults::default(),
                delays: Delays::default(),
                overrides: Overrides::default(),
                calls: CallCounts::default(),
                completions: Vec::new(),
            })),
        }
    }

    /// Start building a seeded mock.
    pub fn builder() -> MockLedgerBuilder {
        MockLedgerBuilder::default()
    }

    /// Underlying contract simulation.
    pub fn local(&self) -> &LocalLedger {
        &self.ledger
    }

    /// This mock as a shared client.
    pub fn client(&self) -> BoxedLedgerClient {
        Arc::new(self.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn complete(&self, call: String) {
        self.with_state(|s| s.completions.push(call));
    }

    // ─── Identity ───────────────────────────────────────────────────────

    /// Change the address submissions are signed with.
    pub fn set_signer(&self, signer: Address) {
        self.with_state(|s| s.signer = signer);
    }

    /// Address submissions are signed with.
    pub fn signer(&self) -> Address {
        self.with_state(|s| s.signer.clone())
    }

    // ─── Faults ─────────────────────────────────────────────────────────

    /// Fail `enumerate_addresses`.
    pub fn fail_enumerate(&self, error: LedgerError) {
        self.with_state(|s| s.faults.enumerate = Some(error));
    }

    /// Fail `username_of(address)`.
    pub fn fail_username_of(&self, address: &str, error: LedgerError) {
        self.with_state(|s| s.faults.username_of.insert(address.to_string(), error));
    }

    /// Fail `balance_of(username)`.
    pub fn fail_balance_of(&self, username: &str, error: LedgerError) {
        self.with_state(|s| s.faults.balance_of.insert(username.to_string(), error));
    }

    /// Refuse submissions of `kind`.
    pub fn fail_submit(&self, kind: OperationKind, error: LedgerError) {
        self.with_state(|s| s.faults.submit.insert(kind, error));
    }

    /// Fail the finality wait for `kind`. The transaction is never applied.
    pub fn fail_finality(&self, kind: OperationKind, error: LedgerError) {
        self.with_state(|s| s.faults.finality.insert(kind, error));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.with_state(|s| s.faults = Faults::default());
    }

    // ─── Latency ────────────────────────────────────────────────────────

    /// Delay `username_of(address)`.
    pub fn delay_username_of(&self, address: &str, delay: Duration) {
        self.with_state(|s| s.delays.username_of.insert(address.to_string(), delay));
    }

    /// Delay `balance_of(username)`.
    pub fn delay_balance_of(&self, username: &str, delay: Duration) {
        self.with_state(|s| s.delays.balance_of.insert(username.to_string(), delay));
    }

    /// Delay the finality wait for `kind`.
    pub fn delay_finality(&self, kind: OperationKind, delay: Duration) {
        self.with_state(|s| s.delays.finality.insert(kind, delay));
    }

    // ─── Raw responses ──────────────────────────────────────────────────

    /// Answer `enumerate_addresses` with `addresses` verbatim.
    pub fn override_addresses(&self, addresses: &[&str]) {
        let addresses = addresses.iter().map(ToString::to_string).collect();
        self.with_state(|s| s.overrides.addresses = Some(addresses));
    }

    /// Answer `username_of(address)` with `username` verbatim.
    pub fn override_username(&self, address: &str, username: &str) {
        self.with_state(|s| {
            s.overrides
                .usernames
                .insert(address.to_string(), username.to_string())
        });
    }

    /// Answer `balance_of(username)` with `balance` verbatim.
    pub fn override_balance(&self, username: &str, balance: &str) {
        self.with_state(|s| {
            s.overrides
                .balances
                .insert(username.to_string(), balance.to_string())
        });
    }

    // ─── Accounting ─────────────────────────────────────────────────────

    /// Calls issued so far.
    pub fn calls(&self) -> CallCounts {
        self.with_state(|s| s.calls)
    }

    /// Reset call counters and the completion log.
    pub fn reset_calls(&self) {
        self.with_state(|s| {
            s.calls = CallCounts::default();
            s.completions.clear();
        });
    }

    /// Calls in the order they completed, as `method:key`.
    pub fn completions(&self) -> Vec<String> {
        self.with_state(|s| s.completions.clone())
    }

    async fn submit(&self, request: OperationRequest) -> Result<PendingTx, LedgerError> {
        let kind = request.kind();
        let (fault, signer) = self.with_state(|s| {
            match kind {
                OperationKind::Register => s.calls.submit_register += 1,
                OperationKind::Redeem => s.calls.submit_redeem += 1,
                OperationKind::Reward => s.calls.submit_reward += 1,
            }
            (s.faults.submit.get(&kind).cloned(), s.signer.clone())
        });
        let result = match fault {
            Some(error) => Err(error),
            None => Ok(self.ledger.submit(&signer, request)),
        };
        self.complete(format!("submit:{kind}"));
        result
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn enumerate_addresses(&self) -> Result<Vec<String>, LedgerError> {
        let (fault, addresses) = self.with_state(|s| {
            s.calls.enumerate_addresses += 1;
            (s.faults.enumerate.clone(), s.overrides.addresses.clone())
        });
        let result = match (fault, addresses) {
            (Some(error), _) => Err(error),
            (None, Some(addresses)) => Ok(addresses),
            (None, None) => Ok(self.ledger.addresses()),
        };
        self.complete("enumerate_addresses".to_string());
        result
    }

    async fn username_of(&self, address: &str) -> Result<String, LedgerError> {
        let (delay, fault, username) = self.with_state(|s| {
            s.calls.username_of += 1;
            (
                s.delays.username_of.get(address).copied(),
                s.faults.username_of.get(address).cloned(),
                s.overrides.usernames.get(address).cloned(),
            )
        });
        pause(delay).await;
        let result = match (fault, username) {
            (Some(error), _) => Err(error),
            (None, Some(username)) => Ok(username),
            (None, None) => self.ledger.username_of(address),
        };
        self.complete(format!("username_of:{address}"));
        result
    }

    async fn balance_of(&self, username: &str) -> Result<String, LedgerError> {
        let (delay, fault, balance) = self.with_state(|s| {
            s.calls.balance_of += 1;
            (
                s.delays.balance_of.get(username).copied(),
                s.faults.balance_of.get(username).cloned(),
                s.overrides.balances.get(username).cloned(),
            )
        });
        pause(delay).await;
        let result = match (fault, balance) {
            (Some(error), _) => Err(error),
            (None, Some(balance)) => Ok(balance),
            (None, None) => self.ledger.balance_of(username),
        };
        self.complete(format!("balance_of:{username}"));
        result
    }

    async fn submit_register(
        &self,
        username: &Username,
        address: &Address,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError> {
        self.submit(OperationRequest::Register {
            username: username.clone(),
            address: address.clone(),
            amount: amount.clone(),
        })
        .await
    }

    async fn submit_redeem(&self, amount: &Amount) -> Result<PendingTx, LedgerError> {
        self.submit(OperationRequest::Redeem {
            amount: amount.clone(),
        })
        .await
    }

    async fn submit_reward(
        &self,
        username: &Username,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError> {
        self.submit(OperationRequest::Reward {
            username: username.clone(),
            amount: amount.clone(),
        })
        .await
    }

    async fn await_finality(
        &self,
        tx: &PendingTx,
        _confirmations: u64,
    ) -> Result<TxReceipt, LedgerError> {
        let (delay, fault) = self.with_state(|s| {
            s.calls.await_finality += 1;
            (
                s.delays.finality.get(&tx.kind).copied(),
                s.faults.finality.get(&tx.kind).cloned(),
            )
        });
        pause(delay).await;
        let result = match fault {
            Some(error) => Err(error),
            None => self.ledger.finalize(tx),
        };
        self.complete(format!("await_finality:{}", tx.kind));
        result
    }
}

/// Builder for a seeded [`MockLedger`].
#[derive(Debug, Clone)]
pub struct MockLedgerBuilder {
    contract: String,
    owner: String,
    signer: String,
    users: Vec<(String, String, String)>,
}

impl Default for MockLedgerBuilder {
    fn default() -> Self {
        Self {
            contract: crate::fixtures::CONTRACT.to_string(),
            owner: crate::fixtures::OWNER.to_string(),
            signer: crate::fixtures::OWNER.to_string(),
            users: Vec::new(),
        }
    }
}

impl MockLedgerBuilder {
    /// Contract address the ledger is deployed at.
    #[must_use]
    pub fn contract(mut self, contract: &str) -> Self {
        self.contract = contract.to_string();
        self
    }

    /// Address allowed to mint.
    #[must_use]
    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    /// Initial signer.
    #[must_use]
    pub fn signer(mut self, signer: &str) -> Self {
        self.signer = signer.to_string();
        self
    }

    /// Register a user before the test starts.
    #[must_use]
    pub fn user(mut self, username: &str, address: &str, balance: &str) -> Self {
        self.users
            .push((username.to_string(), address.to_string(), balance.to_string()));
        self
    }

    /// Build the mock. Panics on invalid seed data.
    pub fn build(self) -> MockLedger {
        let ledger = LocalLedger::new(
            Address::parse(&self.contract).unwrap(),
            Address::parse(&self.owner).unwrap(),
        );
        for (username, address, balance) in &self.users {
            ledger.seed(username, address, balance).unwrap();
        }
        MockLedger::new(ledger, Address::parse(&self.signer).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_and_overrides() {
        let mock = MockLedger::builder().user("alice", "0xA", "100").build();
        mock.override_balance("alice", "not-a-number");

        assert_eq!(mock.enumerate_addresses().await.unwrap(), vec!["0xA".to_string()]);
        assert_eq!(mock.balance_of("alice").await.unwrap(), "not-a-number");
        assert_eq!(mock.calls().reads(), 2);
        assert_eq!(mock.completions(), vec!["enumerate_addresses", "balance_of:alice"]);
    }

    #[tokio::test]
    async fn test_finality_fault_does_not_apply() {
        let mock = MockLedger::builder()
            .user("alice", "0xA", "100")
            .signer("0xA")
            .build();
        mock.fail_finality(OperationKind::Redeem, LedgerError::transport("timeout"));

        let tx = mock.submit_redeem(&Amount::from(10)).await.unwrap();
        assert!(mock.await_finality(&tx, 1).await.is_err());
        assert_eq!(mock.local().balance_of("alice").unwrap(), "100");
        assert_eq!(mock.calls().total(), 2);
    }
}
