//! In-process registry contract
//!
//! [`LocalLedger`] simulates the registry contract for offline use, demos and
//! tests. It has the same observable behaviour a client relies on:
//!
//! - `registerUser(username, address, amount)` rejects a taken username or
//!   address and credits the initial amount
//! - `redeem(amount)` burns tokens held by the signer, who must be registered
//!   and hold at least `amount`
//! - `mint(username, amount)` may only be called by the owner, for a user that
//!   exists
//!
//! Submissions are queued and take effect when their finality is awaited, one
//! block per transaction. A reverted call changes nothing.
//!
//! Both queues are bounded. Past [`MAX_PENDING_TRANSACTIONS`] the oldest
//! queued call is mined even though nobody awaited it, as a real chain would.
//! Past [`MAX_SETTLED_TRANSACTIONS`] the oldest remembered outcome is
//! forgotten and its hash becomes unknown.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use law_core::{
    Address, Amount, BoxedLedgerClient, LedgerClient, LedgerConnector, LedgerError, PendingTx,
    SigningIdentity, TxHash, TxReceipt, Username, Wallet, WalletError,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::orchestrator::OperationRequest;

/// Queued calls kept before the oldest is mined unobserved.
pub const MAX_PENDING_TRANSACTIONS: usize = 1024;

/// Settled outcomes remembered for repeated finality queries.
pub const MAX_SETTLED_TRANSACTIONS: usize = 1024;

#[derive(Debug, Clone)]
struct Account {
    username: Username,
    address: Address,
    balance: Amount,
}

#[derive(Debug)]
struct QueuedCall {
    signer: Address,
    request: OperationRequest,
}

#[derive(Debug)]
struct LedgerState {
    contract: Address,
    owner: Address,
    /// Registration order
    accounts: Vec<Account>,
    /// Submission order
    pending: IndexMap<TxHash, QueuedCall>,
    /// Settlement order
    settled: IndexMap<TxHash, Result<TxReceipt, LedgerError>>,
    next_tx: u64,
    block_number: u64,
}

impl LedgerState {
    fn mine(&mut self, tx_hash: TxHash, call: QueuedCall) -> Result<TxReceipt, LedgerError> {
        self.block_number += 1;
        let block_number = self.block_number;
        let outcome = self.apply(call).map(|()| TxReceipt {
            tx_hash: tx_hash.clone(),
            block_number,
        });
        self.settled.insert(tx_hash, outcome.clone());
        while self.settled.len() > MAX_SETTLED_TRANSACTIONS {
            self.settled.shift_remove_index(0);
        }
        outcome
    }

    fn account_by_address(&self, address: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address.as_str() == address)
    }

    fn account_by_username(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username.as_str() == username)
    }

    fn apply(&mut self, call: QueuedCall) -> Result<(), LedgerError> {
        match call.request {
            OperationRequest::Register {
                username,
                address,
                amount,
            } => self.register(username, address, amount),
            OperationRequest::Redeem { amount } => {
                let account = self
                    .accounts
                    .iter_mut()
                    .find(|a| a.address == call.signer)
                    .ok_or_else(|| LedgerError::reverted("caller is not registered"))?;
                account.balance = account
                    .balance
                    .checked_sub(&amount)
                    .ok_or_else(|| LedgerError::reverted("insufficient balance"))?;
                Ok(())
            }
            OperationRequest::Reward { username, amount } => {
                if call.signer != self.owner {
                    return Err(LedgerError::reverted("caller is not the owner"));
                }
                let account = self
                    .accounts
                    .iter_mut()
                    .find(|a| a.username == username)
                    .ok_or_else(|| LedgerError::reverted(format!("unknown user {username}")))?;
                account.balance = account.balance.add(&amount);
                Ok(())
            }
        }
    }

    fn register(
        &mut self,
        username: Username,
        address: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if self.account_by_username(username.as_str()).is_some() {
            return Err(LedgerError::reverted(format!("username {username} already registered")));
        }
        if self.account_by_address(address.as_str()).is_some() {
            return Err(LedgerError::reverted(format!("address {address} already registered")));
        }
        self.accounts.push(Account {
            username,
            address,
            balance: amount,
        });
        Ok(())
    }
}

/// Shared handle to one simulated contract.
#[derive(Debug, Clone)]
pub struct LocalLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl LocalLedger {
    /// Deploy an empty contract at `contract`, mintable by `owner`.
    pub fn new(contract: Address, owner: Address) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                contract,
                owner,
                accounts: Vec::new(),
                pending: IndexMap::new(),
                settled: IndexMap::new(),
                next_tx: 1,
                block_number: 0,
            })),
        }
    }

    /// Contract address.
    pub fn contract(&self) -> Address {
        self.state.lock().contract.clone()
    }

    /// Address allowed to mint.
    pub fn owner(&self) -> Address {
        self.state.lock().owner.clone()
    }

    /// Register a user immediately, bypassing the transaction queue.
    pub fn seed(&self, username: &str, address: &str, balance: &str) -> Result<(), LedgerError> {
        let invalid = |e: law_core::InputError| LedgerError::rejected(e.to_string());
        let username = Username::parse(username).map_err(invalid)?;
        let address = Address::parse(address).map_err(invalid)?;
        let balance = Amount::parse(balance).map_err(invalid)?;
        self.state.lock().register(username, address, balance)
    }

    /// Registered addresses in registration order.
    pub fn addresses(&self) -> Vec<String> {
        self.state
            .lock()
            .accounts
            .iter()
            .map(|a| a.address.as_str().to_string())
            .collect()
    }

    /// `getUsernameByAddress`
    pub fn username_of(&self, address: &str) -> Result<String, LedgerError> {
        self.state
            .lock()
            .account_by_address(address)
            .map(|a| a.username.as_str().to_string())
            .ok_or_else(|| LedgerError::reverted(format!("address {address} is not registered")))
    }

    /// `balanceOfUser`
    pub fn balance_of(&self, username: &str) -> Result<String, LedgerError> {
        self.state
            .lock()
            .account_by_username(username)
            .map(|a| a.balance.as_str().to_string())
            .ok_or_else(|| LedgerError::reverted(format!("unknown user {username}")))
    }

    /// Queue `request` signed by `signer`.
    pub fn submit(&self, signer: &Address, request: OperationRequest) -> PendingTx {
        let mut state = self.state.lock();
        let tx_hash = TxHash::new(format!("0x{:064x}", state.next_tx));
        state.next_tx += 1;
        let kind = request.kind();
        state.pending.insert(
            tx_hash.clone(),
            QueuedCall {
                signer: signer.clone(),
                request,
            },
        );
        debug!(tx = %tx_hash, %kind, "queued local transaction");
        while state.pending.len() > MAX_PENDING_TRANSACTIONS {
            let Some((oldest, call)) = state.pending.shift_remove_index(0) else {
                break;
            };
            debug!(tx = %oldest, "mining unobserved transaction");
            // The outcome stays queryable through the settled cache.
            let _ = state.mine(oldest, call);
        }
        PendingTx { tx_hash, kind }
    }

    /// Mine a queued transaction, or return the outcome it already had.
    pub fn finalize(&self, tx: &PendingTx) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock();
        if let Some(outcome) = state.settled.get(&tx.tx_hash) {
            return outcome.clone();
        }
        let call = state
            .pending
            .shift_remove(&tx.tx_hash)
            .ok_or_else(|| LedgerError::UnknownTransaction {
                tx_hash: tx.tx_hash.to_string(),
            })?;
        state.mine(tx.tx_hash.clone(), call)
    }

    /// Submitted calls not yet mined.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Outcomes remembered for repeated finality queries.
    pub fn settled_count(&self) -> usize {
        self.state.lock().settled.len()
    }

    /// Client acting as `signer`.
    pub fn client(&self, signer: Address) -> LocalLedgerClient {
        LocalLedgerClient {
            ledger: self.clone(),
            signer,
        }
    }
}

/// [`LedgerClient`] over a [`LocalLedger`] for one signer.
#[derive(Debug, Clone)]
pub struct LocalLedgerClient {
    ledger: LocalLedger,
    signer: Address,
}

#[async_trait]
impl LedgerClient for LocalLedgerClient {
    async fn enumerate_addresses(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.ledger.addresses())
    }

    async fn username_of(&self, address: &str) -> Result<String, LedgerError> {
        self.ledger.username_of(address)
    }

    async fn balance_of(&self, username: &str) -> Result<String, LedgerError> {
        self.ledger.balance_of(username)
    }

    async fn submit_register(
        &self,
        username: &Username,
        address: &Address,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError> {
        Ok(self.ledger.submit(
            &self.signer,
            OperationRequest::Register {
                username: username.clone(),
                address: address.clone(),
                amount: amount.clone(),
            },
        ))
    }

    async fn submit_redeem(&self, amount: &Amount) -> Result<PendingTx, LedgerError> {
        Ok(self.ledger.submit(
            &self.signer,
            OperationRequest::Redeem {
                amount: amount.clone(),
            },
        ))
    }

    async fn submit_reward(
        &self,
        username: &Username,
        amount: &Amount,
    ) -> Result<PendingTx, LedgerError> {
        Ok(self.ledger.submit(
            &self.signer,
            OperationRequest::Reward {
                username: username.clone(),
                amount: amount.clone(),
            },
        ))
    }

    async fn await_finality(
        &self,
        tx: &PendingTx,
        _confirmations: u64,
    ) -> Result<TxReceipt, LedgerError> {
        // A single local node finalizes on inclusion.
        self.ledger.finalize(tx)
    }
}

/// Connects signing identities to a [`LocalLedger`].
#[derive(Debug, Clone)]
pub struct LocalConnector {
    ledger: LocalLedger,
}

impl LocalConnector {
    /// Connector for `ledger`.
    pub fn new(ledger: LocalLedger) -> Self {
        Self { ledger }
    }
}

impl LedgerConnector for LocalConnector {
    fn connect(
        &self,
        identity: &SigningIdentity,
        contract: &Address,
    ) -> Result<BoxedLedgerClient, LedgerError> {
        if *contract != self.ledger.contract() {
            return Err(LedgerError::transport(format!("no contract deployed at {contract}")));
        }
        Ok(Arc::new(self.ledger.client(identity.address.clone())))
    }
}

/// Wallet that always answers with the same identity, or with none.
#[derive(Debug, Clone)]
pub struct StaticWallet {
    identity: Option<SigningIdentity>,
}

impl StaticWallet {
    /// Wallet holding `identity`.
    pub fn new(identity: SigningIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Wallet without any account.
    pub fn empty() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl Wallet for StaticWallet {
    async fn request_identity(&self) -> Result<SigningIdentity, WalletError> {
        self.identity.clone().ok_or(WalletError::NoIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn ledger() -> LocalLedger {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        ledger.seed("alice", "0xA", "100").unwrap();
        ledger
    }

    fn redeem(n: u64) -> OperationRequest {
        OperationRequest::Redeem {
            amount: Amount::from(n),
        }
    }

    #[test]
    fn test_seed_rejects_taken_name_and_address() {
        let ledger = ledger();
        assert_matches!(ledger.seed("alice", "0xB", "1"), Err(LedgerError::Reverted { .. }));
        assert_matches!(ledger.seed("bob", "0xA", "1"), Err(LedgerError::Reverted { .. }));
        assert_eq!(ledger.addresses(), vec!["0xA".to_string()]);
    }

    #[test]
    fn test_state_changes_only_at_finality() {
        let ledger = ledger();
        let tx = ledger.submit(&addr("0xA"), redeem(30));
        assert_eq!(ledger.balance_of("alice").unwrap(), "100");

        let receipt = ledger.finalize(&tx).unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(ledger.balance_of("alice").unwrap(), "70");

        // Finalizing again returns the same receipt without re-applying.
        assert_eq!(ledger.finalize(&tx).unwrap(), receipt);
        assert_eq!(ledger.balance_of("alice").unwrap(), "70");
    }

    #[test]
    fn test_redeem_rules() {
        let ledger = ledger();
        let overdraw = ledger.submit(&addr("0xA"), redeem(101));
        assert_eq!(ledger.finalize(&overdraw), Err(LedgerError::reverted("insufficient balance")));

        let stranger = ledger.submit(&addr("0xZ"), redeem(1));
        assert_eq!(
            ledger.finalize(&stranger),
            Err(LedgerError::reverted("caller is not registered"))
        );
        assert_eq!(ledger.balance_of("alice").unwrap(), "100");
    }

    #[test]
    fn test_only_owner_mints() {
        let ledger = ledger();
        let reward = |signer: &str| {
            ledger.submit(
                &addr(signer),
                OperationRequest::Reward {
                    username: Username::parse("alice").unwrap(),
                    amount: Amount::from(5),
                },
            )
        };
        let by_alice = reward("0xA");
        assert_eq!(
            ledger.finalize(&by_alice),
            Err(LedgerError::reverted("caller is not the owner"))
        );
        let by_owner = reward("0xOWNER");
        assert!(ledger.finalize(&by_owner).is_ok());
        assert_eq!(ledger.balance_of("alice").unwrap(), "105");
    }

    #[test]
    fn test_unknown_transaction() {
        let ledger = ledger();
        let foreign = PendingTx {
            tx_hash: TxHash::new("0xdead"),
            kind: law_core::OperationKind::Redeem,
        };
        assert_matches!(ledger.finalize(&foreign), Err(LedgerError::UnknownTransaction { .. }));
    }

    #[test]
    fn test_unobserved_transactions_are_mined_when_queue_is_full() {
        let ledger = ledger();
        let first = ledger.submit(&addr("0xA"), redeem(1));
        for _ in 0..MAX_PENDING_TRANSACTIONS {
            ledger.submit(&addr("0xA"), redeem(0));
        }
        assert_eq!(ledger.pending_count(), MAX_PENDING_TRANSACTIONS);
        assert_eq!(ledger.balance_of("alice").unwrap(), "99");
        assert_eq!(ledger.finalize(&first).unwrap().block_number, 1);
    }

    #[test]
    fn test_settled_cache_is_bounded() {
        let ledger = ledger();
        let first = ledger.submit(&addr("0xA"), redeem(0));
        ledger.finalize(&first).unwrap();
        for _ in 0..MAX_SETTLED_TRANSACTIONS {
            let tx = ledger.submit(&addr("0xA"), redeem(0));
            ledger.finalize(&tx).unwrap();
        }
        assert_eq!(ledger.settled_count(), MAX_SETTLED_TRANSACTIONS);
        assert_matches!(ledger.finalize(&first), Err(LedgerError::UnknownTransaction { .. }));
    }

    #[test]
    fn test_reads_for_unknown_keys_revert() {
        let ledger = ledger();
        assert_matches!(ledger.username_of("0xB"), Err(LedgerError::Reverted { .. }));
        assert_matches!(ledger.balance_of("bob"), Err(LedgerError::Reverted { .. }));
    }

    #[tokio::test]
    async fn test_static_wallet() {
        let wallet = StaticWallet::new(SigningIdentity::new(addr("0xA")));
        assert_eq!(wallet.request_identity().await.unwrap().address, addr("0xA"));
        assert_eq!(StaticWallet::empty().request_identity().await, Err(WalletError::NoIdentity));
    }
}
