//! AppCore - the registry component as one explicit context object
//!
//! `AppCore` owns everything a view needs: the published snapshot, the
//! operation log, the selection and the metrics. Once connected it also holds
//! the [`Session`] together with the synchronizer and orchestrator built from
//! it. There is no ambient state; frontends hold an `AppCore` (typically in an
//! `Arc`) and call its methods from as many tasks as they like.
//!
//! `NotConnected` and `InvalidInput` are both detected before any remote call
//! is made. The services lock is only held long enough to clone the handles.
//!
//! Each connect starts a new session generation. Operations still waiting on
//! finality from an earlier session settle normally but never publish into
//! the snapshot the new session owns.

use std::sync::Arc;

use law_core::{
    Address, ConfigError, Dynamic, LedgerConnector, RegistryConfig, RegistryError,
    RegistrySnapshot, SigningIdentity, Subscription, UserRecord, Wallet,
};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::metrics::{MetricsSnapshot, RegistryMetrics};
use crate::operations::OperationLog;
use crate::orchestrator::{OperationReport, OperationRequest, Submission, TransactionOrchestrator};
use crate::selection::Selection;
use crate::session::{Session, SessionEpoch, SessionGeneration};
use crate::sync::RegistrySynchronizer;

/// Handles that exist only while a session is established.
#[derive(Clone)]
struct Services {
    session: Session,
    synchronizer: RegistrySynchronizer,
    orchestrator: TransactionOrchestrator,
}

/// Outcome of [`AppCore::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    /// Identity the session signs with
    pub identity: SigningIdentity,
    /// Result of the initial refresh, when `refresh_on_connect` is set
    pub refresh: Option<Result<u64, RegistryError>>,
}

/// Registry synchronization and transaction lifecycle, in one context.
pub struct AppCore {
    config: RegistryConfig,
    contract: Address,
    snapshot: Dynamic<Arc<RegistrySnapshot>>,
    operations: OperationLog,
    metrics: Arc<RegistryMetrics>,
    selection: Selection,
    epoch: SessionEpoch,
    services: RwLock<Option<Services>>,
}

impl std::fmt::Debug for AppCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCore")
            .field("contract", &self.contract)
            .field("connected", &self.is_connected())
            .field("snapshot_version", &self.snapshot.version())
            .finish_non_exhaustive()
    }
}

impl AppCore {
    /// Create a disconnected core with an empty snapshot.
    pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let contract = Address::parse(&config.contract_address)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        let snapshot = Dynamic::new(Arc::new(RegistrySnapshot::empty()));
        Ok(Self {
            selection: Selection::new(snapshot.clone()),
            config,
            contract,
            snapshot,
            operations: OperationLog::new(),
            metrics: Arc::new(RegistryMetrics::new()),
            epoch: SessionEpoch::new(),
            services: RwLock::new(None),
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Connect to the configured contract.
    ///
    /// **What it does**: obtains a signing identity, binds a ledger client and
    /// stores the session, replacing any previous one
    /// **Returns**: the identity and, if `refresh_on_connect` is set, the
    /// outcome of the initial refresh. A failed initial refresh does not undo
    /// the connection.
    pub async fn connect(
        &self,
        wallet: &dyn Wallet,
        connector: &dyn LedgerConnector,
    ) -> Result<ConnectReport, RegistryError> {
        let session = Session::connect(wallet, connector, &self.contract).await?;
        let identity = session.identity().clone();
        let (synchronizer, replaced) = {
            let mut slot = self.services.write();
            let services = self.build_services(session, self.epoch.advance());
            let synchronizer = services.synchronizer.clone();
            (synchronizer, slot.replace(services).is_some())
        };
        if replaced {
            info!(signer = %identity.address, "previous session replaced");
        }

        let refresh = if self.config.refresh_on_connect {
            Some(synchronizer.refresh().await)
        } else {
            None
        };
        Ok(ConnectReport { identity, refresh })
    }

    /// Whether a session exists.
    pub fn is_connected(&self) -> bool {
        self.services.read().is_some()
    }

    /// Identity of the current session.
    pub fn identity(&self) -> Option<SigningIdentity> {
        self.services
            .read()
            .as_ref()
            .map(|s| s.session.identity().clone())
    }

    fn build_services(&self, session: Session, generation: SessionGeneration) -> Services {
        let ledger = session.ledger();
        let synchronizer = RegistrySynchronizer::new(
            ledger.clone(),
            self.snapshot.clone(),
            self.metrics.clone(),
            self.config.lookup_concurrency,
        )
        .bound_to(generation);
        let orchestrator = TransactionOrchestrator::new(
            ledger,
            synchronizer.clone(),
            self.operations.clone(),
            self.metrics.clone(),
            self.config.confirmations,
        );
        Services {
            session,
            synchronizer,
            orchestrator,
        }
    }

    fn require_services(&self) -> Result<Services, RegistryError> {
        self.services.read().clone().ok_or(RegistryError::NotConnected)
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Rebuild and publish the snapshot. Returns the published version.
    pub async fn refresh(&self) -> Result<u64, RegistryError> {
        let services = self.require_services()?;
        services.synchronizer.refresh().await
    }

    /// Currently published snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.get()
    }

    /// Currently published snapshot with its version.
    pub fn snapshot_versioned(&self) -> (Arc<RegistrySnapshot>, u64) {
        self.snapshot.get_versioned()
    }

    /// Subscribe to snapshot publications.
    pub fn subscribe(&self) -> Subscription<Arc<RegistrySnapshot>> {
        self.snapshot.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Register `username` at `address` with an initial `amount`.
    pub async fn register_user(
        &self,
        username: &str,
        address: &str,
        amount: &str,
    ) -> Result<OperationReport, RegistryError> {
        let services = self.require_services()?;
        let request = OperationRequest::register(username, address, amount)?;
        Ok(services.orchestrator.execute(request).await)
    }

    /// Redeem `amount` tokens held by the session's signer.
    pub async fn redeem(&self, amount: &str) -> Result<OperationReport, RegistryError> {
        let services = self.require_services()?;
        let request = OperationRequest::redeem(amount)?;
        Ok(services.orchestrator.execute(request).await)
    }

    /// Mint `amount` tokens to `username`.
    pub async fn reward_user(
        &self,
        username: &str,
        amount: &str,
    ) -> Result<OperationReport, RegistryError> {
        let services = self.require_services()?;
        let request = OperationRequest::reward(username, amount)?;
        Ok(services.orchestrator.execute(request).await)
    }

    /// Submission phase only, for callers that settle tokens themselves.
    pub async fn submit(&self, request: OperationRequest) -> Result<Submission, RegistryError> {
        let services = self.require_services()?;
        let submission = services.orchestrator.submit(request).await;
        if let Submission::Failed(report) = &submission {
            warn!(op = %report.id, "submission refused");
        }
        Ok(submission)
    }

    /// Operation status feed.
    pub fn operations(&self) -> &OperationLog {
        &self.operations
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select a user by exact username.
    pub fn select(&self, username: &str) -> Option<UserRecord> {
        self.selection.select(username)
    }

    /// Selected user, resolved against the current snapshot.
    pub fn selected(&self) -> Option<UserRecord> {
        self.selection.selected()
    }

    /// Drop the selection.
    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
