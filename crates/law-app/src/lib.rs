//! # LAW App
//!
//! Headless core of the LAW registry client: it keeps a consistent local view
//! of every registered user and drives mutating operations through their
//! submit, finality and refresh lifecycle.
//!
//! ```text
//! View ──► AppCore ──► TransactionOrchestrator ──► LedgerClient
//!  ▲                         │ (on finality)
//!  │                         ▼
//!  └──── snapshot ◄── RegistrySynchronizer
//! ```
//!
//! Frontends hold an [`AppCore`], call its operations and observe the
//! published [`RegistrySnapshot`](law_core::RegistrySnapshot) and the
//! [`OperationLog`].
//!
//! [`LocalLedger`] is an in-process contract used when no remote ledger is
//! available.

#![forbid(unsafe_code)]

pub mod app;
pub mod local_ledger;
pub mod metrics;
pub mod operations;
pub mod orchestrator;
pub mod selection;
pub mod session;
pub mod sync;

pub use app::{AppCore, ConnectReport};
pub use local_ledger::{LocalConnector, LocalLedger, LocalLedgerClient, StaticWallet};
pub use metrics::{MetricsSnapshot, RegistryMetrics};
pub use operations::{
    OperationEvent, OperationId, OperationLog, OperationRecord, OperationStatus,
    TransitionOutcome, MAX_RETAINED_OPERATIONS,
};
pub use orchestrator::{
    FinalityToken, OperationReport, OperationRequest, Submission, TransactionOrchestrator,
};
pub use selection::Selection;
pub use session::{Session, SessionEpoch, SessionGeneration};
pub use sync::RegistrySynchronizer;
