//! Operation status feed
//!
//! **States:** `Submitted -> Confirmed | Failed`
//!
//! Every mutating invocation gets an [`OperationRecord`] in the shared
//! [`OperationLog`]. The log is a [`Dynamic`] so a view can subscribe to it
//! the same way it subscribes to the registry snapshot.
//!
//! Terminal states ignore further events, and an event that changes nothing
//! does not wake subscribers. Once the log grows past
//! [`MAX_RETAINED_OPERATIONS`] the oldest terminal records go first.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use law_core::{Dynamic, OperationKind, RegistryError, Subscription, TxHash};
use tracing::debug;

use crate::orchestrator::OperationRequest;

/// Upper bound on records kept in the log.
///
/// A dropped [`FinalityToken`](crate::FinalityToken) leaves its record
/// `Submitted` forever. Such records are only evicted, oldest first, when the
/// log is full of in-flight records and no terminal record is left to drop.
pub const MAX_RETAINED_OPERATIONS: usize = 256;

/// Identifier of one operation invocation. Monotonic per [`OperationLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    /// Raw counter value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

// ─── States ─────────────────────────────────────────────────────────────

/// Lifecycle status of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Handed to the ledger, finality not yet observed
    Submitted,
    /// The ledger reported finality
    Confirmed,
    /// Submission or the finality wait failed
    Failed {
        /// Reported cause
        error: RegistryError,
    },
}

impl OperationStatus {
    /// Whether no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed { .. })
    }

    /// Lowercase label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Status after `event`, or `None` if the event is ignored.
    fn next(&self, event: &OperationEvent) -> Option<OperationStatus> {
        if self.is_terminal() {
            return None;
        }
        Some(match event {
            OperationEvent::Finalized => Self::Confirmed,
            OperationEvent::Failed(error) => Self::Failed {
                error: error.clone(),
            },
        })
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed: {error}"),
            other => f.write_str(other.label()),
        }
    }
}

// ─── Events ─────────────────────────────────────────────────────────────

/// Events that drive an operation's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    /// The ledger reported finality
    Finalized,
    /// Submission or finality wait failed
    Failed(RegistryError),
}

/// Result of applying an event to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The status changed
    Transitioned {
        /// Previous status label
        from: &'static str,
        /// New status label
        to: &'static str,
    },
    /// The record was already terminal
    Ignored,
    /// No record with that id is retained
    Unknown,
}

// ─── Records ────────────────────────────────────────────────────────────

/// One entry of the status feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// Invocation id
    pub id: OperationId,
    /// Operation kind
    pub kind: OperationKind,
    /// Validated parameters
    pub request: OperationRequest,
    /// Current status
    pub status: OperationStatus,
    /// Transaction hash once the ledger accepted the submission
    pub tx_hash: Option<TxHash>,
}

type Records = BTreeMap<OperationId, OperationRecord>;

/// Shared, observable log of operation records.
#[derive(Debug, Clone)]
pub struct OperationLog {
    records: Dynamic<Records>,
    next_id: Arc<AtomicU64>,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLog {
    /// Empty log.
    pub fn new() -> Self {
        Self {
            records: Dynamic::new(BTreeMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create a `Submitted` record for `request` and return its id.
    pub fn begin(&self, request: OperationRequest) -> OperationId {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = OperationRecord {
            id,
            kind: request.kind(),
            request,
            status: OperationStatus::Submitted,
            tx_hash: None,
        };
        self.records.update(|records| {
            records.insert(id, record);
            evict_oldest(records);
        });
        id
    }

    /// Record the transaction hash the ledger assigned. Returns `false` if
    /// the record is no longer retained.
    pub fn attach_tx(&self, id: OperationId, tx_hash: TxHash) -> bool {
        self.records
            .update_if(|records| match records.get_mut(&id) {
                Some(record) => {
                    record.tx_hash = Some(tx_hash);
                    true
                }
                None => false,
            })
            .is_some()
    }

    /// Apply a lifecycle event to a record.
    pub fn apply(&self, id: OperationId, event: OperationEvent) -> TransitionOutcome {
        let mut outcome = TransitionOutcome::Unknown;
        self.records.update_if(|records| {
            let Some(record) = records.get_mut(&id) else {
                return false;
            };
            let Some(next) = record.status.next(&event) else {
                outcome = TransitionOutcome::Ignored;
                return false;
            };
            let from = record.status.label();
            record.status = next;
            outcome = TransitionOutcome::Transitioned {
                from,
                to: record.status.label(),
            };
            true
        });
        outcome
    }

    /// Copy of one record.
    pub fn get(&self, id: OperationId) -> Option<OperationRecord> {
        self.records.get().get(&id).cloned()
    }

    /// Every retained record in invocation order.
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.get().into_values().collect()
    }

    /// Records that have not reached a terminal status.
    pub fn in_flight(&self) -> Vec<OperationRecord> {
        self.records()
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.get().len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to changes of the whole log.
    pub fn subscribe(&self) -> Subscription<BTreeMap<OperationId, OperationRecord>> {
        self.records.subscribe()
    }
}

fn evict_oldest(records: &mut Records) {
    while records.len() > MAX_RETAINED_OPERATIONS {
        let oldest_settled = records
            .iter()
            .find(|(_, r)| r.status.is_terminal())
            .map(|(id, _)| *id);
        let evicted = match oldest_settled {
            Some(id) => records.remove(&id),
            None => records.pop_first().map(|(_, record)| record),
        };
        if let Some(record) = evicted {
            debug!(op = %record.id, status = record.status.label(), "evicted operation record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use law_core::{Amount, LedgerError};

    fn redeem(n: u64) -> OperationRequest {
        OperationRequest::Redeem {
            amount: Amount::from(n),
        }
    }

    #[test]
    fn test_begin_assigns_monotonic_ids() {
        let log = OperationLog::new();
        let a = log.begin(redeem(1));
        let b = log.begin(redeem(2));
        assert!(a < b);
        assert_eq!(log.get(a).unwrap().status, OperationStatus::Submitted);
        assert_eq!(log.get(b).unwrap().kind, OperationKind::Redeem);
    }

    #[test]
    fn test_terminal_state_ignores_events() {
        let log = OperationLog::new();
        let id = log.begin(redeem(1));

        assert_eq!(
            log.apply(id, OperationEvent::Finalized),
            TransitionOutcome::Transitioned {
                from: "submitted",
                to: "confirmed"
            }
        );
        let failure = RegistryError::operation_failed(
            OperationKind::Redeem,
            LedgerError::reverted("late"),
        );
        assert_eq!(
            log.apply(id, OperationEvent::Failed(failure)),
            TransitionOutcome::Ignored
        );
        assert_eq!(log.get(id).unwrap().status, OperationStatus::Confirmed);
    }

    #[test]
    fn test_unknown_id() {
        let log = OperationLog::new();
        log.begin(redeem(1));
        assert_eq!(
            log.apply(OperationId(99), OperationEvent::Finalized),
            TransitionOutcome::Unknown
        );
        assert!(log.get(OperationId(99)).is_none());
    }

    #[test]
    fn test_attach_tx() {
        let log = OperationLog::new();
        let id = log.begin(redeem(3));
        assert!(log.attach_tx(id, TxHash::new("0x01")));
        assert_eq!(log.get(id).unwrap().tx_hash, Some(TxHash::new("0x01")));
    }

    #[test]
    fn test_noop_events_do_not_notify() {
        let log = OperationLog::new();
        let id = log.begin(redeem(1));
        log.apply(id, OperationEvent::Finalized);
        let mut sub = log.subscribe();

        assert_eq!(log.apply(id, OperationEvent::Finalized), TransitionOutcome::Ignored);
        assert_eq!(
            log.apply(OperationId(99), OperationEvent::Finalized),
            TransitionOutcome::Unknown
        );
        assert!(!log.attach_tx(OperationId(99), TxHash::new("0x02")));
        assert!(!sub.has_changed());
        assert!(sub.poll().is_none());
    }

    #[test]
    fn test_abandoned_records_are_bounded() {
        let log = OperationLog::new();
        let first = log.begin(redeem(0));
        for n in 1..MAX_RETAINED_OPERATIONS as u64 + 5 {
            log.begin(redeem(n));
        }
        assert_eq!(log.len(), MAX_RETAINED_OPERATIONS);
        assert!(log.get(first).is_none());
        assert_eq!(log.apply(first, OperationEvent::Finalized), TransitionOutcome::Unknown);
    }

    #[test]
    fn test_eviction_keeps_in_flight_records() {
        let log = OperationLog::new();
        let pending = log.begin(redeem(0));
        for n in 0..MAX_RETAINED_OPERATIONS as u64 + 10 {
            let id = log.begin(redeem(n));
            log.apply(id, OperationEvent::Finalized);
        }
        assert_eq!(log.len(), MAX_RETAINED_OPERATIONS);
        assert!(log.get(pending).is_some());
        assert_eq!(log.in_flight().len(), 1);
    }

    #[test]
    fn test_subscription_sees_transitions() {
        let log = OperationLog::new();
        let mut sub = log.subscribe();
        let id = log.begin(redeem(1));
        let seen = sub.poll().unwrap();
        assert_eq!(seen[&id].status, OperationStatus::Submitted);
        log.apply(id, OperationEvent::Finalized);
        assert_eq!(sub.poll().unwrap()[&id].status, OperationStatus::Confirmed);
    }
}
