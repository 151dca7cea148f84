//! Registry refresh against a scripted ledger.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use assert_matches::assert_matches;
use law_app::AppCore;
use law_core::{Amount, LedgerError, RegistryError};
use law_testkit::{alice_and_bob, connected_core, test_config, MockLedger};
use proptest::prelude::*;

fn names(core: &AppCore) -> Vec<String> {
    core.snapshot()
        .iter()
        .map(|u| u.username.as_str().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_order_follows_enumeration_not_completion() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.delay_balance_of("alice", Duration::from_millis(50));

    core.refresh().await.unwrap();

    let completions = ledger.completions();
    let pos = |call: &str| completions.iter().position(|c| c == call).unwrap();
    assert!(pos("balance_of:bob") < pos("balance_of:alice"));

    let snapshot = core.snapshot();
    let records: Vec<_> = snapshot
        .iter()
        .map(|u| (u.username.as_str(), u.address.as_str(), u.balance.as_str()))
        .collect();
    assert_eq!(records, [("alice", "0xA", "100"), ("bob", "0xB", "50")]);
}

#[tokio::test(start_paused = true)]
async fn test_username_precedes_balance_per_address() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.delay_username_of("0xA", Duration::from_millis(30));

    core.refresh().await.unwrap();

    let completions = ledger.completions();
    let pos = |call: &str| completions.iter().position(|c| c == call).unwrap();
    assert!(pos("username_of:0xA") < pos("balance_of:alice"));
    assert!(pos("balance_of:bob") < pos("username_of:0xA"));
}

#[tokio::test]
async fn test_lookup_failure_keeps_previous_snapshot() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    let version = core.refresh().await.unwrap();
    let before = core.snapshot();

    ledger.local().seed("carol", "0xC", "7").unwrap();
    ledger.fail_balance_of("carol", LedgerError::transport("connection reset"));

    let err = core.refresh().await.unwrap_err();
    assert_matches!(
        err,
        RegistryError::SyncFailed {
            cause: LedgerError::Transport { .. }
        }
    );
    let (after, after_version) = core.snapshot_versioned();
    assert_eq!(*after, *before);
    assert_eq!(after_version, version);
    assert_eq!(core.metrics().refresh_failed_total, 1);
}

#[tokio::test]
async fn test_enumeration_failure_is_sync_failed() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.fail_enumerate(LedgerError::transport("rpc down"));

    assert_matches!(core.refresh().await, Err(RegistryError::SyncFailed { .. }));
    assert_eq!(ledger.calls().username_of, 0);
    assert!(core.snapshot().is_empty());
}

#[tokio::test]
async fn test_malformed_balance_fails_refresh() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.override_balance("bob", "12.5");

    assert_matches!(
        core.refresh().await,
        Err(RegistryError::SyncFailed {
            cause: LedgerError::Decode { .. }
        })
    );
    assert_eq!(core.snapshot().len(), 0);
}

#[tokio::test]
async fn test_duplicate_address_fails_refresh() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.override_addresses(&["0xA", "0xB", "0xA"]);

    assert_matches!(
        core.refresh().await,
        Err(RegistryError::SyncFailed {
            cause: LedgerError::Decode { .. }
        })
    );
}

#[tokio::test]
async fn test_duplicate_username_fails_refresh() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.override_username("0xB", "alice");

    assert_matches!(
        core.refresh().await,
        Err(RegistryError::SyncFailed {
            cause: LedgerError::Decode { .. }
        })
    );
}

#[tokio::test]
async fn test_username_lookup_uses_enumerated_address_verbatim() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    ledger.override_addresses(&[" 0xA", "0xB"]);
    ledger.override_username(" 0xA", "alice");

    core.refresh().await.unwrap();

    assert!(ledger.completions().contains(&"username_of: 0xA".to_string()));
    assert_eq!(core.snapshot().users()[0].address.as_str(), "0xA");
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;

    let first_version = core.refresh().await.unwrap();
    let first = core.snapshot();
    let second_version = core.refresh().await.unwrap();
    let second = core.snapshot();

    assert_eq!(*first, *second);
    assert_eq!(second_version, first_version + 1);
    assert_eq!(names(&core), ["alice", "bob"]);
}

#[tokio::test]
async fn test_subscribers_see_each_publication() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    let mut sub = core.subscribe();
    assert!(sub.poll().is_none());

    core.refresh().await.unwrap();
    assert_eq!(sub.poll().unwrap().len(), 2);

    ledger.fail_enumerate(LedgerError::transport("down"));
    let _ = core.refresh().await;
    assert!(!sub.has_changed());
}

#[tokio::test]
async fn test_total_supply_and_lookups() {
    let ledger = alice_and_bob();
    let core = connected_core(&ledger, "0xA").await;
    core.refresh().await.unwrap();

    let snapshot = core.snapshot();
    assert_eq!(snapshot.total_supply(), Amount::from(150));
    assert_eq!(snapshot.find_by_address("0xB").unwrap().username.as_str(), "bob");
}

#[tokio::test]
async fn test_lookup_concurrency_of_one_still_completes() {
    let ledger = alice_and_bob();
    let core = AppCore::new(law_core::RegistryConfig {
        lookup_concurrency: 1,
        ..test_config()
    })
    .unwrap();
    core.connect(
        &law_testkit::MockWallet::with_identity("0xA"),
        &law_testkit::MockConnector::new(ledger.clone()),
    )
    .await
    .unwrap();
    ledger.delay_balance_of("alice", Duration::from_millis(5));

    core.refresh().await.unwrap();
    let completions = ledger.completions();
    let pos = |call: &str| completions.iter().position(|c| c == call).unwrap();
    assert!(pos("balance_of:alice") < pos("username_of:0xB"));
}

fn registry(balances: &[(u64, u64, u64)]) -> MockLedger {
    let mut builder = MockLedger::builder();
    for (i, (balance, _, _)) in balances.iter().enumerate() {
        builder = builder.user(&format!("user{i}"), &format!("0x{i:x}"), &balance.to_string());
    }
    let ledger = builder.build();
    for (i, (_, name_delay, balance_delay)) in balances.iter().enumerate() {
        ledger.delay_username_of(&format!("0x{i:x}"), Duration::from_millis(*name_delay));
        ledger.delay_balance_of(&format!("user{i}"), Duration::from_millis(*balance_delay));
    }
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_refresh_preserves_order_under_any_latency(
        users in prop::collection::vec((any::<u64>(), 0u64..40, 0u64..40), 0..8)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let (expected, published) = runtime.block_on(async {
            let ledger = registry(&users);
            let core = connected_core(&ledger, "0x0").await;
            core.refresh().await.unwrap();
            (ledger.local().addresses(), core.snapshot())
        });

        let addresses: Vec<String> = published
            .iter()
            .map(|u| u.address.as_str().to_string())
            .collect();
        prop_assert_eq!(addresses, expected);

        for (i, record) in published.iter().enumerate() {
            prop_assert_eq!(record.username.as_str(), format!("user{i}"));
            prop_assert_eq!(&record.balance, &Amount::from(users[i].0));
        }
    }
}
