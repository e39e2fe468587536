//! End-to-end behavior of the registry over an in-memory ledger.

use std::sync::Arc;

use obra_ledger::{InMemoryLedger, LedgerClient};
use obra_registry::{RecordFilter, Registry, RegistryError, RegistryStats, WritePolicy};
use serde_json::json;

const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

fn setup() -> (Arc<InMemoryLedger>, Registry) {
    let ledger = Arc::new(InMemoryLedger::with_accounts(vec![ACCOUNT.to_string()]));
    let registry = Registry::new(ledger.clone(), WritePolicy::default());
    (ledger, registry)
}

#[tokio::test]
async fn unreadable_record_is_skipped_but_counted() {
    let (ledger, registry) = setup();
    for location in ["San José", "Cartago", "Heredia"] {
        registry
            .register(location, "Canal", &json!({"at": location}))
            .await
            .unwrap();
    }
    ledger.fail_reads_for(2).await;

    let all = registry.list_all(&RecordFilter::Any).await.unwrap();
    assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);

    let stats = registry.summarize().await.unwrap();
    assert_eq!(
        stats,
        RegistryStats {
            total: 3,
            active: 2,
            inactive: 1,
            unreadable: 1,
        }
    );
}

#[tokio::test]
async fn registered_record_reads_back() {
    let (ledger, registry) = setup();
    registry.register("Cusco", "Puente", &json!({})).await.unwrap();
    let before = ledger.record_count().await.unwrap().to_u64().unwrap();

    let receipt = registry
        .register("Lima, Peru", "Canal", &json!({"risk": "high"}))
        .await
        .unwrap();
    assert_eq!(receipt.id, before + 1);
    assert!(receipt.transaction_hash.starts_with("0x"));

    let record = registry.get_by_id(receipt.id as i64).await.unwrap();
    assert_eq!(record.location, "Lima, Peru");
    assert_eq!(record.kind, "Canal");
    assert_eq!(record.payload, json!({"risk": "high"}));
}

#[tokio::test]
async fn listings_agree_with_each_other() {
    let (ledger, registry) = setup();
    for location in ["Riverside", "Lima", "Old River Rd", "Cusco", "river mouth"] {
        registry.register(location, "Canal", &json!([])).await.unwrap();
    }
    ledger.deactivate(3).await.unwrap();

    let all = registry.list_all(&RecordFilter::Any).await.unwrap();
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let active = registry.list_all(&RecordFilter::ActiveOnly).await.unwrap();
    assert!(active.iter().all(|r| r.active && all.contains(r)));
    assert_eq!(active.len(), 4);

    let found = registry.search("river").await.unwrap();
    let expected: Vec<_> = all
        .iter()
        .filter(|r| r.location.to_lowercase().contains("river"))
        .cloned()
        .collect();
    assert_eq!(found, expected);
    assert_eq!(found.len(), 3);

    let stats = registry.summarize().await.unwrap();
    assert_eq!((stats.total, stats.active, stats.inactive), (5, 4, 1));
}

#[tokio::test]
async fn lookups_outside_the_range_fail() {
    let (_ledger, registry) = setup();
    registry.register("Lima", "Canal", &json!({})).await.unwrap();

    assert!(matches!(
        registry.get_by_id(0).await,
        Err(RegistryError::InvalidArgument(_))
    ));
    assert!(matches!(
        registry.get_by_id(-1).await,
        Err(RegistryError::InvalidArgument(_))
    ));
    assert!(matches!(
        registry.get_by_id(2).await,
        Err(RegistryError::NotFound { id: 2 })
    ));
}

#[tokio::test]
async fn malformed_payload_is_skipped_in_scans_and_surfaced_on_lookup() {
    let (ledger, registry) = setup();
    registry.register("Lima", "Canal", &json!({})).await.unwrap();
    ledger
        .submit_record(obra_ledger::RecordSubmission {
            payload_json: "{broken".to_string(),
            location: "Cusco".to_string(),
            kind: "Canal".to_string(),
            signer: ACCOUNT.to_string(),
            gas_limit: 5_000_000,
            gas_price: 0,
        })
        .await
        .unwrap();

    let outcome = registry.scan().await.unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.skipped[0].id, 2);

    assert!(matches!(
        registry.get_by_id(2).await,
        Err(RegistryError::MalformedPayload { id: 2, .. })
    ));
}

#[tokio::test]
async fn verified_write_lands_in_the_current_block() {
    let ledger = Arc::new(InMemoryLedger::with_accounts(vec![ACCOUNT.to_string()]));
    let policy = WritePolicy {
        gas_limit: 1_000_000,
        gas_price: 1,
    };
    let registry = Registry::new(ledger, policy);
    let (receipt, record) = registry
        .register_and_verify("Lima", "Canal", &json!({"ok": true}))
        .await
        .unwrap();
    assert_eq!(receipt.id, record.id);
    assert_eq!(registry.current_block().await.unwrap(), receipt.block_number);
}
