use std::future::Future;

use super::{count_of, make_submission, signer, TestResult};
use crate::record::{RECORD_ID_FIELD, RECORD_REGISTERED_EVENT};
use crate::LedgerClient;

pub(super) async fn run_write_tests<L, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    vec![
        TestResult::from_result(
            "write",
            "empty_ledger_has_zero_count",
            empty_ledger_has_zero_count(factory).await,
        ),
        TestResult::from_result(
            "write",
            "ledger_exposes_a_signing_account",
            ledger_exposes_a_signing_account(factory).await,
        ),
        TestResult::from_result(
            "write",
            "ids_follow_the_count",
            ids_follow_the_count(factory).await,
        ),
        TestResult::from_result(
            "write",
            "receipt_carries_registered_event",
            receipt_carries_registered_event(factory).await,
        ),
        TestResult::from_result(
            "write",
            "receipt_block_is_known_to_the_node",
            receipt_block_is_known_to_the_node(factory).await,
        ),
    ]
}

async fn empty_ledger_has_zero_count<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let count = count_of(&ledger).await?;
    if count != 0 {
        return Err(format!("expected count 0, got {}", count));
    }
    Ok(())
}

async fn ledger_exposes_a_signing_account<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    signer(&ledger).await.map(|_| ())
}

/// Each write is assigned `count + 1`, and the count follows.
async fn ids_follow_the_count<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let from = signer(&ledger).await?;

    for expected in 1..=3u64 {
        let before = count_of(&ledger).await?;
        let receipt = ledger
            .submit_record(make_submission(&from, &format!("Sitio {}", expected)))
            .await
            .map_err(|e| format!("submit: {e}"))?;
        let id = receipt
            .event(RECORD_REGISTERED_EVENT)
            .and_then(|e| e.field(RECORD_ID_FIELD))
            .and_then(|v| v.as_uint())
            .ok_or("missing id in confirmation event")?
            .to_u64()
            .map_err(|e| e.to_string())?;
        if id != before + 1 || id != expected {
            return Err(format!(
                "expected id {} (count before {}), got {}",
                expected, before, id
            ));
        }
        let after = count_of(&ledger).await?;
        if after != id {
            return Err(format!("expected count {} after write, got {}", id, after));
        }
    }
    Ok(())
}

async fn receipt_carries_registered_event<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let from = signer(&ledger).await?;
    let receipt = ledger
        .submit_record(make_submission(&from, "Turrialba"))
        .await
        .map_err(|e| format!("submit: {e}"))?;

    if receipt.transaction_hash.is_empty() {
        return Err("empty transaction hash".to_string());
    }
    match receipt.event(RECORD_REGISTERED_EVENT) {
        Some(event) if event.field(RECORD_ID_FIELD).is_some() => Ok(()),
        Some(_) => Err(format!(
            "{} event has no '{}' field",
            RECORD_REGISTERED_EVENT, RECORD_ID_FIELD
        )),
        None => Err(format!("receipt has no {} event", RECORD_REGISTERED_EVENT)),
    }
}

async fn receipt_block_is_known_to_the_node<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let from = signer(&ledger).await?;
    let receipt = ledger
        .submit_record(make_submission(&from, "Limón"))
        .await
        .map_err(|e| format!("submit: {e}"))?;
    let head = ledger.current_block().await.map_err(|e| e.to_string())?;
    if head < receipt.block_number {
        return Err(format!(
            "node head {} is behind receipt block {}",
            head, receipt.block_number
        ));
    }
    Ok(())
}
