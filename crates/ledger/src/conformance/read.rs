use std::future::Future;

use super::{count_of, make_submission, signer, TestResult};
use crate::LedgerClient;

pub(super) async fn run_read_tests<L, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    vec![
        TestResult::from_result(
            "read",
            "written_record_reads_back_verbatim",
            written_record_reads_back_verbatim(factory).await,
        ),
        TestResult::from_result(
            "read",
            "read_beyond_count_reverts",
            read_beyond_count_reverts(factory).await,
        ),
        TestResult::from_result(
            "read",
            "read_of_zero_reverts",
            read_of_zero_reverts(factory).await,
        ),
    ]
}

/// The ledger stores the payload string untouched and stamps the signer.
async fn written_record_reads_back_verbatim<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let from = signer(&ledger).await?;
    let submission = make_submission(&from, "San José, Costa Rica");
    ledger
        .submit_record(submission.clone())
        .await
        .map_err(|e| format!("submit: {e}"))?;

    let raw = ledger.record(1).await.map_err(|e| format!("read: {e}"))?;
    if raw.id.to_u64().map_err(|e| e.to_string())? != 1 {
        return Err(format!("expected id 1, got {}", raw.id));
    }
    if raw.payload_json != submission.payload_json {
        return Err(format!("payload changed: {}", raw.payload_json));
    }
    if raw.location != submission.location || raw.kind != submission.kind {
        return Err(format!(
            "expected {}/{}, got {}/{}",
            submission.location, submission.kind, raw.location, raw.kind
        ));
    }
    if !raw.reported_by.eq_ignore_ascii_case(&from) {
        return Err(format!("expected reporter {}, got {}", from, raw.reported_by));
    }
    if !raw.active {
        return Err("new record must be active".to_string());
    }
    Ok(())
}

async fn read_beyond_count_reverts<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    let from = signer(&ledger).await?;
    ledger
        .submit_record(make_submission(&from, "Heredia"))
        .await
        .map_err(|e| format!("submit: {e}"))?;
    let count = count_of(&ledger).await?;

    match ledger.record(count + 1).await {
        Err(e) if e.is_revert() => Ok(()),
        Err(e) => Err(format!("expected a revert, got {e}")),
        Ok(raw) => Err(format!("read past count returned record {}", raw.id)),
    }
}

async fn read_of_zero_reverts<L, F, Fut>(factory: &F) -> Result<(), String>
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let ledger = factory().await;
    match ledger.record(0).await {
        Err(e) if e.is_revert() => Ok(()),
        Err(e) => Err(format!("expected a revert, got {e}")),
        Ok(raw) => Err(format!("id 0 returned record {}", raw.id)),
    }
}
