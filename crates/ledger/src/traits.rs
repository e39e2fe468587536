use async_trait::async_trait;

use crate::error::LedgerError;
use crate::record::{RawRecord, RecordSubmission, WriteReceipt};
use crate::uint::LedgerUint;

/// The client trait for the registry ledger.
///
/// A `LedgerClient` gives access to an append-only contract that stores
/// records under dense, sequential ids `1..=record_count()`. The ledger has no
/// list, filter, or search primitive; everything beyond indexed reads is
/// reconstructed by callers.
///
/// ## Error semantics
///
/// - `record` returns `Err(LedgerError::Reverted)` when the contract refuses
///   the read for that id (missing or unreadable record). Any other error
///   means the ledger as a whole could not answer.
/// - `submit_record` returns only after the transaction is mined. A mined
///   transaction with a failed status is `Err(LedgerError::Reverted)`.
/// - Implementations never retry a submission.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single client can be
/// shared via `Arc` across axum handlers and async tasks.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// Total number of records ever written. Only ever increases.
    async fn record_count(&self) -> Result<LedgerUint, LedgerError>;

    /// Read the record stored under `id`.
    async fn record(&self, id: u64) -> Result<RawRecord, LedgerError>;

    /// Submit a write transaction and wait for its confirmation.
    async fn submit_record(&self, submission: RecordSubmission)
        -> Result<WriteReceipt, LedgerError>;

    /// Accounts the node can sign transactions for, in node order.
    async fn accounts(&self) -> Result<Vec<String>, LedgerError>;

    /// Latest block number known to the node.
    async fn current_block(&self) -> Result<LedgerUint, LedgerError>;

    /// Contract address, when the backend has one.
    fn contract_address(&self) -> Option<&str> {
        None
    }
}
