//! In-process ledger backend.
//!
//! Behaves like the deployed registry contract: ids are assigned `count + 1`,
//! every write mines a new block and emits the registration event, and reads
//! past the end revert. Used by tests and by `obra serve --in-memory`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::record::{
    EmittedEvent, LedgerValue, RawRecord, RecordSubmission, WriteReceipt, RECORD_ID_FIELD,
    RECORD_REGISTERED_EVENT,
};
use crate::traits::LedgerClient;
use crate::uint::LedgerUint;

/// Revert reason the registry contract uses for ids it does not hold.
const MISSING_RECORD_REASON: &str = "Obra no existe";

#[derive(Default)]
struct LedgerState {
    /// Record `id` lives at index `id - 1`.
    records: Vec<RawRecord>,
    unreadable: BTreeSet<u64>,
    block: u64,
    next_write_failure: Option<String>,
    emit_events: bool,
}

/// A ledger held entirely in memory.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    accounts: Vec<String>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::with_accounts(Vec::new())
    }
}

impl InMemoryLedger {
    /// A ledger with no signing accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose node can sign for the given accounts.
    pub fn with_accounts(accounts: Vec<String>) -> Self {
        InMemoryLedger {
            state: RwLock::new(LedgerState {
                emit_events: true,
                ..LedgerState::default()
            }),
            accounts,
        }
    }

    /// Flip a record to inactive, as the contract owner's deactivation call would.
    pub async fn deactivate(&self, id: u64) -> Result<(), LedgerError> {
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: u64) -> Result<(), LedgerError> {
        self.set_active(id, true).await
    }

    /// Make every future read of `id` revert.
    pub async fn fail_reads_for(&self, id: u64) {
        self.state.write().await.unreadable.insert(id);
    }

    /// Make the next submission revert with `reason`.
    pub async fn fail_next_submission(&self, reason: &str) {
        self.state.write().await.next_write_failure = Some(reason.to_string());
    }

    /// Toggle emission of the registration event on writes.
    pub async fn set_emit_events(&self, emit: bool) {
        self.state.write().await.emit_events = emit;
    }

    async fn set_active(&self, id: u64, active: bool) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        let record = index_of(id)
            .and_then(|i| state.records.get_mut(i))
            .ok_or_else(missing_record)?;
        record.active = active;
        state.block += 1;
        Ok(())
    }
}

fn index_of(id: u64) -> Option<usize> {
    id.checked_sub(1).and_then(|i| usize::try_from(i).ok())
}

fn missing_record() -> LedgerError {
    LedgerError::Reverted {
        reason: MISSING_RECORD_REASON.to_string(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn record_count(&self) -> Result<LedgerUint, LedgerError> {
        let state = self.state.read().await;
        Ok(LedgerUint::from_u64(state.records.len() as u64))
    }

    async fn record(&self, id: u64) -> Result<RawRecord, LedgerError> {
        let state = self.state.read().await;
        if state.unreadable.contains(&id) {
            return Err(LedgerError::Reverted {
                reason: format!("record {} is unreadable", id),
            });
        }
        index_of(id)
            .and_then(|i| state.records.get(i))
            .cloned()
            .ok_or_else(missing_record)
    }

    async fn submit_record(
        &self,
        submission: RecordSubmission,
    ) -> Result<WriteReceipt, LedgerError> {
        if !self.accounts.iter().any(|a| a == &submission.signer) {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: format!("unknown account {}", submission.signer),
            });
        }

        let mut state = self.state.write().await;
        state.block += 1;
        let transaction_hash = format!("0x{:064x}", state.block);

        if let Some(reason) = state.next_write_failure.take() {
            return Err(LedgerError::Reverted { reason });
        }

        let id = LedgerUint::from_u64(state.records.len() as u64 + 1);
        state.records.push(RawRecord {
            id,
            payload_json: submission.payload_json,
            location: submission.location,
            kind: submission.kind,
            created_at: LedgerUint::from_u64(unix_now()),
            reported_by: submission.signer,
            active: true,
        });

        let events = if state.emit_events {
            vec![EmittedEvent {
                name: RECORD_REGISTERED_EVENT.to_string(),
                fields: BTreeMap::from([(RECORD_ID_FIELD.to_string(), LedgerValue::Uint(id))]),
            }]
        } else {
            Vec::new()
        };

        Ok(WriteReceipt {
            transaction_hash,
            block_number: LedgerUint::from_u64(state.block),
            events,
        })
    }

    async fn accounts(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.accounts.clone())
    }

    async fn current_block(&self) -> Result<LedgerUint, LedgerError> {
        Ok(LedgerUint::from_u64(self.state.read().await.block))
    }
}
