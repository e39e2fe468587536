//! Enumeration of the ledger into a record set.
//!
//! The ledger exposes only a count and per-id reads, so every listing is a
//! full scan of `1..=count`. Records that fail to read or decode are skipped
//! and logged; the scan itself only fails if the count cannot be fetched.

use std::sync::Arc;

use obra_ledger::{LedgerClient, LedgerError};

use crate::codec;
use crate::error::{CodecError, RegistryError};
use crate::record::{Record, RecordFilter};

/// Why a record was left out of a scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanFailure {
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Decode(CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub id: u64,
    pub failure: ScanFailure,
}

/// Everything a full scan saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    /// Ledger count at the start of the scan.
    pub count: u64,
    /// Readable records in ascending id order.
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedRecord>,
}

impl ScanOutcome {
    fn absorb(mut self, (id, result): (u64, Result<Record, ScanFailure>)) -> Self {
        match result {
            Ok(record) => self.records.push(record),
            Err(failure) => {
                tracing::warn!(id, error = %failure, "skipping unreadable obra");
                self.skipped.push(SkippedRecord { id, failure });
            }
        }
        self
    }
}

#[derive(Clone)]
pub struct RegistryReader {
    ledger: Arc<dyn LedgerClient>,
}

impl RegistryReader {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        RegistryReader { ledger }
    }

    /// Current record count as a native integer.
    pub async fn count(&self) -> Result<u64, RegistryError> {
        Ok(self.ledger.record_count().await?.to_u64()?)
    }

    /// Read every id in `1..=count`, sequentially.
    pub async fn scan(&self) -> Result<ScanOutcome, RegistryError> {
        let count = self.count().await?;
        let mut results = Vec::new();
        for id in 1..=count {
            results.push((id, self.fetch(id).await));
        }
        let outcome = results.into_iter().fold(
            ScanOutcome {
                count,
                ..ScanOutcome::default()
            },
            ScanOutcome::absorb,
        );
        tracing::debug!(
            count,
            readable = outcome.records.len(),
            skipped = outcome.skipped.len(),
            "scan complete"
        );
        Ok(outcome)
    }

    /// All readable records matching `filter`, in ascending id order.
    pub async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<Record>, RegistryError> {
        let mut records = self.scan().await?.records;
        records.retain(|r| filter.matches(r));
        Ok(records)
    }

    /// Records whose location contains `term`, ignoring case.
    pub async fn search(&self, term: &str) -> Result<Vec<Record>, RegistryError> {
        if term.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "search term must not be empty".to_string(),
            ));
        }
        self.list_all(&RecordFilter::LocationContains(term.to_string()))
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Record, RegistryError> {
        let id = u64::try_from(id)
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                RegistryError::InvalidArgument(format!("obra id must be positive, got {}", id))
            })?;
        self.get(id).await
    }

    /// Fetch one record by its native id; `id` must be positive.
    pub(crate) async fn get(&self, id: u64) -> Result<Record, RegistryError> {
        if id > self.count().await? {
            return Err(RegistryError::NotFound { id });
        }
        match self.ledger.record(id).await {
            Ok(raw) => Ok(codec::decode(&raw)?),
            Err(e) if e.is_revert() => Err(RegistryError::NotFound { id }),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, id: u64) -> Result<Record, ScanFailure> {
        let raw = self.ledger.record(id).await.map_err(ScanFailure::Ledger)?;
        codec::decode(&raw).map_err(ScanFailure::Decode)
    }
}
