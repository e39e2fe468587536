//! Query and aggregation service over the append-only obra ledger.
//!
//! [`Registry`] is the entry point. It owns one [`LedgerClient`] and routes
//! listings and lookups through [`RegistryReader`], writes through
//! [`RegistryWriter`], and statistics through [`Aggregator`]. Nothing is
//! cached: every call re-reads the ledger.

pub mod aggregate;
pub mod codec;
mod error;
pub mod reader;
mod record;
pub mod writer;

use std::sync::Arc;

use obra_ledger::LedgerClient;
use serde::Serialize;

pub use aggregate::Aggregator;
pub use codec::EncodedRecord;
pub use error::{CodecError, RegistryError};
pub use reader::{RegistryReader, ScanFailure, ScanOutcome, SkippedRecord};
pub use record::{Record, RecordFilter, RegistrationReceipt, RegistryStats};
pub use writer::{RegistryWriter, WritePolicy};

#[derive(Clone)]
pub struct Registry {
    ledger: Arc<dyn LedgerClient>,
    reader: RegistryReader,
    writer: RegistryWriter,
    aggregator: Aggregator,
}

impl Registry {
    pub fn new(ledger: Arc<dyn LedgerClient>, policy: WritePolicy) -> Self {
        let reader = RegistryReader::new(ledger.clone());
        Registry {
            writer: RegistryWriter::new(ledger.clone(), policy),
            aggregator: Aggregator::new(reader.clone()),
            reader,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<Record>, RegistryError> {
        self.reader.list_all(filter).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Record, RegistryError> {
        self.reader.get_by_id(id).await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Record>, RegistryError> {
        self.reader.search(term).await
    }

    pub async fn scan(&self) -> Result<ScanOutcome, RegistryError> {
        self.reader.scan().await
    }

    pub async fn register<T>(
        &self,
        location: &str,
        kind: &str,
        payload: &T,
    ) -> Result<RegistrationReceipt, RegistryError>
    where
        T: Serialize + ?Sized,
    {
        self.writer.register(location, kind, payload).await
    }

    pub async fn register_and_verify<T>(
        &self,
        location: &str,
        kind: &str,
        payload: &T,
    ) -> Result<(RegistrationReceipt, Record), RegistryError>
    where
        T: Serialize + ?Sized,
    {
        self.writer.register_and_verify(location, kind, payload).await
    }

    pub async fn summarize(&self) -> Result<RegistryStats, RegistryError> {
        self.aggregator.summarize().await
    }

    /// Latest block height of the ledger node.
    pub async fn current_block(&self) -> Result<u64, RegistryError> {
        Ok(self.ledger.current_block().await?.to_u64()?)
    }
}
