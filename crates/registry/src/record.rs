use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One registered obra, decoded from its ledger representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Ledger-assigned id, starting at 1.
    pub id: u64,
    pub location: String,
    pub kind: String,
    /// Unix timestamp (seconds) stamped by the ledger at write time.
    pub created_at: i64,
    /// Account that submitted the write.
    pub reported_by: String,
    pub active: bool,
    /// Caller-supplied document. Opaque to the registry.
    pub payload: Value,
}

/// Which records a listing returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordFilter {
    #[default]
    Any,
    ActiveOnly,
    /// Case-insensitive substring match on `location`.
    LocationContains(String),
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RecordFilter::Any => true,
            RecordFilter::ActiveOnly => record.active,
            RecordFilter::LocationContains(term) => record
                .location
                .to_lowercase()
                .contains(&term.to_lowercase()),
        }
    }
}

/// Summary counts over a full scan.
///
/// `inactive` is `total - active`, so records that could not be read land in
/// `inactive`; `unreadable` says how many of them there were.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub unreadable: u64,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub id: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}
