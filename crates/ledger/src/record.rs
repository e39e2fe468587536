use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::uint::LedgerUint;

/// Name of the event the registry contract emits when a record is written.
pub const RECORD_REGISTERED_EVENT: &str = "ObraRegistrada";

/// Event field carrying the ledger-assigned record id.
pub const RECORD_ID_FIELD: &str = "id";

/// A record exactly as the ledger stores it: scalars, strings, and the
/// caller's payload as an embedded JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: LedgerUint,
    /// Serialized JSON document supplied at write time. Not validated by the ledger.
    pub payload_json: String,
    pub location: String,
    pub kind: String,
    /// Unix timestamp (seconds) stamped by the ledger at write time.
    pub created_at: LedgerUint,
    /// Account that submitted the write.
    pub reported_by: String,
    pub active: bool,
}

/// A write request handed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSubmission {
    pub payload_json: String,
    pub location: String,
    pub kind: String,
    /// Sending account; must be one the node can sign for.
    pub signer: String,
    pub gas_limit: u64,
    pub gas_price: u64,
}

/// A decoded value carried by an emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerValue {
    Uint(LedgerUint),
    Bool(bool),
    /// `0x`-prefixed, lowercase, 20-byte account address.
    Address(String),
    String(String),
    Bytes(Vec<u8>),
    Tuple(Vec<LedgerValue>),
}

impl LedgerValue {
    pub fn as_uint(&self) -> Option<LedgerUint> {
        match self {
            LedgerValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LedgerValue::String(s) | LedgerValue::Address(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LedgerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// An event emitted by the contract while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub name: String,
    /// Decoded event arguments keyed by their declared names.
    pub fields: BTreeMap<String, LedgerValue>,
}

impl EmittedEvent {
    pub fn field(&self, name: &str) -> Option<&LedgerValue> {
        self.fields.get(name)
    }
}

/// Confirmation of a mined write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub transaction_hash: String,
    pub block_number: LedgerUint,
    pub events: Vec<EmittedEvent>,
}

impl WriteReceipt {
    /// First emitted event with the given name.
    pub fn event(&self, name: &str) -> Option<&EmittedEvent> {
        self.events.iter().find(|e| e.name == name)
    }
}
