//! Conversion between raw ledger records and [`Record`].

use obra_ledger::{LedgerUint, RawRecord};
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::record::Record;

/// A validated write, ready to hand to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub payload_json: String,
    pub location: String,
    pub kind: String,
}

impl EncodedRecord {
    /// The payload as a JSON value, for comparison with a read-back record.
    pub fn payload(&self) -> Result<Value, CodecError> {
        serde_json::from_str(&self.payload_json)
            .map_err(|e| CodecError::Unserializable(e.to_string()))
    }
}

/// Decode a raw ledger record. Any JSON payload shape is accepted.
pub fn decode(raw: &RawRecord) -> Result<Record, CodecError> {
    let id = to_u64("id", &raw.id)?;
    let created_at = to_u64("created_at", &raw.created_at)
        .and_then(|secs| {
            i64::try_from(secs).map_err(|_| CodecError::Overflow {
                field: "created_at",
                value: secs.to_string(),
                target: "i64",
            })
        })?;
    let payload = serde_json::from_str(&raw.payload_json).map_err(|e| {
        CodecError::MalformedPayload {
            id,
            message: e.to_string(),
        }
    })?;

    Ok(Record {
        id,
        location: raw.location.clone(),
        kind: raw.kind.clone(),
        created_at,
        reported_by: raw.reported_by.clone(),
        active: raw.active,
        payload,
    })
}

/// Validate a new record and serialize its payload.
///
/// `location` and `kind` must contain non-whitespace text and the payload
/// must be present (not JSON `null`). Text fields are stored as given.
pub fn encode<T>(payload: &T, location: &str, kind: &str) -> Result<EncodedRecord, CodecError>
where
    T: Serialize + ?Sized,
{
    if location.trim().is_empty() {
        return Err(CodecError::EmptyField { field: "location" });
    }
    if kind.trim().is_empty() {
        return Err(CodecError::EmptyField { field: "kind" });
    }
    let value =
        serde_json::to_value(payload).map_err(|e| CodecError::Unserializable(e.to_string()))?;
    if value.is_null() {
        return Err(CodecError::MissingPayload);
    }
    let payload_json =
        serde_json::to_string(&value).map_err(|e| CodecError::Unserializable(e.to_string()))?;

    Ok(EncodedRecord {
        payload_json,
        location: location.to_string(),
        kind: kind.to_string(),
    })
}

fn to_u64(field: &'static str, value: &LedgerUint) -> Result<u64, CodecError> {
    value.to_u64().map_err(|_| CodecError::Overflow {
        field,
        value: value.to_string(),
        target: "u64",
    })
}
