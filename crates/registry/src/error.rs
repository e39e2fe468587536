use obra_ledger::LedgerError;

/// Errors produced by the record codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A required text field was empty or whitespace.
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// The payload was absent (JSON `null`).
    #[error("payload is required")]
    MissingPayload,

    /// The payload could not be serialized to JSON.
    #[error("payload cannot be serialized: {0}")]
    Unserializable(String),

    /// The stored payload string is not valid JSON.
    #[error("payload of obra {id} is not valid json: {message}")]
    MalformedPayload { id: u64, message: String },

    /// A ledger integer does not fit the native field.
    #[error("{field} {value} does not fit {target}")]
    Overflow {
        field: &'static str,
        value: String,
        target: &'static str,
    },
}

/// All errors returned by the registry core.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No readable record with this id.
    #[error("obra {id} not found")]
    NotFound { id: u64 },

    #[error("payload of obra {id} is malformed: {message}")]
    MalformedPayload { id: u64, message: String },

    /// The node holds no account to sign the write with.
    #[error("no signing account available on the ledger node")]
    NoSigningIdentity,

    /// The ledger rejected or reverted the write.
    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },

    /// The write was mined but the confirmation event is missing.
    #[error("event {event} not found in transaction {transaction_hash}")]
    EventNotFound {
        event: String,
        transaction_hash: String,
    },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    #[error("{what} {value} overflows {target}")]
    NumericOverflow {
        what: String,
        value: String,
        target: &'static str,
    },

    /// A record read back after a write does not match what was submitted.
    #[error("obra {id} does not match the submitted {field}")]
    VerificationFailed { id: u64, field: &'static str },
}

impl From<LedgerError> for RegistryError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Overflow { value, target } => RegistryError::NumericOverflow {
                what: "ledger integer".to_string(),
                value,
                target,
            },
            other => RegistryError::LedgerUnavailable(other),
        }
    }
}

impl From<CodecError> for RegistryError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::MalformedPayload { id, message } => {
                RegistryError::MalformedPayload { id, message }
            }
            CodecError::Overflow {
                field,
                value,
                target,
            } => RegistryError::NumericOverflow {
                what: field.to_string(),
                value,
                target,
            },
            invalid => RegistryError::InvalidArgument(invalid.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_is_not_reported_as_unavailable() {
        let err: RegistryError = LedgerError::Overflow {
            value: "0x1".repeat(8),
            target: "u64",
        }
        .into();
        assert!(matches!(err, RegistryError::NumericOverflow { target: "u64", .. }));
    }

    #[test]
    fn validation_failures_become_invalid_argument() {
        let err: RegistryError = CodecError::EmptyField { field: "location" }.into();
        match err {
            RegistryError::InvalidArgument(msg) => assert_eq!(msg, "location must not be empty"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
