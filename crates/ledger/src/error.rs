/// All errors that can be returned by a LedgerClient implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The node could not be reached (connection refused, timeout, bad status).
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The node answered with a JSON-RPC error that is not an execution revert.
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Contract execution reverted, either on a read call or a mined transaction.
    #[error("execution reverted: {reason}")]
    Reverted { reason: String },

    /// The node answered, but the payload could not be decoded.
    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),

    /// A ledger integer did not fit the requested native type.
    #[error("ledger integer {value} overflows {target}")]
    Overflow { value: String, target: &'static str },

    /// The client is misconfigured (missing deployment descriptor, ABI entry, etc.).
    #[error("ledger configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// True when the failure is specific to the requested record rather than
    /// the connection as a whole.
    pub fn is_revert(&self) -> bool {
        matches!(self, LedgerError::Reverted { .. })
    }
}
