pub mod conformance;
mod error;
pub mod jsonrpc;
mod memory;
mod record;
mod traits;
mod uint;

pub use error::LedgerError;
pub use jsonrpc::{Deployment, JsonRpcConfig, JsonRpcLedger};
pub use memory::InMemoryLedger;
pub use record::{
    EmittedEvent, LedgerValue, RawRecord, RecordSubmission, WriteReceipt, RECORD_ID_FIELD,
    RECORD_REGISTERED_EVENT,
};
pub use traits::LedgerClient;
pub use uint::LedgerUint;
