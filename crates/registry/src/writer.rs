//! The write path: validate, sign with the node's first account, submit,
//! and pull the assigned id out of the confirmation event.

use std::sync::Arc;

use obra_ledger::{
    LedgerClient, LedgerError, RecordSubmission, WriteReceipt, RECORD_ID_FIELD,
    RECORD_REGISTERED_EVENT,
};
use serde::Serialize;

use crate::codec::{self, EncodedRecord};
use crate::error::RegistryError;
use crate::reader::RegistryReader;
use crate::record::{Record, RegistrationReceipt};

/// Gas settings applied to every write.
///
/// The defaults match a permissioned network: a fixed budget and zero price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub gas_limit: u64,
    pub gas_price: u64,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy {
            gas_limit: 5_000_000,
            gas_price: 0,
        }
    }
}

#[derive(Clone)]
pub struct RegistryWriter {
    ledger: Arc<dyn LedgerClient>,
    reader: RegistryReader,
    policy: WritePolicy,
}

impl RegistryWriter {
    pub fn new(ledger: Arc<dyn LedgerClient>, policy: WritePolicy) -> Self {
        RegistryWriter {
            reader: RegistryReader::new(ledger.clone()),
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Submit a new record. No retries: a failed submission is reported as is.
    pub async fn register<T>(
        &self,
        location: &str,
        kind: &str,
        payload: &T,
    ) -> Result<RegistrationReceipt, RegistryError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = codec::encode(payload, location, kind)?;
        self.submit(encoded).await
    }

    /// Re-read a freshly written record and check it holds what was sent.
    pub async fn verify(
        &self,
        receipt: &RegistrationReceipt,
        expected: &EncodedRecord,
    ) -> Result<Record, RegistryError> {
        let record = self.reader.get(receipt.id).await?;
        if record.location != expected.location {
            return Err(mismatch(receipt.id, "location"));
        }
        if record.kind != expected.kind {
            return Err(mismatch(receipt.id, "kind"));
        }
        if record.payload != expected.payload()? {
            return Err(mismatch(receipt.id, "payload"));
        }
        tracing::debug!(id = receipt.id, "write verified");
        Ok(record)
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
        let encoded = codec::encode(payload, location, kind)?;
        let receipt = self.submit(encoded.clone()).await?;
        let record = self.verify(&receipt, &encoded).await?;
        Ok((receipt, record))
    }

    async fn submit(&self, encoded: EncodedRecord) -> Result<RegistrationReceipt, RegistryError> {
        let signer = self
            .ledger
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(RegistryError::NoSigningIdentity)?;

        let submission = RecordSubmission {
            payload_json: encoded.payload_json,
            location: encoded.location,
            kind: encoded.kind,
            signer,
            gas_limit: self.policy.gas_limit,
            gas_price: self.policy.gas_price,
        };
        let receipt = self
            .ledger
            .submit_record(submission)
            .await
            .map_err(submission_error)?;

        let id = assigned_id(&receipt)?;
        let block_number = receipt.block_number.to_u64()?;
        tracing::info!(
            id,
            tx_hash = %receipt.transaction_hash,
            block = block_number,
            "obra registered"
        );
        Ok(RegistrationReceipt {
            id,
            transaction_hash: receipt.transaction_hash,
            block_number,
        })
    }
}

fn submission_error(e: LedgerError) -> RegistryError {
    match e {
        LedgerError::Reverted { reason } => RegistryError::TransactionFailed { reason },
        LedgerError::Rpc { code, message } => RegistryError::TransactionFailed {
            reason: format!("rejected by node ({}): {}", code, message),
        },
        other => other.into(),
    }
}

fn assigned_id(receipt: &WriteReceipt) -> Result<u64, RegistryError> {
    let id = receipt
        .event(RECORD_REGISTERED_EVENT)
        .and_then(|event| event.field(RECORD_ID_FIELD))
        .and_then(|value| value.as_uint())
        .ok_or_else(|| RegistryError::EventNotFound {
            event: RECORD_REGISTERED_EVENT.to_string(),
            transaction_hash: receipt.transaction_hash.clone(),
        })?;
    Ok(id.to_u64()?)
}

fn mismatch(id: u64, field: &'static str) -> RegistryError {
    RegistryError::VerificationFailed { id, field }
}
