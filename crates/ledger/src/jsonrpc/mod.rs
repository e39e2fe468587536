//! `LedgerClient` backed by an Ethereum-compatible JSON-RPC node.
//!
//! The registry contract is located and described by a [`Deployment`]
//! descriptor. Reads go through `eth_call`; writes through
//! `eth_sendTransaction` with a node-managed account, after which the client
//! waits for the receipt and decodes the registration event from its logs.

pub mod abi;
pub mod deployment;
mod transport;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use self::abi::{AbiEntry, ParamType};
pub use self::deployment::Deployment;
use self::transport::RpcTransport;
use crate::error::LedgerError;
use crate::record::{
    EmittedEvent, LedgerValue, RawRecord, RecordSubmission, WriteReceipt, RECORD_REGISTERED_EVENT,
};
use crate::traits::LedgerClient;
use crate::uint::LedgerUint;

/// Contract function returning the record count.
pub const COUNT_FUNCTION: &str = "totalObras";
/// Contract function returning one record by id.
pub const READ_FUNCTION: &str = "obtenerObra";
/// Contract function writing a record: `(datosJSON, ubicacion, tipoObra)`.
pub const WRITE_FUNCTION: &str = "registrarObra";

/// Record fields in the contract's declared output order, used when the ABI
/// leaves outputs unnamed.
const RECORD_FIELDS: [&str; 7] = [
    "id",
    "datosJSON",
    "ubicacion",
    "tipoObra",
    "timestamp",
    "reportadoPor",
    "activo",
];

/// Connection settings for [`JsonRpcLedger`].
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    pub rpc_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How long to wait for a submitted transaction to be mined.
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for JsonRpcConfig {
    fn default() -> Self {
        JsonRpcConfig {
            rpc_url: "http://localhost:4545".to_string(),
            request_timeout: Duration::from_secs(30),
            receipt_timeout: Duration::from_secs(60),
            receipt_poll_interval: Duration::from_millis(500),
        }
    }
}

/// A contract function resolved against the ABI.
struct PreparedCall {
    selector: [u8; 4],
    inputs: Vec<ParamType>,
    outputs: Vec<ParamType>,
    output_names: Vec<String>,
}

impl PreparedCall {
    fn from_entry(entry: &AbiEntry) -> Result<Self, LedgerError> {
        Ok(PreparedCall {
            selector: entry.selector()?,
            inputs: entry.input_types()?,
            outputs: entry.output_types()?,
            output_names: entry.outputs.iter().map(|p| p.name.clone()).collect(),
        })
    }
}

pub struct JsonRpcLedger {
    transport: RpcTransport,
    contract_address: String,
    count_call: PreparedCall,
    read_call: PreparedCall,
    write_call: PreparedCall,
    /// Flattened read output names, one per record field.
    record_fields: Vec<String>,
    event: AbiEntry,
    event_topic: [u8; 32],
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl JsonRpcLedger {
    /// Resolve the registry contract's functions and event from the ABI.
    ///
    /// Does not touch the network; see [`JsonRpcLedger::connect`].
    pub fn new(deployment: &Deployment, config: &JsonRpcConfig) -> Result<Self, LedgerError> {
        let count_call = PreparedCall::from_entry(deployment.function(COUNT_FUNCTION)?)?;
        let read_call = PreparedCall::from_entry(deployment.function(READ_FUNCTION)?)?;
        let write_call = PreparedCall::from_entry(deployment.function(WRITE_FUNCTION)?)?;
        let event = deployment.event(RECORD_REGISTERED_EVENT)?.clone();

        if count_call.outputs.first().map_or(true, |t| !is_integer(t)) {
            return Err(LedgerError::Config(format!(
                "{} must return an integer",
                COUNT_FUNCTION
            )));
        }
        if read_call.inputs.len() != 1 || !is_integer(&read_call.inputs[0]) {
            return Err(LedgerError::Config(format!(
                "{} must take a single integer id",
                READ_FUNCTION
            )));
        }
        if write_call.inputs != [ParamType::String, ParamType::String, ParamType::String] {
            return Err(LedgerError::Config(format!(
                "{} must take (string, string, string)",
                WRITE_FUNCTION
            )));
        }

        let record_fields = record_field_names(deployment.function(READ_FUNCTION)?);
        let event_topic = event.topic()?;

        Ok(JsonRpcLedger {
            transport: RpcTransport::new(&config.rpc_url, config.request_timeout),
            contract_address: deployment.contract_address.to_lowercase(),
            count_call,
            read_call,
            write_call,
            record_fields,
            event,
            event_topic,
            receipt_timeout: config.receipt_timeout,
            receipt_poll_interval: config.receipt_poll_interval,
        })
    }

    /// Build the client and verify the node answers.
    pub async fn connect(
        deployment: &Deployment,
        config: &JsonRpcConfig,
    ) -> Result<Self, LedgerError> {
        let ledger = Self::new(deployment, config)?;
        let block = ledger.current_block().await?;
        tracing::info!(
            rpc_url = ledger.transport.url(),
            contract = %ledger.contract_address,
            block = %block,
            "connected to ledger"
        );
        Ok(ledger)
    }

    async fn eth_call(
        &self,
        call: &PreparedCall,
        args: &[LedgerValue],
    ) -> Result<Vec<LedgerValue>, LedgerError> {
        let data = abi::encode_call(call.selector, &call.inputs, args)?;
        let result = self
            .transport
            .call(
                "eth_call",
                json!([{"to": self.contract_address, "data": abi::to_hex(&data)}, "latest"]),
            )
            .await?;
        let bytes = abi::from_hex(as_str(&result, "eth_call result")?)?;
        abi::decode(&call.outputs, &bytes)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Value, LedgerError> {
        let started = Instant::now();
        loop {
            let receipt = self
                .transport
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            if started.elapsed() >= self.receipt_timeout {
                return Err(LedgerError::Unavailable(format!(
                    "transaction {} not mined after {:?}",
                    tx_hash, self.receipt_timeout
                )));
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    /// Decode the registry's events out of a receipt's logs.
    fn decode_events(&self, logs: &[Value]) -> Result<Vec<EmittedEvent>, LedgerError> {
        let mut events = Vec::new();
        for log in logs {
            let address = log.get("address").and_then(Value::as_str).unwrap_or_default();
            if !address.eq_ignore_ascii_case(&self.contract_address) {
                continue;
            }
            let topics = log
                .get("topics")
                .and_then(Value::as_array)
                .map(|t| {
                    t.iter()
                        .map(|topic| abi::from_hex(topic.as_str().unwrap_or_default()))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            if topics.first().map(Vec::as_slice) != Some(&self.event_topic[..]) {
                continue;
            }
            let data = abi::from_hex(log.get("data").and_then(Value::as_str).unwrap_or("0x"))?;
            events.push(EmittedEvent {
                name: self.event.name.clone(),
                fields: abi::decode_log(&self.event, &topics, &data)?,
            });
        }
        Ok(events)
    }

    fn raw_record(&self, values: Vec<LedgerValue>) -> Result<RawRecord, LedgerError> {
        // A single tuple output carries the whole struct.
        let values = match <[LedgerValue; 1]>::try_from(values) {
            Ok([LedgerValue::Tuple(members)]) => members,
            Ok([single]) => vec![single],
            Err(values) => values,
        };
        let fields: BTreeMap<&str, LedgerValue> = self
            .record_fields
            .iter()
            .map(String::as_str)
            .zip(values)
            .collect();

        let get = |name: &str| {
            fields.get(name).ok_or_else(|| {
                LedgerError::MalformedResponse(format!("record output has no '{}' field", name))
            })
        };
        let text = |name: &str| {
            get(name)?.as_str().map(str::to_string).ok_or_else(|| {
                LedgerError::MalformedResponse(format!("record field '{}' is not a string", name))
            })
        };
        let uint = |name: &str| {
            get(name)?.as_uint().ok_or_else(|| {
                LedgerError::MalformedResponse(format!("record field '{}' is not an integer", name))
            })
        };

        Ok(RawRecord {
            id: uint("id")?,
            payload_json: text("datosJSON")?,
            location: text("ubicacion")?,
            kind: text("tipoObra")?,
            created_at: uint("timestamp")?,
            reported_by: text("reportadoPor")?,
            active: get("activo")?.as_bool().ok_or_else(|| {
                LedgerError::MalformedResponse("record field 'activo' is not a bool".to_string())
            })?,
        })
    }
}

fn is_integer(ty: &ParamType) -> bool {
    matches!(ty, ParamType::Uint(_) | ParamType::Int(_))
}

/// Names of the read function's outputs, flattening a single struct output.
fn record_field_names(entry: &AbiEntry) -> Vec<String> {
    let params = match entry.outputs.as_slice() {
        [single] if single.ty == "tuple" => single.components.as_slice(),
        outputs => outputs,
    };
    if params.iter().all(|p| p.name.is_empty()) {
        return RECORD_FIELDS.iter().map(|s| s.to_string()).collect();
    }
    params.iter().map(|p| p.name.clone()).collect()
}

fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, LedgerError> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::MalformedResponse(format!("{} is not a string", what)))
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn record_count(&self) -> Result<LedgerUint, LedgerError> {
        self.eth_call(&self.count_call, &[])
            .await?
            .first()
            .and_then(LedgerValue::as_uint)
            .ok_or_else(|| {
                LedgerError::MalformedResponse(format!("{} returned no integer", COUNT_FUNCTION))
            })
    }

    async fn record(&self, id: u64) -> Result<RawRecord, LedgerError> {
        let values = self
            .eth_call(&self.read_call, &[LedgerValue::Uint(LedgerUint::from_u64(id))])
            .await?;
        self.raw_record(values)
    }

    async fn submit_record(
        &self,
        submission: RecordSubmission,
    ) -> Result<WriteReceipt, LedgerError> {
        let data = abi::encode_call(
            self.write_call.selector,
            &self.write_call.inputs,
            &[
                LedgerValue::String(submission.payload_json),
                LedgerValue::String(submission.location),
                LedgerValue::String(submission.kind),
            ],
        )?;
        let tx = json!({
            "from": submission.signer,
            "to": self.contract_address,
            "data": abi::to_hex(&data),
            "gas": LedgerUint::from_u64(submission.gas_limit).to_hex(),
            "gasPrice": LedgerUint::from_u64(submission.gas_price).to_hex(),
        });

        let hash = self.transport.call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = as_str(&hash, "transaction hash")?.to_string();
        tracing::debug!(tx_hash = %tx_hash, "transaction submitted, waiting for receipt");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        let status = receipt.get("status").and_then(Value::as_str).unwrap_or("0x1");
        if LedgerUint::from_hex(status)?.is_zero() {
            return Err(LedgerError::Reverted {
                reason: format!("transaction {} reverted", tx_hash),
            });
        }

        let block_number = LedgerUint::from_hex(as_str(
            receipt.get("blockNumber").unwrap_or(&Value::Null),
            "receipt blockNumber",
        )?)?;
        let logs = receipt
            .get("logs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(WriteReceipt {
            transaction_hash: tx_hash,
            block_number,
            events: self.decode_events(logs)?,
        })
    }

    async fn accounts(&self) -> Result<Vec<String>, LedgerError> {
        let result = self.transport.call("eth_accounts", json!([])).await?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::MalformedResponse(format!("eth_accounts: {}", e)))
    }

    async fn current_block(&self) -> Result<LedgerUint, LedgerError> {
        let result = self.transport.call("eth_blockNumber", json!([])).await?;
        LedgerUint::from_hex(as_str(&result, "eth_blockNumber result")?)
    }

    fn contract_address(&self) -> Option<&str> {
        Some(&self.contract_address)
    }
}
