//! In-process JSON-RPC node hosting the registry contract.
//!
//! Speaks just enough JSON-RPC for `JsonRpcLedger`: `eth_call` for reads,
//! `eth_sendTransaction` + `eth_getTransactionReceipt` for writes,
//! `eth_accounts`, and `eth_blockNumber`. Calldata and return data go through
//! the same ABI codec as the client. Shared with the `obra` binary's tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use obra_ledger::jsonrpc::abi::{self, ParamType, ERROR_STRING_SELECTOR};
use obra_ledger::{Deployment, LedgerUint, LedgerValue};

pub const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";
pub const DEPLOYMENT: &str = include_str!("../fixtures/deployment.json");

/// How long a stalled `eth_call` hangs before answering.
const STALL: Duration = Duration::from_secs(30);

pub fn deployment() -> Deployment {
    Deployment::from_json(DEPLOYMENT).expect("fixture deployment parses")
}

pub struct StoredRecord {
    pub payload: String,
    pub location: String,
    pub kind: String,
    pub reporter: String,
    pub timestamp: u64,
    pub active: bool,
}

#[derive(Default)]
pub struct NodeState {
    pub records: Vec<StoredRecord>,
    receipts: HashMap<String, Value>,
    /// Hashes that have been polled once; receipts appear on the second poll.
    polled: Vec<String>,
    pub block: u64,
    pub revert_next: bool,
    pub never_mine: bool,
    /// Reads hang instead of answering.
    pub stall_calls: bool,
}

pub struct Node {
    deployment: Deployment,
    pub state: Mutex<NodeState>,
}

type RpcResult = Result<Value, Value>;

fn revert(reason: &str) -> Value {
    let mut data = ERROR_STRING_SELECTOR.to_vec();
    data.extend(abi::encode(&[ParamType::String], &[LedgerValue::String(reason.into())]).unwrap());
    json!({
        "code": 3,
        "message": format!("execution reverted: {}", reason),
        "data": abi::to_hex(&data),
    })
}

fn word_hex(value: u64) -> String {
    abi::to_hex(&LedgerUint::from_u64(value).to_be_bytes())
}

impl Node {
    /// Mark record `id` inactive, as the contract owner would.
    pub fn deactivate(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.records[id as usize - 1].active = false;
    }

    fn selector(&self, name: &str) -> [u8; 4] {
        self.deployment.function(name).unwrap().selector().unwrap()
    }

    fn eth_call(&self, params: &Value) -> RpcResult {
        let data = abi::from_hex(params[0]["data"].as_str().unwrap_or("0x")).unwrap();
        let (selector, args) = data.split_at(4);
        let state = self.state.lock().unwrap();

        if selector == self.selector("totalObras") {
            let out = abi::encode(
                &[ParamType::Uint(256)],
                &[LedgerValue::Uint(LedgerUint::from_u64(state.records.len() as u64))],
            )
            .unwrap();
            return Ok(json!(abi::to_hex(&out)));
        }

        if selector == self.selector("obtenerObra") {
            let id = abi::decode(&[ParamType::Uint(256)], args).unwrap()[0]
                .as_uint()
                .unwrap()
                .to_u64()
                .unwrap();
            let Some(record) = id.checked_sub(1).and_then(|i| state.records.get(i as usize)) else {
                return Err(revert("Obra no existe"));
            };
            let entry = self.deployment.function("obtenerObra").unwrap();
            let out = abi::encode(
                &entry.output_types().unwrap(),
                &[LedgerValue::Tuple(vec![
                    LedgerValue::Uint(LedgerUint::from_u64(id)),
                    LedgerValue::String(record.payload.clone()),
                    LedgerValue::String(record.location.clone()),
                    LedgerValue::String(record.kind.clone()),
                    LedgerValue::Uint(LedgerUint::from_u64(record.timestamp)),
                    LedgerValue::Address(record.reporter.clone()),
                    LedgerValue::Bool(record.active),
                ])],
            )
            .unwrap();
            return Ok(json!(abi::to_hex(&out)));
        }

        Err(json!({"code": -32601, "message": "unknown selector"}))
    }

    fn send_transaction(&self, params: &Value) -> RpcResult {
        let tx = &params[0];
        let from = tx["from"].as_str().unwrap_or_default().to_lowercase();
        if from != ACCOUNT {
            return Err(json!({"code": -32000, "message": "unknown account"}));
        }
        let data = abi::from_hex(tx["data"].as_str().unwrap_or("0x")).unwrap();
        let (selector, args) = data.split_at(4);
        if selector != self.selector("registrarObra") {
            return Err(json!({"code": -32601, "message": "unknown selector"}));
        }
        let strings: Vec<String> = abi::decode(
            &[ParamType::String, ParamType::String, ParamType::String],
            args,
        )
        .unwrap()
        .into_iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

        let mut state = self.state.lock().unwrap();
        state.block += 1;
        let block = state.block;
        let hash = format!("0x{:064x}", block);
        if state.never_mine {
            return Ok(json!(hash));
        }

        if std::mem::take(&mut state.revert_next) {
            state.receipts.insert(
                hash.clone(),
                json!({
                    "transactionHash": hash,
                    "blockNumber": format!("0x{:x}", block),
                    "status": "0x0",
                    "logs": [],
                }),
            );
            return Ok(json!(hash));
        }

        let timestamp = 1_700_000_000 + block;
        state.records.push(StoredRecord {
            payload: strings[0].clone(),
            location: strings[1].clone(),
            kind: strings[2].clone(),
            reporter: from.clone(),
            timestamp,
            active: true,
        });
        let id = state.records.len() as u64;

        let event = self.deployment.event("ObraRegistrada").unwrap();
        let log_data = abi::encode(
            &[ParamType::String, ParamType::String, ParamType::Uint(256)],
            &[
                LedgerValue::String(strings[1].clone()),
                LedgerValue::String(strings[2].clone()),
                LedgerValue::Uint(LedgerUint::from_u64(timestamp)),
            ],
        )
        .unwrap();
        let mut reporter_word = vec![0u8; 12];
        reporter_word.extend(abi::from_hex(&from).unwrap());

        state.receipts.insert(
            hash.clone(),
            json!({
                "transactionHash": hash,
                "blockNumber": format!("0x{:x}", block),
                "status": "0x1",
                "logs": [
                    // Unrelated contract emitting at the same time.
                    {
                        "address": "0x0000000000000000000000000000000000000001",
                        "topics": [],
                        "data": "0x",
                    },
                    {
                        "address": self.deployment.contract_address,
                        "topics": [
                            abi::to_hex(&event.topic().unwrap()),
                            word_hex(id),
                            abi::to_hex(&reporter_word),
                        ],
                        "data": abi::to_hex(&log_data),
                    }
                ],
            }),
        );
        Ok(json!(hash))
    }

    fn receipt(&self, params: &Value) -> RpcResult {
        let hash = params[0].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock().unwrap();
        if !state.polled.contains(&hash) {
            state.polled.push(hash);
            return Ok(Value::Null);
        }
        Ok(state.receipts.get(&hash).cloned().unwrap_or(Value::Null))
    }

    fn handle(&self, method: &str, params: &Value) -> RpcResult {
        match method {
            "eth_call" => self.eth_call(params),
            "eth_sendTransaction" => self.send_transaction(params),
            "eth_getTransactionReceipt" => self.receipt(params),
            "eth_accounts" => Ok(json!([ACCOUNT])),
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", self.state.lock().unwrap().block))),
            _ => Err(json!({"code": -32601, "message": "method not found"})),
        }
    }
}

async fn rpc(State(node): State<Arc<Node>>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default();
    let stalled = method == "eth_call" && node.state.lock().unwrap().stall_calls;
    if stalled {
        tokio::time::sleep(STALL).await;
    }
    let response = match node.handle(method, &request["params"]) {
        Ok(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
        Err(error) => json!({"jsonrpc": "2.0", "id": request["id"], "error": error}),
    };
    Json(response)
}

/// Serve a fresh node on an ephemeral port of the current runtime.
pub async fn spawn_node() -> (String, Arc<Node>) {
    let node = Arc::new(Node {
        deployment: deployment(),
        state: Mutex::new(NodeState::default()),
    });
    let app = Router::new().route("/", post(rpc)).with_state(node.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (url, node)
}

/// Serve a fresh node from a background thread, for synchronous tests that
/// drive the node from another process.
pub fn spawn_node_thread() -> (String, Arc<Node>) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        runtime.block_on(async {
            tx.send(spawn_node().await).expect("test is waiting");
            std::future::pending::<()>().await;
        });
    });
    rx.recv().expect("node started")
}
