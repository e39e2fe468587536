//! JSON-RPC 2.0 over HTTP.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

use super::abi;
use crate::error::LedgerError;

/// JSON-RPC error code nodes use for execution reverts.
const REVERT_CODE: i64 = 3;

pub(crate) struct RpcTransport {
    url: String,
    agent: ureq::Agent,
    next_id: AtomicU64,
}

impl RpcTransport {
    pub(crate) fn new(url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        RpcTransport {
            url: url.to_string(),
            agent,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Invoke `method` and return its `result` member.
    pub(crate) async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let agent = self.agent.clone();
        let url = self.url.clone();

        let envelope = tokio::task::spawn_blocking(move || {
            let response = agent
                .post(&url)
                .send_json(&request)
                .map_err(|e| LedgerError::Unavailable(format!("{}: {}", url, e)))?;
            response
                .into_body()
                .read_json::<Value>()
                .map_err(|e| {
                    LedgerError::MalformedResponse(format!(
                        "failed to parse response as JSON: {}",
                        e
                    ))
                })
        })
        .await
        .map_err(|e| LedgerError::Unavailable(format!("task join error: {}", e)))??;

        tracing::trace!(method, "json-rpc call answered");
        parse_envelope(envelope)
    }
}

/// Split a JSON-RPC response into its result or a typed error.
pub(crate) fn parse_envelope(envelope: Value) -> Result<Value, LedgerError> {
    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        if code == REVERT_CODE || message.to_lowercase().contains("revert") {
            let reason = error
                .get("data")
                .and_then(revert_data)
                .and_then(|data| abi::decode_revert_reason(&data))
                .unwrap_or(message);
            return Err(LedgerError::Reverted { reason });
        }
        return Err(LedgerError::Rpc { code, message });
    }

    envelope
        .get("result")
        .cloned()
        .ok_or_else(|| LedgerError::MalformedResponse("response has no result".to_string()))
}

/// Revert data is either a hex string or an object carrying one under `data`.
fn revert_data(data: &Value) -> Option<Vec<u8>> {
    let hex = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    abi::from_hex(hex).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::abi::{encode, ParamType, ERROR_STRING_SELECTOR};
    use crate::record::LedgerValue;

    #[test]
    fn result_is_extracted() {
        let value = parse_envelope(json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"})).unwrap();
        assert_eq!(value, json!("0x10"));
    }

    #[test]
    fn null_result_is_kept() {
        let value = parse_envelope(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn revert_reason_is_decoded_from_data() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(
            encode(&[ParamType::String], &[LedgerValue::String("Obra no existe".into())]).unwrap(),
        );
        let err = parse_envelope(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3, "message": "execution reverted", "data": abi::to_hex(&data)},
        }))
        .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Reverted {
                reason: "Obra no existe".to_string()
            }
        );
    }

    #[test]
    fn revert_without_data_keeps_message() {
        let err = parse_envelope(json!({
            "error": {"code": -32000, "message": "VM Exception while processing transaction: revert"},
        }))
        .unwrap_err();
        assert!(err.is_revert());
    }

    #[test]
    fn other_errors_are_rpc_errors() {
        let err = parse_envelope(json!({
            "error": {"code": -32601, "message": "method not found"},
        }))
        .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Rpc {
                code: -32601,
                message: "method not found".to_string()
            }
        );
    }

    #[test]
    fn missing_result_is_malformed() {
        assert!(matches!(
            parse_envelope(json!({"jsonrpc": "2.0", "id": 1})),
            Err(LedgerError::MalformedResponse(_))
        ));
    }
}
