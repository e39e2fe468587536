//! JSON shapes shared by the HTTP API and `--output json`.
//!
//! Field names are the ones existing API clients already consume.

use obra_registry::{Record, RegistrationReceipt, RegistryStats};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// RFC 3339 rendering of a Unix timestamp, or `null` when out of range.
fn fecha(timestamp: i64) -> Value {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .map_or(Value::Null, Value::String)
}

pub(crate) fn record_json(record: &Record) -> Value {
    json!({
        "id": record.id.to_string(),
        "ubicacion": record.location,
        "tipoObra": record.kind,
        "timestamp": record.created_at,
        "fecha": fecha(record.created_at),
        "reportadoPor": record.reported_by,
        "activo": record.active,
        "datos": record.payload,
    })
}

pub(crate) fn records_json(records: &[Record]) -> Value {
    json!({
        "total": records.len(),
        "obras": records.iter().map(record_json).collect::<Vec<_>>(),
    })
}

/// Counts are strings, as ledger integers always were on this API.
pub(crate) fn stats_json(
    stats: &RegistryStats,
    block_number: u64,
    contract_address: Option<&str>,
) -> Value {
    json!({
        "totalObras": stats.total.to_string(),
        "obrasActivas": stats.active.to_string(),
        "obrasInactivas": stats.inactive.to_string(),
        "obrasIlegibles": stats.unreadable.to_string(),
        "blockNumber": block_number.to_string(),
        "contractAddress": contract_address,
    })
}

pub(crate) fn registration_json(receipt: &RegistrationReceipt, verified: bool) -> Value {
    json!({
        "success": true,
        "obraId": receipt.id.to_string(),
        "transactionHash": receipt.transaction_hash,
        "blockNumber": receipt.block_number.to_string(),
        "verificada": verified,
    })
}

/// Human-readable block for one record.
pub(crate) fn record_text(record: &Record) -> String {
    let mut out = format!(
        "Obra #{} ({})\n  Location:    {}\n  Kind:        {}\n  Date:        {}\n  Reported by: {}\n",
        record.id,
        if record.active { "active" } else { "inactive" },
        record.location,
        record.kind,
        fecha(record.created_at).as_str().unwrap_or("-"),
        record.reported_by,
    );
    if let Some(risks) = record
        .payload
        .get("evaluacionRiesgos")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
    {
        out.push_str(&format!("  Risks:       {}\n", risks.len()));
        for (i, risk) in risks.iter().enumerate() {
            let field = |name: &str| risk.get(name).and_then(Value::as_str).unwrap_or("?");
            out.push_str(&format!(
                "    {}. [{}] {}\n",
                i + 1,
                field("severidad"),
                field("categoria")
            ));
        }
    }
    out
}
