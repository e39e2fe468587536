use std::path::Path;
use std::process;

use serde_json::Value;

use super::{block_on, print_json};
use crate::config::Config;
use crate::ledger::open_registry;
use crate::wire::{record_text, registration_json};
use crate::{report_error, OutputFormat};

const DEFAULT_LOCATION: &str = "San Jose, Costa Rica";
const DEFAULT_KIND: &str = "Canalización";

/// `informacionGeneral.<field>` of a payload, if it is non-blank text.
fn general_info<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get("informacionGeneral")
        .and_then(|info| info.get(field))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Location and kind for a payload, unless given explicitly.
pub(crate) fn resolve_labels(
    payload: &Value,
    location: Option<&str>,
    kind: Option<&str>,
) -> (String, String) {
    let location = location
        .or_else(|| general_info(payload, "ubicacionObservada"))
        .unwrap_or(DEFAULT_LOCATION);
    let kind = kind
        .or_else(|| general_info(payload, "tipoObra"))
        .unwrap_or(DEFAULT_KIND);
    (location.to_string(), kind.to_string())
}

pub(crate) fn cmd_register(
    config: &Config,
    payload_path: &Path,
    location: Option<&str>,
    kind: Option<&str>,
    verify: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let payload: Value = match std::fs::read_to_string(payload_path)
        .map_err(|e| format!("could not read '{}': {}", payload_path.display(), e))
        .and_then(|text| {
            serde_json::from_str(&text)
                .map_err(|e| format!("could not parse '{}': {}", payload_path.display(), e))
        }) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let (location, kind) = resolve_labels(&payload, location, kind);

    if !quiet && output == OutputFormat::Text {
        println!("Location: {}", location);
        println!("Kind:     {}", kind);
    }

    let result = block_on(
        async {
            let registry = open_registry(config).await?;
            let outcome = if verify {
                registry
                    .register_and_verify(&location, &kind, &payload)
                    .await
                    .map(|(receipt, record)| (receipt, Some(record)))
            } else {
                registry
                    .register(&location, &kind, &payload)
                    .await
                    .map(|receipt| (receipt, None))
            };
            outcome.map_err(|e| e.to_string())
        },
        output,
        quiet,
    );

    let (receipt, record) = match result {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&registration_json(&receipt, record.is_some())),
        OutputFormat::Text => {
            println!("Registered obra #{}", receipt.id);
            println!("Transaction: {}", receipt.transaction_hash);
            println!("Block:       {}", receipt.block_number);
            if let Some(record) = record {
                println!("\nVerified:\n{}", record_text(&record));
            }
        }
    }
}
