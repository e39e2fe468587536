use std::process;

use obra_registry::{Record, RecordFilter, Registry, RegistryError};

use super::{block_on, print_json};
use crate::config::Config;
use crate::ledger::open_registry;
use crate::wire::{record_json, record_text, records_json, stats_json};
use crate::{report_error, OutputFormat};

/// Connect, run `query`, and exit 1 with a report on any failure.
fn run<T, F, Fut>(config: &Config, output: OutputFormat, quiet: bool, query: F) -> T
where
    F: FnOnce(Registry) -> Fut,
    Fut: std::future::Future<Output = Result<T, RegistryError>>,
{
    let result = block_on(
        async {
            let registry = open_registry(config).await?;
            query(registry).await.map_err(|e| e.to_string())
        },
        output,
        quiet,
    );
    match result {
        Ok(value) => value,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_stats(config: &Config, output: OutputFormat, quiet: bool) {
    let (stats, block, contract) = run(config, output, quiet, |registry| async move {
        let stats = registry.summarize().await?;
        let block = registry.current_block().await?;
        let contract = registry.ledger().contract_address().map(str::to_string);
        Ok((stats, block, contract))
    });

    match output {
        OutputFormat::Json => print_json(&stats_json(&stats, block, contract.as_deref())),
        OutputFormat::Text => {
            if let Some(contract) = &contract {
                println!("Contract:   {}", contract);
            }
            println!("Block:      {}", block);
            println!("Total:      {}", stats.total);
            println!("Active:     {}", stats.active);
            println!("Inactive:   {}", stats.inactive);
            if stats.unreadable > 0 {
                println!("Unreadable: {}", stats.unreadable);
            }
        }
    }
}

pub(crate) fn cmd_list(config: &Config, active_only: bool, output: OutputFormat, quiet: bool) {
    let filter = if active_only {
        RecordFilter::ActiveOnly
    } else {
        RecordFilter::Any
    };
    let records = run(config, output, quiet, |registry| async move {
        registry.list_all(&filter).await
    });
    print_records(&records, output, quiet);
}

pub(crate) fn cmd_search(config: &Config, term: &str, output: OutputFormat, quiet: bool) {
    let records = run(config, output, quiet, |registry| async move {
        registry.search(term).await
    });
    print_records(&records, output, quiet);
}

pub(crate) fn cmd_get(config: &Config, id: i64, output: OutputFormat, quiet: bool) {
    let record = run(config, output, quiet, |registry| async move {
        registry.get_by_id(id).await
    });
    match output {
        OutputFormat::Json => print_json(&record_json(&record)),
        OutputFormat::Text => print!("{}", record_text(&record)),
    }
}

fn print_records(records: &[Record], output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => print_json(&records_json(records)),
        OutputFormat::Text => {
            if records.is_empty() {
                if !quiet {
                    println!("No obras found.");
                }
                return;
            }
            for record in records {
                println!("{}", record_text(record));
            }
            if !quiet {
                println!("{} obra(s)", records.len());
            }
        }
    }
}
