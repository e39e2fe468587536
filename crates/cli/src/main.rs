mod commands;
mod config;
mod ledger;
mod logging;
mod serve;
mod wire;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Query and register public works on the obra ledger.
#[derive(Parser)]
#[command(
    name = "obra",
    version,
    about = "Query and register public works on the obra ledger"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to the TOML configuration file (default: $OBRA_CONFIG, then ./obra.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config and $PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Serve a fresh in-process ledger instead of connecting to a node
        #[arg(long)]
        in_memory: bool,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Show total, active, and inactive obra counts
    Stats,

    /// List every readable obra
    List {
        /// Only active obras
        #[arg(long)]
        active: bool,
    },

    /// Show one obra by id
    Get {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Find obras whose location contains a term (case-insensitive)
    Search { term: String },

    /// Register a new obra from a JSON payload file
    Register {
        /// Path to the JSON payload
        #[arg(long)]
        payload: PathBuf,
        /// Location (default: payload informacionGeneral.ubicacionObservada)
        #[arg(long)]
        location: Option<String>,
        /// Work type (default: payload informacionGeneral.tipoObra)
        #[arg(long)]
        kind: Option<String>,
        /// Skip reading the record back after the write
        #[arg(long)]
        no_verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    logging::init_logging(config.logging.format, default_level);

    match cli.command {
        Commands::Serve {
            port,
            in_memory,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "error: --tls-cert and --tls-key must both be provided",
                    cli.output,
                    cli.quiet,
                );
                process::exit(1);
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let result = commands::block_on(
                async {
                    let registry = if in_memory {
                        Some(ledger::in_memory_registry(&config))
                    } else {
                        match ledger::open_registry(&config).await {
                            Ok(registry) => Some(registry),
                            Err(e) => {
                                tracing::warn!(error = %e, "could not connect to ledger");
                                None
                            }
                        }
                    };
                    serve::start_server(&config, registry, tls_cert, tls_key).await
                },
                cli.output,
                cli.quiet,
            );
            if let Err(e) = result {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Stats => commands::cmd_stats(&config, cli.output, cli.quiet),
        Commands::List { active } => commands::cmd_list(&config, active, cli.output, cli.quiet),
        Commands::Get { id } => commands::cmd_get(&config, id, cli.output, cli.quiet),
        Commands::Search { term } => commands::cmd_search(&config, &term, cli.output, cli.quiet),
        Commands::Register {
            payload,
            location,
            kind,
            no_verify,
        } => commands::cmd_register(
            &config,
            &payload,
            location.as_deref(),
            kind.as_deref(),
            !no_verify,
            cli.output,
            cli.quiet,
        ),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
