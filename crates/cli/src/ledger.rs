//! Building a [`Registry`] from configuration.

use std::sync::Arc;

use obra_ledger::{Deployment, InMemoryLedger, JsonRpcLedger};
use obra_registry::Registry;

use crate::config::Config;

/// Signing account of the in-memory ledger.
pub(crate) const DEV_ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

/// Connect to the node named in `config` using its deployment descriptor.
pub(crate) async fn open_registry(config: &Config) -> Result<Registry, String> {
    let deployment = Deployment::load(&config.ledger.deployment).map_err(|e| e.to_string())?;
    let ledger = JsonRpcLedger::connect(&deployment, &config.json_rpc())
        .await
        .map_err(|e| e.to_string())?;
    Ok(Registry::new(Arc::new(ledger), config.write_policy()))
}

/// A registry over a fresh in-process ledger that signs as [`DEV_ACCOUNT`].
pub(crate) fn in_memory_registry(config: &Config) -> Registry {
    tracing::warn!("using in-memory ledger; records are lost on exit");
    let ledger = InMemoryLedger::with_accounts(vec![DEV_ACCOUNT.to_string()]);
    Registry::new(Arc::new(ledger), config.write_policy())
}
