//! Application state and the bridge from handlers into the registry.

use std::future::Future;
use std::time::Duration;

use obra_registry::{Registry, RegistryError};

use super::error::ApiError;

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// `None` when the ledger could not be reached at startup.
    pub(crate) registry: Option<Registry>,
    /// Node URL, reported on the info route.
    pub(crate) rpc_url: String,
    /// Upper bound on one request's ledger work.
    pub(crate) request_timeout: Duration,
}

impl AppState {
    pub(crate) fn contract_address(&self) -> Option<&str> {
        self.registry
            .as_ref()
            .and_then(|r| r.ledger().contract_address())
    }

    /// Run `op` against the registry under the request timeout.
    pub(crate) async fn call<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(Registry) -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let registry = self.registry.clone().ok_or(ApiError::LedgerNotConnected)?;
        tokio::time::timeout(self.request_timeout, op(registry))
            .await
            .map_err(|_| ApiError::Timeout(self.request_timeout))?
            .map_err(ApiError::Registry)
    }
}
