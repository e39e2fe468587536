//! Deployment descriptor written by the contract deployment tooling.
//!
//! ```json
//! {
//!   "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
//!   "deployer": "0xf17f52151EbEF6C7334FAD080c5704D77216b732",
//!   "deployedAt": "2025-03-01T12:00:00.000Z",
//!   "network": "LACNET Local",
//!   "abi": [ ... ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::abi::AbiEntry;
use crate::error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub contract_address: String,
    pub abi: Vec<AbiEntry>,
    #[serde(default)]
    pub deployer: Option<String>,
    #[serde(default)]
    pub deployed_at: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

impl Deployment {
    /// Read and parse a deployment descriptor from `path`.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| LedgerError::Config(format!("{} ({})", e, path.display())))
    }

    pub fn from_json(content: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(content)
            .map_err(|e| LedgerError::Config(format!("invalid deployment descriptor: {}", e)))
    }

    /// The ABI entry of the function named `name`.
    pub fn function(&self, name: &str) -> Result<&AbiEntry, LedgerError> {
        self.entry("function", name)
    }

    /// The ABI entry of the event named `name`.
    pub fn event(&self, name: &str) -> Result<&AbiEntry, LedgerError> {
        self.entry("event", name)
    }

    fn entry(&self, kind: &str, name: &str) -> Result<&AbiEntry, LedgerError> {
        self.abi
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .ok_or_else(|| {
                LedgerError::Config(format!(
                    "{} '{}' not found in contract abi",
                    kind, name
                ))
            })
    }
}
