//! Conformance test suite for `LedgerClient` implementations.
//!
//! A backend-agnostic suite that any `LedgerClient` can run to verify it
//! behaves like the registry contract. The suite covers:
//!
//! - **Writes**: id assignment, confirmation events, block progression
//! - **Reads**: verbatim read-back, reverts outside `[1, count]`
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty ledger with at least one signing account:
//!
//! ```ignore
//! use obra_ledger::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         InMemoryLedger::with_accounts(vec!["0xaa".into()])
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod read;
mod write;

use std::fmt;
use std::future::Future;

use crate::record::RecordSubmission;
use crate::LedgerClient;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "read", "write").
    pub category: String,
    /// Test name (e.g. "first_write_gets_id_1").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a ledger backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// ledger, ensuring test isolation.
pub async fn run_conformance_suite<L, F, Fut>(factory: F) -> ConformanceReport
where
    L: LedgerClient,
    F: Fn() -> Fut,
    Fut: Future<Output = L>,
{
    let mut results = Vec::new();

    results.extend(write::run_write_tests(&factory).await);
    results.extend(read::run_read_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// First signing account of the ledger, as the registry writer would pick it.
async fn signer<L: LedgerClient>(ledger: &L) -> Result<String, String> {
    let accounts = ledger.accounts().await.map_err(|e| e.to_string())?;
    accounts
        .into_iter()
        .next()
        .ok_or_else(|| "ledger exposes no signing account".to_string())
}

fn make_submission(signer: &str, location: &str) -> RecordSubmission {
    RecordSubmission {
        payload_json: r#"{"evaluacionRiesgos":[{"categoria":"hidrologico","severidad":"alta"}]}"#
            .to_string(),
        location: location.to_string(),
        kind: "Canalización".to_string(),
        signer: signer.to_string(),
        gas_limit: 5_000_000,
        gas_price: 0,
    }
}

async fn count_of<L: LedgerClient>(ledger: &L) -> Result<u64, String> {
    ledger
        .record_count()
        .await
        .and_then(|c| c.to_u64())
        .map_err(|e| e.to_string())
}
