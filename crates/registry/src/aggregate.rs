use crate::error::RegistryError;
use crate::reader::{RegistryReader, ScanOutcome};
use crate::record::RegistryStats;

/// Summary statistics over the whole registry.
#[derive(Clone)]
pub struct Aggregator {
    reader: RegistryReader,
}

impl Aggregator {
    pub fn new(reader: RegistryReader) -> Self {
        Aggregator { reader }
    }

    pub async fn summarize(&self) -> Result<RegistryStats, RegistryError> {
        Ok(stats_of(&self.reader.scan().await?))
    }
}

/// Counts from a finished scan. Unreadable ids count as inactive.
pub fn stats_of(outcome: &ScanOutcome) -> RegistryStats {
    let active = outcome.records.iter().filter(|r| r.active).count() as u64;
    RegistryStats {
        total: outcome.count,
        active,
        inactive: outcome.count.saturating_sub(active),
        unreadable: outcome.skipped.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{ScanFailure, SkippedRecord};
    use crate::record::Record;
    use obra_ledger::LedgerError;
    use serde_json::json;

    fn record(id: u64, active: bool) -> Record {
        Record {
            id,
            location: "Lima".to_string(),
            kind: "Canal".to_string(),
            created_at: 0,
            reported_by: String::new(),
            active,
            payload: json!({}),
        }
    }

    #[test]
    fn unreadable_records_land_in_inactive() {
        let outcome = ScanOutcome {
            count: 4,
            records: vec![record(1, true), record(3, false), record(4, true)],
            skipped: vec![SkippedRecord {
                id: 2,
                failure: ScanFailure::Ledger(LedgerError::Reverted {
                    reason: "Obra no existe".to_string(),
                }),
            }],
        };
        assert_eq!(
            stats_of(&outcome),
            RegistryStats {
                total: 4,
                active: 2,
                inactive: 2,
                unreadable: 1,
            }
        );
    }

    #[test]
    fn empty_scan_is_all_zero() {
        assert_eq!(stats_of(&ScanOutcome::default()), RegistryStats::default());
    }
}
