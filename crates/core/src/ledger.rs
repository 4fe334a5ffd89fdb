use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// Per-key processed counts over a fixed, known key space.
///
/// Written by the consumer's success path (one increment per successfully
/// processed item) and read by the completion monitor. Verification reads
/// are a best-effort snapshot: the monitor only verifies after the idle
/// window has elapsed, so a read racing the very last in-flight increment
/// resolves on the next tick.
#[derive(Debug)]
pub struct ProcessingLedger {
    counts: Vec<AtomicU32>,
    total: AtomicU64,
}

impl ProcessingLedger {
    /// Create a ledger for keys `0..keys`.
    #[must_use]
    pub fn new(keys: usize) -> Self {
        let mut counts = Vec::with_capacity(keys);
        counts.resize_with(keys, || AtomicU32::new(0));
        Self {
            counts,
            total: AtomicU64::new(0),
        }
    }

    /// Size of the key space.
    #[must_use]
    pub fn key_space(&self) -> usize {
        self.counts.len()
    }

    /// Record one successful processing of `key`.
    ///
    /// Returns `false` when the key falls outside the key space; the caller
    /// is expected to reject such items rather than count them.
    pub fn record(&self, key: u64) -> bool {
        let Ok(idx) = usize::try_from(key) else {
            return false;
        };
        let Some(slot) = self.counts.get(idx) else {
            return false;
        };
        slot.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Release);
        true
    }

    /// Grand total of successful processings across all keys.
    ///
    /// This is the progress signal the completion monitor samples on each
    /// idle-check tick.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Current count for a single key.
    #[must_use]
    pub fn count(&self, key: usize) -> u32 {
        self.counts
            .get(key)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    /// Copy of all per-key counts.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        self.counts
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }

    /// Scan the full key space and report every key that was never
    /// processed or processed more than once.
    #[must_use]
    pub fn verify(&self) -> VerificationReport {
        let mut anomalies = Vec::new();
        for (key, slot) in self.counts.iter().enumerate() {
            match slot.load(Ordering::Relaxed) {
                0 => anomalies.push(Anomaly::Missing { key }),
                1 => {}
                count => anomalies.push(Anomaly::Duplicate { key, count }),
            }
        }
        VerificationReport {
            key_space: self.key_space(),
            total: self.total(),
            anomalies,
        }
    }
}

/// A single violation of the exactly-once invariant found at verification
/// time. Anomalies are reported, not fatal: duplicates in particular are an
/// accepted trade-off of at-least-once redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Anomaly {
    /// The key was never processed.
    Missing { key: usize },
    /// The key was processed more than once.
    Duplicate { key: usize, count: u32 },
}

/// Outcome of scanning the ledger over the full key space.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Size of the key space that was scanned.
    pub key_space: usize,
    /// Grand total of processings at scan time.
    pub total: u64,
    /// All missing/duplicate keys found.
    pub anomalies: Vec<Anomaly>,
}

impl VerificationReport {
    /// Whether every key was processed exactly once.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Number of keys that were never processed.
    #[must_use]
    pub fn missing(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a, Anomaly::Missing { .. }))
            .count()
    }

    /// Number of keys that were processed more than once.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a, Anomaly::Duplicate { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_count_and_total() {
        let ledger = ProcessingLedger::new(10);
        assert!(ledger.record(3));
        assert!(ledger.record(3));
        assert!(ledger.record(7));
        assert_eq!(ledger.count(3), 2);
        assert_eq!(ledger.count(7), 1);
        assert_eq!(ledger.total(), 3);
    }

    #[test]
    fn record_out_of_range_is_refused() {
        let ledger = ProcessingLedger::new(5);
        assert!(!ledger.record(5));
        assert!(!ledger.record(u64::MAX));
        assert_eq!(ledger.total(), 0);
    }

    #[test]
    fn verify_clean_when_all_keys_processed_once() {
        let ledger = ProcessingLedger::new(10);
        for key in 0..10 {
            ledger.record(key);
        }
        let report = ledger.verify();
        assert!(report.is_clean());
        assert_eq!(report.total, 10);
    }

    #[test]
    fn verify_reports_missing_and_duplicate_keys() {
        let ledger = ProcessingLedger::new(10);
        for key in 0..10 {
            if key != 4 {
                ledger.record(key);
            }
        }
        ledger.record(5);

        let report = ledger.verify();
        assert!(!report.is_clean());
        assert_eq!(report.missing(), 1);
        assert_eq!(report.duplicates(), 1);
        assert!(report.anomalies.contains(&Anomaly::Missing { key: 4 }));
        assert!(
            report
                .anomalies
                .contains(&Anomaly::Duplicate { key: 5, count: 2 })
        );
    }

    #[test]
    fn snapshot_matches_counts() {
        let ledger = ProcessingLedger::new(3);
        ledger.record(0);
        ledger.record(2);
        ledger.record(2);
        assert_eq!(ledger.snapshot(), vec![1, 0, 2]);
    }
}
