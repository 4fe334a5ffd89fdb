use std::sync::Arc;

use parking_lot::Mutex;

use conveyor_core::AckDecision;

/// One acknowledgment decision as seen by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    /// Transport-assigned delivery tag, unique per delivery (redeliveries
    /// get a fresh tag).
    pub delivery_tag: u64,
    /// 1-based attempt number for the underlying payload.
    pub attempt: u32,
    pub decision: AckDecision,
}

/// Shared, append-only record of every decision the bridge made.
#[derive(Debug, Clone, Default)]
pub struct AckLog {
    records: Arc<Mutex<Vec<AckRecord>>>,
}

impl AckLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: AckRecord) {
        self.records.lock().push(record);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AckRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of acknowledged deliveries.
    #[must_use]
    pub fn acknowledged(&self) -> usize {
        self.count(AckDecision::Acknowledge)
    }

    /// Number of rejected deliveries.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.count(AckDecision::Reject)
    }

    fn count(&self, decision: AckDecision) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.decision == decision)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_decision() {
        let log = AckLog::new();
        log.push(AckRecord {
            delivery_tag: 1,
            attempt: 1,
            decision: AckDecision::Acknowledge,
        });
        log.push(AckRecord {
            delivery_tag: 2,
            attempt: 1,
            decision: AckDecision::Reject,
        });
        log.push(AckRecord {
            delivery_tag: 3,
            attempt: 2,
            decision: AckDecision::Acknowledge,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.acknowledged(), 2);
        assert_eq!(log.rejected(), 1);
    }
}
