//! Per-run cost accumulator.

use std::collections::BTreeMap;

use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{
    ExperimentParams, GasReport, GasValue, MetricsRecord, ProposalIndex, RecordParams,
};

/// Phase keys of the persisted gas block
pub mod keys {
    pub const DEPLOYMENT: &str = "deployment";
    pub const FINALIZATION: &str = "finalization";
    pub const SUBMISSION: &str = "submission";
    pub const END_SUBMISSION: &str = "endSubmission";
    pub const PARTITIONING: &str = "partitioning";
    pub const ASSIGNMENT: &str = "assignment";
    pub const END_ASSIGNMENT: &str = "endAssignment";
    pub const TOKEN_APPROVAL: &str = "tokenApproval";
    pub const COMMITMENT: &str = "commitment";
    pub const END_COMMITMENT: &str = "endCommitment";
    pub const REVEAL: &str = "reveal";
    pub const END_REVEAL: &str = "endReveal";
    pub const SELECTION: &str = "selection";
    pub const END_SELECTION: &str = "endSelection";
}

/// Accumulates oracle call costs keyed by phase name
///
/// Per-proposal phases are sub-keyed by proposal index. Recording the same
/// key twice adds to the stored cost; recording a flat cost under a
/// per-proposal key (or the reverse) is refused and leaves the stored
/// costs untouched.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    entries: BTreeMap<String, GasValue>,
    rejected_reveals: Vec<ProposalIndex>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, cost: u64) -> ProtocolResult<()> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert(GasValue::Cost(0))
        {
            GasValue::Cost(existing) => {
                *existing += cost;
                Ok(())
            }
            GasValue::Nested(_) => Err(conflict(key, "per-proposal", "flat")),
        }
    }

    pub fn record_indexed(&mut self, key: &str, index: usize, cost: u64) -> ProtocolResult<()> {
        let GasValue::Nested(children) = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| GasValue::Nested(BTreeMap::new()))
        else {
            return Err(conflict(key, "flat", "per-proposal"));
        };
        match children.entry(index).or_insert(GasValue::Cost(0)) {
            GasValue::Cost(existing) => {
                *existing += cost;
                Ok(())
            }
            GasValue::Nested(_) => Err(conflict(&format!("{key}.{index}"), "nested", "flat")),
        }
    }

    /// Note a reveal the oracle refused; it is listed in the record's params
    pub fn reject_reveal(&mut self, proposal: ProposalIndex) {
        self.rejected_reveals.push(proposal);
    }

    pub fn rejected_reveals(&self) -> &[ProposalIndex] {
        &self.rejected_reveals
    }

    pub fn get(&self, key: &str) -> Option<&GasValue> {
        self.entries.get(key)
    }

    /// Sum of every recorded leaf
    pub fn total(&self) -> u64 {
        self.entries.values().map(GasValue::total).sum()
    }

    /// Close the run's accounting into a persistable record
    pub fn finish(self, params: &ExperimentParams, selection_completed: bool) -> MetricsRecord {
        let total = self.total();
        let mut record_params = RecordParams::new(params, selection_completed);
        record_params.rejected_reveals = self.rejected_reveals;
        MetricsRecord {
            params: record_params,
            gas: GasReport {
                entries: self.entries,
                total,
            },
        }
    }
}

fn conflict(key: &str, stored: &str, recorded: &str) -> ProtocolError {
    ProtocolError::RunState(format!(
        "gas key {key} holds {stored} costs, refusing a {recorded} cost"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_and_indexed_totals() {
        let mut metrics = MetricsCollector::new();
        metrics.record(keys::DEPLOYMENT, 1_000).unwrap();
        metrics.record(keys::FINALIZATION, 50).unwrap();
        for i in 0..4 {
            metrics
                .record_indexed(keys::SUBMISSION, i, 10 + i as u64)
                .unwrap();
        }
        assert_eq!(metrics.total(), 1_000 + 50 + 10 + 11 + 12 + 13);

        match metrics.get(keys::SUBMISSION) {
            Some(GasValue::Nested(children)) => assert_eq!(children.len(), 4),
            other => panic!("expected nested submission costs, got {other:?}"),
        }
    }

    #[test]
    fn test_repeated_record_accumulates() {
        let mut metrics = MetricsCollector::new();
        metrics.record(keys::PARTITIONING, 5).unwrap();
        metrics.record(keys::PARTITIONING, 7).unwrap();
        metrics.record_indexed(keys::REVEAL, 2, 3).unwrap();
        metrics.record_indexed(keys::REVEAL, 2, 4).unwrap();
        assert_eq!(metrics.get(keys::PARTITIONING), Some(&GasValue::Cost(12)));
        assert_eq!(metrics.total(), 19);
    }

    #[test]
    fn test_finish_without_selection_keys() {
        let mut metrics = MetricsCollector::new();
        metrics.record(keys::END_REVEAL, 30).unwrap();
        let record = metrics.finish(&ExperimentParams::default(), false);
        assert!(!record.params.selection_completed);
        assert!(record.params.rejected_reveals.is_empty());
        assert!(record.gas.get(keys::SELECTION).is_none());
        assert_eq!(record.gas.total, 30);
    }

    #[test]
    fn test_kind_conflict_keeps_recorded_costs() {
        let mut metrics = MetricsCollector::new();
        metrics.record_indexed(keys::SUBMISSION, 0, 40).unwrap();
        metrics.record_indexed(keys::SUBMISSION, 1, 60).unwrap();
        metrics.record(keys::DEPLOYMENT, 500).unwrap();

        let err = metrics.record(keys::SUBMISSION, 7).unwrap_err();
        assert!(matches!(err, ProtocolError::RunState(_)), "{err}");
        let err = metrics.record_indexed(keys::DEPLOYMENT, 0, 7).unwrap_err();
        assert!(matches!(err, ProtocolError::RunState(_)), "{err}");

        assert_eq!(metrics.get(keys::DEPLOYMENT), Some(&GasValue::Cost(500)));
        match metrics.get(keys::SUBMISSION) {
            Some(GasValue::Nested(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected nested submission costs, got {other:?}"),
        }
        assert_eq!(metrics.total(), 600);
    }

    #[test]
    fn test_rejected_reveals_reach_the_record() {
        let mut metrics = MetricsCollector::new();
        metrics.record_indexed(keys::REVEAL, 0, 10).unwrap();
        metrics.reject_reveal(1);
        metrics.record_indexed(keys::REVEAL, 2, 10).unwrap();
        assert_eq!(metrics.rejected_reveals(), &[1]);

        let record = metrics.finish(&ExperimentParams::default(), true);
        assert_eq!(record.params.rejected_reveals, vec![1]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["params"]["rejectedReveals"], serde_json::json!([1]));
    }
}
