//! Cost accounting records.
//!
//! Costs are opaque gas-equivalent units reported by the oracle for every
//! call. Per-proposal phases (submission, token approval, commitment,
//! reveal) are stored as a nested map keyed by proposal index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::experiment::{ExperimentParams, ScoresMode};

/// A cost leaf or a nested map of costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GasValue {
    Cost(u64),
    Nested(BTreeMap<usize, GasValue>),
}

impl GasValue {
    /// Sum of every leaf below this value.
    pub fn total(&self) -> u64 {
        match self {
            Self::Cost(cost) => *cost,
            Self::Nested(children) => children.values().map(Self::total).sum(),
        }
    }
}

/// Cost entries of one run keyed by phase name, plus the derived total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GasReport {
    #[serde(flatten)]
    pub entries: BTreeMap<String, GasValue>,
    pub total: u64,
}

impl GasReport {
    pub fn get(&self, key: &str) -> Option<&GasValue> {
        self.entries.get(key)
    }
}

/// Parameters block of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordParams {
    pub l: usize,
    pub n: usize,
    pub m: usize,
    pub k: usize,
    #[serde(rename = "scores_mode")]
    pub scores_mode: ScoresMode,
    pub off_chain: bool,
    pub rev_perc: f64,
    pub index_width: u16,
    pub score_width: u16,
    pub selection_completed: bool,
    /// Proposals whose reveal did not match their commitment
    #[serde(default)]
    pub rejected_reveals: Vec<usize>,
}

impl RecordParams {
    pub fn new(params: &ExperimentParams, selection_completed: bool) -> Self {
        Self {
            l: params.l,
            n: params.n,
            m: params.m,
            k: params.k,
            scores_mode: params.scores_mode,
            off_chain: params.off_chain,
            rev_perc: params.rev_perc,
            index_width: params.index_width,
            score_width: params.score_width,
            selection_completed,
            rejected_reveals: Vec::new(),
        }
    }
}

/// The document persisted once per run.
///
/// Only the `params` block is read back (see [`RecordParams`]); the gas
/// block is write-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub params: RecordParams,
    pub gas: GasReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_total() {
        let nested = GasValue::Nested(BTreeMap::from([
            (0, GasValue::Cost(10)),
            (1, GasValue::Cost(20)),
            (
                2,
                GasValue::Nested(BTreeMap::from([(0, GasValue::Cost(5))])),
            ),
        ]));
        assert_eq!(nested.total(), 35);
        assert_eq!(GasValue::Cost(7).total(), 7);
    }

    #[test]
    fn test_record_json_shape() {
        let mut entries = BTreeMap::new();
        entries.insert("deployment".to_string(), GasValue::Cost(100));
        entries.insert(
            "submission".to_string(),
            GasValue::Nested(BTreeMap::from([(0, GasValue::Cost(3)), (1, GasValue::Cost(4))])),
        );
        let record = MetricsRecord {
            params: RecordParams::new(&ExperimentParams::default(), false),
            gas: GasReport {
                entries,
                total: 107,
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["params"]["selectionCompleted"], false);
        assert_eq!(json["params"]["rejectedReveals"], serde_json::json!([]));
        assert_eq!(json["params"]["scores_mode"], "MATRIX");
        assert_eq!(json["params"]["offChain"], true);
        assert_eq!(json["params"]["revPerc"], 1.0);
        assert_eq!(json["params"]["indexWidth"], 256);
        assert_eq!(json["gas"]["deployment"], 100);
        assert_eq!(json["gas"]["submission"]["1"], 4);
        assert_eq!(json["gas"]["total"], 107);

        let params: RecordParams = serde_json::from_value(json["params"].clone()).unwrap();
        assert_eq!(params, record.params);
    }

    #[test]
    fn test_params_without_rejected_reveals_still_parse() {
        let json = serde_json::json!({
            "l": 4, "n": 8, "m": 2, "k": 5,
            "scores_mode": "MAP", "offChain": true, "revPerc": 1.0,
            "indexWidth": 256, "scoreWidth": 256, "selectionCompleted": true
        });
        let params: RecordParams = serde_json::from_value(json).unwrap();
        assert!(params.rejected_reveals.is_empty());
        assert!(params.selection_completed);
    }
}
