//! Experiment parameters and run plans.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::partition::{Assignment, Partition};
use crate::domain::errors::{ProtocolError, ProtocolResult};

/// How the oracle stores scores and what selection returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoresMode {
    /// Sparse per-review storage; selection returns no score matrix
    Map,
    /// Dense `n x n` storage; selection returns the score matrix
    #[default]
    Matrix,
}

impl ScoresMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "MAP",
            Self::Matrix => "MATRIX",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MAP" => Some(Self::Map),
            "MATRIX" => Some(Self::Matrix),
            _ => None,
        }
    }
}

impl fmt::Display for ScoresMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration snapshot of one experiment run.
///
/// Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentParams {
    /// Number of clusters
    #[serde(default = "default_l")]
    pub l: usize,

    /// Number of proposals
    #[serde(default = "default_n")]
    pub n: usize,

    /// Reviews per proposal
    #[serde(default = "default_m")]
    pub m: usize,

    /// Desired number of winners
    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default)]
    pub scores_mode: ScoresMode,

    /// Generate partition and assignment locally instead of inside the oracle
    #[serde(default = "default_true")]
    pub off_chain: bool,

    /// Fraction of proposals that reveal, in `(0, 1]`
    #[serde(default = "default_rev_perc")]
    pub rev_perc: f64,

    /// Bit width of proposal indices on the ledger
    #[serde(default = "default_width")]
    pub index_width: u16,

    /// Bit width of scores on the ledger
    #[serde(default = "default_width")]
    pub score_width: u16,
}

const fn default_l() -> usize {
    4
}

const fn default_n() -> usize {
    8
}

const fn default_m() -> usize {
    2
}

const fn default_k() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_rev_perc() -> f64 {
    1.0
}

const fn default_width() -> u16 {
    256
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            l: default_l(),
            n: default_n(),
            m: default_m(),
            k: default_k(),
            scores_mode: ScoresMode::default(),
            off_chain: default_true(),
            rev_perc: default_rev_perc(),
            index_width: default_width(),
            score_width: default_width(),
        }
    }
}

impl ExperimentParams {
    /// Range checks that must hold before any oracle call.
    pub fn validate(&self) -> ProtocolResult<()> {
        let invalid = |msg: String| Err(ProtocolError::InvalidConfiguration(msg));
        if self.l == 0 {
            return invalid("l must be at least 1".to_string());
        }
        if self.l > self.n {
            return invalid(format!("l ({}) cannot exceed n ({})", self.l, self.n));
        }
        if self.m == 0 {
            return invalid("m must be at least 1".to_string());
        }
        if self.k == 0 || self.k > self.n {
            return invalid(format!("k ({}) must be in 1..={}", self.k, self.n));
        }
        if !(self.rev_perc > 0.0 && self.rev_perc <= 1.0) {
            return invalid(format!("revPerc ({}) must be in (0, 1]", self.rev_perc));
        }
        for (name, width) in [("index", self.index_width), ("score", self.score_width)] {
            if width == 0 || width > 256 || width % 8 != 0 {
                return invalid(format!(
                    "{name} width ({width}) must be a multiple of 8 in 8..=256"
                ));
            }
        }
        Ok(())
    }

    /// Sweep predicate: `n >= 2k`, `n > 1.5 l` and `m <= n (l - 1) / l`.
    ///
    /// The last clause already implies `n > m`.
    pub fn is_feasible(&self) -> bool {
        let (l, n, m, k) = (self.l as f64, self.n as f64, self.m as f64, self.k as f64);
        n >= 2.0 * k && n > l * 1.5 && m <= n * (l - 1.0) / l
    }

    /// Number of proposals that reveal: indices `0..ceil(n * revPerc)`.
    pub fn reveal_count(&self) -> usize {
        ((self.n as f64 * self.rev_perc).ceil() as usize).min(self.n)
    }

    /// File stem under which this run's record is stored.
    pub fn record_name(&self) -> String {
        format!(
            "l{}_n{}_m{}_k{}_scores_{}_offChain_{}_revPerc_{}",
            self.l, self.n, self.m, self.k, self.scores_mode, self.off_chain, self.rev_perc
        )
    }
}

/// Where the partition and assignment of a run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutSource {
    /// Computed locally and pushed to the oracle
    OffChain,
    /// Computed by the oracle from `l` and `m`
    OnChain,
    /// Fixed layout pushed to the oracle as-is
    Provided {
        partition: Partition,
        assignment: Assignment,
    },
}

/// Where the scores of the evaluation phase come from.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationSource {
    /// Uniform in `min_score .. min_score + spread`
    Synthetic { min_score: u64, spread: u64 },
    /// Fixed scores per reviewer, aligned with the assignment rows
    Fixed(Vec<Vec<u64>>),
}

impl Default for EvaluationSource {
    fn default() -> Self {
        Self::Synthetic {
            min_score: 50,
            spread: 50,
        }
    }
}

/// Everything one run needs besides the oracle itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub params: ExperimentParams,
    pub layout: LayoutSource,
    pub evaluations: EvaluationSource,
    /// File stem of the persisted record
    pub record_name: String,
}

impl RunPlan {
    /// Plan driven by `params`: the layout follows `off_chain`.
    pub fn from_params(params: ExperimentParams, evaluations: EvaluationSource) -> Self {
        let layout = if params.off_chain {
            LayoutSource::OffChain
        } else {
            LayoutSource::OnChain
        };
        let record_name = params.record_name();
        Self {
            params,
            layout,
            evaluations,
            record_name,
        }
    }

    /// The fixed reference scenario: eight proposals in four pairs, two
    /// reviews each, five winners.
    pub fn paper(scores_mode: ScoresMode) -> ProtocolResult<Self> {
        let params = ExperimentParams {
            l: 4,
            n: 8,
            m: 2,
            k: 5,
            scores_mode,
            off_chain: true,
            rev_perc: 1.0,
            index_width: 256,
            score_width: 256,
        };
        let partition = Partition::new(vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7]])?;
        let assignment = Assignment::from_rows(vec![
            vec![3, 7],
            vec![2, 4],
            vec![0, 6],
            vec![1, 5],
            vec![3, 6],
            vec![1, 7],
            vec![0, 5],
            vec![2, 4],
        ]);
        let evaluations = vec![
            vec![0, 100],
            vec![80, 30],
            vec![83, 42],
            vec![77, 50],
            vec![65, 65],
            vec![56, 98],
            vec![29, 62],
            vec![75, 29],
        ];
        let record_name = format!("paper_{}", scores_mode.as_str().to_lowercase());
        Ok(Self {
            params,
            layout: LayoutSource::Provided {
                partition,
                assignment,
            },
            evaluations: EvaluationSource::Fixed(evaluations),
            record_name,
        })
    }
}
