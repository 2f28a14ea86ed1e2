//! Local evaluation step: one score per assigned review target.

use rand::Rng;

use crate::domain::errors::{ProtocolError, ProtocolResult};
use crate::domain::models::{EvaluationSource, ProposalIndex};

/// Produces the scores a reviewer gives to its targets
pub trait Evaluator: Send + Sync {
    /// Scores aligned with `targets`
    fn evaluate(&self, reviewer: ProposalIndex, targets: &[ProposalIndex])
        -> ProtocolResult<Vec<u64>>;
}

/// Uniform scores in `min_score .. min_score + spread`
///
/// Uses the thread-local generator; runs are not reproducible.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticEvaluator {
    min_score: u64,
    spread: u64,
}

impl SyntheticEvaluator {
    pub fn new(min_score: u64, spread: u64) -> Self {
        Self { min_score, spread }
    }
}

impl Evaluator for SyntheticEvaluator {
    fn evaluate(
        &self,
        _reviewer: ProposalIndex,
        targets: &[ProposalIndex],
    ) -> ProtocolResult<Vec<u64>> {
        if self.spread == 0 {
            return Ok(vec![self.min_score; targets.len()]);
        }
        let mut rng = rand::thread_rng();
        Ok(targets
            .iter()
            .map(|_| self.min_score + rng.gen_range(0..self.spread))
            .collect())
    }
}

/// Pre-recorded scores, one row per reviewer
#[derive(Debug, Clone)]
pub struct FixedEvaluator {
    rows: Vec<Vec<u64>>,
}

impl FixedEvaluator {
    pub fn new(rows: Vec<Vec<u64>>) -> Self {
        Self { rows }
    }
}

impl Evaluator for FixedEvaluator {
    fn evaluate(
        &self,
        reviewer: ProposalIndex,
        targets: &[ProposalIndex],
    ) -> ProtocolResult<Vec<u64>> {
        let row = self.rows.get(reviewer).ok_or_else(|| {
            ProtocolError::InvalidConfiguration(format!("no fixed scores for proposal {reviewer}"))
        })?;
        if row.len() != targets.len() {
            return Err(ProtocolError::InvalidConfiguration(format!(
                "proposal {reviewer} has {} fixed scores for {} review targets",
                row.len(),
                targets.len()
            )));
        }
        Ok(row.clone())
    }
}

pub fn evaluator_for(source: &EvaluationSource) -> Box<dyn Evaluator> {
    match source {
        EvaluationSource::Synthetic { min_score, spread } => {
            Box::new(SyntheticEvaluator::new(*min_score, *spread))
        }
        EvaluationSource::Fixed(rows) => Box::new(FixedEvaluator::new(rows.clone())),
    }
}
