//! Lazy enumeration of sweep configurations.

use crate::domain::models::{ExperimentParams, SweepConfig};

/// Cartesian product of the sweep axes, filtered by
/// [`ExperimentParams::is_feasible`]
///
/// Axes vary in the order `l, n, k, m, scores_mode, off_chain, rev_perc`,
/// with `rev_perc` varying fastest. Widths are taken from `base`.
/// The sequence is restartable: [`ExperimentSweep::configurations`] always
/// begins again from the first combination.
#[derive(Debug, Clone)]
pub struct ExperimentSweep {
    axes: SweepConfig,
    base: ExperimentParams,
}

impl ExperimentSweep {
    pub fn new(axes: SweepConfig, base: ExperimentParams) -> Self {
        Self { axes, base }
    }

    /// Size of the unfiltered product
    pub fn combination_count(&self) -> usize {
        self.radices().iter().product()
    }

    /// Feasible configurations, lazily
    pub fn configurations(&self) -> SweepIter<'_> {
        SweepIter {
            sweep: self,
            cursor: 0,
            end: self.combination_count(),
        }
    }

    fn radices(&self) -> [usize; 7] {
        let a = &self.axes;
        [
            a.ls.len(),
            a.ns.len(),
            a.ks.len(),
            a.ms.len(),
            a.scores_modes.len(),
            a.off_chain.len(),
            a.rev_percs.len(),
        ]
    }

    /// Decode a mixed-radix position into a configuration
    fn at(&self, mut position: usize) -> ExperimentParams {
        let radices = self.radices();
        let mut digits = [0usize; 7];
        for (digit, radix) in digits.iter_mut().zip(radices).rev() {
            *digit = position % radix;
            position /= radix;
        }
        let a = &self.axes;
        ExperimentParams {
            l: a.ls[digits[0]],
            n: a.ns[digits[1]],
            k: a.ks[digits[2]],
            m: a.ms[digits[3]],
            scores_mode: a.scores_modes[digits[4]],
            off_chain: a.off_chain[digits[5]],
            rev_perc: a.rev_percs[digits[6]],
            ..self.base.clone()
        }
    }
}

pub struct SweepIter<'a> {
    sweep: &'a ExperimentSweep,
    cursor: usize,
    end: usize,
}

impl Iterator for SweepIter<'_> {
    type Item = ExperimentParams;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.end {
            let params = self.sweep.at(self.cursor);
            self.cursor += 1;
            if params.is_feasible() {
                return Some(params);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.end - self.cursor))
    }
}
