//! Gradient drivers for the Gaussian-mixture objective.
//!
//! Two strategies, both exact:
//!
//! - **full**: one trace of the whole objective, one reverse sweep;
//! - **split**: one trace of the point-independent terms plus one short trace
//!   per data point, re-recorded in place, with the gradients accumulated.
//!   Peak trace memory no longer grows with the number of points.

use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::objective::MixtureObjective;
use crate::store::{Tag, TapeStore};

/// Tag of the point-independent part of the split objective.
pub const OTHER_TAG: Tag = 0;
/// Tag of the per-point trace of the split objective.
pub const INNER_TAG: Tag = 1;
/// Tag of the full-objective trace.
pub const FULL_TAG: Tag = 2;

/// Gradient of a mixture objective with respect to all its parameters.
#[derive(Debug)]
pub struct MixtureGradient<'o, O> {
    objective: &'o O,
    store: TapeStore<f64>,
}

impl<'o, O: MixtureObjective> MixtureGradient<'o, O> {
    pub fn new(objective: &'o O) -> Self {
        MixtureGradient {
            objective,
            store: TapeStore::new(),
        }
    }

    /// Store holding the recorded traces.
    pub fn store(&self) -> &TapeStore<f64> {
        &self.store
    }

    /// Record the full objective at `params` under [`FULL_TAG`].
    ///
    /// Returns the objective value. Later [`gradient`](Self::gradient) calls
    /// replay this trace.
    pub fn record(&self, params: &[f64]) -> Result<f64> {
        let dims = self.objective.dims();
        dims.split(params)?;
        let objective = self.objective;
        let out = self.store.record(FULL_TAG, params, |x| {
            // Arity was checked above.
            let (alphas, rest) = x.split_at(dims.k);
            let (means, icf) = rest.split_at(dims.d * dims.k);
            vec![objective.objective(alphas, means, icf)]
        })?;
        Ok(out[0])
    }

    /// Objective value and gradient at `params`, replaying the full trace.
    ///
    /// Records it first if nothing is stored yet.
    pub fn gradient(&self, params: &[f64]) -> Result<(f64, Vec<f64>)> {
        if !self.store.contains(FULL_TAG) {
            self.record(params)?;
        }
        let eval = Evaluator::new(&self.store);
        let err = eval.forward_sweep(FULL_TAG, params)?[0];
        let grad = eval.reverse_sweep(FULL_TAG, &[1.0])?;
        Ok((err, grad))
    }

    /// Objective value and gradient at `params`, one short trace per point.
    pub fn split_gradient(&self, params: &[f64]) -> Result<(f64, Vec<f64>)> {
        let dims = self.objective.dims();
        dims.split(params)?;
        let objective = self.objective;
        // Offsets of means and icf in the flat parameter vector.
        let (a, m) = (dims.k, dims.k + dims.d * dims.k);

        let mut err = self.store.record(OTHER_TAG, params, |x| {
            vec![objective.objective_other(&x[..a], &x[a..m], &x[m..])]
        })?[0];
        let eval = Evaluator::new(&self.store);
        let mut grad = eval.reverse_sweep(OTHER_TAG, &[1.0])?;

        for i in 0..dims.n {
            err += self.store.record(INNER_TAG, params, |x| {
                vec![objective.objective_point(i, &x[..a], &x[a..m], &x[m..])]
            })?[0];
            let g = eval.reverse_sweep(INNER_TAG, &[1.0])?;
            for (acc, gi) in grad.iter_mut().zip(g) {
                *acc += gi;
            }
        }
        tracing::debug!(points = dims.n, params = grad.len(), "split gradient accumulated");
        Ok((err, grad))
    }
}
