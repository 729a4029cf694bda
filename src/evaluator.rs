//! Sweeps against a tagged trace.
//!
//! [`Evaluator`] is a thin handle over a [`TapeStore`]: every method looks up
//! the trace by tag and runs the corresponding sweep on it. Arity is checked
//! before anything is touched, so a mismatch never truncates.

use crate::error::Result;
use crate::float::Float;
use crate::store::{Tag, TapeStore};

/// Forward and reverse sweeps over the traces of one store.
#[derive(Clone, Copy, Debug)]
pub struct Evaluator<'s, F: Float = f64> {
    store: &'s TapeStore<F>,
}

impl<'s, F: Float> Evaluator<'s, F> {
    pub fn new(store: &'s TapeStore<F>) -> Self {
        Evaluator { store }
    }

    pub fn store(&self) -> &'s TapeStore<F> {
        self.store
    }

    /// Replay the trace at `inputs` and return its outputs.
    pub fn forward_sweep(&self, tag: Tag, inputs: &[F]) -> Result<Vec<F>> {
        self.store.with_tape_mut(tag, |t| {
            t.forward(inputs)?;
            Ok(t.output_values())
        })
    }

    /// Gradient of a single-output trace, one reverse pass.
    pub fn gradient_sweep(&self, tag: Tag, inputs: &[F]) -> Result<Vec<F>> {
        self.store.with_tape_mut(tag, |t| t.gradient(inputs))
    }

    /// One Jacobian row per output-seed vector.
    ///
    /// Row `k` is `seeds[k]ᵀ·J(inputs)`; with standard basis seeds these are
    /// the rows of the Jacobian.
    pub fn jacobian_sweep<S: AsRef<[F]>>(
        &self,
        tag: Tag,
        inputs: &[F],
        seeds: &[S],
    ) -> Result<Vec<Vec<F>>> {
        self.store.with_tape_mut(tag, |t| t.jacobian_rows(inputs, seeds))
    }

    /// Dense Jacobian, one reverse sweep per output.
    pub fn jacobian(&self, tag: Tag, inputs: &[F]) -> Result<Vec<Vec<F>>> {
        self.store.with_tape_mut(tag, |t| t.jacobian(inputs))
    }

    /// Outputs and `J·direction`, first-order forward mode.
    pub fn tangent_sweep(
        &self,
        tag: Tag,
        inputs: &[F],
        direction: &[F],
    ) -> Result<(Vec<F>, Vec<F>)> {
        self.store.with_tape_mut(tag, |t| t.tangent(inputs, direction))
    }

    /// Reverse sweep at the values left by the last forward sweep.
    pub fn reverse_sweep(&self, tag: Tag, seeds: &[F]) -> Result<Vec<F>> {
        self.store.with_tape(tag, |t| t.reverse(seeds))
    }
}
