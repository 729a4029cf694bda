use crate::error::{Arity, Result};
use crate::float::Float;
use crate::opcode::OpCode;

impl<F: Float> super::Tape<F> {
    /// Propagate `adjoints` from the end of the tape back to the inputs.
    ///
    /// Entries with a zero adjoint are skipped. The adjoint of every
    /// non-input entry is cleared once consumed, so after the call only the
    /// input slots hold meaningful values.
    pub(crate) fn reverse_core(&self, values: &[F], adjoints: &mut [F]) {
        let zero = F::zero();
        for i in (0..self.opcodes.len()).rev() {
            let adj = adjoints[i];
            if adj == zero {
                continue;
            }

            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => {}
                op => {
                    adjoints[i] = zero;
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let (da, db) = self.entry_partials(i, values);
                    adjoints[a_idx as usize] += da * adj;
                    if op.is_binary() {
                        adjoints[b_idx as usize] += db * adj;
                    }
                }
            }
        }
    }

    /// Vector-Jacobian product `seedsᵀ·J` evaluated at `values`.
    ///
    /// `values` is either the tape's own buffer or one produced by
    /// [`forward_into`](Self::forward_into). Outputs that were extracted more
    /// than once accumulate their seeds.
    pub fn reverse_from(&self, values: &[F], seeds: &[F]) -> Result<Vec<F>> {
        self.check_arity(Arity::Seeds, self.num_outputs(), seeds.len())?;

        let mut adjoints = vec![F::zero(); self.opcodes.len()];
        for (&idx, &s) in self.output_indices.iter().zip(seeds) {
            adjoints[idx as usize] += s;
        }
        self.reverse_core(values, &mut adjoints);

        Ok(self
            .input_indices
            .iter()
            .map(|&idx| adjoints[idx as usize])
            .collect())
    }

    /// Reverse sweep at the values of the last forward sweep.
    pub fn reverse(&self, seeds: &[F]) -> Result<Vec<F>> {
        self.reverse_from(&self.values, seeds)
    }

    /// Gradient of a scalar trace at `inputs`.
    ///
    /// Fails with [`TraceMismatch`](crate::Error::TraceMismatch) unless the
    /// trace has exactly one output.
    pub fn gradient(&mut self, inputs: &[F]) -> Result<Vec<F>> {
        self.check_arity(Arity::Outputs, 1, self.num_outputs())?;
        self.forward(inputs)?;
        self.reverse(&[F::one()])
    }

    /// One forward sweep at `inputs`, then one reverse sweep per seed.
    ///
    /// Row `k` of the result is `seeds[k]ᵀ·J`.
    pub fn jacobian_rows<S: AsRef<[F]>>(
        &mut self,
        inputs: &[F],
        seeds: &[S],
    ) -> Result<Vec<Vec<F>>> {
        for s in seeds {
            self.check_arity(Arity::Seeds, self.num_outputs(), s.as_ref().len())?;
        }
        self.forward(inputs)?;
        seeds.iter().map(|s| self.reverse(s.as_ref())).collect()
    }

    /// Dense Jacobian at `inputs`, one reverse sweep per output.
    pub fn jacobian(&mut self, inputs: &[F]) -> Result<Vec<Vec<F>>> {
        self.forward(inputs)?;
        let m = self.num_outputs();
        let mut seed = vec![F::zero(); m];
        let mut rows = Vec::with_capacity(m);
        for k in 0..m {
            seed[k] = F::one();
            rows.push(self.reverse(&seed)?);
            seed[k] = F::zero();
        }
        Ok(rows)
    }
}
