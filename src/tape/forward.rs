use crate::error::{Arity, Result};
use crate::float::Float;
use crate::opcode::OpCode;

impl<F: Float> super::Tape<F> {
    /// Replay the tape at new inputs (forward sweep).
    ///
    /// Overwrites the stored values in place. Fails with
    /// [`TraceMismatch`](crate::Error::TraceMismatch) if `inputs` does not
    /// have exactly one entry per seeded input.
    pub fn forward(&mut self, inputs: &[F]) -> Result<()> {
        self.check_arity(Arity::Inputs, self.num_inputs(), inputs.len())?;

        for (&idx, &v) in self.input_indices.iter().zip(inputs) {
            self.values[idx as usize] = v;
        }

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                _ => {
                    let v = self.eval_entry(i, &self.values);
                    self.values[i] = v;
                }
            }
        }
        Ok(())
    }

    /// Forward sweep into an external buffer, leaving the tape untouched.
    ///
    /// Pair with [`reverse_from`](Self::reverse_from) when several threads
    /// share one tape.
    pub fn forward_into(&self, inputs: &[F], values: &mut Vec<F>) -> Result<()> {
        self.check_arity(Arity::Inputs, self.num_inputs(), inputs.len())?;

        values.clear();
        values.extend_from_slice(&self.values);
        for (&idx, &v) in self.input_indices.iter().zip(inputs) {
            values[idx as usize] = v;
        }

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                _ => {
                    let v = self.eval_entry(i, values);
                    values[i] = v;
                }
            }
        }
        Ok(())
    }

    /// First-order forward (tangent) propagation at `values`.
    ///
    /// `direction[k]` seeds the k-th input. Returns the tangent of every tape
    /// entry; callers read outputs through
    /// [`output_indices`](Self::output_indices).
    pub(crate) fn tangent_core(&self, values: &[F], direction: &[F]) -> Vec<F> {
        let zero = F::zero();
        let mut tangents = vec![zero; self.opcodes.len()];
        for (&idx, &d) in self.input_indices.iter().zip(direction) {
            tangents[idx as usize] = d;
        }

        for i in 0..self.opcodes.len() {
            let op = self.opcodes[i];
            match op {
                OpCode::Input | OpCode::Const => continue,
                _ => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let ta = tangents[a_idx as usize];
                    let tb = if op.is_binary() {
                        tangents[b_idx as usize]
                    } else {
                        zero
                    };
                    if ta == zero && tb == zero {
                        continue;
                    }
                    let (da, db) = self.entry_partials(i, values);
                    let mut t = zero;
                    if ta != zero {
                        t += da * ta;
                    }
                    if tb != zero {
                        t += db * tb;
                    }
                    tangents[i] = t;
                }
            }
        }
        tangents
    }

    /// Forward sweep plus one tangent direction.
    ///
    /// Returns `(outputs, J·direction)`.
    pub fn tangent(&mut self, inputs: &[F], direction: &[F]) -> Result<(Vec<F>, Vec<F>)> {
        self.check_arity(Arity::Direction, self.num_inputs(), direction.len())?;
        self.forward(inputs)?;
        let tangents = self.tangent_core(&self.values, direction);
        let out = self
            .output_indices
            .iter()
            .map(|&idx| tangents[idx as usize])
            .collect();
        Ok((self.output_values(), out))
    }
}
