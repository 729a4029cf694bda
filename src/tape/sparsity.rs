use crate::float::Float;
use crate::pattern::{self, JacobianPattern};

impl<F: Float> super::Tape<F> {
    /// Structural Jacobian sparsity of the recorded trace.
    ///
    /// Independent of the input values; a pattern detected once stays valid
    /// for every replay of the same trace.
    pub fn jacobian_pattern(&self) -> JacobianPattern {
        pattern::detect_jacobian_pattern(
            &self.opcodes,
            &self.arg_indices,
            &self.input_indices,
            &self.output_indices,
        )
    }
}
