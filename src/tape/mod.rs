//! Recorded traces.
//!
//! A [`Tape`] stores opcodes and operand indices rather than precomputed
//! multipliers, so it can be replayed at new inputs without re-recording.
//! Inputs and outputs are tracked by their position on the tape; seeding and
//! extraction may interleave with ordinary operations.
//!
//! # Limitations
//!
//! The tape records one execution path. If the recorded function branches on
//! primal values, replaying at inputs that take the other branch yields the
//! derivatives of the recorded branch.

use crate::error::{Arity, Error, Result};
use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};
use crate::store::Tag;

// Submodules, each adds impl blocks to Tape<F>
mod forward;
mod reverse;
mod sparsity;

/// Sentinel index for constants that were never promoted onto a tape.
pub const CONSTANT: u32 = u32::MAX;

/// A closed trace that can be replayed at different inputs.
///
/// Built through a [`Recording`](crate::Recording) and owned by a
/// [`TapeStore`](crate::TapeStore).
#[derive(Clone, Debug, Default)]
pub struct Tape<F: Float> {
    pub(crate) tag: Tag,
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    pub(crate) values: Vec<F>,
    pub(crate) input_indices: Vec<u32>,
    pub(crate) output_indices: Vec<u32>,
    /// Set when an active value of another recording reached this tape.
    pub(crate) foreign: bool,
}

impl<F: Float> Tape<F> {
    /// Create an empty tape for `tag`.
    pub fn new(tag: Tag) -> Self {
        Tape {
            tag,
            opcodes: Vec::new(),
            arg_indices: Vec::new(),
            values: Vec::new(),
            input_indices: Vec::new(),
            output_indices: Vec::new(),
            foreign: false,
        }
    }

    /// Create an empty tape with room for `est_ops` entries.
    pub fn with_capacity(tag: Tag, est_ops: usize) -> Self {
        Tape {
            tag,
            opcodes: Vec::with_capacity(est_ops),
            arg_indices: Vec::with_capacity(est_ops),
            values: Vec::with_capacity(est_ops),
            input_indices: Vec::new(),
            output_indices: Vec::new(),
            foreign: false,
        }
    }

    #[inline]
    fn push_entry(&mut self, op: OpCode, args: [u32; 2], value: F) -> u32 {
        let idx = self.opcodes.len() as u32;
        self.opcodes.push(op);
        self.arg_indices.push(args);
        self.values.push(value);
        idx
    }

    /// Register a seeded input. Returns its tape index.
    #[inline]
    pub fn push_input(&mut self, value: F) -> u32 {
        let idx = self.push_entry(OpCode::Input, [UNUSED, UNUSED], value);
        self.input_indices.push(idx);
        idx
    }

    /// Register a constant. Returns its tape index.
    #[inline]
    pub fn push_const(&mut self, value: F) -> u32 {
        self.push_entry(OpCode::Const, [UNUSED, UNUSED], value)
    }

    /// Record an operation. Returns the result index.
    ///
    /// If every operand is a `Const` entry the result is folded into a
    /// single `Const` carrying the already computed value.
    #[inline]
    pub fn push_op(&mut self, op: OpCode, arg0: u32, arg1: u32, value: F) -> u32 {
        let arg0_const = self.opcodes[arg0 as usize] == OpCode::Const;
        let arg1_const = arg1 == UNUSED || self.opcodes[arg1 as usize] == OpCode::Const;
        if arg0_const && arg1_const {
            return self.push_const(value);
        }
        self.push_entry(op, [arg0, arg1], value)
    }

    /// Record an integer power. The exponent is stored in `arg_indices[1]`.
    #[inline]
    pub fn push_powi(&mut self, arg0: u32, exp: i32, value: F) -> u32 {
        if self.opcodes[arg0 as usize] == OpCode::Const {
            return self.push_const(value);
        }
        if exp == 1 {
            return arg0;
        }
        self.push_entry(OpCode::Powi, [arg0, opcode::powi_exp_encode(exp)], value)
    }

    /// Mark the entry at `index` as the next output.
    #[inline]
    pub fn push_output(&mut self, index: u32) {
        self.output_indices.push(index);
    }

    /// Tag this tape was recorded under.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Number of seeded inputs.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.input_indices.len()
    }

    /// Number of extracted outputs.
    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }

    /// Number of entries (inputs, constants and operations).
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.opcodes.len()
    }

    /// True if nothing was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// Tape indices of the seeded inputs, in seeding order.
    #[inline]
    pub fn input_indices(&self) -> &[u32] {
        &self.input_indices
    }

    /// Tape indices of the outputs, in extraction order.
    #[inline]
    pub fn output_indices(&self) -> &[u32] {
        &self.output_indices
    }

    /// Output values as of the recording or the last forward sweep.
    pub fn output_values(&self) -> Vec<F> {
        self.output_indices
            .iter()
            .map(|&idx| self.values[idx as usize])
            .collect()
    }

    /// Fail with [`Error::TraceMismatch`] unless `found == expected`.
    #[inline]
    pub(crate) fn check_arity(&self, what: Arity, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(Error::TraceMismatch {
                tag: self.tag,
                what,
                expected,
                found,
            })
        }
    }

    /// Evaluate entry `i` reading operands from `values`.
    #[inline]
    pub(crate) fn eval_entry(&self, i: usize, values: &[F]) -> F {
        let op = self.opcodes[i];
        let [a_idx, b_idx] = self.arg_indices[i];
        let a = values[a_idx as usize];
        match op {
            OpCode::Powi => opcode::eval_powi(a, opcode::powi_exp_decode(b_idx)),
            op if op.is_binary() => opcode::eval(op, a, values[b_idx as usize]),
            op => opcode::eval(op, a, F::zero()),
        }
    }

    /// Local partials `(∂v_i/∂v_a, ∂v_i/∂v_b)` of entry `i` at `values`.
    #[inline]
    pub(crate) fn entry_partials(&self, i: usize, values: &[F]) -> (F, F) {
        let op = self.opcodes[i];
        let [a_idx, b_idx] = self.arg_indices[i];
        let a = values[a_idx as usize];
        match op {
            OpCode::Powi => (
                opcode::powi_partial(a, opcode::powi_exp_decode(b_idx)),
                F::zero(),
            ),
            op if op.is_binary() => opcode::partials(op, a, values[b_idx as usize], values[i]),
            op => opcode::partials(op, a, F::zero(), values[i]),
        }
    }
}
