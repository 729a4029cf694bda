//! Opcodes recorded on a trace.
//!
//! Each opcode is an elementary operation. [`eval`] evaluates one opcode and
//! [`partials`] returns its local derivatives; every sweep is built from
//! these two functions.

use num_traits::Float;

/// Sentinel used in `arg_indices[1]` for unary ops (second slot unused).
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes.
///
/// Binary ops use both `arg_indices` slots; unary ops use slot 0 only
/// (slot 1 = [`UNUSED`], except [`OpCode::Powi`] which stores the `i32`
/// exponent reinterpreted as `u32`).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Structural ──
    /// Seeded input variable (leaf).
    Input,
    /// Constant promoted onto the trace.
    Const,

    // ── Binary ──
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,

    // ── Unary ──
    Neg,
    Recip,
    Sqrt,
    /// Integer power. Exponent stored in `arg_indices[1]`.
    Powi,
    Exp,
    Ln,
    Sin,
    Cos,
    Atan,
    Abs,
}

impl OpCode {
    /// True if the op reads both argument slots as trace indices.
    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Max | OpCode::Min
        )
    }
}

/// Evaluate one opcode.
///
/// `b` is ignored for unary ops. [`OpCode::Powi`] goes through [`eval_powi`].
#[inline]
pub fn eval<T: Float>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Input | OpCode::Const => {
            unreachable!("Input/Const carry their value and are never re-evaluated")
        }
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Max => {
            if a >= b {
                a
            } else {
                b
            }
        }
        OpCode::Min => {
            if a <= b {
                a
            } else {
                b
            }
        }
        OpCode::Neg => -a,
        OpCode::Recip => a.recip(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Powi => unreachable!("powi is evaluated through eval_powi"),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Atan => a.atan(),
        OpCode::Abs => a.abs(),
    }
}

/// Evaluate `a^exp`.
#[inline]
pub fn eval_powi<T: Float>(a: T, exp: i32) -> T {
    a.powi(exp)
}

/// Local partial derivatives `(∂r/∂a, ∂r/∂b)` of one opcode.
///
/// `r` is the result value at the same operands. For unary ops the second
/// partial is zero.
#[inline]
pub fn partials<T: Float>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    match op {
        OpCode::Input | OpCode::Const => (zero, zero),
        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        // Ties go to the first operand, matching eval.
        OpCode::Max => {
            if a >= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Min => {
            if a <= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Neg => (-one, zero),
        OpCode::Recip => {
            let inv = one / a;
            (-inv * inv, zero)
        }
        OpCode::Sqrt => ((one + one).recip() / r, zero),
        OpCode::Powi => unreachable!("powi partials go through powi_partial"),
        OpCode::Exp => (r, zero),
        OpCode::Ln => (one / a, zero),
        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Atan => (one / (one + a * a), zero),
        OpCode::Abs => (a.signum(), zero),
    }
}

/// Derivative of `a^exp` with respect to `a`.
#[inline]
pub fn powi_partial<T: Float>(a: T, exp: i32) -> T {
    if exp == 0 {
        return T::zero();
    }
    let n = T::from(exp).unwrap_or_else(T::zero);
    n * a.powi(exp - 1)
}

/// Encode a `powi` exponent for storage in `arg_indices[1]`.
#[inline]
pub fn powi_exp_encode(exp: i32) -> u32 {
    exp as u32
}

/// Decode a `powi` exponent stored by [`powi_exp_encode`].
#[inline]
pub fn powi_exp_decode(slot: u32) -> i32 {
    slot as i32
}
