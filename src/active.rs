//! Active scalars recorded onto an open trace.
//!
//! An [`Active`] is a value plus the trace index it was recorded at, borrowed
//! from the [`Recording`](crate::Recording) that produced it. Every arithmetic
//! operation on an active value appends an opcode to that recording. Values
//! without a trace behind them are constants and cost nothing until they meet
//! an active operand.

use std::cell::RefCell;
use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};
use crate::tape::{Tape, CONSTANT};

/// Scalar recorded onto an open trace.
///
/// `Copy`, and only valid while the recording that produced it is alive; the
/// borrow checker enforces this through `'r`. Mixing actives of two open
/// recordings marks both traces as foreign, and ending either one fails with
/// [`Error::ForeignActive`](crate::Error::ForeignActive).
#[derive(Clone, Copy)]
pub struct Active<'r, F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
    pub(crate) tape: Option<&'r RefCell<Tape<F>>>,
}

impl<'r, F: Float> Active<'r, F> {
    /// Create a constant (not tracked on any trace).
    #[inline]
    pub fn constant(value: F) -> Self {
        Active {
            value,
            index: CONSTANT,
            tape: None,
        }
    }

    #[inline]
    pub(crate) fn on_tape(value: F, index: u32, tape: &'r RefCell<Tape<F>>) -> Self {
        Active {
            value,
            index,
            tape: Some(tape),
        }
    }

    /// Primal value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Trace index, or [`CONSTANT`] for constants.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// True if no trace depends on this value.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.tape.is_none()
    }

    #[inline]
    fn slot(&self, tape: &mut Tape<F>) -> u32 {
        if self.index == CONSTANT {
            tape.push_const(self.value)
        } else {
            self.index
        }
    }

    /// Record a unary op.
    #[inline]
    pub(crate) fn unary(self, op: OpCode) -> Self {
        let value = opcode::eval(op, self.value, F::zero());
        match self.tape {
            None => Active::constant(value),
            Some(cell) => {
                let mut t = cell.borrow_mut();
                let xi = self.slot(&mut t);
                let index = t.push_op(op, xi, UNUSED, value);
                Active::on_tape(value, index, cell)
            }
        }
    }

    /// True if `self` was recorded on `cell`. Constants belong everywhere.
    #[inline]
    pub(crate) fn belongs_to(&self, cell: &RefCell<Tape<F>>) -> bool {
        self.tape.map_or(true, |own| std::ptr::eq(own, cell))
    }

    /// Record a binary op, promoting a constant operand onto the trace.
    ///
    /// An operand from another recording is poisoned on both traces and
    /// enters this one as a constant, so every index stays in bounds.
    #[inline]
    pub(crate) fn binary(self, rhs: Self, op: OpCode) -> Self {
        let value = opcode::eval(op, self.value, rhs.value);
        if let (Some(lhs_cell), Some(rhs_cell)) = (self.tape, rhs.tape) {
            if !std::ptr::eq(lhs_cell, rhs_cell) {
                lhs_cell.borrow_mut().foreign = true;
                rhs_cell.borrow_mut().foreign = true;
                return self.binary(Active::constant(rhs.value), op);
            }
        }
        match self.tape.or(rhs.tape) {
            None => Active::constant(value),
            Some(cell) => {
                let mut t = cell.borrow_mut();
                let li = self.slot(&mut t);
                let ri = rhs.slot(&mut t);
                let index = t.push_op(op, li, ri, value);
                Active::on_tape(value, index, cell)
            }
        }
    }

    /// Integer power.
    pub fn powi(self, exp: i32) -> Self {
        let value = opcode::eval_powi(self.value, exp);
        match self.tape {
            None => Active::constant(value),
            Some(cell) => {
                let mut t = cell.borrow_mut();
                let xi = self.slot(&mut t);
                let index = t.push_powi(xi, exp, value);
                Active::on_tape(value, index, cell)
            }
        }
    }
}

impl<F: Float> fmt::Debug for Active<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Active")
            .field("value", &self.value)
            .field("index", &self.index)
            .field("constant", &self.is_constant())
            .finish()
    }
}

impl<F: Float> Display for Active<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Active<'_, F> {
    fn default() -> Self {
        Active::constant(F::zero())
    }
}

impl<F: Float> PartialEq for Active<'_, F> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Active<'_, F> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

// ──────────────────────────────────────────────
//  Active ↔ Active operators
// ──────────────────────────────────────────────

macro_rules! active_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:expr) => {
        impl<'r, F: Float> $trait for Active<'r, F> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.binary(rhs, $op)
            }
        }

        impl<'r, F: Float> $assign_trait for Active<'r, F> {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                *self = self.binary(rhs, $op);
            }
        }

        impl<'r, F: Float> $trait<F> for Active<'r, F> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: F) -> Self {
                self.binary(Active::constant(rhs), $op)
            }
        }

        impl<'r, F: Float> $assign_trait<F> for Active<'r, F> {
            #[inline]
            fn $assign_method(&mut self, rhs: F) {
                *self = self.binary(Active::constant(rhs), $op);
            }
        }
    };
}

active_binop!(Add, add, AddAssign, add_assign, OpCode::Add);
active_binop!(Sub, sub, SubAssign, sub_assign, OpCode::Sub);
active_binop!(Mul, mul, MulAssign, mul_assign, OpCode::Mul);
active_binop!(Div, div, DivAssign, div_assign, OpCode::Div);

impl<F: Float> Neg for Active<'_, F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary(OpCode::Neg)
    }
}

// ──────────────────────────────────────────────
//  primitive ↔ Active operators
// ──────────────────────────────────────────────

macro_rules! primitive_lhs_ops {
    ($f:ty) => {
        impl<'r> Add<Active<'r, $f>> for $f {
            type Output = Active<'r, $f>;
            #[inline]
            fn add(self, rhs: Active<'r, $f>) -> Active<'r, $f> {
                Active::constant(self).binary(rhs, OpCode::Add)
            }
        }

        impl<'r> Sub<Active<'r, $f>> for $f {
            type Output = Active<'r, $f>;
            #[inline]
            fn sub(self, rhs: Active<'r, $f>) -> Active<'r, $f> {
                Active::constant(self).binary(rhs, OpCode::Sub)
            }
        }

        impl<'r> Mul<Active<'r, $f>> for $f {
            type Output = Active<'r, $f>;
            #[inline]
            fn mul(self, rhs: Active<'r, $f>) -> Active<'r, $f> {
                Active::constant(self).binary(rhs, OpCode::Mul)
            }
        }

        impl<'r> Div<Active<'r, $f>> for $f {
            type Output = Active<'r, $f>;
            #[inline]
            fn div(self, rhs: Active<'r, $f>) -> Active<'r, $f> {
                Active::constant(self).binary(rhs, OpCode::Div)
            }
        }
    };
}

primitive_lhs_ops!(f32);
primitive_lhs_ops!(f64);
