//! The [`Scalar`] trait for writing trace-generic numeric code.
//!
//! Objectives written as `fn f<T: Scalar>(x: &[T]) -> T` run on plain `f64`
//! for residual evaluation and on [`Active`] while a trace is recorded.

use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::FromPrimitive;

use crate::active::Active;
use crate::float::Float;
use crate::opcode::OpCode;

/// Numeric type an objective can be evaluated with.
///
/// Unlike `num_traits::Float` this carries no `'static` bound, so the
/// borrowed [`Active`] type implements it.
pub trait Scalar:
    Copy
    + Debug
    + Display
    + Default
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn atan(self) -> Self;
    fn abs(self) -> Self;
    fn recip(self) -> Self;
    fn powi(self, exp: i32) -> Self;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;

    /// Lift an `f64` literal.
    #[inline]
    fn from_f64(val: f64) -> Self {
        Self::from_f(
            <Self::Float as FromPrimitive>::from_f64(val).unwrap_or_else(num_traits::Zero::zero),
        )
    }

    #[inline]
    fn zero() -> Self {
        Self::from_f(num_traits::Zero::zero())
    }

    #[inline]
    fn one() -> Self {
        Self::from_f(num_traits::One::one())
    }
}

macro_rules! impl_scalar_primitive {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }

            #[inline]
            fn value(&self) -> $f {
                *self
            }

            #[inline]
            fn exp(self) -> Self {
                <$f>::exp(self)
            }
            #[inline]
            fn ln(self) -> Self {
                <$f>::ln(self)
            }
            #[inline]
            fn sqrt(self) -> Self {
                <$f>::sqrt(self)
            }
            #[inline]
            fn sin(self) -> Self {
                <$f>::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                <$f>::cos(self)
            }
            #[inline]
            fn atan(self) -> Self {
                <$f>::atan(self)
            }
            #[inline]
            fn abs(self) -> Self {
                <$f>::abs(self)
            }
            #[inline]
            fn recip(self) -> Self {
                <$f>::recip(self)
            }
            #[inline]
            fn powi(self, exp: i32) -> Self {
                <$f>::powi(self, exp)
            }
            // Ties go to the first operand, as on a trace.
            #[inline]
            fn max(self, other: Self) -> Self {
                if self >= other {
                    self
                } else {
                    other
                }
            }
            #[inline]
            fn min(self, other: Self) -> Self {
                if self <= other {
                    self
                } else {
                    other
                }
            }
        }
    };
}

impl_scalar_primitive!(f32);
impl_scalar_primitive!(f64);

impl<'r, F: Float> Scalar for Active<'r, F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Active::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }

    #[inline]
    fn exp(self) -> Self {
        self.unary(OpCode::Exp)
    }
    #[inline]
    fn ln(self) -> Self {
        self.unary(OpCode::Ln)
    }
    #[inline]
    fn sqrt(self) -> Self {
        self.unary(OpCode::Sqrt)
    }
    #[inline]
    fn sin(self) -> Self {
        self.unary(OpCode::Sin)
    }
    #[inline]
    fn cos(self) -> Self {
        self.unary(OpCode::Cos)
    }
    #[inline]
    fn atan(self) -> Self {
        self.unary(OpCode::Atan)
    }
    #[inline]
    fn abs(self) -> Self {
        self.unary(OpCode::Abs)
    }
    #[inline]
    fn recip(self) -> Self {
        self.unary(OpCode::Recip)
    }
    #[inline]
    fn powi(self, exp: i32) -> Self {
        Active::powi(self, exp)
    }
    #[inline]
    fn max(self, other: Self) -> Self {
        self.binary(other, OpCode::Max)
    }
    #[inline]
    fn min(self, other: Self) -> Self {
        self.binary(other, OpCode::Min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypot<T: Scalar>(x: T, y: T) -> T {
        (x * x + y * y).sqrt()
    }

    #[test]
    fn generic_code_runs_on_primitives() {
        assert_eq!(hypot(3.0_f64, 4.0), 5.0);
        assert_eq!(hypot(3.0_f32, 4.0), 5.0);
        assert_eq!(<f64 as Scalar>::from_f64(0.5), 0.5);
    }

    #[test]
    fn generic_code_runs_on_constants() {
        let r = hypot(Active::constant(3.0_f64), Active::constant(4.0));
        assert!(r.is_constant());
        assert_eq!(r.value(), 5.0);
    }
}
