use std::fmt::{Debug, Display};
use std::ops::{AddAssign, MulAssign, SubAssign};

use num_traits::{Float as NumFloat, FromPrimitive};

/// Marker trait for the primal value type carried by traces (`f32`, `f64`).
///
/// Bundles the numeric and utility traits the sweeps and the sparse matrix
/// store need. Only primitive float types implement this; [`Active`](crate::Active)
/// does not.
pub trait Float:
    NumFloat
    + FromPrimitive
    + AddAssign
    + SubAssign
    + MulAssign
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}
