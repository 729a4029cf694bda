#![allow(dead_code)]

use adsweep::Scalar;

// ─── Banded residuals ──────────────────────────────────────────────────────
// r_i = x_i·x_{i+1} - sin(x_{i-1}), tridiagonal Jacobian.

pub fn banded<T: Scalar>(x: &[T]) -> Vec<T> {
    let n = x.len();
    (0..n)
        .map(|i| {
            let mut r = x[i] * x[i];
            if i + 1 < n {
                r = x[i] * x[i + 1];
            }
            if i > 0 {
                r -= x[i - 1].sin();
            }
            r
        })
        .collect()
}

// ─── Arrowhead residuals ───────────────────────────────────────────────────
// Banded plus a dense first column and a dense last row, the case where
// one-sided compression degenerates.

pub fn arrowhead<T: Scalar>(x: &[T]) -> Vec<T> {
    let mut r = banded(x);
    for ri in r.iter_mut() {
        *ri += x[0] * T::from_f64(0.5);
    }
    let mut total = T::zero();
    for &xi in x {
        total += xi * xi;
    }
    r.push(total);
    r
}

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}
