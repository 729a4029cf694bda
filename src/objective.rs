//! Interfaces of the objectives the pipeline differentiates.
//!
//! The objectives themselves live outside this crate. They are written once,
//! generic over [`Scalar`], and evaluated both with plain `f64` and with
//! [`Active`](crate::Active) values while a trace is recorded.

use crate::error::{Error, Result};
use crate::matrix::BaLayout;
use crate::scalar::Scalar;

// ──────────────────────────────────────────────
//  Gaussian mixture
// ──────────────────────────────────────────────

/// Dimensions of a Gaussian-mixture problem.
///
/// Parameters are laid out as `k` mixture weights, then `k` means of
/// dimension `d`, then `k` inverse-covariance factors of `d(d+1)/2` entries
/// each (log-diagonal first, then the strict lower triangle by columns).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixtureDims {
    /// Dimension of a data point.
    pub d: usize,
    /// Number of components.
    pub k: usize,
    /// Number of data points.
    pub n: usize,
}

impl MixtureDims {
    pub fn new(d: usize, k: usize, n: usize) -> Self {
        MixtureDims { d, k, n }
    }

    /// Entries of one inverse-covariance factor.
    pub fn icf_size(&self) -> usize {
        self.d * (self.d + 1) / 2
    }

    /// Total parameter count, `k(d+1)(d+2)/2`.
    pub fn param_count(&self) -> usize {
        self.k + self.d * self.k + self.icf_size() * self.k
    }

    /// Split a flat parameter vector into `(alphas, means, icf)`.
    pub fn split<'a, T>(&self, params: &'a [T]) -> Result<(&'a [T], &'a [T], &'a [T])> {
        if params.len() != self.param_count() {
            return Err(Error::Layout(format!(
                "{} mixture parameters, expected {}",
                params.len(),
                self.param_count()
            )));
        }
        let (alphas, rest) = params.split_at(self.k);
        let (means, icf) = rest.split_at(self.d * self.k);
        Ok((alphas, means, icf))
    }
}

/// A Gaussian-mixture negative log-likelihood over owned data points.
///
/// `objective` must equal `objective_other` plus the sum of
/// `objective_point` over all points; the default does exactly that.
pub trait MixtureObjective {
    fn dims(&self) -> MixtureDims;

    /// Full objective.
    fn objective<T: Scalar<Float = f64>>(&self, alphas: &[T], means: &[T], icf: &[T]) -> T {
        let mut err = self.objective_other(alphas, means, icf);
        for i in 0..self.dims().n {
            err += self.objective_point(i, alphas, means, icf);
        }
        err
    }

    /// Terms that do not depend on any single data point (normalisation and
    /// prior).
    fn objective_other<T: Scalar<Float = f64>>(&self, alphas: &[T], means: &[T], icf: &[T]) -> T;

    /// Contribution of data point `i`.
    fn objective_point<T: Scalar<Float = f64>>(
        &self,
        i: usize,
        alphas: &[T],
        means: &[T],
        icf: &[T],
    ) -> T;
}

// ──────────────────────────────────────────────
//  Bundle adjustment
// ──────────────────────────────────────────────

/// Residuals of one bundle-adjustment observation.
pub trait ReprojectionObjective {
    /// Weighted reprojection error of `point` seen by `cam` at `feature`.
    ///
    /// `cam` has [`BaLayout::cam_params`] entries, `point` has three.
    fn reprojection_error<T: Scalar<Float = f64>>(
        &self,
        cam: &[T],
        point: &[T],
        weight: T,
        feature: &[f64; 2],
    ) -> [T; 2];

    /// Regularisation residual of one observation weight.
    fn weight_error<T: Scalar<Float = f64>>(&self, weight: T) -> T;
}

/// Bundle-adjustment instance: parameter blocks and observations.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaProblem {
    /// Parameters per camera.
    pub cam_params: usize,
    /// Camera blocks, flattened.
    pub cams: Vec<f64>,
    /// Points, three coordinates each, flattened.
    pub points: Vec<f64>,
    /// One weight per observation.
    pub weights: Vec<f64>,
    /// `[camera, point]` of every observation.
    pub obs: Vec<[usize; 2]>,
    /// Measured feature of every observation.
    pub feats: Vec<[f64; 2]>,
}

impl BaProblem {
    pub fn n_cams(&self) -> usize {
        if self.cam_params == 0 {
            0
        } else {
            self.cams.len() / self.cam_params
        }
    }

    pub fn n_points(&self) -> usize {
        self.points.len() / BaLayout::POINT_DIM
    }

    pub fn n_obs(&self) -> usize {
        self.obs.len()
    }

    pub fn camera(&self, i: usize) -> &[f64] {
        &self.cams[i * self.cam_params..(i + 1) * self.cam_params]
    }

    pub fn point(&self, i: usize) -> &[f64] {
        &self.points[i * BaLayout::POINT_DIM..(i + 1) * BaLayout::POINT_DIM]
    }

    /// Check array lengths and observation indices.
    pub fn validate(&self) -> Result<()> {
        if self.cam_params == 0 || self.cams.len() % self.cam_params != 0 {
            return Err(Error::Layout(format!(
                "{} camera values for blocks of {}",
                self.cams.len(),
                self.cam_params
            )));
        }
        if self.points.len() % BaLayout::POINT_DIM != 0 {
            return Err(Error::Layout(format!("{} point coordinates", self.points.len())));
        }
        if self.weights.len() != self.obs.len() || self.feats.len() != self.obs.len() {
            return Err(Error::Layout(format!(
                "{} observations with {} weights and {} features",
                self.obs.len(),
                self.weights.len(),
                self.feats.len()
            )));
        }
        let (n, m) = (self.n_cams(), self.n_points());
        if let Some((i, o)) = self
            .obs
            .iter()
            .enumerate()
            .find(|(_, o)| o[0] >= n || o[1] >= m)
        {
            return Err(Error::Layout(format!(
                "observation {i} references camera {} and point {} of {n} and {m}",
                o[0], o[1]
            )));
        }
        Ok(())
    }

    pub fn layout(&self, weight_rows: bool) -> BaLayout {
        BaLayout {
            n_cams: self.n_cams(),
            n_points: self.n_points(),
            n_obs: self.n_obs(),
            cam_params: self.cam_params,
            weight_rows,
        }
    }

    /// All parameters in Jacobian column order: cameras, points, weights.
    pub fn parameters(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.cams.len() + self.points.len() + self.weights.len());
        x.extend_from_slice(&self.cams);
        x.extend_from_slice(&self.points);
        x.extend_from_slice(&self.weights);
        x
    }
}

/// Residuals of the whole problem: `(reproj_err, w_err)`.
///
/// `reproj_err` holds two entries per observation, `w_err` one.
pub fn ba_residuals<O: ReprojectionObjective>(
    objective: &O,
    problem: &BaProblem,
) -> Result<(Vec<f64>, Vec<f64>)> {
    problem.validate()?;
    let mut reproj = Vec::with_capacity(2 * problem.n_obs());
    let mut w_err = Vec::with_capacity(problem.n_obs());
    for (i, &[c, p]) in problem.obs.iter().enumerate() {
        let e = objective.reprojection_error(
            problem.camera(c),
            problem.point(p),
            problem.weights[i],
            &problem.feats[i],
        );
        reproj.extend_from_slice(&e);
        w_err.push(objective.weight_error(problem.weights[i]));
    }
    Ok((reproj, w_err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixture_parameter_count() {
        let dims = MixtureDims::new(3, 4, 10);
        assert_eq!(dims.param_count(), 4 * 4 * 5 / 2);
        let params = vec![0.0_f64; dims.param_count()];
        let (a, m, q) = dims.split(&params).unwrap();
        assert_eq!((a.len(), m.len(), q.len()), (4, 12, 24));
        assert!(dims.split(&params[1..]).is_err());
    }

    #[test]
    fn problem_rejects_dangling_observation() {
        let p = BaProblem {
            cam_params: 9,
            cams: vec![0.0; 9],
            points: vec![0.0; 3],
            weights: vec![1.0],
            obs: vec![[0, 1]],
            feats: vec![[0.0, 0.0]],
        };
        assert!(matches!(p.validate(), Err(Error::Layout(_))));
    }
}
