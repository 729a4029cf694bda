//! Reference objectives and random instances shared by the integration
//! tests and benches.

#![allow(dead_code)]

use adsweep::{BaProblem, MixtureDims, MixtureObjective, ReprojectionObjective, Scalar};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Route library events to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn lit<T: Scalar>(v: f64) -> T {
    T::from_f64(v)
}

// ─── Gaussian mixture ──────────────────────────────────────────────────────

/// Negative log-likelihood of a Gaussian mixture with a Wishart prior on
/// the inverse covariances. The prior's normalising constant is omitted.
pub struct ReferenceMixture {
    pub dims: MixtureDims,
    /// `n` points of dimension `d`, flattened.
    pub x: Vec<f64>,
    pub gamma: f64,
    pub m: i32,
}

fn logsumexp<T: Scalar>(v: &[T]) -> T {
    let mut mx = v[0];
    for &e in &v[1..] {
        mx = mx.max(e);
    }
    let mut sum = T::zero();
    for &e in v {
        sum += (e - mx).exp();
    }
    sum.ln() + mx
}

impl ReferenceMixture {
    fn icf_parts<'a, T: Scalar>(&self, icf: &'a [T], k: usize) -> &'a [T] {
        let sz = self.dims.icf_size();
        &icf[k * sz..(k + 1) * sz]
    }

    /// Lower-triangular `Q_k · v`; diagonal `exp(icf[..d])`, strict lower
    /// triangle from `icf[d..]` by columns.
    fn q_times<T: Scalar>(&self, icf_k: &[T], v: &[T]) -> Vec<T> {
        let d = self.dims.d;
        let mut out: Vec<T> = (0..d).map(|i| icf_k[i].exp() * v[i]).collect();
        let mut idx = d;
        for i in 0..d {
            for j in i + 1..d {
                out[j] += icf_k[idx] * v[i];
                idx += 1;
            }
        }
        out
    }
}

impl MixtureObjective for ReferenceMixture {
    fn dims(&self) -> MixtureDims {
        self.dims
    }

    fn objective_other<T: Scalar<Float = f64>>(&self, alphas: &[T], _means: &[T], icf: &[T]) -> T {
        let MixtureDims { d, k, n } = self.dims;
        let constant = -(n as f64) * (d as f64) * 0.5 * (2.0 * std::f64::consts::PI).ln();
        let half_gamma_sq = 0.5 * self.gamma * self.gamma;

        let mut prior = T::zero();
        for c in 0..k {
            let icf_k = self.icf_parts(icf, c);
            let mut frob = T::zero();
            let mut sum_qs = T::zero();
            for i in 0..d {
                let q = icf_k[i].exp();
                frob += q * q;
                sum_qs += icf_k[i];
            }
            for &l in &icf_k[d..] {
                frob += l * l;
            }
            prior += lit::<T>(half_gamma_sq) * frob - lit::<T>(self.m as f64) * sum_qs;
        }
        lit::<T>(constant) - lit::<T>(n as f64) * logsumexp(alphas) + prior
    }

    fn objective_point<T: Scalar<Float = f64>>(
        &self,
        i: usize,
        alphas: &[T],
        means: &[T],
        icf: &[T],
    ) -> T {
        let MixtureDims { d, k, .. } = self.dims;
        let xi = &self.x[i * d..(i + 1) * d];
        let mut main = Vec::with_capacity(k);
        for c in 0..k {
            let icf_k = self.icf_parts(icf, c);
            let centered: Vec<T> = (0..d).map(|j| T::from_f(xi[j]) - means[c * d + j]).collect();
            let qx = self.q_times(icf_k, &centered);
            let mut sum_qs = T::zero();
            for &q in &icf_k[..d] {
                sum_qs += q;
            }
            let mut sq = T::zero();
            for &e in &qx {
                sq += e * e;
            }
            main.push(alphas[c] + sum_qs - lit::<T>(0.5) * sq);
        }
        logsumexp(&main)
    }
}

/// Random mixture instance and a parameter vector to evaluate it at.
pub fn random_mixture(
    rng: &mut StdRng,
    d: usize,
    k: usize,
    n: usize,
) -> (ReferenceMixture, Vec<f64>) {
    let dims = MixtureDims::new(d, k, n);
    let x = (0..n * d).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let params = (0..dims.param_count())
        .map(|_| rng.gen_range(-0.5..0.5))
        .collect();
    (
        ReferenceMixture {
            dims,
            x,
            gamma: 1.0,
            m: 0,
        },
        params,
    )
}

// ─── Bundle adjustment ─────────────────────────────────────────────────────

/// Pinhole camera with Rodrigues rotation and two-term radial distortion.
///
/// Camera block: rotation (3), center (3), focal (1), principal point (2,
/// only with 11 parameters), radial distortion (2).
pub struct ReferenceReprojection;

fn cross<T: Scalar>(a: &[T], b: &[T]) -> [T; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn rodrigues_rotate<T: Scalar<Float = f64>>(rot: &[T], x: &[T]) -> [T; 3] {
    let sqtheta = rot[0] * rot[0] + rot[1] * rot[1] + rot[2] * rot[2];
    if sqtheta.value() != 0.0 {
        let theta = sqtheta.sqrt();
        let (c, s) = (theta.cos(), theta.sin());
        let inv = theta.recip();
        let w = [rot[0] * inv, rot[1] * inv, rot[2] * inv];
        let wx = cross(&w, x);
        let tmp = (w[0] * x[0] + w[1] * x[1] + w[2] * x[2]) * (T::one() - c);
        [
            x[0] * c + wx[0] * s + w[0] * tmp,
            x[1] * c + wx[1] * s + w[1] * tmp,
            x[2] * c + wx[2] * s + w[2] * tmp,
        ]
    } else {
        let rx = cross(rot, x);
        [x[0] + rx[0], x[1] + rx[1], x[2] + rx[2]]
    }
}

impl ReprojectionObjective for ReferenceReprojection {
    fn reprojection_error<T: Scalar<Float = f64>>(
        &self,
        cam: &[T],
        point: &[T],
        weight: T,
        feature: &[f64; 2],
    ) -> [T; 2] {
        let shifted = [point[0] - cam[3], point[1] - cam[4], point[2] - cam[5]];
        let xc = rodrigues_rotate(&cam[..3], &shifted);
        let p = [xc[0] / xc[2], xc[1] / xc[2]];

        let n = cam.len();
        let (k1, k2) = (cam[n - 2], cam[n - 1]);
        let rsq = p[0] * p[0] + p[1] * p[1];
        let l = T::one() + k1 * rsq + k2 * rsq * rsq;

        let focal = cam[6];
        let (u0, v0) = if n >= 11 {
            (cam[7], cam[8])
        } else {
            (T::zero(), T::zero())
        };
        [
            weight * (p[0] * l * focal + u0 - T::from_f(feature[0])),
            weight * (p[1] * l * focal + v0 - T::from_f(feature[1])),
        ]
    }

    fn weight_error<T: Scalar<Float = f64>>(&self, weight: T) -> T {
        T::one() - weight * weight
    }
}

fn random_camera(rng: &mut StdRng, cam_params: usize) -> Vec<f64> {
    let mut cam = Vec::with_capacity(cam_params);
    cam.extend((0..3).map(|_| rng.gen_range(-0.1..0.1)));
    cam.extend((0..3).map(|_| rng.gen_range(-0.5..0.5)));
    cam.push(rng.gen_range(1.0..2.0));
    if cam_params >= 11 {
        cam.extend((0..2).map(|_| rng.gen_range(-0.1..0.1)));
    }
    cam.extend((0..2).map(|_| rng.gen_range(-1e-2..1e-2)));
    cam
}

/// Random instance whose points sit in front of every camera.
pub fn random_ba(
    rng: &mut StdRng,
    cam_params: usize,
    n_cams: usize,
    n_points: usize,
    n_obs: usize,
) -> BaProblem {
    let cams = (0..n_cams).flat_map(|_| random_camera(rng, cam_params)).collect();
    let points = (0..n_points)
        .flat_map(|_| {
            [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(4.0..8.0),
            ]
        })
        .collect();
    // Every camera and every point is seen at least once when n_obs allows.
    let obs = (0..n_obs)
        .map(|i| {
            if i < n_cams.max(n_points) {
                [i % n_cams, i % n_points]
            } else {
                [rng.gen_range(0..n_cams), rng.gen_range(0..n_points)]
            }
        })
        .collect();
    let weights = (0..n_obs).map(|_| rng.gen_range(0.5..1.5)).collect();
    let feats = (0..n_obs)
        .map(|_| [rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)])
        .collect();
    BaProblem {
        cam_params,
        cams,
        points,
        weights,
        obs,
        feats,
    }
}

// ─── Helpers ───────────────────────────────────────────────────────────────

/// Central finite-difference gradient.
pub fn fd_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let mut xp = x.to_vec();
    (0..x.len())
        .map(|i| {
            let xi = xp[i];
            xp[i] = xi + h;
            let fp = f(&xp);
            xp[i] = xi - h;
            let fm = f(&xp);
            xp[i] = xi;
            (fp - fm) / (2.0 * h)
        })
        .collect()
}

/// Mixture objective at a flat parameter vector, plain `f64`.
pub fn mixture_value(obj: &ReferenceMixture, params: &[f64]) -> f64 {
    let (a, m, q) = obj.dims.split(params).unwrap();
    obj.objective(a, m, q)
}
