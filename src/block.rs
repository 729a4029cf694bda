//! Block-structured bundle-adjustment Jacobian.
//!
//! Every observation depends on one camera, one point and one weight, so its
//! two reprojection residuals have a dense `2 × (cam_params + 4)` local
//! Jacobian. [`BlockJacobianAssembler`] records a small trace per
//! observation, reverse-sweeps it with identity seeds and drops the block
//! into the global matrix. Only one local trace is alive at a time.
//!
//! The weight residual depends on its weight alone; it is recorded once and
//! replayed with one tangent sweep per observation.

use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::matrix::{BaSparseMat, CsrMatrix, DenseBlock};
use crate::objective::{BaProblem, ReprojectionObjective};
use crate::store::{Tag, TapeStore};

/// Tag of the per-observation reprojection trace.
pub const REPROJ_TAG: Tag = 1;
/// Tag of the weight-error trace.
pub const WEIGHT_TAG: Tag = 2;

/// Residuals and Jacobian of a bundle-adjustment problem.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaJacobian {
    /// Two reprojection residuals per observation.
    pub reproj_err: Vec<f64>,
    /// One weight residual per observation.
    pub w_err: Vec<f64>,
    pub jacobian: CsrMatrix<f64>,
}

/// Assembles the bundle-adjustment Jacobian block by block.
#[derive(Clone, Copy, Debug)]
pub struct BlockJacobianAssembler<'o, O> {
    objective: &'o O,
    weight_rows: bool,
}

impl<'o, O: ReprojectionObjective> BlockJacobianAssembler<'o, O> {
    pub fn new(objective: &'o O) -> Self {
        BlockJacobianAssembler {
            objective,
            weight_rows: true,
        }
    }

    /// Include or omit the weight-error rows.
    pub fn with_weight_rows(mut self, weight_rows: bool) -> Self {
        self.weight_rows = weight_rows;
        self
    }

    /// Residuals and local `2 × (cam_params + 4)` block of one observation.
    ///
    /// Records under [`REPROJ_TAG`] in `store`, overwriting any earlier
    /// local trace. Block columns are camera, point, weight.
    pub fn local_block(
        &self,
        store: &TapeStore<f64>,
        cam: &[f64],
        point: &[f64],
        weight: f64,
        feature: &[f64; 2],
    ) -> Result<([f64; 2], DenseBlock<f64>)> {
        let rec = store.begin_recording(REPROJ_TAG)?;
        let err = {
            let acam = rec.seed_all(cam);
            let apoint = rec.seed_all(point);
            let aw = rec.seed(weight);
            let e = self
                .objective
                .reprojection_error(&acam, &apoint, aw, feature);
            [rec.extract(e[0])?, rec.extract(e[1])?]
        };
        rec.end()?;

        // The recording left the trace at these inputs; no forward replay.
        let eval = Evaluator::new(store);
        let rows = vec![
            eval.reverse_sweep(REPROJ_TAG, &[1.0, 0.0])?,
            eval.reverse_sweep(REPROJ_TAG, &[0.0, 1.0])?,
        ];
        Ok((err, DenseBlock::from_rows(rows)?))
    }

    fn record_weight_error(&self, store: &TapeStore<f64>, weight: f64) -> Result<()> {
        let rec = store.begin_recording(WEIGHT_TAG)?;
        {
            let aw = rec.seed(weight);
            rec.extract(self.objective.weight_error(aw))?;
        }
        rec.end()
    }

    /// Residuals and sparse Jacobian of `problem`.
    ///
    /// Observations are processed in ascending order, so the output is
    /// deterministic.
    pub fn assemble(&self, problem: &BaProblem) -> Result<BaJacobian> {
        problem.validate()?;
        let store = TapeStore::new();
        let mut mat = BaSparseMat::new(problem.layout(self.weight_rows));
        let mut reproj_err = Vec::with_capacity(2 * problem.n_obs());

        for (i, &[c, p]) in problem.obs.iter().enumerate() {
            let (err, block) = self.local_block(
                &store,
                problem.camera(c),
                problem.point(p),
                problem.weights[i],
                &problem.feats[i],
            )?;
            tracing::trace!(obs = i, cam = c, point = p, "reprojection block");
            reproj_err.extend_from_slice(&err);
            mat.insert_reproj_block(i, c, p, &block)?;
        }

        let w_err = self.weight_errors(&store, problem, &mut mat)?;
        let jacobian = mat.finish();
        tracing::info!(
            rows = jacobian.nrows,
            cols = jacobian.ncols,
            nnz = jacobian.nnz(),
            "block Jacobian assembled"
        );
        Ok(BaJacobian {
            reproj_err,
            w_err,
            jacobian,
        })
    }

    fn weight_errors(
        &self,
        store: &TapeStore<f64>,
        problem: &BaProblem,
        mat: &mut BaSparseMat<f64>,
    ) -> Result<Vec<f64>> {
        let Some(&w0) = problem.weights.first() else {
            return Ok(Vec::new());
        };
        self.record_weight_error(store, w0)?;

        let eval = Evaluator::new(store);
        let mut w_err = Vec::with_capacity(problem.n_obs());
        for (i, &w) in problem.weights.iter().enumerate() {
            let (err, d) = eval.tangent_sweep(WEIGHT_TAG, &[w], &[1.0])?;
            w_err.push(err[0]);
            if self.weight_rows {
                mat.insert_weight_block(i, d[0])?;
            }
        }
        Ok(w_err)
    }
}

#[cfg(feature = "parallel")]
impl<'o, O: ReprojectionObjective + Sync> BlockJacobianAssembler<'o, O> {
    /// [`assemble`](Self::assemble) with observations spread across rayon
    /// workers.
    ///
    /// Each worker records into its own store. Blocks are inserted afterwards
    /// in ascending observation order, so the result equals the serial one.
    pub fn assemble_par(&self, problem: &BaProblem) -> Result<BaJacobian> {
        use rayon::prelude::*;

        problem.validate()?;
        let blocks: Vec<([f64; 2], DenseBlock<f64>)> = problem
            .obs
            .par_iter()
            .enumerate()
            .map_init(TapeStore::new, |store, (i, &[c, p])| {
                self.local_block(
                    store,
                    problem.camera(c),
                    problem.point(p),
                    problem.weights[i],
                    &problem.feats[i],
                )
            })
            .collect::<Result<_>>()?;

        let mut mat = BaSparseMat::new(problem.layout(self.weight_rows));
        let mut reproj_err = Vec::with_capacity(2 * problem.n_obs());
        for (i, (err, block)) in blocks.iter().enumerate() {
            let [c, p] = problem.obs[i];
            reproj_err.extend_from_slice(err);
            mat.insert_reproj_block(i, c, p, block)?;
        }

        let store = TapeStore::new();
        let w_err = self.weight_errors(&store, problem, &mut mat)?;
        let jacobian = mat.finish();
        tracing::info!(
            rows = jacobian.nrows,
            cols = jacobian.ncols,
            nnz = jacobian.nnz(),
            "block Jacobian assembled in parallel"
        );
        Ok(BaJacobian {
            reproj_err,
            w_err,
            jacobian,
        })
    }
}
