//! Compressed-row Jacobian storage.
//!
//! [`CsrBuilder`] assembles a [`CsrMatrix`] one row at a time in ascending
//! row order. Rows that are never pushed stay empty. [`BaSparseMat`] wraps the
//! builder with the column layout of a bundle-adjustment problem so that
//! per-observation blocks land in the right place.

use crate::error::{Error, Result};
use crate::float::Float;
use crate::pattern::JacobianPattern;

/// Frozen compressed-row matrix.
///
/// `row_ptr.len() == nrows + 1`, `row_ptr` is non-decreasing, and the column
/// indices of every row are unique and sorted.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsrMatrix<F> {
    pub nrows: usize,
    pub ncols: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<u32>,
    pub values: Vec<F>,
}

impl<F: Float> CsrMatrix<F> {
    /// Matrix with the structure of `pattern` and the given values, aligned
    /// with the pattern's entries.
    pub fn from_pattern(pattern: &JacobianPattern, values: Vec<F>) -> Result<Self> {
        if values.len() != pattern.nnz() {
            return Err(Error::Layout(format!(
                "{} values for a pattern with {} entries",
                values.len(),
                pattern.nnz()
            )));
        }
        Ok(CsrMatrix {
            nrows: pattern.nrows,
            ncols: pattern.ncols,
            row_ptr: pattern.row_ptr(),
            col_idx: pattern.cols.clone(),
            values,
        })
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row `r`.
    pub fn row(&self, r: usize) -> (&[u32], &[F]) {
        let span = self.row_ptr[r]..self.row_ptr[r + 1];
        (&self.col_idx[span.clone()], &self.values[span])
    }

    /// Entry `(r, c)`, zero if not stored.
    pub fn get(&self, r: usize, c: usize) -> F {
        let (cols, vals) = self.row(r);
        match cols.binary_search(&(c as u32)) {
            Ok(k) => vals[k],
            Err(_) => F::zero(),
        }
    }

    /// Row-major dense copy.
    pub fn to_dense(&self) -> Vec<Vec<F>> {
        let mut dense = vec![vec![F::zero(); self.ncols]; self.nrows];
        for (r, row) in dense.iter_mut().enumerate() {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                row[c as usize] = v;
            }
        }
        dense
    }

    /// `(row, col, value)` triplets in storage order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, F)> + '_ {
        (0..self.nrows).flat_map(move |r| {
            let (cols, vals) = self.row(r);
            cols.iter().zip(vals).map(move |(&c, &v)| (r, c as usize, v))
        })
    }

    /// Check the compressed-row invariants.
    pub fn is_well_formed(&self) -> bool {
        if self.row_ptr.len() != self.nrows + 1
            || self.row_ptr.first() != Some(&0)
            || self.row_ptr.last() != Some(&self.col_idx.len())
            || self.col_idx.len() != self.values.len()
        {
            return false;
        }
        if self.row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return false;
        }
        (0..self.nrows).all(|r| {
            let (cols, _) = self.row(r);
            cols.windows(2).all(|w| w[0] < w[1])
                && cols.iter().all(|&c| (c as usize) < self.ncols)
        })
    }
}

/// Incremental row-by-row builder for [`CsrMatrix`].
#[derive(Debug)]
pub struct CsrBuilder<F> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<F>,
}

impl<F: Float> CsrBuilder<F> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self::with_capacity(nrows, ncols, 0)
    }

    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Self {
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        row_ptr.push(0);
        CsrBuilder {
            nrows,
            ncols,
            row_ptr,
            col_idx: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
        }
    }

    /// Index of the next row that may be pushed.
    pub fn next_row(&self) -> usize {
        self.row_ptr.len() - 1
    }

    fn pad_to(&mut self, row: usize) {
        let end = self.col_idx.len();
        while self.next_row() < row {
            self.row_ptr.push(end);
        }
    }

    /// Append row `row`. Skipped rows are left empty.
    ///
    /// `cols` need not be sorted. Fails with [`Error::RowOutOfOrder`] if
    /// `row` was already written, and with [`Error::Layout`] on an
    /// out-of-range row or column or a repeated column.
    pub fn push_row(&mut self, row: usize, cols: &[u32], vals: &[F]) -> Result<()> {
        let expected = self.next_row();
        if row < expected {
            return Err(Error::RowOutOfOrder { row, expected });
        }
        if row >= self.nrows {
            return Err(Error::Layout(format!("row {row} outside {} rows", self.nrows)));
        }
        if cols.len() != vals.len() {
            return Err(Error::Layout(format!(
                "row {row} has {} columns and {} values",
                cols.len(),
                vals.len()
            )));
        }

        let mut entries: Vec<(u32, F)> = cols.iter().copied().zip(vals.iter().copied()).collect();
        entries.sort_unstable_by_key(|&(c, _)| c);
        for w in entries.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(Error::Layout(format!("row {row} repeats column {}", w[0].0)));
            }
        }
        if let Some(&(c, _)) = entries.last() {
            if c as usize >= self.ncols {
                return Err(Error::Layout(format!("column {c} outside {} columns", self.ncols)));
            }
        }

        self.pad_to(row);
        for (c, v) in entries {
            self.col_idx.push(c);
            self.values.push(v);
        }
        self.row_ptr.push(self.col_idx.len());
        Ok(())
    }

    /// Freeze the matrix; trailing rows are left empty.
    pub fn finish(mut self) -> CsrMatrix<F> {
        let nrows = self.nrows;
        self.pad_to(nrows);
        CsrMatrix {
            nrows,
            ncols: self.ncols,
            row_ptr: self.row_ptr,
            col_idx: self.col_idx,
            values: self.values,
        }
    }
}

/// Small dense row-major block of local partials.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseBlock<F> {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<F>,
}

impl<F: Float> DenseBlock<F> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        DenseBlock {
            rows,
            cols,
            data: vec![F::zero(); rows * cols],
        }
    }

    /// Block from its rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<F>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(Error::Layout("ragged dense block".into()));
        }
        let n = rows.len();
        Ok(DenseBlock {
            rows: n,
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> F {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[F] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }
}

/// Row and column layout of a bundle-adjustment Jacobian.
///
/// Columns: all camera blocks, then all point blocks, then one weight per
/// observation. Rows: two reprojection residuals per observation, then
/// (with `weight_rows`) one weight residual per observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaLayout {
    pub n_cams: usize,
    pub n_points: usize,
    pub n_obs: usize,
    /// Parameters per camera.
    pub cam_params: usize,
    /// Append one weight-error row per observation.
    pub weight_rows: bool,
}

impl Default for BaLayout {
    fn default() -> Self {
        BaLayout {
            n_cams: 0,
            n_points: 0,
            n_obs: 0,
            cam_params: BaLayout::CAM_PARAMS,
            weight_rows: true,
        }
    }
}

impl BaLayout {
    /// Default camera block: rotation (3), center (3), focal, principal
    /// point (2), radial distortion (2).
    pub const CAM_PARAMS: usize = 11;
    /// Coordinates per point.
    pub const POINT_DIM: usize = 3;

    pub fn nrows(&self) -> usize {
        if self.weight_rows {
            3 * self.n_obs
        } else {
            2 * self.n_obs
        }
    }

    pub fn ncols(&self) -> usize {
        self.cam_params * self.n_cams + Self::POINT_DIM * self.n_points + self.n_obs
    }

    /// Width of one reprojection block: camera, point and weight.
    pub fn reproj_block_cols(&self) -> usize {
        self.cam_params + Self::POINT_DIM + 1
    }

    pub fn cam_col(&self, cam: usize) -> usize {
        self.cam_params * cam
    }

    pub fn point_col(&self, point: usize) -> usize {
        self.cam_params * self.n_cams + Self::POINT_DIM * point
    }

    pub fn weight_col(&self, obs: usize) -> usize {
        self.cam_params * self.n_cams + Self::POINT_DIM * self.n_points + obs
    }

    /// First of the two reprojection rows of `obs`.
    pub fn reproj_row(&self, obs: usize) -> usize {
        2 * obs
    }

    pub fn weight_row(&self, obs: usize) -> usize {
        2 * self.n_obs + obs
    }

    /// Entries of a fully assembled Jacobian.
    pub fn nnz(&self) -> usize {
        let reproj = 2 * self.reproj_block_cols() * self.n_obs;
        if self.weight_rows {
            reproj + self.n_obs
        } else {
            reproj
        }
    }
}

/// Bundle-adjustment Jacobian under construction.
///
/// Reprojection blocks must be inserted in ascending observation order,
/// then weight entries in ascending observation order.
#[derive(Debug)]
pub struct BaSparseMat<F> {
    layout: BaLayout,
    builder: CsrBuilder<F>,
    cols: Vec<u32>,
}

impl<F: Float> BaSparseMat<F> {
    pub fn new(layout: BaLayout) -> Self {
        BaSparseMat {
            layout,
            builder: CsrBuilder::with_capacity(layout.nrows(), layout.ncols(), layout.nnz()),
            cols: Vec::with_capacity(layout.reproj_block_cols()),
        }
    }

    pub fn layout(&self) -> &BaLayout {
        &self.layout
    }

    /// Insert the `2 × (cam_params + 4)` block of observation `obs`.
    ///
    /// Block columns are ordered camera, point, weight.
    pub fn insert_reproj_block(
        &mut self,
        obs: usize,
        cam: usize,
        point: usize,
        block: &DenseBlock<F>,
    ) -> Result<()> {
        let l = self.layout;
        if block.rows != 2 || block.cols != l.reproj_block_cols() {
            return Err(Error::Layout(format!(
                "reprojection block is {}x{}, expected 2x{}",
                block.rows,
                block.cols,
                l.reproj_block_cols()
            )));
        }
        if cam >= l.n_cams || point >= l.n_points || obs >= l.n_obs {
            return Err(Error::Layout(format!(
                "observation {obs} references camera {cam} and point {point}"
            )));
        }

        self.cols.clear();
        self.cols
            .extend((0..l.cam_params).map(|j| (l.cam_col(cam) + j) as u32));
        self.cols
            .extend((0..BaLayout::POINT_DIM).map(|j| (l.point_col(point) + j) as u32));
        self.cols.push(l.weight_col(obs) as u32);

        let row = l.reproj_row(obs);
        self.builder.push_row(row, &self.cols, block.row(0))?;
        self.builder.push_row(row + 1, &self.cols, block.row(1))
    }

    /// Insert `∂(weight error)/∂w` of observation `obs`.
    pub fn insert_weight_block(&mut self, obs: usize, value: F) -> Result<()> {
        if !self.layout.weight_rows {
            return Err(Error::Layout("layout has no weight rows".into()));
        }
        if obs >= self.layout.n_obs {
            return Err(Error::Layout(format!(
                "weight {obs} outside {} observations",
                self.layout.n_obs
            )));
        }
        let col = self.layout.weight_col(obs) as u32;
        self.builder
            .push_row(self.layout.weight_row(obs), &[col], &[value])
    }

    pub fn finish(self) -> CsrMatrix<F> {
        self.builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sorts_and_pads() {
        let mut b = CsrBuilder::<f64>::new(4, 3);
        b.push_row(1, &[2, 0], &[5.0, 1.0]).unwrap();
        b.push_row(3, &[1], &[7.0]).unwrap();
        let m = b.finish();
        assert_eq!(m.row_ptr, vec![0, 0, 2, 2, 3]);
        assert_eq!(m.col_idx, vec![0, 2, 1]);
        assert_eq!(m.get(1, 2), 5.0);
        assert_eq!(m.get(0, 0), 0.0);
        assert!(m.is_well_formed());
    }

    #[test]
    fn builder_rejects_rewind_and_repeats() {
        let mut b = CsrBuilder::<f64>::new(3, 3);
        b.push_row(1, &[0], &[1.0]).unwrap();
        assert_eq!(
            b.push_row(0, &[0], &[1.0]),
            Err(Error::RowOutOfOrder { row: 0, expected: 2 })
        );
        assert!(matches!(b.push_row(2, &[1, 1], &[1.0, 2.0]), Err(Error::Layout(_))));
        assert!(matches!(b.push_row(2, &[3], &[1.0]), Err(Error::Layout(_))));
    }

    #[test]
    fn layout_columns_are_contiguous() {
        let l = BaLayout {
            n_cams: 2,
            n_points: 3,
            n_obs: 4,
            cam_params: 9,
            weight_rows: true,
        };
        assert_eq!(l.ncols(), 18 + 9 + 4);
        assert_eq!(l.point_col(0), 18);
        assert_eq!(l.weight_col(3), 30);
        assert_eq!(l.nrows(), 12);
        assert_eq!(l.weight_row(0), 8);
    }
}
