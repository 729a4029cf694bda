//! Structural Jacobian sparsity.
//!
//! Detection walks a trace forward, propagating for every entry the sorted set
//! of inputs it depends on. Sets stay small for traces built from many local
//! residuals, which is where the compressed extraction pays off.

use crate::opcode::OpCode;

/// Jacobian sparsity pattern in COO format.
///
/// Entries are sorted by `(row, col)` without duplicates. Rows index outputs,
/// columns index inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JacobianPattern {
    /// Number of outputs.
    pub nrows: usize,
    /// Number of inputs.
    pub ncols: usize,
    /// Row index of each structural nonzero.
    pub rows: Vec<u32>,
    /// Column index of each structural nonzero.
    pub cols: Vec<u32>,
}

impl JacobianPattern {
    /// Build a pattern from arbitrary `(row, col)` pairs.
    ///
    /// Pairs are sorted and deduplicated. Pairs outside `nrows × ncols` are
    /// dropped.
    pub fn from_entries<I>(nrows: usize, ncols: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut pairs: Vec<(u32, u32)> = entries
            .into_iter()
            .filter(|&(r, c)| (r as usize) < nrows && (c as usize) < ncols)
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        let (rows, cols) = pairs.into_iter().unzip();
        JacobianPattern {
            nrows,
            ncols,
            rows,
            cols,
        }
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Whether the pattern has no entries.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if `(row, col)` is a structural nonzero.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let key = (row as u32, col as u32);
        let mut lo = 0usize;
        let mut hi = self.rows.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match (self.rows[mid], self.cols[mid]).cmp(&key) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }

    /// Compressed row offsets: entries of row `r` are `row_ptr[r]..row_ptr[r + 1]`.
    pub fn row_ptr(&self) -> Vec<usize> {
        let mut ptr = vec![0usize; self.nrows + 1];
        for &r in &self.rows {
            ptr[r as usize + 1] += 1;
        }
        for r in 0..self.nrows {
            ptr[r + 1] += ptr[r];
        }
        ptr
    }

    /// Iterate `(row, col)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .map(|(&r, &c)| (r as usize, c as usize))
    }
}

/// Merge two sorted, deduplicated index lists.
fn union_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Propagate input dependencies through a trace.
///
/// Every operation depends on the union of its operands' dependencies;
/// `Powi` reads only slot 0. Inputs are numbered in seeding order.
pub(crate) fn detect_jacobian_pattern(
    opcodes: &[OpCode],
    arg_indices: &[[u32; 2]],
    input_indices: &[u32],
    output_indices: &[u32],
) -> JacobianPattern {
    let mut deps: Vec<Vec<u32>> = vec![Vec::new(); opcodes.len()];
    for (k, &idx) in input_indices.iter().enumerate() {
        deps[idx as usize].push(k as u32);
    }

    for i in 0..opcodes.len() {
        let op = opcodes[i];
        match op {
            OpCode::Input | OpCode::Const => continue,
            _ => {
                let [a, b] = arg_indices[i];
                deps[i] = if op.is_binary() && b != a {
                    union_sorted(&deps[a as usize], &deps[b as usize])
                } else {
                    deps[a as usize].clone()
                };
            }
        }
    }

    let mut rows = Vec::new();
    let mut cols = Vec::new();
    for (r, &idx) in output_indices.iter().enumerate() {
        for &c in &deps[idx as usize] {
            rows.push(r as u32);
            cols.push(c);
        }
    }

    JacobianPattern {
        nrows: output_indices.len(),
        ncols: input_indices.len(),
        rows,
        cols,
    }
}
