//! Sparse Jacobians from a single global trace.
//!
//! The structural pattern is discovered from the trace, the row/column
//! dependency graph is covered and bicolored, and every color group is
//! evaluated with one compressed sweep: forward for column groups, reverse
//! for row groups. Entries are then read off the compressed results
//! directly. A [`CompressionPlan`] depends only on the pattern, so it can be
//! computed once and replayed at new inputs.

use crate::block::BaJacobian;
use crate::bicolor::{color_cover, Bicoloring, ConflictRule};
use crate::cover::{BipartiteGraphVertexCover, DEFAULT_COVER_EFFORT};
use crate::error::{Arity, Error, Result};
use crate::float::Float;
use crate::graph::{BipartiteGraph, BipartiteGraphView, Vertex, VertexOrdering};
use crate::matrix::CsrMatrix;
use crate::objective::{BaProblem, ReprojectionObjective};
use crate::pattern::JacobianPattern;
use crate::store::{Tag, TapeStore};
use crate::tape::Tape;

/// Tag of the global bundle-adjustment trace.
pub const BA_GLOBAL_TAG: Tag = 3;

/// How color groups are formed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compression {
    /// Column groups only, forward sweeps.
    Column,
    /// Row groups only, reverse sweeps.
    Row,
    /// Rows and columns from a bicolored vertex cover.
    Bidirectional(Bicoloring),
    /// Whichever of `Column`, `Row` and `Bidirectional(Greedy)` needs the
    /// fewest sweeps, in that order on ties.
    #[default]
    Auto,
}

/// Options of a [`SparsityDrivenExtractor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractOptions {
    pub compression: Compression,
    pub ordering: VertexOrdering,
    /// Upper bound on the number of compressed sweeps.
    pub max_colors: Option<usize>,
    /// Budget of the minimal-cover search.
    pub cover_effort: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            compression: Compression::Auto,
            ordering: VertexOrdering::LargestFirst,
            max_colors: None,
            cover_effort: DEFAULT_COVER_EFFORT,
        }
    }
}

/// Where one nonzero is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recovery {
    /// Row entry of the forward sweep of column group `g`.
    Forward(u32),
    /// Column entry of the reverse sweep of row group `g`.
    Reverse(u32),
}

/// Pattern, groups and per-nonzero recovery source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionPlan {
    pub pattern: JacobianPattern,
    /// Mode the groups were built with; never `Auto`.
    pub compression: Compression,
    /// Columns evaluated together in one forward sweep.
    pub column_groups: Vec<Vec<u32>>,
    /// Rows evaluated together in one reverse sweep.
    pub row_groups: Vec<Vec<u32>>,
    /// Aligned with the pattern's entries.
    pub recovery: Vec<Recovery>,
}

impl CompressionPlan {
    /// Build a plan for `pattern`.
    ///
    /// Fails with [`Error::CoverInfeasible`] when no mode fits within
    /// `options.max_colors`.
    pub fn new(pattern: JacobianPattern, options: &ExtractOptions) -> Result<Self> {
        let graph = BipartiteGraph::from_pattern(&pattern);
        let plan = match options.compression {
            Compression::Auto => {
                let mut best: Option<CompressionPlan> = None;
                let mut last_err = None;
                for mode in [
                    Compression::Column,
                    Compression::Row,
                    Compression::Bidirectional(Bicoloring::Greedy),
                ] {
                    match Self::for_mode(&pattern, &graph, mode, options) {
                        Ok(p)
                            if best
                                .as_ref()
                                .map_or(true, |b| p.num_sweeps() < b.num_sweeps()) =>
                        {
                            best = Some(p)
                        }
                        Ok(_) => {}
                        Err(e) => last_err = Some(e),
                    }
                }
                match (best, last_err) {
                    (Some(p), _) => p,
                    (None, Some(e)) => return Err(e),
                    (None, None) => unreachable!("auto compression tries at least one mode"),
                }
            }
            mode => Self::for_mode(&pattern, &graph, mode, options)?,
        };
        tracing::debug!(
            nnz = plan.pattern.nnz(),
            mode = ?plan.compression,
            column_groups = plan.column_groups.len(),
            row_groups = plan.row_groups.len(),
            "compression plan"
        );
        Ok(plan)
    }

    fn for_mode(
        pattern: &JacobianPattern,
        graph: &BipartiteGraph,
        mode: Compression,
        options: &ExtractOptions,
    ) -> Result<Self> {
        let mut cover = BipartiteGraphVertexCover::new(graph).with_effort(options.cover_effort);
        let sweeps = match mode {
            Compression::Column | Compression::Row => {
                let side: Vec<Vertex> = options
                    .ordering
                    .order(graph)
                    .into_iter()
                    .filter(|v| match v {
                        Vertex::Left(_) => mode == Compression::Row,
                        Vertex::Right(_) => mode == Compression::Column,
                    })
                    .collect();
                cover.cover_vertex_in_order(&side)?;
                let sweeps = color_cover(&mut cover, options.ordering, ConflictRule::Recoverable);
                if let Some(max) = options.max_colors.filter(|&m| sweeps > m) {
                    return Err(Error::CoverInfeasible {
                        reason: format!(
                            "{mode:?} compression needs {sweeps} sweeps, budget is {max}"
                        ),
                    });
                }
                sweeps
            }
            Compression::Bidirectional(policy) => {
                policy.bicolor(&mut cover, options.ordering, options.max_colors)?
            }
            Compression::Auto => unreachable!("resolved by the caller"),
        };

        let column_groups = cover.right_groups();
        let row_groups = cover.left_groups();
        debug_assert_eq!(sweeps, column_groups.len() + row_groups.len());

        let mut col_group_of = vec![u32::MAX; graph.right_count()];
        for (g, cols) in column_groups.iter().enumerate() {
            for &c in cols {
                col_group_of[c as usize] = g as u32;
            }
        }
        let mut row_group_of = vec![u32::MAX; graph.left_count()];
        for (g, rows) in row_groups.iter().enumerate() {
            for &r in rows {
                row_group_of[r as usize] = g as u32;
            }
        }

        let recovery = pattern
            .iter()
            .map(|(r, c)| {
                if cover.is_right_included(c) {
                    Recovery::Forward(col_group_of[c])
                } else {
                    Recovery::Reverse(row_group_of[r])
                }
            })
            .collect();

        Ok(CompressionPlan {
            pattern: pattern.clone(),
            compression: mode,
            column_groups,
            row_groups,
            recovery,
        })
    }

    /// Forward plus reverse sweeps per extraction.
    pub fn num_sweeps(&self) -> usize {
        self.column_groups.len() + self.row_groups.len()
    }

    /// Entry values from compressed sweep results.
    ///
    /// `forward[g][row]` and `reverse[g][col]` are the results of column
    /// group `g` and row group `g`.
    fn recover<F: Float>(&self, forward: &[Vec<F>], reverse: &[Vec<F>]) -> Vec<F> {
        self.pattern
            .iter()
            .zip(&self.recovery)
            .map(|((r, c), rec)| match *rec {
                Recovery::Forward(g) => forward[g as usize][r],
                Recovery::Reverse(g) => reverse[g as usize][c],
            })
            .collect()
    }
}

/// Outputs and sparse Jacobian at one input point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SparseJacobian<F> {
    pub outputs: Vec<F>,
    pub jacobian: CsrMatrix<F>,
}

/// Compressed sparse Jacobian extraction over the traces of one store.
#[derive(Clone, Copy, Debug)]
pub struct SparsityDrivenExtractor<'s, F: Float = f64> {
    store: &'s TapeStore<F>,
    options: ExtractOptions,
}

impl<'s, F: Float> SparsityDrivenExtractor<'s, F> {
    pub fn new(store: &'s TapeStore<F>) -> Self {
        Self::with_options(store, ExtractOptions::default())
    }

    pub fn with_options(store: &'s TapeStore<F>, options: ExtractOptions) -> Self {
        SparsityDrivenExtractor { store, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Structural pattern of the trace under `tag`.
    pub fn discover_pattern(&self, tag: Tag) -> Result<JacobianPattern> {
        self.store.with_tape(tag, |t| Ok(t.jacobian_pattern()))
    }

    /// Pattern discovery plus cover and coloring.
    pub fn plan(&self, tag: Tag) -> Result<CompressionPlan> {
        CompressionPlan::new(self.discover_pattern(tag)?, &self.options)
    }

    /// Sparse Jacobian at `inputs`, planning from scratch.
    pub fn extract(&self, tag: Tag, inputs: &[F]) -> Result<SparseJacobian<F>> {
        let plan = self.plan(tag)?;
        self.extract_with_plan(tag, inputs, &plan)
    }

    /// Sparse Jacobian at `inputs` using a plan computed earlier for the
    /// same trace.
    pub fn extract_with_plan(
        &self,
        tag: Tag,
        inputs: &[F],
        plan: &CompressionPlan,
    ) -> Result<SparseJacobian<F>> {
        self.store.with_tape_mut(tag, |tape| {
            tape.check_arity(Arity::Inputs, plan.pattern.ncols, tape.num_inputs())?;
            tape.check_arity(Arity::Outputs, plan.pattern.nrows, tape.num_outputs())?;
            tape.forward(inputs)?;

            let (forward, reverse) = compressed_sweeps(tape, plan)?;
            let values = plan.recover(&forward, &reverse);
            let jacobian = CsrMatrix::from_pattern(&plan.pattern, values)?;
            tracing::info!(
                tag,
                rows = jacobian.nrows,
                cols = jacobian.ncols,
                nnz = jacobian.nnz(),
                sweeps = plan.num_sweeps(),
                "sparse Jacobian extracted"
            );
            Ok(SparseJacobian {
                outputs: tape.output_values(),
                jacobian,
            })
        })
    }
}

fn column_seed<F: Float>(n: usize, members: &[u32]) -> Vec<F> {
    let mut seed = vec![F::zero(); n];
    for &j in members {
        seed[j as usize] = F::one();
    }
    seed
}

fn forward_group<F: Float>(tape: &Tape<F>, cols: &[u32]) -> Vec<F> {
    let tangents = tape.tangent_core(&tape.values, &column_seed(tape.num_inputs(), cols));
    tape.output_indices
        .iter()
        .map(|&idx| tangents[idx as usize])
        .collect()
}

fn reverse_group<F: Float>(tape: &Tape<F>, rows: &[u32]) -> Result<Vec<F>> {
    tape.reverse(&column_seed(tape.num_outputs(), rows))
}

/// One sweep per group at the tape's current values.
#[cfg(not(feature = "parallel"))]
fn compressed_sweeps<F: Float>(
    tape: &Tape<F>,
    plan: &CompressionPlan,
) -> Result<(Vec<Vec<F>>, Vec<Vec<F>>)> {
    let forward = plan
        .column_groups
        .iter()
        .map(|cols| forward_group(tape, cols))
        .collect();
    let reverse = plan
        .row_groups
        .iter()
        .map(|rows| reverse_group(tape, rows))
        .collect::<Result<_>>()?;
    Ok((forward, reverse))
}

/// One sweep per group at the tape's current values, groups in parallel.
#[cfg(feature = "parallel")]
fn compressed_sweeps<F: Float>(
    tape: &Tape<F>,
    plan: &CompressionPlan,
) -> Result<(Vec<Vec<F>>, Vec<Vec<F>>)> {
    use rayon::prelude::*;

    let forward = plan
        .column_groups
        .par_iter()
        .map(|cols| forward_group(tape, cols))
        .collect();
    let reverse = plan
        .row_groups
        .par_iter()
        .map(|rows| reverse_group(tape, rows))
        .collect::<Result<_>>()?;
    Ok((forward, reverse))
}

// ──────────────────────────────────────────────
//  Bundle adjustment through the generic path
// ──────────────────────────────────────────────

/// Record the whole bundle-adjustment objective under [`BA_GLOBAL_TAG`].
///
/// Inputs are cameras, points and weights in Jacobian column order. Outputs
/// are the reprojection residuals, followed by the weight residuals when
/// `weight_rows` is set. Returns the outputs.
pub fn ba_objective_trace<O: ReprojectionObjective>(
    store: &TapeStore<f64>,
    objective: &O,
    problem: &BaProblem,
    weight_rows: bool,
) -> Result<Vec<f64>> {
    problem.validate()?;
    let cam_len = problem.cams.len();
    let point_len = problem.points.len();
    store.record(BA_GLOBAL_TAG, &problem.parameters(), |x| {
        let (cams, rest) = x.split_at(cam_len);
        let (points, weights) = rest.split_at(point_len);
        let cp = problem.cam_params;
        let mut out = Vec::with_capacity(3 * problem.n_obs());
        for (i, &[c, p]) in problem.obs.iter().enumerate() {
            let e = objective.reprojection_error(
                &cams[c * cp..(c + 1) * cp],
                &points[3 * p..3 * p + 3],
                weights[i],
                &problem.feats[i],
            );
            out.extend_from_slice(&e);
        }
        if weight_rows {
            out.extend(weights.iter().map(|&w| objective.weight_error(w)));
        }
        out
    })
}

/// Bundle-adjustment residuals and Jacobian via pattern discovery and
/// compression instead of the known block structure.
pub fn ba_sparse_jacobian<O: ReprojectionObjective>(
    objective: &O,
    problem: &BaProblem,
    weight_rows: bool,
    options: ExtractOptions,
) -> Result<BaJacobian> {
    let store = TapeStore::new();
    ba_objective_trace(&store, objective, problem, weight_rows)?;
    let extractor = SparsityDrivenExtractor::with_options(&store, options);
    let SparseJacobian {
        mut outputs,
        jacobian,
    } = extractor.extract(BA_GLOBAL_TAG, &problem.parameters())?;

    let w_err = if weight_rows {
        outputs.split_off(2 * problem.n_obs())
    } else {
        problem
            .weights
            .iter()
            .map(|&w| objective.weight_error(w))
            .collect()
    };
    Ok(BaJacobian {
        reproj_err: outputs,
        w_err,
        jacobian,
    })
}
