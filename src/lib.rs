//! Exact Jacobians of recorded traces, assembled block by block or through
//! sparsity-driven compression.
//!
//! A [`TapeStore`] owns traces recorded through a [`Recording`]; an
//! [`Evaluator`] replays them forward and backward. Structured problems use
//! the [`BlockJacobianAssembler`], unstructured ones the
//! [`SparsityDrivenExtractor`], which covers and bicolors the row/column
//! dependency graph to evaluate many entries per sweep.

pub mod active;
pub mod bicolor;
pub mod block;
pub mod cover;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod float;
pub mod gradient;
pub mod graph;
pub mod matrix;
pub mod objective;
pub mod opcode;
pub mod pattern;
pub mod scalar;
pub mod store;
pub mod tape;

pub use active::Active;
pub use bicolor::{Bicoloring, ConflictRule};
pub use block::{BaJacobian, BlockJacobianAssembler};
pub use cover::BipartiteGraphVertexCover;
pub use error::{Arity, Error, Result};
pub use evaluator::Evaluator;
pub use extract::{
    ba_objective_trace, ba_sparse_jacobian, Compression, CompressionPlan, ExtractOptions,
    Recovery, SparseJacobian, SparsityDrivenExtractor,
};
pub use float::Float;
pub use gradient::MixtureGradient;
pub use graph::{BipartiteGraph, BipartiteGraphView, Vertex, VertexOrdering};
pub use matrix::{BaLayout, BaSparseMat, CsrBuilder, CsrMatrix, DenseBlock};
pub use objective::{ba_residuals, BaProblem, MixtureDims, MixtureObjective, ReprojectionObjective};
pub use pattern::JacobianPattern;
pub use scalar::Scalar;
pub use store::{Recording, Tag, TapeStore};
pub use tape::Tape;

/// Active scalar over `f64`.
pub type Active64<'r> = Active<'r, f64>;
