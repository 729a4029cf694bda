//! Bipartite dependency graph of a Jacobian.
//!
//! Left vertices are rows (outputs), right vertices are columns (inputs), and
//! every structural nonzero is an edge. Covers and colorings only need read
//! access, through [`BipartiteGraphView`].

use crate::pattern::JacobianPattern;

/// A vertex on either side of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Vertex {
    Left(u32),
    Right(u32),
}

/// Read-only adjacency access.
pub trait BipartiteGraphView {
    fn left_count(&self) -> usize;
    fn right_count(&self) -> usize;
    /// Right neighbors of left vertex `l`, sorted.
    fn left_neighbors(&self, l: usize) -> &[u32];
    /// Left neighbors of right vertex `r`, sorted.
    fn right_neighbors(&self, r: usize) -> &[u32];

    fn edge_count(&self) -> usize {
        (0..self.left_count())
            .map(|l| self.left_neighbors(l).len())
            .sum()
    }

    fn degree(&self, v: Vertex) -> usize {
        match v {
            Vertex::Left(l) => self.left_neighbors(l as usize).len(),
            Vertex::Right(r) => self.right_neighbors(r as usize).len(),
        }
    }
}

/// Adjacency-list bipartite graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BipartiteGraph {
    left_adj: Vec<Vec<u32>>,
    right_adj: Vec<Vec<u32>>,
}

impl BipartiteGraph {
    /// Graph without edges.
    pub fn new(left: usize, right: usize) -> Self {
        BipartiteGraph {
            left_adj: vec![Vec::new(); left],
            right_adj: vec![Vec::new(); right],
        }
    }

    /// Graph from `(left, right)` edges. Repeated edges collapse; edges with
    /// an endpoint out of range are dropped.
    pub fn from_edges<I>(left: usize, right: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut g = Self::new(left, right);
        for (l, r) in edges {
            if (l as usize) < left && (r as usize) < right {
                g.left_adj[l as usize].push(r);
                g.right_adj[r as usize].push(l);
            }
        }
        for adj in g.left_adj.iter_mut().chain(g.right_adj.iter_mut()) {
            adj.sort_unstable();
            adj.dedup();
        }
        g
    }

    /// Rows on the left, columns on the right.
    pub fn from_pattern(pattern: &JacobianPattern) -> Self {
        Self::from_edges(
            pattern.nrows,
            pattern.ncols,
            pattern.rows.iter().copied().zip(pattern.cols.iter().copied()),
        )
    }

    /// Edges in `(left, right)` order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.left_adj
            .iter()
            .enumerate()
            .flat_map(|(l, adj)| adj.iter().map(move |&r| (l as u32, r)))
    }
}

impl BipartiteGraphView for BipartiteGraph {
    fn left_count(&self) -> usize {
        self.left_adj.len()
    }

    fn right_count(&self) -> usize {
        self.right_adj.len()
    }

    fn left_neighbors(&self, l: usize) -> &[u32] {
        &self.left_adj[l]
    }

    fn right_neighbors(&self, r: usize) -> &[u32] {
        &self.right_adj[r]
    }
}

/// Order in which a cover visits vertices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexOrdering {
    /// All left vertices, then all right vertices, by index.
    Natural,
    /// Descending degree; ties keep the natural order.
    #[default]
    LargestFirst,
}

impl VertexOrdering {
    /// Every vertex of `graph` in this order.
    pub fn order<G: BipartiteGraphView + ?Sized>(&self, graph: &G) -> Vec<Vertex> {
        let mut order: Vec<Vertex> = (0..graph.left_count() as u32)
            .map(Vertex::Left)
            .chain((0..graph.right_count() as u32).map(Vertex::Right))
            .collect();
        if *self == VertexOrdering::LargestFirst {
            order.sort_by_key(|&v| std::cmp::Reverse(graph.degree(v)));
        }
        order
    }
}
