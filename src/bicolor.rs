//! Bicoloring of a vertex cover.
//!
//! Included columns get colors from the right palette and are evaluated with
//! one forward sweep per color; included rows get colors from the left
//! palette and are evaluated with one reverse sweep per color. A nonzero
//! `(r, c)` is read from the forward sweep of `c` when `c` is included and
//! from the reverse sweep of `r` otherwise. Colors are assigned so that each
//! such read sees a single contribution.

use crate::cover::BipartiteGraphVertexCover;
use crate::error::{Error, Result};
use crate::graph::{BipartiteGraphView, Vertex, VertexOrdering};

/// Bicoloring policy: which cover is computed and how strictly rows are
/// separated.
///
/// Columns are always kept apart from every column they share a row with.
/// `Star` and `Acyclic` apply the same distance-2 rule to rows, so no two
/// included vertices joined by a path of length 2 share a color. `Greedy`
/// only separates rows whose shared column is read from row sweeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bicoloring {
    /// Greedy max-degree cover, rows separated only where recovery needs it.
    Greedy,
    /// Order-driven cover, distance-2 coloring on both sides.
    #[default]
    Star,
    /// Smallest cover within budget, distance-2 coloring on both sides.
    Acyclic,
}

/// When two included rows may not share a color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictRule {
    /// Only when they share a column whose entries are read from row sweeps.
    Recoverable,
    /// Whenever they share any column.
    Conservative,
}

impl Bicoloring {
    pub fn conflict_rule(self) -> ConflictRule {
        match self {
            Bicoloring::Greedy => ConflictRule::Recoverable,
            Bicoloring::Star | Bicoloring::Acyclic => ConflictRule::Conservative,
        }
    }

    /// Compute a cover of `cover`'s graph and color it.
    ///
    /// Returns the number of colors (sweeps) used. Fails with
    /// [`Error::CoverInfeasible`] if the coloring needs more than
    /// `max_colors`.
    pub fn bicolor<G: BipartiteGraphView + ?Sized>(
        self,
        cover: &mut BipartiteGraphVertexCover<'_, G>,
        ordering: VertexOrdering,
        max_colors: Option<usize>,
    ) -> Result<usize> {
        let Some(graph) = cover.graph() else {
            return Ok(0);
        };
        match self {
            Bicoloring::Greedy => {
                cover.cover_vertex();
            }
            Bicoloring::Star => {
                cover.cover_vertex_in_order(&ordering.order(graph))?;
            }
            Bicoloring::Acyclic => {
                cover.cover_minimal_vertex();
            }
        }
        let colors = color_cover(cover, ordering, self.conflict_rule());
        tracing::debug!(policy = ?self, cover = cover.cover_size(), colors, "bicoloring");

        match max_colors {
            Some(max) if colors > max => Err(Error::CoverInfeasible {
                reason: format!("{self:?} bicoloring needs {colors} colors, budget is {max}"),
            }),
            _ => Ok(colors),
        }
    }
}

/// Color the included vertices of an already computed cover.
///
/// Left colors start at `1`, right colors just above the right default.
/// Returns the number of distinct colors assigned.
pub fn color_cover<G: BipartiteGraphView + ?Sized>(
    cover: &mut BipartiteGraphVertexCover<'_, G>,
    ordering: VertexOrdering,
    rule: ConflictRule,
) -> usize {
    let Some(g) = cover.graph() else {
        return 0;
    };
    let right_base = cover.right_default_color();
    let mut left_used = 0u32;
    let mut right_used = 0u32;
    // Colors forbidden for the vertex being colored, stamped by vertex id.
    let mut mark: Vec<usize> = Vec::new();

    for v in ordering.order(g) {
        match v {
            Vertex::Left(l) if cover.is_left_included(l as usize) => {
                let l = l as usize;
                let stamp = l + 1;
                for &c in g.left_neighbors(l) {
                    let c = c as usize;
                    if rule == ConflictRule::Recoverable && cover.is_right_included(c) {
                        continue;
                    }
                    for &other in g.right_neighbors(c) {
                        let other = other as usize;
                        let color = cover.left_colors[other];
                        if other != l && color != 0 {
                            forbid(&mut mark, color as usize, stamp);
                        }
                    }
                }
                let color = first_free(&mark, 1, stamp);
                cover.left_colors[l] = color as u32;
                left_used = left_used.max(color as u32);
            }
            Vertex::Right(c) if cover.is_right_included(c as usize) => {
                let c = c as usize;
                let stamp = g.left_count() + c + 1;
                for &r in g.right_neighbors(c) {
                    for &other in g.left_neighbors(r as usize) {
                        let other = other as usize;
                        let color = cover.right_colors[other];
                        if other != c && color != right_base {
                            forbid(&mut mark, (color - right_base) as usize, stamp);
                        }
                    }
                }
                let offset = first_free(&mark, 1, stamp);
                cover.right_colors[c] = right_base + offset as u32;
                right_used = right_used.max(offset as u32);
            }
            _ => {}
        }
    }
    (left_used + right_used) as usize
}

#[inline]
fn forbid(mark: &mut Vec<usize>, color: usize, stamp: usize) {
    if mark.len() <= color {
        mark.resize(color + 1, 0);
    }
    mark[color] = stamp;
}

#[inline]
fn first_free(mark: &[usize], from: usize, stamp: usize) -> usize {
    (from..)
        .find(|&c| mark.get(c).map_or(true, |&s| s != stamp))
        .unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BipartiteGraph;

    // Arrowhead: row 0 and column 0 are dense, the rest is diagonal.
    fn arrowhead(n: u32) -> BipartiteGraph {
        let edges = (0..n)
            .flat_map(|i| [(0, i), (i, 0), (i, i)])
            .collect::<Vec<_>>();
        BipartiteGraph::from_edges(n as usize, n as usize, edges)
    }

    #[test]
    fn arrowhead_needs_three_sweeps() {
        let g = arrowhead(6);
        let mut cover = BipartiteGraphVertexCover::new(&g);
        let colors = Bicoloring::Greedy
            .bicolor(&mut cover, VertexOrdering::LargestFirst, None)
            .unwrap();
        assert!(cover.is_cover());
        assert!(colors <= 3);
    }

    #[test]
    fn star_separates_rows_through_included_columns() {
        // Rows 0 and 1 meet only in column 0, which the cover includes.
        let g = BipartiteGraph::from_edges(2, 3, [(0, 0), (1, 0), (0, 1), (1, 2)]);
        let order = [Vertex::Right(0), Vertex::Left(0), Vertex::Left(1)];

        let mut cover = BipartiteGraphVertexCover::new(&g);
        cover.cover_vertex_in_order(&order).unwrap();
        color_cover(&mut cover, VertexOrdering::Natural, ConflictRule::Recoverable);
        assert_eq!(cover.left_colors(), &[1, 1]);

        cover.cover_vertex_in_order(&order).unwrap();
        color_cover(&mut cover, VertexOrdering::Natural, ConflictRule::Conservative);
        assert_eq!(cover.left_colors(), &[1, 2]);
    }

    #[test]
    fn color_budget_is_enforced() {
        let g = arrowhead(6);
        let mut cover = BipartiteGraphVertexCover::new(&g);
        assert!(matches!(
            Bicoloring::Greedy.bicolor(&mut cover, VertexOrdering::Natural, Some(1)),
            Err(Error::CoverInfeasible { .. })
        ));
    }

    #[test]
    fn palettes_stay_disjoint() {
        let g = arrowhead(4);
        let mut cover = BipartiteGraphVertexCover::new(&g);
        Bicoloring::Acyclic
            .bicolor(&mut cover, VertexOrdering::LargestFirst, None)
            .unwrap();
        let right_default = cover.right_default_color();
        assert!(cover.left_colors().iter().all(|&c| c < right_default));
        assert!(cover.right_colors().iter().all(|&c| c >= right_default));
    }
}
