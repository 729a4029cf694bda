//! Vertex covers of a bipartite dependency graph.
//!
//! A cover picks rows and columns such that every structural nonzero has at
//! least one chosen endpoint. Chosen columns are later evaluated with forward
//! sweeps and chosen rows with reverse sweeps, so a small cover means few
//! sweeps. Vertices start at two reserved default colors, `0` on the left and
//! `left + right + 1` on the right; only included vertices are recolored.
//!
//! Terminology:
//!
//! - *included*: a vertex chosen for the cover;
//! - *covered*: a vertex left out of the cover whose every edge is handled by
//!   an included vertex on the other side.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::graph::{BipartiteGraphView, Vertex};

/// Edge visits allowed to the matching search of
/// [`cover_minimal_vertex`](BipartiteGraphVertexCover::cover_minimal_vertex).
pub const DEFAULT_COVER_EFFORT: usize = 1 << 22;

const NONE: u32 = u32::MAX;

/// Vertex cover and bicoloring state over a borrowed graph.
#[derive(Debug)]
pub struct BipartiteGraphVertexCover<'g, G: BipartiteGraphView + ?Sized> {
    graph: Option<&'g G>,
    pub(crate) left_colors: Vec<u32>,
    pub(crate) right_colors: Vec<u32>,
    in_left: Vec<bool>,
    in_right: Vec<bool>,
    included_left: Vec<u32>,
    included_right: Vec<u32>,
    covered_left: Vec<u32>,
    covered_right: Vec<u32>,
    effort: usize,
    covering_time: Duration,
}

impl<'g, G: BipartiteGraphView + ?Sized> BipartiteGraphVertexCover<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        let mut cover = BipartiteGraphVertexCover {
            graph: Some(graph),
            left_colors: Vec::new(),
            right_colors: Vec::new(),
            in_left: Vec::new(),
            in_right: Vec::new(),
            included_left: Vec::new(),
            included_right: Vec::new(),
            covered_left: Vec::new(),
            covered_right: Vec::new(),
            effort: DEFAULT_COVER_EFFORT,
            covering_time: Duration::ZERO,
        };
        cover.reset();
        cover
    }

    /// Bound the work of [`cover_minimal_vertex`](Self::cover_minimal_vertex).
    pub fn with_effort(mut self, effort: usize) -> Self {
        self.effort = effort;
        self
    }

    /// Graph being covered; `None` after [`clear`](Self::clear).
    pub fn graph(&self) -> Option<&'g G> {
        self.graph
    }

    fn left_count(&self) -> usize {
        self.graph.map_or(0, |g| g.left_count())
    }

    fn right_count(&self) -> usize {
        self.graph.map_or(0, |g| g.right_count())
    }

    /// Detach from the graph; the instance behaves as an empty graph.
    pub fn clear(&mut self) {
        self.graph = None;
        self.reset();
    }

    /// Restore default colors and drop the cover. The graph is kept.
    pub fn reset(&mut self) {
        let (l, r) = (self.left_count(), self.right_count());
        let right_default = self.right_default_color();
        self.left_colors = vec![0; l];
        self.right_colors = vec![right_default; r];
        self.in_left = vec![false; l];
        self.in_right = vec![false; r];
        self.included_left.clear();
        self.included_right.clear();
        self.covered_left.clear();
        self.covered_right.clear();
        self.covering_time = Duration::ZERO;
    }

    /// Wall time of the last successful cover computation.
    pub fn covering_time(&self) -> Duration {
        self.covering_time
    }

    /// Reserved color of uncolored left vertices.
    pub fn left_default_color(&self) -> u32 {
        0
    }

    /// Reserved color of uncolored right vertices, above every assignable
    /// left color.
    pub fn right_default_color(&self) -> u32 {
        (self.left_count() + self.right_count() + 1) as u32
    }

    pub fn left_colors(&self) -> &[u32] {
        &self.left_colors
    }

    pub fn right_colors(&self) -> &[u32] {
        &self.right_colors
    }

    /// Left vertices in the cover, ascending.
    pub fn included_left_vertices(&self) -> &[u32] {
        &self.included_left
    }

    /// Right vertices in the cover, ascending.
    pub fn included_right_vertices(&self) -> &[u32] {
        &self.included_right
    }

    /// Left vertices outside the cover with at least one edge, ascending.
    pub fn covered_left_vertices(&self) -> &[u32] {
        &self.covered_left
    }

    /// Right vertices outside the cover with at least one edge, ascending.
    pub fn covered_right_vertices(&self) -> &[u32] {
        &self.covered_right
    }

    pub fn is_left_included(&self, l: usize) -> bool {
        self.in_left[l]
    }

    pub fn is_right_included(&self, r: usize) -> bool {
        self.in_right[r]
    }

    /// Number of included vertices.
    pub fn cover_size(&self) -> usize {
        self.included_left.len() + self.included_right.len()
    }

    /// True if every edge has an included endpoint.
    pub fn is_cover(&self) -> bool {
        let Some(g) = self.graph else {
            return true;
        };
        (0..g.left_count()).all(|l| {
            self.in_left[l]
                || g.left_neighbors(l)
                    .iter()
                    .all(|&r| self.in_right[r as usize])
        })
    }

    /// Greedy cover: repeatedly include the vertex touching the most
    /// uncovered edges. Returns the cover size.
    pub fn cover_vertex(&mut self) -> usize {
        self.reset();
        let Some(g) = self.graph else {
            return 0;
        };
        let start = Instant::now();
        let (in_left, in_right) = greedy_cover(g);
        self.install(in_left, in_right);
        self.covering_time = start.elapsed();
        tracing::debug!(
            size = self.cover_size(),
            elapsed = ?self.covering_time,
            "greedy vertex cover"
        );
        self.cover_size()
    }

    /// Cover visiting vertices in `order`, including each one that still
    /// touches an uncovered edge.
    ///
    /// Fails with [`Error::CoverInfeasible`] if `order` names a vertex that
    /// does not exist or leaves an edge with no endpoint in it.
    pub fn cover_vertex_in_order(&mut self, order: &[Vertex]) -> Result<usize> {
        self.reset();
        let Some(g) = self.graph else {
            return Ok(0);
        };
        let start = Instant::now();
        let (l_n, r_n) = (g.left_count(), g.right_count());
        let mut in_left = vec![false; l_n];
        let mut in_right = vec![false; r_n];

        for &v in order {
            match v {
                Vertex::Left(l) if (l as usize) < l_n => {
                    let l = l as usize;
                    if !in_left[l] && g.left_neighbors(l).iter().any(|&r| !in_right[r as usize]) {
                        in_left[l] = true;
                    }
                }
                Vertex::Right(r) if (r as usize) < r_n => {
                    let r = r as usize;
                    if !in_right[r] && g.right_neighbors(r).iter().any(|&l| !in_left[l as usize]) {
                        in_right[r] = true;
                    }
                }
                v => {
                    return Err(Error::CoverInfeasible {
                        reason: format!("{v:?} is not a vertex of a {l_n}x{r_n} graph"),
                    })
                }
            }
        }

        if let Some((l, r)) = first_uncovered_edge(g, &in_left, &in_right) {
            return Err(Error::CoverInfeasible {
                reason: format!("edge ({l}, {r}) has no endpoint in the given order"),
            });
        }
        self.install(in_left, in_right);
        self.covering_time = start.elapsed();
        Ok(self.cover_size())
    }

    /// Smallest cover found within the effort budget.
    ///
    /// Runs a bounded augmenting-path matching and derives the cover from it
    /// (König). If the budget runs out, falls back to the greedy cover with
    /// redundant vertices pruned. Never larger than
    /// [`cover_vertex`](Self::cover_vertex).
    pub fn cover_minimal_vertex(&mut self) -> usize {
        self.reset();
        let Some(g) = self.graph else {
            return 0;
        };

        let start = Instant::now();
        let (mut in_left, mut in_right) = greedy_cover(g);
        prune_redundant(g, &mut in_left, &mut in_right);
        let greedy_size = count(&in_left) + count(&in_right);

        match matching_cover(g, self.effort) {
            Some((ml, mr)) if count(&ml) + count(&mr) <= greedy_size => {
                self.install(ml, mr);
                tracing::debug!(size = self.cover_size(), "matching vertex cover");
            }
            Some(_) => self.install(in_left, in_right),
            None => {
                tracing::debug!(
                    effort = self.effort,
                    "matching budget exhausted, pruned greedy cover"
                );
                self.install(in_left, in_right);
            }
        }
        self.covering_time = start.elapsed();
        self.cover_size()
    }

    fn install(&mut self, in_left: Vec<bool>, in_right: Vec<bool>) {
        let Some(g) = self.graph else {
            return;
        };
        self.included_left = indices(&in_left);
        self.included_right = indices(&in_right);
        self.covered_left = (0..g.left_count())
            .filter(|&l| !in_left[l] && !g.left_neighbors(l).is_empty())
            .map(|l| l as u32)
            .collect();
        self.covered_right = (0..g.right_count())
            .filter(|&r| !in_right[r] && !g.right_neighbors(r).is_empty())
            .map(|r| r as u32)
            .collect();
        self.in_left = in_left;
        self.in_right = in_right;
    }

    /// Left vertices grouped by assigned color (default color excluded).
    pub fn left_groups(&self) -> Vec<Vec<u32>> {
        groups(&self.left_colors, self.left_default_color())
    }

    /// Right vertices grouped by assigned color (default color excluded).
    pub fn right_groups(&self) -> Vec<Vec<u32>> {
        groups(&self.right_colors, self.right_default_color())
    }

    /// Diagnostic dump of the cover and its coloring.
    pub fn print_bicoloring_vertex_cover<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl<G: BipartiteGraphView + ?Sized> fmt::Display for BipartiteGraphVertexCover<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Bipartite graph vertex cover: {} left, {} right, size {}",
            self.left_count(),
            self.right_count(),
            self.cover_size()
        )?;
        writeln!(f, "Included left vertices:  {:?}", self.included_left)?;
        writeln!(f, "Included right vertices: {:?}", self.included_right)?;
        writeln!(f, "Covered left vertices:   {:?}", self.covered_left)?;
        writeln!(f, "Covered right vertices:  {:?}", self.covered_right)?;
        for &l in &self.included_left {
            writeln!(f, "Left vertex {} : color {}", l, self.left_colors[l as usize])?;
        }
        for &r in &self.included_right {
            writeln!(f, "Right vertex {} : color {}", r, self.right_colors[r as usize])?;
        }
        Ok(())
    }
}

fn count(flags: &[bool]) -> usize {
    flags.iter().filter(|&&b| b).count()
}

fn indices(flags: &[bool]) -> Vec<u32> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, &b)| b)
        .map(|(i, _)| i as u32)
        .collect()
}

fn groups(colors: &[u32], default: u32) -> Vec<Vec<u32>> {
    let mut used: Vec<u32> = colors.iter().copied().filter(|&c| c != default).collect();
    used.sort_unstable();
    used.dedup();
    let mut out = vec![Vec::new(); used.len()];
    for (v, &c) in colors.iter().enumerate() {
        if c != default {
            if let Ok(k) = used.binary_search(&c) {
                out[k].push(v as u32);
            }
        }
    }
    out
}

fn first_uncovered_edge<G: BipartiteGraphView + ?Sized>(
    g: &G,
    in_left: &[bool],
    in_right: &[bool],
) -> Option<(usize, u32)> {
    (0..g.left_count()).filter(|&l| !in_left[l]).find_map(|l| {
        g.left_neighbors(l)
            .iter()
            .find(|&&r| !in_right[r as usize])
            .map(|&r| (l, r))
    })
}

/// Max-degree greedy cover with a lazily updated heap.
fn greedy_cover<G: BipartiteGraphView + ?Sized>(g: &G) -> (Vec<bool>, Vec<bool>) {
    let (l_n, r_n) = (g.left_count(), g.right_count());
    let mut in_left = vec![false; l_n];
    let mut in_right = vec![false; r_n];
    let mut left_deg: Vec<usize> = (0..l_n).map(|l| g.left_neighbors(l).len()).collect();
    let mut right_deg: Vec<usize> = (0..r_n).map(|r| g.right_neighbors(r).len()).collect();

    // Ties go to the smaller vertex: left before right, then by index.
    let mut heap: BinaryHeap<(usize, Reverse<Vertex>)> = BinaryHeap::new();
    heap.extend((0..l_n).map(|l| (left_deg[l], Reverse(Vertex::Left(l as u32)))));
    heap.extend((0..r_n).map(|r| (right_deg[r], Reverse(Vertex::Right(r as u32)))));

    while let Some((deg, Reverse(v))) = heap.pop() {
        if deg == 0 {
            break;
        }
        match v {
            Vertex::Left(l) => {
                let l = l as usize;
                if in_left[l] || left_deg[l] != deg {
                    continue;
                }
                in_left[l] = true;
                left_deg[l] = 0;
                for &r in g.left_neighbors(l) {
                    let r = r as usize;
                    if !in_right[r] {
                        right_deg[r] -= 1;
                        heap.push((right_deg[r], Reverse(Vertex::Right(r as u32))));
                    }
                }
            }
            Vertex::Right(r) => {
                let r = r as usize;
                if in_right[r] || right_deg[r] != deg {
                    continue;
                }
                in_right[r] = true;
                right_deg[r] = 0;
                for &l in g.right_neighbors(r) {
                    let l = l as usize;
                    if !in_left[l] {
                        left_deg[l] -= 1;
                        heap.push((left_deg[l], Reverse(Vertex::Left(l as u32))));
                    }
                }
            }
        }
    }
    (in_left, in_right)
}

/// Drop included vertices whose neighbors are all included.
fn prune_redundant<G: BipartiteGraphView + ?Sized>(
    g: &G,
    in_left: &mut [bool],
    in_right: &mut [bool],
) {
    for l in 0..in_left.len() {
        if in_left[l] && g.left_neighbors(l).iter().all(|&r| in_right[r as usize]) {
            in_left[l] = false;
        }
    }
    for r in 0..in_right.len() {
        if in_right[r] && g.right_neighbors(r).iter().all(|&l| in_left[l as usize]) {
            in_right[r] = false;
        }
    }
}

/// Minimum cover from a maximum matching (König), or `None` once more than
/// `effort` edges have been visited.
fn matching_cover<G: BipartiteGraphView + ?Sized>(
    g: &G,
    effort: usize,
) -> Option<(Vec<bool>, Vec<bool>)> {
    let (l_n, r_n) = (g.left_count(), g.right_count());
    let mut match_l = vec![NONE; l_n];
    let mut match_r = vec![NONE; r_n];
    let mut budget = effort;

    // Cheap initial matching.
    for l in 0..l_n {
        if let Some(&r) = g.left_neighbors(l).iter().find(|&&r| match_r[r as usize] == NONE) {
            match_l[l] = r;
            match_r[r as usize] = l as u32;
        }
    }

    let mut visited = vec![false; r_n];
    let mut via = vec![NONE; r_n];
    let mut stack: Vec<(u32, usize)> = Vec::new();
    for root in 0..l_n {
        if match_l[root] != NONE || g.left_neighbors(root).is_empty() {
            continue;
        }
        visited.iter_mut().for_each(|v| *v = false);
        stack.clear();
        stack.push((root as u32, 0));

        while let Some(top) = stack.last_mut() {
            let u = top.0;
            let adj = g.left_neighbors(u as usize);
            if top.1 == adj.len() {
                stack.pop();
                continue;
            }
            let r = adj[top.1] as usize;
            top.1 += 1;
            budget = budget.checked_sub(1)?;
            if visited[r] {
                continue;
            }
            visited[r] = true;
            via[r] = u;
            if match_r[r] == NONE {
                // Flip the alternating path back to the root.
                let mut cur = r;
                loop {
                    let u = via[cur] as usize;
                    let prev = match_l[u];
                    match_l[u] = cur as u32;
                    match_r[cur] = u as u32;
                    if u == root {
                        break;
                    }
                    cur = prev as usize;
                }
                break;
            }
            stack.push((match_r[r], 0));
        }
    }

    // Alternating reachability from unmatched left vertices.
    let mut reach_l = vec![false; l_n];
    let mut reach_r = vec![false; r_n];
    let mut queue: Vec<usize> = (0..l_n).filter(|&l| match_l[l] == NONE).collect();
    for &l in &queue {
        reach_l[l] = true;
    }
    while let Some(l) = queue.pop() {
        for &r in g.left_neighbors(l) {
            let r = r as usize;
            if reach_r[r] {
                continue;
            }
            reach_r[r] = true;
            let m = match_r[r];
            if m != NONE && !reach_l[m as usize] {
                reach_l[m as usize] = true;
                queue.push(m as usize);
            }
        }
    }

    let in_left = reach_l.iter().map(|&z| !z).collect();
    Some((in_left, reach_r))
}
