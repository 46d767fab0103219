//! Entering-arc selection (pricing) rules.
//!
//! Both rules implement block search: non-basis real arcs are scanned in
//! fixed-size blocks behind a rolling cursor, and the most negative
//! reduced cost within the first block containing an eligible arc wins.
//! A full revolution without a candidate proves optimality. Artificial
//! arcs are never priced; their big-M cost keeps them out of any optimal
//! basis.

use rayon::prelude::*;

use crate::costs::ArcCosts;
use crate::graph::FullBipartiteDigraph;
use crate::tree::SpanningTree;
use crate::{E, I};

/// Blocks never shrink below this, whatever the arc count.
pub const MIN_BLOCK_SIZE: I = 10;

fn default_block_size(arc_count: I) -> I {
    ((arc_count as E).sqrt().ceil() as I).max(MIN_BLOCK_SIZE)
}

/// Entering-arc selection rule for the network simplex.
pub trait Pricing {
    /// Returns the next entering arc, or `None` after a full revolution
    /// without any arc pricing below `-eps` (optimality).
    fn find_entering(
        &mut self,
        di: &FullBipartiteDigraph,
        costs: &ArcCosts,
        tree: &SpanningTree,
        eps: E,
    ) -> Option<I>;
}

#[inline]
fn reduced_cost(a: I, di: &FullBipartiteDigraph, costs: &ArcCosts, tree: &SpanningTree) -> E {
    // Multiplying by the state sign folds the lower/upper eligibility
    // tests into one comparison; basis arcs price to zero.
    tree.state(a).sign()
        * (costs.get(a) - tree.potential(di.target(a)) + tree.potential(di.source(a)))
}

/// Serial block-search pricing.
pub struct BlockSearch {
    block_size: I,
    next_arc: I,
}

impl BlockSearch {
    /// `block_size = 0` selects `max(ceil(sqrt(arc_count)), MIN_BLOCK_SIZE)`.
    pub fn new(arc_count: I, block_size: I) -> Self {
        let block_size = if block_size > 0 {
            block_size
        } else {
            default_block_size(arc_count)
        };
        Self {
            block_size,
            next_arc: 0,
        }
    }
}

impl Pricing for BlockSearch {
    fn find_entering(
        &mut self,
        di: &FullBipartiteDigraph,
        costs: &ArcCosts,
        tree: &SpanningTree,
        eps: E,
    ) -> Option<I> {
        let arc_count = costs.real_count();
        let mut scanned = 0;
        let mut start = self.next_arc;
        while scanned < arc_count {
            let end = (start + self.block_size).min(arc_count);
            let mut best: Option<(E, I)> = None;
            for a in start..end {
                let c = reduced_cost(a, di, costs, tree);
                // Strict improvement keeps the lowest arc id on ties
                if c < -eps && best.map_or(true, |(bc, _)| c < bc) {
                    best = Some((c, a));
                }
            }
            scanned += end - start;
            start = if end == arc_count { 0 } else { end };
            if let Some((_, a)) = best {
                self.next_arc = start;
                return Some(a);
            }
        }
        None
    }
}

/// Block-search pricing with the reduced-cost scan fanned out over a
/// bounded thread pool.
///
/// Each worker owns a contiguous slice of the current block and reports
/// its local best; the reduction keeps the most negative reduced cost
/// and breaks ties on the lowest arc id, so the outcome does not depend
/// on scheduling. Workers only read potentials and costs; all tree
/// mutation happens on the driver thread between pricing passes.
pub struct ParallelBlockSearch {
    block_size: I,
    next_arc: I,
    pool: rayon::ThreadPool,
}

impl ParallelBlockSearch {
    /// `num_threads = 0` uses all available cores. The automatic block
    /// size is scaled by the worker count so every worker sees a full
    /// serial-sized slice.
    pub fn new(arc_count: I, block_size: I, num_threads: usize) -> Self {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if num_threads != 0 {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().expect("creating thread pool failed");
        let block_size = if block_size > 0 {
            block_size
        } else {
            default_block_size(arc_count) * pool.current_num_threads().max(1)
        };
        Self {
            block_size,
            next_arc: 0,
            pool,
        }
    }
}

fn merge_best(x: Option<(E, I)>, y: Option<(E, I)>) -> Option<(E, I)> {
    match (x, y) {
        (Some((cx, ax)), Some((cy, ay))) => {
            if cy < cx || (cy == cx && ay < ax) {
                Some((cy, ay))
            } else {
                Some((cx, ax))
            }
        }
        (None, y) => y,
        (x, None) => x,
    }
}

impl Pricing for ParallelBlockSearch {
    fn find_entering(
        &mut self,
        di: &FullBipartiteDigraph,
        costs: &ArcCosts,
        tree: &SpanningTree,
        eps: E,
    ) -> Option<I> {
        let arc_count = costs.real_count();
        let workers = self.pool.current_num_threads().max(1);
        let mut scanned = 0;
        let mut start = self.next_arc;
        while scanned < arc_count {
            let end = (start + self.block_size).min(arc_count);
            let chunk = (end - start).div_ceil(workers).max(1);
            let best = self.pool.install(|| {
                (0..workers)
                    .into_par_iter()
                    .map(|w| {
                        let lo = (start + w * chunk).min(end);
                        let hi = (lo + chunk).min(end);
                        let mut local: Option<(E, I)> = None;
                        for a in lo..hi {
                            let c = reduced_cost(a, di, costs, tree);
                            if c < -eps && local.map_or(true, |(bc, _)| c < bc) {
                                local = Some((c, a));
                            }
                        }
                        local
                    })
                    .reduce(|| None, merge_best)
            });
            scanned += end - start;
            start = if end == arc_count { 0 } else { end };
            if let Some((_, a)) = best {
                self.next_arc = start;
                return Some(a);
            }
        }
        None
    }
}
