//! Network simplex specialized for the uncapacitated transportation
//! problem on a complete bipartite graph.
//!
//! Each pivot prices an entering arc (see [`crate::pivot`]), runs the
//! ratio test around the unique cycle the arc closes, augments flow,
//! exchanges the basis arcs and shifts the potentials of the moved
//! subtree. Real arcs have infinite capacity; feasibility of the initial
//! basis comes from big-M artificial arcs to the root.

use crate::callback::PivotProgress;
use crate::costs::ArcCosts;
use crate::graph::FullBipartiteDigraph;
use crate::pivot::Pricing;
use crate::tree::{ArcState, SpanningTree};
use crate::{E, I, Solver, SolverHooks, Status};

pub struct NetworkSimplex<'a, P: Pricing> {
    di: FullBipartiteDigraph,
    costs: ArcCosts<'a>,
    tree: SpanningTree,
    pricing: P,
    eps: E,
    feas_tol: E,
    max_iter: u64,
    nit: u64,
}

impl<'a, P: Pricing> NetworkSimplex<'a, P> {
    /// Sets up the all-artificial starting basis over the reduced
    /// problem. `supply` holds the signed node weights (demands
    /// negative); `max_iter = 0` means unlimited pivots.
    pub fn new(
        di: FullBipartiteDigraph,
        mut costs: ArcCosts<'a>,
        supply: &[E],
        pricing: P,
        max_iter: u64,
    ) -> Self {
        let max_cost = costs.max_abs_real();
        // Large enough that no artificial arc survives in an optimal
        // basis of a feasible problem, small enough that potentials stay
        // representable.
        let big_m = (1. + di.artificial_arc_count() as E) * (max_cost + 1.);

        costs.resize(di.arc_count());
        for v in 0..di.artificial_arc_count() {
            costs.set_artificial(di.artificial_arc_id(v), big_m);
        }

        let total: E = supply.iter().map(|&s| s.max(0.)).sum();
        let tree = SpanningTree::new(&di, supply, big_m);

        Self {
            di,
            costs,
            tree,
            pricing,
            eps: 1e-10 * max_cost,
            feas_tol: 1e-9 * total.max(1.),
            max_iter,
            nit: 0,
        }
    }

    #[inline]
    pub fn flow(&self, arc: I) -> E {
        self.tree.flow(arc)
    }

    #[inline]
    pub fn potential(&self, node: I) -> E {
        self.tree.potential(node)
    }

    pub fn iterations(&self) -> u64 {
        self.nit
    }

    /// Runs the pivot loop to termination.
    pub fn run(&mut self, hooks: &mut SolverHooks) -> Status {
        hooks.terminator.initialize();

        let status = loop {
            let Some(in_arc) =
                self.pricing
                    .find_entering(&self.di, &self.costs, &self.tree, self.eps)
            else {
                break Status::Optimal;
            };
            if self.max_iter > 0 && self.nit >= self.max_iter {
                break Status::IterationLimit;
            }
            self.nit += 1;

            let Some(reduced_cost) = self.pivot(in_arc) else {
                return Status::Unbounded;
            };

            hooks.callback.call(&PivotProgress {
                nit: self.nit,
                entering_arc: in_arc,
                reduced_cost,
            });
            if let Some(status) = hooks.terminator.terminate() {
                break status;
            }
        };

        if status == Status::Optimal && !self.is_feasible() {
            return Status::Infeasible;
        }
        status
    }

    /// Residual flow on any artificial arc means the original problem
    /// could not be transported; below the tolerance it is float noise
    /// from upstream balancing.
    fn is_feasible(&self) -> bool {
        (self.costs.real_count()..self.di.arc_count()).all(|a| self.tree.flow(a) <= self.feas_tol)
    }

    /// One pivot on `in_arc`. Returns the entering reduced cost, or
    /// `None` when the ratio test finds no bounding arc (unbounded).
    fn pivot(&mut self, in_arc: I) -> Option<E> {
        debug_assert_eq!(self.tree.state(in_arc), ArcState::Lower);

        let u = self.di.source(in_arc);
        let v = self.di.target(in_arc);
        let join = self.tree.find_join(u, v);
        let reduced_cost =
            self.costs.get(in_arc) - self.tree.potential(v) + self.tree.potential(u);

        // Ratio test. Augmenting along u -> v sends flow from the join
        // down to u and from v up to the join; arcs pointing against
        // those directions lose flow and bound the step. Ties prefer the
        // candidate closest to the join, u-side over v-side.
        let mut delta = E::INFINITY;
        let mut leaving: Option<(I, bool)> = None;
        for x in self.tree.ancestors(u, join) {
            if self.tree.is_forward(x) {
                let f = self.tree.flow(self.tree.pred(x));
                if f <= delta {
                    delta = f;
                    leaving = Some((x, true));
                }
            }
        }
        for x in self.tree.ancestors(v, join) {
            if !self.tree.is_forward(x) {
                let f = self.tree.flow(self.tree.pred(x));
                let take = match leaving {
                    Some((_, true)) => f < delta,
                    _ => f <= delta,
                };
                if take {
                    delta = f;
                    leaving = Some((x, false));
                }
            }
        }
        let (out_node, on_source_side) = leaving?;

        // Augment around the cycle
        if delta > 0. {
            self.tree.add_flow(in_arc, delta);
            let mut x = u;
            while x != join {
                let arc = self.tree.pred(x);
                let d = if self.tree.is_forward(x) { -delta } else { delta };
                self.tree.add_flow(arc, d);
                x = self.tree.parent(x);
            }
            let mut x = v;
            while x != join {
                let arc = self.tree.pred(x);
                let d = if self.tree.is_forward(x) { delta } else { -delta };
                self.tree.add_flow(arc, d);
                x = self.tree.parent(x);
            }
        }

        // Basis exchange: the subtree under the leaving arc contains the
        // entering endpoint on the same side of the cycle.
        let out_arc = self.tree.pred(out_node);
        self.tree.set_state(in_arc, ArcState::Basis);
        self.tree.set_state(out_arc, ArcState::Lower);

        let (q, p, q_is_source) = if on_source_side {
            (u, v, true)
        } else {
            (v, u, false)
        };
        self.tree.update(out_node, in_arc, p, q, q_is_source);

        // Restore dual feasibility on the entering arc by shifting the
        // moved subtree's potentials.
        let shift = if q_is_source {
            -reduced_cost
        } else {
            reduced_cost
        };
        self.tree.shift_potentials(q, shift);

        Some(reduced_cost)
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &SpanningTree {
        &self.tree
    }
}

impl<'a, P: Pricing> Solver for NetworkSimplex<'a, P> {
    fn solve(&mut self, hooks: &mut SolverHooks) -> Status {
        self.run(hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::BlockSearch;

    fn simplex<'a>(
        n: I,
        m: I,
        distance: &'a [E],
        rows: &'a [I],
        cols: &'a [I],
        supply: &[E],
        max_iter: u64,
    ) -> NetworkSimplex<'a, BlockSearch> {
        let di = FullBipartiteDigraph::new(n, m);
        let costs = ArcCosts::new(distance, rows, cols, m);
        let pricing = BlockSearch::new(costs.real_count(), 0);
        NetworkSimplex::new(di, costs, supply, pricing, max_iter)
    }

    #[test]
    fn test_two_by_two_identity() {
        let distance = [0., 1., 1., 0.];
        let rows = [0, 1];
        let cols = [0, 1];
        let supply = [1., 2., -1., -2.];
        let mut net = simplex(2, 2, &distance, &rows, &cols, &supply, 0);

        assert_eq!(net.run(&mut SolverHooks::none()), Status::Optimal);
        net.tree().check_consistency();

        // Mass stays on the diagonal
        assert_eq!(net.flow(0), 1.);
        assert_eq!(net.flow(3), 2.);
        assert_eq!(net.flow(1), 0.);
        assert_eq!(net.flow(2), 0.);

        // Complementary slackness on the diagonal arcs
        for (arc, i, j) in [(0, 0, 2), (3, 1, 3)] {
            let c = distance[arc];
            assert!((net.potential(j) - net.potential(i) - c).abs() < 1e-9);
        }
    }

    #[test]
    fn test_off_diagonal_transport() {
        // All mass must cross: supply on the left, demand on the right
        let distance = [2., 5., 3., 1.];
        let rows = [0, 1];
        let cols = [0, 1];
        let supply = [1., 1., -1., -1.];
        let mut net = simplex(2, 2, &distance, &rows, &cols, &supply, 0);

        assert_eq!(net.run(&mut SolverHooks::none()), Status::Optimal);
        // Optimal pairing is (0 -> 0) and (1 -> 1): 2 + 1 = 3
        let cost: E = (0..4).map(|a| net.flow(a) * distance[a]).sum();
        assert!((cost - 3.).abs() < 1e-9);
    }

    #[test]
    fn test_iteration_cap() {
        let distance = [2., 5., 3., 1.];
        let rows = [0, 1];
        let cols = [0, 1];
        let supply = [1., 1., -1., -1.];
        let mut net = simplex(2, 2, &distance, &rows, &cols, &supply, 1);

        assert_eq!(net.run(&mut SolverHooks::none()), Status::IterationLimit);
        assert_eq!(net.iterations(), 1);
    }

    #[test]
    fn test_unbalanced_is_infeasible() {
        // Demand exceeds supply by a full unit; the slack stays on an
        // artificial arc.
        let distance = [1., 1.];
        let rows = [0];
        let cols = [0, 1];
        let supply = [1., -1., -1.];
        let mut net = simplex(1, 2, &distance, &rows, &cols, &supply, 0);

        assert_eq!(net.run(&mut SolverHooks::none()), Status::Infeasible);
    }
}
