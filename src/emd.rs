//! Solve driver for the earth mover's distance.
//!
//! The driver prunes zero-weight nodes, builds the reduced bipartite
//! problem over the retained indices, runs the network simplex and
//! writes flow, duals and total cost back into the caller's dense
//! layout. [`solve`] and [`solve_parallel`] are the flat entry points;
//! [`EmdSolver`] is the structured surface with options and hooks.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::costs::ArcCosts;
use crate::graph::FullBipartiteDigraph;
use crate::pivot::{BlockSearch, ParallelBlockSearch, Pricing};
use crate::simplex::NetworkSimplex;
use crate::{E, I, SolverHooks, SolverOptions, Status};

#[derive(Debug, Display, Error, PartialEq)]
pub enum EmdError {
    #[display("Distance matrix does not match supply x demand dimensions")]
    DistanceDimensionMismatch,
}

/// A transportation problem over borrowed dense buffers.
///
/// `distance` is row-major with one row per supply and one column per
/// demand; all three buffers must outlive the solve.
#[derive(Debug)]
pub struct TransportProblem<'a> {
    supply: &'a [E],
    demand: &'a [E],
    distance: &'a [E],
}

impl<'a> TransportProblem<'a> {
    pub fn new(supply: &'a [E], demand: &'a [E], distance: &'a [E]) -> Result<Self, EmdError> {
        if distance.len() != supply.len() * demand.len() {
            return Err(EmdError::DistanceDimensionMismatch);
        }
        Ok(Self {
            supply,
            demand,
            distance,
        })
    }

    pub fn supply_count(&self) -> I {
        self.supply.len()
    }

    pub fn demand_count(&self) -> I {
        self.demand.len()
    }
}

/// An owned solve result in the caller's dense layout.
///
/// `flow`, `alpha` and `beta` are meaningful only when
/// [`Status::has_solution`] holds; they stay zeroed otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub status: Status,
    pub flow: Vec<E>,
    pub alpha: Vec<E>,
    pub beta: Vec<E>,
    pub cost: E,
    pub iterations: u64,
}

/// Structured solver surface over a [`TransportProblem`].
///
/// Reads `max_iter`, `num_threads` and `block_size` from
/// [`SolverOptions`]; `num_threads = 1` runs the serial pricing rule,
/// any other value the parallel one (0 = all available cores).
pub struct EmdSolver<'a> {
    problem: &'a TransportProblem<'a>,
    options: SolverOptions,
}

impl<'a> EmdSolver<'a> {
    /// Creates a new solver instance for the given problem and options.
    pub fn new(problem: &'a TransportProblem<'a>, options: &SolverOptions) -> Self {
        Self {
            problem,
            options: options.clone(),
        }
    }

    /// Solves the problem and returns an owned [`Solution`].
    pub fn solve(&mut self, hooks: &mut SolverHooks) -> Solution {
        let n1 = self.problem.supply_count();
        let n2 = self.problem.demand_count();
        let max_iter = self.options.get_option::<u64>("max_iter").unwrap_or(0);
        let num_threads = self.options.get_option::<usize>("num_threads").unwrap_or(1);
        let block_size = self.options.get_option::<usize>("block_size").unwrap_or(0);

        let mut flow = vec![0.; n1 * n2];
        let mut alpha = vec![0.; n1];
        let mut beta = vec![0.; n2];
        let mut cost = 0.;
        let (status, iterations) = run(
            self.problem.supply,
            self.problem.demand,
            self.problem.distance,
            &mut flow,
            &mut alpha,
            &mut beta,
            &mut cost,
            max_iter,
            block_size,
            num_threads,
            hooks,
        );

        Solution {
            status,
            flow,
            alpha,
            beta,
            cost,
            iterations,
        }
    }
}

/// Computes the earth mover's distance between `supply` and `demand`
/// under the row-major `distance` matrix.
///
/// On [`Status::Optimal`] and [`Status::IterationLimit`] the transport
/// plan is written into `flow`, the dual potentials into `alpha` and
/// `beta`, and the objective into `total_cost`; entries without mass
/// keep their caller-supplied values, so the output buffers should be
/// zeroed beforehand. `max_iter = 0` means unlimited pivots.
///
/// # Panics
///
/// Panics when the buffer lengths are inconsistent with
/// `supply.len() x demand.len()`.
pub fn solve(
    supply: &[E],
    demand: &[E],
    distance: &[E],
    flow: &mut [E],
    alpha: &mut [E],
    beta: &mut [E],
    total_cost: &mut E,
    max_iter: u64,
) -> Status {
    check_shapes(supply, demand, distance, flow, alpha, beta);
    run(
        supply,
        demand,
        distance,
        flow,
        alpha,
        beta,
        total_cost,
        max_iter,
        0,
        1,
        &mut SolverHooks::none(),
    )
    .0
}

/// [`solve`] with the reduced-cost scans fanned out over `num_threads`
/// workers (0 = all available cores). Results are identical to the
/// serial solver for a fixed thread count.
pub fn solve_parallel(
    supply: &[E],
    demand: &[E],
    distance: &[E],
    flow: &mut [E],
    alpha: &mut [E],
    beta: &mut [E],
    total_cost: &mut E,
    max_iter: u64,
    num_threads: usize,
) -> Status {
    check_shapes(supply, demand, distance, flow, alpha, beta);
    run(
        supply,
        demand,
        distance,
        flow,
        alpha,
        beta,
        total_cost,
        max_iter,
        0,
        num_threads,
        &mut SolverHooks::none(),
    )
    .0
}

fn check_shapes(
    supply: &[E],
    demand: &[E],
    distance: &[E],
    flow: &[E],
    alpha: &[E],
    beta: &[E],
) {
    assert_eq!(distance.len(), supply.len() * demand.len());
    assert_eq!(flow.len(), distance.len());
    assert_eq!(alpha.len(), supply.len());
    assert_eq!(beta.len(), demand.len());
}

/// Indices of the strictly positive weights, or `None` on any negative
/// entry.
fn retained(weights: &[E]) -> Option<Vec<I>> {
    let mut kept = Vec::new();
    for (i, &val) in weights.iter().enumerate() {
        if val > 0. {
            kept.push(i);
        } else if val < 0. {
            return None;
        }
    }
    Some(kept)
}

#[allow(clippy::too_many_arguments)]
fn run(
    supply: &[E],
    demand: &[E],
    distance: &[E],
    flow: &mut [E],
    alpha: &mut [E],
    beta: &mut [E],
    total_cost: &mut E,
    max_iter: u64,
    block_size: I,
    num_threads: usize,
    hooks: &mut SolverHooks,
) -> (Status, u64) {
    // Only strictly positive weights take part in the solve; a negative
    // weight aborts before any allocation.
    let Some(rows) = retained(supply) else {
        return (Status::Infeasible, 0);
    };
    let Some(cols) = retained(demand) else {
        return (Status::Infeasible, 0);
    };

    let n = rows.len();
    let m = cols.len();

    // Demand is negative supply
    let mut weights = Vec::with_capacity(n + m);
    weights.extend(rows.iter().map(|&i| supply[i]));
    weights.extend(cols.iter().map(|&j| -demand[j]));

    let di = FullBipartiteDigraph::new(n, m);
    let costs = ArcCosts::new(distance, &rows, &cols, demand.len());

    let stride = demand.len();
    if num_threads == 1 {
        let pricing = BlockSearch::new(costs.real_count(), block_size);
        run_simplex(
            di, costs, &weights, pricing, max_iter, hooks, &rows, &cols, stride, distance, flow,
            alpha, beta, total_cost,
        )
    } else {
        let pricing = ParallelBlockSearch::new(costs.real_count(), block_size, num_threads);
        run_simplex(
            di, costs, &weights, pricing, max_iter, hooks, &rows, &cols, stride, distance, flow,
            alpha, beta, total_cost,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn run_simplex<P: Pricing>(
    di: FullBipartiteDigraph,
    costs: ArcCosts<'_>,
    weights: &[E],
    pricing: P,
    max_iter: u64,
    hooks: &mut SolverHooks,
    rows: &[I],
    cols: &[I],
    stride: I,
    distance: &[E],
    flow: &mut [E],
    alpha: &mut [E],
    beta: &mut [E],
    total_cost: &mut E,
) -> (Status, u64) {
    let n = di.supply_count();
    let m = di.demand_count();

    let mut net = NetworkSimplex::new(di, costs, weights, pricing, max_iter);
    let status = net.run(hooks);

    if status.has_solution() {
        let mut cost = 0.;
        for a in 0..di.real_arc_count() {
            let f = net.flow(a);
            if f > 0. {
                let idx = rows[a / m] * stride + cols[a % m];
                flow[idx] = f;
                cost += f * distance[idx];
            }
        }
        for (i, &row) in rows.iter().enumerate() {
            alpha[row] = -net.potential(i);
        }
        for (j, &col) in cols.iter().enumerate() {
            beta[col] = net.potential(n + j);
        }
        *total_cost = cost;
    }

    (status, net.iterations())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::terminators::{
        InterruptTerminator, IterationTerminator, MultipleTerminators, TimeOutTerminator,
    };

    /// 2x2 instance that needs more than one pivot to reach the optimum.
    fn slow_problem() -> ([E; 2], [E; 2], [E; 4]) {
        ([1., 1.], [1., 1.], [2., 5., 3., 1.])
    }

    fn hooks_with(terminator: Box<dyn crate::terminators::Terminator>) -> SolverHooks {
        SolverHooks {
            callback: Box::new(NoOpCallback {}),
            terminator,
        }
    }

    #[test]
    fn test_structured_solver_surface() {
        let supply = [1., 0.];
        let demand = [0., 1.];
        let distance = [0., 1., 1., 0.];
        let problem = TransportProblem::new(&supply, &demand, &distance).unwrap();

        let mut options = SolverOptions::new();
        options.set_option("max_iter", 10u64).unwrap();
        let mut solver = EmdSolver::new(&problem, &options);
        let solution = solver.solve(&mut SolverHooks::none());

        assert_eq!(solution.status, Status::Optimal);
        assert_eq!(solution.flow, vec![0., 1., 0., 0.]);
        assert_eq!(solution.cost, 1.);
        assert!(solution.iterations >= 1);
    }

    #[test]
    fn test_terminator_hook_caps_the_solve() {
        let (supply, demand, distance) = slow_problem();
        let problem = TransportProblem::new(&supply, &demand, &distance).unwrap();

        let mut hooks = hooks_with(Box::new(IterationTerminator::new(1)));
        let mut solver = EmdSolver::new(&problem, &SolverOptions::new());
        let solution = solver.solve(&mut hooks);

        assert_eq!(solution.status, Status::IterationLimit);
        assert_eq!(solution.iterations, 1);
        assert!(solution.flow.iter().all(|&f| f >= 0.));
    }

    #[test]
    fn test_timeout_hook_stops_the_solve() {
        let (supply, demand, distance) = slow_problem();
        let problem = TransportProblem::new(&supply, &demand, &distance).unwrap();

        // A zero-second budget expires after the first pivot
        let mut hooks = hooks_with(Box::new(TimeOutTerminator::new(0)));
        let mut solver = EmdSolver::new(&problem, &SolverOptions::new());
        let solution = solver.solve(&mut hooks);

        assert_eq!(solution.status, Status::TimeLimit);
        assert_eq!(solution.iterations, 1);
        // No write-back without a usable plan
        assert!(solution.flow.iter().all(|&f| f == 0.));
        assert_eq!(solution.cost, 0.);
    }

    #[test]
    fn test_interrupt_hook_stops_the_solve() {
        // The interrupt terminator installs a process-global signal
        // handler, so this is the only test that constructs one. The
        // interrupt is raised programmatically; combined with an
        // unlimited iteration cap it is the only hook that can fire.
        let (supply, demand, distance) = slow_problem();
        let problem = TransportProblem::new(&supply, &demand, &distance).unwrap();

        let mut interrupt = InterruptTerminator::new();
        interrupt.interrupt();
        let mut hooks = hooks_with(Box::new(MultipleTerminators::new(vec![
            Box::new(interrupt),
            Box::new(IterationTerminator::new(0)),
        ])));
        let mut solver = EmdSolver::new(&problem, &SolverOptions::new());
        let solution = solver.solve(&mut hooks);

        assert_eq!(solution.status, Status::Interrupted);
        assert_eq!(solution.iterations, 1);
        assert!(solution.flow.iter().all(|&f| f == 0.));
    }

    #[test]
    fn test_distance_shape_is_validated() {
        let supply = [1., 1.];
        let demand = [2.];
        let distance = [1., 2., 3.];
        assert_eq!(
            TransportProblem::new(&supply, &demand, &distance).unwrap_err(),
            EmdError::DistanceDimensionMismatch,
        );
    }

    #[test]
    fn test_all_zero_weights_is_trivially_optimal() {
        let supply = [0., 0.];
        let demand = [0., 0.];
        let distance = [1., 2., 3., 4.];
        let mut flow = [0.; 4];
        let (mut alpha, mut beta) = ([0.; 2], [0.; 2]);
        let mut cost = -1.;

        let status = solve(
            &supply, &demand, &distance, &mut flow, &mut alpha, &mut beta, &mut cost, 0,
        );
        assert_eq!(status, Status::Optimal);
        assert_eq!(cost, 0.);
        assert_eq!(flow, [0.; 4]);
    }

    #[test]
    fn test_demand_without_supply_is_infeasible() {
        let supply = [0.];
        let demand = [1.];
        let distance = [1.];
        let mut flow = [0.];
        let (mut alpha, mut beta) = ([0.], [0.]);
        let mut cost = 0.;

        let status = solve(
            &supply, &demand, &distance, &mut flow, &mut alpha, &mut beta, &mut cost, 0,
        );
        assert_eq!(status, Status::Infeasible);
        assert_eq!(flow, [0.]);
    }
}
