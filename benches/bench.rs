use divan::Bencher;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn main() {
    divan::main();
}

/// Balanced random transport instance with n supplies and n demands.
fn instance(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut rng = SmallRng::seed_from_u64(42);
    let supply: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() + 0.1).collect();
    let mut demand: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() + 0.1).collect();
    let scale = supply.iter().sum::<f64>() / demand.iter().sum::<f64>();
    demand.iter_mut().for_each(|d| *d *= scale);
    let distance = (0..n * n).map(|_| rng.gen::<f64>() * 10.).collect();
    (supply, demand, distance)
}

fn run(supply: &[f64], demand: &[f64], distance: &[f64], num_threads: usize) -> f64 {
    let n = supply.len();
    let mut flow = vec![0.; n * n];
    let mut alpha = vec![0.; n];
    let mut beta = vec![0.; n];
    let mut cost = 0.;
    let status = if num_threads == 1 {
        otters::emd::solve(
            supply, demand, distance, &mut flow, &mut alpha, &mut beta, &mut cost, 0,
        )
    } else {
        otters::emd::solve_parallel(
            supply,
            demand,
            distance,
            &mut flow,
            &mut alpha,
            &mut beta,
            &mut cost,
            0,
            num_threads,
        )
    };
    assert_eq!(status, otters::Status::Optimal);
    cost
}

#[divan::bench(args = [16, 64, 256])]
fn solve_serial(bencher: Bencher, n: usize) {
    let (supply, demand, distance) = instance(n);
    bencher.bench_local(|| run(&supply, &demand, &distance, 1));
}

#[divan::bench(args = [64, 256])]
fn solve_parallel(bencher: Bencher, n: usize) {
    let (supply, demand, distance) = instance(n);
    bencher.bench_local(|| run(&supply, &demand, &distance, 4));
}
