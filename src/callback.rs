use crate::{E, I, SolverOptions};

/// Snapshot handed to callbacks after every pivot.
pub struct PivotProgress {
    /// Pivots performed so far.
    pub nit: u64,
    /// Arc that entered the basis in this pivot.
    pub entering_arc: I,
    /// Its reduced cost at entry.
    pub reduced_cost: E,
}

/// Hook invoked once per solver iteration for logging, monitoring, or early stopping.
pub trait Callback {
    /// Creates a new callback from solver options.
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    /// Called at the end of each iteration with the current pivot state.
    fn call(&mut self, progress: &PivotProgress);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, _progress: &PivotProgress) {
        // Do nothing
    }
}

/// Prints the entering arc and its reduced cost to stdout each pivot.
pub struct PivotOutput {}

impl Callback for PivotOutput {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, progress: &PivotProgress) {
        let txt = format!(
            "| {:8}: | {:<10} | {:<10.2e} |",
            progress.nit, progress.entering_arc, progress.reduced_cost,
        );
        println!("{}", txt);
    }
}
