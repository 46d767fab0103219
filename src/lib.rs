use std::any::Any;
use std::collections::HashMap;
use std::sync::LazyLock;

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

/// Element type used for weights, costs, flows and potentials.
pub type E = f64;
/// Index type used for node and arc identifiers.
pub type I = usize;

pub mod callback;
pub mod costs;
pub mod emd;
pub mod graph;
pub mod pivot;
pub mod simplex;
pub mod terminators;
pub mod tree;

#[cfg(test)]
pub mod tests;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// Status codes for optimization solvers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// An optimal solution was found.
    Optimal,
    /// The problem is infeasible.
    Infeasible,
    /// The problem is unbounded.
    Unbounded,
    /// The status is unknown or not determined.
    Unknown,
    /// The solver stopped due to a time limit.
    TimeLimit,
    /// The solver stopped due to an iteration limit.
    IterationLimit,
    /// The solver was interrupted (e.g., by user or signal).
    Interrupted,
}

impl Status {
    /// Stable integer code shared with other EMD solver frontends.
    ///
    /// `Infeasible = 0`, `Optimal = 1`, `Unbounded = 2`,
    /// `IterationLimit = 3`. All other variants map to `-1`.
    pub fn code(self) -> i32 {
        match self {
            Status::Infeasible => 0,
            Status::Optimal => 1,
            Status::Unbounded => 2,
            Status::IterationLimit => 3,
            _ => -1,
        }
    }

    /// Whether a solution (flow, duals, cost) has been written out.
    pub fn has_solution(self) -> bool {
        matches!(self, Status::Optimal | Status::IterationLimit)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

/// Trait for iterative optimization solvers.
///
/// Provides a standard interface for algorithms that proceed by repeated iteration,
/// such as simplex, interior-point, or gradient-based methods.
pub trait Solver {
    /// Run the solver until convergence or termination.
    fn solve(&mut self, hooks: &mut SolverHooks) -> Status;
}

/// Per-iteration hooks attached to a solver run.
pub struct SolverHooks {
    pub callback: Box<dyn crate::callback::Callback>,
    pub terminator: Box<dyn crate::terminators::Terminator>,
}

impl SolverHooks {
    /// Hooks that neither report progress nor terminate the solver.
    pub fn none() -> Self {
        Self {
            callback: Box::new(crate::callback::NoOpCallback {}),
            terminator: Box::new(crate::terminators::IterationTerminator::new(0)),
        }
    }
}

/// Option registry for [`SolverOptions`].
///
/// | Option Name   | Type    | Default | Description                                              |
/// |---------------|---------|---------|----------------------------------------------------------|
/// | max_iter      | `u64`   | 0       | Pivot limit, 0 means unlimited                           |
/// | num_threads   | `usize` | 1       | Pricing worker threads, 1 is serial, 0 is all available  |
/// | block_size    | `usize` | 0       | Pricing block size, 0 means automatic                    |
static OPTION_REGISTRY: LazyLock<HashMap<String, Box<dyn OptionTrait>>> = LazyLock::new(|| {
    let mut map: HashMap<String, Box<dyn OptionTrait>> = HashMap::new();
    map.extend([
        ("max_iter".to_string(), Box::new(0u64) as Box<dyn OptionTrait>),
        ("num_threads".to_string(), Box::new(1usize) as Box<dyn OptionTrait>),
        ("block_size".to_string(), Box::new(0usize) as Box<dyn OptionTrait>),
    ]);
    map
});

/// String-keyed solver options with type-checked access.
///
/// Options not present in the registry cannot be set; see
/// [`OPTION_REGISTRY`] for the available names and defaults.
#[derive(Clone)]
pub struct SolverOptions {
    map: HashMap<String, Box<dyn OptionTrait>>,
}

impl SolverOptions {
    pub fn new() -> Self {
        let map = OPTION_REGISTRY.clone();
        Self { map }
    }

    pub fn get_option<T: OptionTrait>(&self, name: &str) -> Option<T>
    where
        T: Clone,
    {
        self.map
            .get(name)
            .and_then(|v| {
                // Downcast to the concrete type
                (v.as_ref() as &dyn Any).downcast_ref::<T>()
            })
            .cloned()
    }

    pub fn set_option<T: OptionTrait>(&mut self, name: &str, value: T) -> Result<(), String> {
        if !self.map.contains_key(name) {
            return Err(format!("Option '{}' is not registered.", name));
        }

        if (self.map.get(name).unwrap().as_ref() as &dyn Any)
            .downcast_ref::<T>()
            .is_some()
        {
            self.map.insert(name.to_string(), Box::new(value));
            Ok(())
        } else {
            Err(format!(
                "Type mismatch for option '{}'. Expected {}.",
                name,
                std::any::type_name::<T>(),
            ))
        }
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Infeasible.code(), 0);
        assert_eq!(Status::Optimal.code(), 1);
        assert_eq!(Status::Unbounded.code(), 2);
        assert_eq!(Status::IterationLimit.code(), 3);
        assert_eq!(Status::InProgress.code(), -1);
        assert!(Status::Optimal.has_solution());
        assert!(Status::IterationLimit.has_solution());
        assert!(!Status::Infeasible.has_solution());
    }

    #[test]
    fn test_options_roundtrip() {
        let mut options = SolverOptions::new();
        assert_eq!(options.get_option::<u64>("max_iter"), Some(0));

        options.set_option("max_iter", 100u64).unwrap();
        assert_eq!(options.get_option::<u64>("max_iter"), Some(100));

        // Wrong type is rejected, value is untouched
        assert!(options.set_option("max_iter", 100usize).is_err());
        assert_eq!(options.get_option::<u64>("max_iter"), Some(100));

        // Unregistered options are rejected
        assert!(options.set_option("nonsense", 1u64).is_err());
    }
}
