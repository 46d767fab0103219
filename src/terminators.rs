//! Terminators for controlling and interrupting long-running solves.
//!
//! A terminator is attached to a solver run through
//! [`SolverHooks`](crate::SolverHooks) and polled by the pivot loop once
//! per pivot; returning a [`Status`] ends the solve with that status.
//! This module provides several implementations of the [`Terminator`] trait:
//! - [`IterationTerminator`]: Terminates after a fixed number of pivots.
//! - [`InterruptTerminator`]: Responds to Ctrl-C (SIGINT) or programmatic interrupts.
//! - [`TimeOutTerminator`]: Terminates after a specified time limit.
//! - [`MultipleTerminators`]: Combines multiple terminators.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and **can only be constructed once** per process. Attempting to create multiple instances will result in a panic.

use std::sync::{Arc, atomic::AtomicBool};

use crate::Status;

pub trait Terminator {
    fn initialize(&mut self) {}

    fn terminate(&mut self) -> Option<Status>;
}

/// Terminator that triggers after a fixed number of iterations.
///
/// A limit of 0 means unlimited; the terminator then never fires.
pub struct IterationTerminator {
    max_iter: u64,
    nit: u64,
}

impl IterationTerminator {
    pub fn new(max_iter: u64) -> Self {
        Self { max_iter, nit: 0 }
    }
}

impl Terminator for IterationTerminator {
    fn initialize(&mut self) {
        self.nit = 0;
    }

    fn terminate(&mut self) -> Option<Status> {
        self.nit += 1;
        if self.max_iter > 0 && self.nit >= self.max_iter {
            Some(Status::IterationLimit)
        } else {
            None
        }
    }
}

/// Terminator that responds to Ctrl-C (SIGINT) or programmatic interrupts.
///
/// # Note
/// Only one instance of `InterruptTerminator` can be constructed per process, as it installs a global signal handler.
/// Creating more than one will panic.
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted_clone = interrupted.clone();
            move || {
                interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    pub fn interrupt(&mut self) {
        self.interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<Status> {
        if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            Some(Status::Interrupted)
        } else {
            None
        }
    }
}

/// Terminator that triggers after a specified number of seconds.
pub struct TimeOutTerminator {
    max_time_secs: u64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_time_secs: u64) -> Self {
        Self {
            max_time_secs,
            start_time: std::time::Instant::now(),
        }
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn terminate(&mut self) -> Option<Status> {
        if self.start_time.elapsed().as_secs() >= self.max_time_secs {
            Some(Status::TimeLimit)
        } else {
            None
        }
    }
}

/// Terminator that combines multiple terminators and triggers if any of them do.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        for terminator in &mut self.terminators {
            if let Some(status) = terminator.as_mut().terminate() {
                return Some(status);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // InterruptTerminator is covered in the solver integration tests
    // (src/emd.rs); its global signal handler allows only one instance
    // per test process.

    #[test]
    fn test_iteration_terminator() {
        let mut terminator = IterationTerminator::new(3);
        terminator.initialize();
        assert_eq!(terminator.terminate(), None);
        assert_eq!(terminator.terminate(), None);
        assert_eq!(terminator.terminate(), Some(Status::IterationLimit));

        // A limit of zero never fires
        let mut unlimited = IterationTerminator::new(0);
        unlimited.initialize();
        for _ in 0..100 {
            assert_eq!(unlimited.terminate(), None);
        }
    }

    #[test]
    fn test_timeout_terminator() {
        // A zero-second budget is already spent at the first poll
        let mut terminator = TimeOutTerminator::new(0);
        terminator.initialize();
        assert_eq!(terminator.terminate(), Some(Status::TimeLimit));

        // A generous budget is not
        let mut terminator = TimeOutTerminator::new(3600);
        terminator.initialize();
        assert_eq!(terminator.terminate(), None);
    }

    #[test]
    fn test_multiple_terminators_fire_on_first_trigger() {
        let mut terminator = MultipleTerminators::new(vec![
            Box::new(IterationTerminator::new(2)),
            Box::new(TimeOutTerminator::new(3600)),
        ]);
        terminator.initialize();

        assert_eq!(terminator.terminate(), None);
        assert_eq!(terminator.terminate(), Some(Status::IterationLimit));
    }
}
