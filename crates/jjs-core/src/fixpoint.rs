//! Fixed-point sequencing of rewrite passes
//!
//! A [`FixpointDriver`] owns an ordered list of passes and reruns the whole
//! list until one full sweep reports no change. The sweep count is bounded;
//! reaching the bound is reported as a warning diagnostic rather than
//! silently accepted.

use crate::diagnostics::DiagnosticHandler;
use crate::errors::CompilationError;
use std::sync::Arc;
use std::time::Instant;

/// A whole-program rewrite over `P`
pub trait OptimizationPass<P> {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    /// Only run when aggressive optimization is enabled
    fn aggressive_only(&self) -> bool {
        false
    }

    /// Rewrite `program`, reporting whether anything changed. Running a pass
    /// again right after it reported `false` must report `false` again.
    fn run(&mut self, program: &mut P) -> Result<bool, CompilationError>;
}

/// Result of driving a pass list to a fixpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixpointOutcome {
    /// Sweeps performed, the final no-change sweep included
    pub iterations: usize,
    /// A sweep finished with no pass reporting a change
    pub converged: bool,
    /// Some sweep changed the program
    pub changed: bool,
}

pub struct FixpointDriver<P> {
    label: &'static str,
    passes: Vec<Box<dyn OptimizationPass<P> + Send>>,
    max_iterations: usize,
    aggressive: bool,
    handler: Arc<dyn DiagnosticHandler>,
}

impl<P> FixpointDriver<P> {
    pub fn new(label: &'static str, max_iterations: usize, aggressive: bool, handler: Arc<dyn DiagnosticHandler>) -> Self {
        Self {
            label,
            passes: Vec::new(),
            max_iterations: max_iterations.max(1),
            aggressive,
            handler,
        }
    }

    pub fn with_pass(mut self, pass: impl OptimizationPass<P> + Send + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass<P> + Send>) {
        self.passes.push(pass);
    }

    /// Names of the passes that will run, in order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes
            .iter()
            .filter(|p| self.aggressive || !p.aggressive_only())
            .map(|p| p.name())
            .collect()
    }

    /// One sweep over every enabled pass
    pub fn sweep(&mut self, program: &mut P) -> Result<bool, CompilationError> {
        let mut changed = false;
        for pass in &mut self.passes {
            if pass.aggressive_only() && !self.aggressive {
                continue;
            }
            let start = Instant::now();
            let pass_changed = pass.run(program)?;
            tracing::debug!(
                fixpoint = self.label,
                pass = pass.name(),
                changed = pass_changed,
                elapsed_us = start.elapsed().as_micros() as u64,
                "pass finished"
            );
            changed |= pass_changed;
        }
        Ok(changed)
    }

    /// Sweep until nothing changes or the iteration bound is reached
    pub fn run(&mut self, program: &mut P) -> Result<FixpointOutcome, CompilationError> {
        let mut any_change = false;
        for iteration in 1..=self.max_iterations {
            let changed = self.sweep(program)?;
            any_change |= changed;
            if !changed {
                tracing::debug!(fixpoint = self.label, iterations = iteration, "fixpoint reached");
                return Ok(FixpointOutcome {
                    iterations: iteration,
                    converged: true,
                    changed: any_change,
                });
            }
        }

        let message = format!(
            "{} did not converge within {} iterations",
            self.label, self.max_iterations
        );
        tracing::warn!(fixpoint = self.label, max_iterations = self.max_iterations, "{}", message);
        self.handler.warning(None, &message);
        Ok(FixpointOutcome {
            iterations: self.max_iterations,
            converged: false,
            changed: any_change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;

    /// Decrements the counter until it reaches zero
    struct CountDown;

    impl OptimizationPass<u32> for CountDown {
        fn name(&self) -> &'static str {
            "count-down"
        }

        fn run(&mut self, program: &mut u32) -> Result<bool, CompilationError> {
            if *program > 0 {
                *program -= 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    struct AlwaysChanges;

    impl OptimizationPass<u32> for AlwaysChanges {
        fn name(&self) -> &'static str {
            "always"
        }

        fn aggressive_only(&self) -> bool {
            true
        }

        fn run(&mut self, program: &mut u32) -> Result<bool, CompilationError> {
            *program += 1;
            Ok(true)
        }
    }

    #[test]
    fn test_runs_until_no_change() {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let mut driver = FixpointDriver::new("test", 100, true, handler.clone()).with_pass(CountDown);
        let mut value = 3;

        let outcome = driver.run(&mut value).unwrap();
        assert_eq!(value, 0);
        assert_eq!(outcome.iterations, 4);
        assert!(outcome.converged);
        assert!(outcome.changed);
        assert_eq!(handler.warning_count(), 0);

        let again = driver.run(&mut value).unwrap();
        assert_eq!(again.iterations, 1);
        assert!(!again.changed);
    }

    #[test]
    fn test_cap_reports_warning() {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let mut driver = FixpointDriver::new("loop", 5, true, handler.clone()).with_pass(AlwaysChanges);
        let mut value = 0;

        let outcome = driver.run(&mut value).unwrap();
        assert!(!outcome.converged);
        assert_eq!(value, 5);
        assert_eq!(handler.warning_count(), 1);
    }

    #[test]
    fn test_aggressive_only_passes_skipped() {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let mut driver = FixpointDriver::new("plain", 10, false, handler)
            .with_pass(CountDown)
            .with_pass(AlwaysChanges);
        let mut value = 1;

        let outcome = driver.run(&mut value).unwrap();
        assert!(outcome.converged);
        assert_eq!(value, 0);
        assert_eq!(driver.pass_names(), vec!["count-down"]);
    }
}
