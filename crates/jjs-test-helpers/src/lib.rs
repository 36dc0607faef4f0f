//! Test utilities and fixtures for jjs
//!
//! This crate provides shared test helpers that can be used by both
//! unit tests (#[cfg(test)]) and integration tests (tests/ directory):
//! a builder for typed programs, ready-made fixture programs, mock
//! collaborators, compile shortcuts and an interpreter for the output AST.

pub mod builder;
pub mod compile;
pub mod eval;
pub mod fixtures;
pub mod mocks;

pub use builder::ProgramBuilder;
pub use eval::{run_program, EvalError, Evaluator, Value, PRINT_NATIVE};
