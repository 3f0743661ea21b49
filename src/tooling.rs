//! Tooling & Integration Layer
//!
//! Command-line access to the engine for operators and scripts.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
