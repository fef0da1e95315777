//! Tooling & Integration Layer
//!
//! Command-line front end over the library.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
