//! Command-line entry point wiring for the Vigil dashboard.

mod bootstrap;
mod cli_args;

pub use bootstrap::{init_tracing, run_dashboard};
pub use cli_args::Cli;
