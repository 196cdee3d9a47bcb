//! CLI layer for literesearch.
//!
//! Provides the command-line interface using clap, with commands for
//! running research and managing prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
