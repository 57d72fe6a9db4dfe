//! # CLI Module
//!
//! Command-line access to the analyzer and validator, for checking interface
//! declarations in CI before they reach the proc-macro.
//!
//! ## Commands
//!
//! ### `lint`
//!
//! Validate every trait in a source file that carries declarations:
//!
//! ```bash
//! brrtclient-lint lint --source src/api.rs
//! ```
//!
//! Options:
//! - `--source <FILE>` - Rust source file to read (required)
//! - `--interface <NAME>` - Only lint this trait
//! - `--errors-only` - Hide warnings and info
//!
//! The process exits with status 1 when any error is reported.
//!
//! ### `inspect`
//!
//! Print the normalized model of one interface: base path, static headers,
//! properties and, per method, the resolved verb, path template, response
//! shape and parameter roles.
//!
//! ```bash
//! brrtclient-lint inspect --source src/api.rs --interface UsersApi
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use brrtclient::cli::{execute, Cli};
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! let outcome = execute(&cli)?;
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{execute, lint_source, run_cli, Cli, Commands, ModelSummary, Outcome};
