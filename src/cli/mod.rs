// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Command-line interface.
//!
//! Argument parsing plus the `extract`, `classify`, and `info` commands.

// Modules
/// CLI arguments.
pub mod args;

/// Dataset classification command.
pub mod classify;

/// Feature extraction command.
pub mod extract;

/// Dataset statistics command.
pub mod info;

/// Logging macros and verbosity control.
pub mod logging;
