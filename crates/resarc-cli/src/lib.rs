//! Inspection commands for resarc archives
//!
//! The `resarc` binary is a thin wrapper over [`run`]. Commands write their
//! report to any [`std::io::Write`], which keeps them testable without
//! spawning a process.

mod commands;
mod config;

pub use commands::{VerifyReport, extract, info, list, run, verify};
pub use config::{Command, Config};
