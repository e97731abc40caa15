//! vizreg CLI
//!
//! Command-line interface for running visual regression checks and
//! inspecting the results ledger.

pub mod commands;
pub mod output;
