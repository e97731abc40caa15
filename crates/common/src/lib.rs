//! vizreg common library
//!
//! Data model, test-case fingerprinting and run settings shared by the
//! regression engine and the CLI.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

// Re-export commonly used types
pub use config::{Browser, CaptureConfig, Settings};
pub use error::{Error, Result};
pub use fingerprint::{fingerprint, parse_batch, FingerprintBuilder};
pub use types::*;
