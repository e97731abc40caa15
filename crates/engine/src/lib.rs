//! vizreg regression engine
//!
//! Drives test cases through the regression pipeline:
//! - Captures a regression image through a [`Capture`] collaborator
//! - Promotes the first capture of a fingerprint to its reference image
//! - Compares regression and reference through a [`Comparator`]
//! - Merges outcomes into a per-directory results ledger
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RegressionPipeline                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FingerprintBuilder: {url, options} -> TestCase             │
//! │  per case, concurrently:                                    │
//! │    ├── Capture::capture()        -> *_regression.png        │
//! │    ├── reference::ensure_reference() -> *_reference.png     │
//! │    └── visual::compare_case()    -> *_difference.png        │
//! │  ledger::write_each()            -> <dir>/results.json      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod error;
pub mod ledger;
pub mod playwright;
pub mod reference;
pub mod runner;
pub mod visual;

pub use capture::Capture;
pub use error::{RegressionError, RegressionResult};
pub use ledger::{Ledger, LoadState, Merge};
pub use playwright::PlaywrightCapture;
pub use runner::RegressionPipeline;
pub use visual::{Comparator, ComparisonOutcome, ComparisonRequest, PixelComparator};
