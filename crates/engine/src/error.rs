//! Error types for the regression engine

use std::path::PathBuf;
use thiserror::Error;
use vizreg_common::ArtifactKind;

#[derive(Error, Debug)]
pub enum RegressionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Regression image missing: {0}")]
    MissingRegressionArtifact(PathBuf),

    #[error("{kind} image missing: {path}")]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },

    #[error("Failed to write reference {to} from {from}: {reason}")]
    ReferenceWriteFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Failed to write ledger in {dir}: {reason}")]
    LedgerWriteFailed { dir: PathBuf, reason: String },

    #[error("Capture failed for {url}: {reason}")]
    CaptureFailed { url: String, reason: String },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Comparison failed: {0}")]
    Comparison(String),

    #[error("Case {index} ({url}) failed: {source}")]
    CaseFailed {
        index: usize,
        url: String,
        #[source]
        source: Box<RegressionError>,
    },

    #[error(transparent)]
    Common(vizreg_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<vizreg_common::Error> for RegressionError {
    fn from(e: vizreg_common::Error) -> Self {
        match e {
            vizreg_common::Error::InvalidInput(msg) => RegressionError::InvalidInput(msg),
            other => RegressionError::Common(other),
        }
    }
}

impl RegressionError {
    /// The error behind a `CaseFailed` wrapper, or `self`
    pub fn root(&self) -> &RegressionError {
        match self {
            RegressionError::CaseFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type RegressionResult<T> = Result<T, RegressionError>;
