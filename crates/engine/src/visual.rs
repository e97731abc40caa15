//! Visual regression testing with screenshot comparison

use async_trait::async_trait;
use image::{Pixel, Rgba, RgbaImage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vizreg_common::{ArtifactKind, CaseState, TestCase};

use crate::error::{RegressionError, RegressionResult};
use crate::reference::path_exists;

/// Images handed to a comparator
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub regression: PathBuf,
    pub reference: PathBuf,
    /// Where the comparator writes the difference image
    pub difference: PathBuf,
    /// Fraction of pixels allowed to differ
    pub threshold: f64,
}

/// Result of a visual comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Fraction of pixels that differ
    pub diff_ratio: f64,

    /// Number of different pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Hash of the regression image
    pub regression_hash: String,

    /// Hash of the reference image
    pub reference_hash: String,
}

/// Compares a regression image against its reference.
///
/// Implementations must write `request.difference` as a side effect.
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(&self, request: &ComparisonRequest) -> RegressionResult<ComparisonOutcome>;
}

/// Compare the images of `case` and record whether they match
pub async fn compare_case(
    case: &mut TestCase,
    comparator: &dyn Comparator,
) -> RegressionResult<ComparisonOutcome> {
    let paths = case.artifacts();

    for kind in [ArtifactKind::Regression, ArtifactKind::Reference] {
        let path = paths.get(kind);
        if !path_exists(path).await {
            return Err(RegressionError::MissingArtifact {
                kind,
                path: path.to_path_buf(),
            });
        }
    }

    let request = ComparisonRequest {
        regression: paths.regression,
        reference: paths.reference,
        difference: paths.difference,
        threshold: case.threshold,
    };
    let outcome = comparator.compare(&request).await?;

    case.matched = Some(outcome.matches);
    case.advance(CaseState::Compared)?;

    if outcome.matches {
        debug!(
            "{} matches its reference ({:.4}% differ)",
            case.url,
            outcome.diff_ratio * 100.0
        );
    } else {
        warn!(
            "Visual regression detected in {} at {}: {:.2}% pixels differ (threshold: {:.2}%)",
            case.url,
            case.viewport,
            outcome.diff_ratio * 100.0,
            case.threshold * 100.0
        );
    }

    Ok(outcome)
}

/// Per-pixel comparator backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct PixelComparator {
    /// Largest per-channel difference still treated as equal
    tolerance: u8,
}

impl Default for PixelComparator {
    fn default() -> Self {
        // Allow small color differences (anti-aliasing, compression)
        Self { tolerance: 5 }
    }
}

impl PixelComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: u8) -> Self {
        Self { tolerance }
    }

    fn compare_blocking(&self, request: &ComparisonRequest) -> RegressionResult<ComparisonOutcome> {
        let regression_hash = hash_file(&request.regression)?;
        let reference_hash = hash_file(&request.reference)?;

        let regression = image::open(&request.regression)?.to_rgba8();
        let reference = image::open(&request.reference)?.to_rgba8();

        if regression.dimensions() != reference.dimensions() {
            warn!(
                "Screenshot dimensions differ: regression {:?} vs reference {:?}",
                regression.dimensions(),
                reference.dimensions()
            );
        }

        // Pixels outside the shared region count as different
        let width = regression.width().max(reference.width());
        let height = regression.height().max(reference.height());
        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = u64::from(width) * u64::from(height);

        for y in 0..height {
            for x in 0..width {
                let actual = pixel_at(&regression, x, y);
                let expected = pixel_at(&reference, x, y);
                match (actual, expected) {
                    (Some(a), Some(b)) if !self.pixels_differ(a, b) => {
                        // Keep original but dim it
                        let channels = a.channels();
                        diff_img.put_pixel(
                            x,
                            y,
                            Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                        );
                    }
                    _ => {
                        diff_pixels += 1;
                        diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                    }
                }
            }
        }

        let diff_ratio = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64
        };

        diff_img.save(&request.difference)?;
        debug!("Wrote difference image {}", request.difference.display());

        Ok(ComparisonOutcome {
            matches: diff_ratio <= request.threshold,
            diff_ratio,
            diff_pixels,
            total_pixels,
            regression_hash,
            reference_hash,
        })
    }

    /// Check if two pixels differ significantly
    fn pixels_differ(&self, a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        a.channels()
            .iter()
            .zip(b.channels())
            .any(|(x, y)| x.abs_diff(*y) > self.tolerance)
    }
}

#[async_trait]
impl Comparator for PixelComparator {
    async fn compare(&self, request: &ComparisonRequest) -> RegressionResult<ComparisonOutcome> {
        let comparator = *self;
        let request = request.clone();
        let outcome = tokio::task::spawn_blocking(move || comparator.compare_blocking(&request))
            .await
            .map_err(|e| RegressionError::Comparison(e.to_string()))??;

        if outcome.regression_hash == outcome.reference_hash {
            info!("Screenshots are byte-identical");
        }
        Ok(outcome)
    }
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

/// Hash a file using SHA256
fn hash_file(path: &Path) -> RegressionResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
