//! CLI Commands

pub mod init;
pub mod reference;
pub mod regression;
pub mod results;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde_json::Value;
use tracing::info;
use vizreg_common::{parse_batch, CaseInput, FingerprintBuilder, Settings};
use vizreg_engine::{PixelComparator, PlaywrightCapture, RegressionPipeline};

/// Options shared by commands that run test cases
#[derive(Args, Debug, Clone)]
pub struct CaseArgs {
    /// Page to capture
    #[arg(required_unless_present = "batch", conflicts_with = "batch")]
    pub url: Option<String>,

    /// JSON file with a list of `{ "url": ..., "options": {...} }` items
    #[arg(long)]
    pub batch: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long)]
    pub vw: Option<u32>,

    /// Viewport height in pixels
    #[arg(long)]
    pub vh: Option<u32>,

    /// Fraction of pixels allowed to differ
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Delay before capturing, in milliseconds
    #[arg(long)]
    pub wait: Option<u64>,

    /// Output directory for images and the results ledger
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Validate and log the cases without capturing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl CaseArgs {
    /// The batch as untyped JSON, read from `--batch` or built from the flags
    pub fn to_value(&self) -> anyhow::Result<Value> {
        match &self.batch {
            Some(file) => {
                let content = std::fs::read_to_string(file)
                    .with_context(|| format!("reading batch file {}", file.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("parsing batch file {}", file.display()))
            }
            None => Ok(serde_json::to_value(vec![self.single()])?),
        }
    }

    /// Typed inputs; batch items go through the same validation as the library
    pub fn inputs(&self) -> anyhow::Result<Vec<CaseInput>> {
        Ok(parse_batch(&self.to_value()?)?)
    }

    fn single(&self) -> CaseInput {
        let mut input = CaseInput::new(self.url.clone().unwrap_or_default());
        if let Some(vw) = self.vw {
            input.options.vw = vw.into();
        }
        if let Some(vh) = self.vh {
            input.options.vh = vh.into();
        }
        if let Some(threshold) = self.threshold {
            input = input.with_threshold(threshold);
        }
        if let Some(wait) = self.wait {
            input = input.with_wait(wait);
        }
        if let Some(path) = &self.path {
            input = input.with_path(path);
        }
        input
    }
}

/// Log what a run would do without touching the browser or the disk
pub fn dry_run(command: &str, inputs: &[CaseInput], settings: &Settings) -> anyhow::Result<()> {
    let cases = FingerprintBuilder::new(settings).build_all(inputs)?;
    info!("Dry run: {} with {} case(s)", command, cases.len());
    for case in &cases {
        info!(
            fingerprint = %case.short_fingerprint(),
            "{} at {} -> {}",
            case.url,
            case.viewport,
            case.output_dir.display()
        );
    }
    Ok(())
}

/// Pipeline backed by Playwright capture and the pixel comparator
pub fn pipeline(settings: Settings) -> anyhow::Result<RegressionPipeline> {
    let capture = PlaywrightCapture::new(settings.capture.clone())?;
    Ok(RegressionPipeline::new(
        settings,
        Arc::new(capture),
        Arc::new(PixelComparator::new()),
    ))
}
