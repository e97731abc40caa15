//! Regression pipeline that orchestrates capture, reference and comparison
//!
//! Each test case runs as its own chain:
//!
//! ```text
//! Pending -> Captured -> Referenced -> Compared -> Persisted
//!    \__________\____________\____________\______-> Errored
//! ```
//!
//! All chains of a batch are polled together on the calling task. A failing
//! chain never cancels its siblings; the batch settles once every chain is
//! terminal and results keep the input order.
//!
//! Cases sharing a fingerprint and output directory write the same image
//! files, so they run one after another in input order instead.

use futures::future::join_all;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, info_span, Instrument};
use vizreg_common::{
    parse_batch, CaseInput, CaseState, FingerprintBuilder, LedgerEntry, Settings, TestCase,
};

use crate::capture::Capture;
use crate::error::{RegressionError, RegressionResult};
use crate::ledger;
use crate::reference::{discard_reference, ensure_reference};
use crate::visual::{compare_case, Comparator};

type Settled = (TestCase, RegressionResult<()>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Regression,
    FreshReference,
}

/// Runs batches of test cases through capture, reference and comparison
pub struct RegressionPipeline {
    settings: Settings,
    capture: Arc<dyn Capture>,
    comparator: Arc<dyn Comparator>,
}

impl RegressionPipeline {
    pub fn new(
        settings: Settings,
        capture: Arc<dyn Capture>,
        comparator: Arc<dyn Comparator>,
    ) -> Self {
        Self {
            settings,
            capture,
            comparator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Check every input against its reference and record the outcomes.
    ///
    /// Fails with the first failing case in input order. Sibling cases still
    /// run to completion and successful ones are written to the ledger.
    pub async fn check_regression(&self, inputs: &[CaseInput]) -> RegressionResult<Vec<TestCase>> {
        self.run_cases(inputs).await?.into_iter().collect()
    }

    /// Like [`check_regression`](Self::check_regression), reporting each case separately
    pub async fn run_cases(
        &self,
        inputs: &[CaseInput],
    ) -> RegressionResult<Vec<RegressionResult<TestCase>>> {
        self.execute(inputs, Mode::Regression).await
    }

    /// Replace the reference of every input with a fresh capture
    pub async fn fresh_reference(&self, inputs: &[CaseInput]) -> RegressionResult<Vec<TestCase>> {
        self.execute(inputs, Mode::FreshReference)
            .await?
            .into_iter()
            .collect()
    }

    /// [`check_regression`](Self::check_regression) over an untyped batch
    pub async fn check_regression_value(&self, items: &Value) -> RegressionResult<Vec<TestCase>> {
        let inputs = parse_batch(items)?;
        self.check_regression(&inputs).await
    }

    /// [`fresh_reference`](Self::fresh_reference) over an untyped batch
    pub async fn fresh_reference_value(&self, items: &Value) -> RegressionResult<Vec<TestCase>> {
        let inputs = parse_batch(items)?;
        self.fresh_reference(&inputs).await
    }

    async fn execute(
        &self,
        inputs: &[CaseInput],
        mode: Mode,
    ) -> RegressionResult<Vec<RegressionResult<TestCase>>> {
        // Validation happens before any I/O
        let cases = FingerprintBuilder::new(&self.settings).build_all(inputs)?;

        let start = Instant::now();
        info!("Running {} case(s)...", cases.len());

        let groups = group_by_identity(cases);
        let mut indexed: Vec<(usize, Settled)> =
            join_all(groups.into_iter().map(|group| self.run_group(group, mode)))
                .await
                .into_iter()
                .flatten()
                .collect();
        indexed.sort_by_key(|(index, _)| *index);
        let mut settled: Vec<Settled> = indexed.into_iter().map(|(_, s)| s).collect();

        if mode == Mode::Regression {
            self.persist(&mut settled).await;
        }

        let results: Vec<RegressionResult<TestCase>> = settled
            .into_iter()
            .enumerate()
            .map(|(index, (case, outcome))| match outcome {
                Ok(()) => Ok(case),
                Err(e) => Err(RegressionError::CaseFailed {
                    index,
                    url: case.url,
                    source: Box::new(e),
                }),
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        let mismatched = results
            .iter()
            .filter(|r| matches!(r, Ok(case) if case.matched == Some(false)))
            .count();
        info!(
            "Finished {} case(s): {} errored, {} mismatched ({} ms)",
            results.len(),
            failed,
            mismatched,
            start.elapsed().as_millis()
        );

        Ok(results)
    }

    /// Run cases with one identity back to back
    async fn run_group(&self, group: Vec<(usize, TestCase)>, mode: Mode) -> Vec<(usize, Settled)> {
        let mut settled = Vec::with_capacity(group.len());
        for (index, case) in group {
            settled.push((index, self.run_chain(case, mode).await));
        }
        settled
    }

    async fn run_chain(&self, mut case: TestCase, mode: Mode) -> Settled {
        let span = info_span!("case", fingerprint = %case.short_fingerprint(), url = %case.url);

        let outcome = async {
            fs::create_dir_all(&case.output_dir).await?;
            if mode == Mode::FreshReference {
                discard_reference(&case).await?;
            }
            self.capture_case(&mut case).await?;
            ensure_reference(&mut case).await?;
            if mode == Mode::Regression {
                compare_case(&mut case, self.comparator.as_ref()).await?;
            }
            Ok::<(), RegressionError>(())
        }
        .instrument(span.clone())
        .await;

        if let Err(e) = &outcome {
            let _enter = span.enter();
            error!("Case failed in state {}: {}", case.state, e);
            case.fail();
        }

        (case, outcome)
    }

    async fn capture_case(&self, case: &mut TestCase) -> RegressionResult<()> {
        debug!("Capturing {} at {}", case.url, case.viewport);
        if let Err(e) = self.capture.capture(case).await {
            case.captured = Some(false);
            return Err(e);
        }
        case.captured = Some(true);
        case.advance(CaseState::Captured)?;
        Ok(())
    }

    /// Merge every compared case into its directory's ledger
    async fn persist(&self, settled: &mut [Settled]) {
        let entries: Vec<LedgerEntry> = settled
            .iter()
            .filter(|(case, outcome)| outcome.is_ok() && case.state == CaseState::Compared)
            .map(|(case, _)| LedgerEntry::from(case))
            .collect();

        if entries.is_empty() {
            return;
        }

        let written = ledger::write_each(&entries).await;

        for (case, outcome) in settled.iter_mut() {
            if outcome.is_err() || case.state != CaseState::Compared {
                continue;
            }
            let dir_result = written
                .iter()
                .find(|(dir, _)| *dir == case.output_dir)
                .map(|(_, result)| result);

            match dir_result {
                Some(Ok(_)) => {
                    if let Err(e) = case.advance(CaseState::Persisted) {
                        *outcome = Err(e.into());
                        case.fail();
                    }
                }
                Some(Err(e)) => {
                    let reason = match e {
                        RegressionError::LedgerWriteFailed { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    *outcome = Err(RegressionError::LedgerWriteFailed {
                        dir: case.output_dir.clone(),
                        reason,
                    });
                    case.fail();
                }
                None => {}
            }
        }
    }
}

/// Group cases by `(fingerprint, output_dir)`, keeping input indices and order
fn group_by_identity(cases: Vec<TestCase>) -> Vec<Vec<(usize, TestCase)>> {
    let mut groups: Vec<((String, PathBuf), Vec<(usize, TestCase)>)> = Vec::new();
    for (index, case) in cases.into_iter().enumerate() {
        let position = groups
            .iter()
            .position(|((fp, dir), _)| *fp == case.fingerprint && *dir == case.output_dir);
        match position {
            Some(position) => {
                debug!(
                    "Case {} repeats {} in {}, running it after the earlier one",
                    index,
                    case.short_fingerprint(),
                    case.output_dir.display()
                );
                groups[position].1.push((index, case));
            }
            None => {
                let key = (case.fingerprint.clone(), case.output_dir.clone());
                groups.push((key, vec![(index, case)]));
            }
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizreg_common::CaseInput;

    #[test]
    fn test_identical_cases_share_a_group() {
        let settings = Settings::default();
        let inputs = [
            CaseInput::new("http://a.test").with_viewport(500, 500),
            CaseInput::new("http://b.test").with_viewport(500, 500),
            CaseInput::new("http://a.test").with_viewport(500, 500).with_threshold(0.5),
            CaseInput::new("http://a.test").with_viewport(500, 500).with_path("/tmp/elsewhere"),
        ];
        let cases = FingerprintBuilder::new(&settings).build_all(&inputs).unwrap();

        let groups = group_by_identity(cases);

        let indices: Vec<Vec<usize>> = groups
            .iter()
            .map(|group| group.iter().map(|(index, _)| *index).collect())
            .collect();
        assert_eq!(indices, vec![vec![0, 2], vec![1], vec![3]]);
    }
}
