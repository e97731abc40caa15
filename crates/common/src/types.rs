//! Core types for vizreg

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Browser viewport geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-case options as supplied by the caller.
///
/// Every field is kept as a raw JSON value: the fingerprint builder decides
/// whether a value is usable or whether the configured default applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseOptions {
    #[serde(alias = "width")]
    pub vw: Value,
    #[serde(alias = "height")]
    pub vh: Value,
    pub threshold: Value,
    pub wait: Value,
    pub path: Value,
}

/// A `{url, options}` pair submitted for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseInput {
    #[serde(alias = "uri")]
    pub url: Value,
    pub options: CaseOptions,
}

impl CaseInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Value::String(url.into()),
            options: CaseOptions::default(),
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.options.vw = Value::from(width);
        self.options.vh = Value::from(height);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.options.threshold = Value::from(threshold);
        self
    }

    pub fn with_wait(mut self, wait_ms: u64) -> Self {
        self.options.wait = Value::from(wait_ms);
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.options.path = Value::String(path.as_ref().to_string_lossy().into_owned());
        self
    }
}

/// Position of a test case in the regression pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Pending,
    Captured,
    Referenced,
    Compared,
    Persisted,
    Errored,
}

impl Default for CaseState {
    fn default() -> Self {
        Self::Pending
    }
}

impl CaseState {
    /// Whether `next` directly follows `self`
    pub fn can_transition_to(self, next: CaseState) -> bool {
        use CaseState::*;
        match (self, next) {
            (Errored, _) => false,
            (_, Errored) => true,
            (Pending, Captured)
            | (Captured, Referenced)
            | (Referenced, Compared)
            | (Compared, Persisted) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaseState::Persisted | CaseState::Errored)
    }
}

impl std::fmt::Display for CaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseState::Pending => write!(f, "pending"),
            CaseState::Captured => write!(f, "captured"),
            CaseState::Referenced => write!(f, "referenced"),
            CaseState::Compared => write!(f, "compared"),
            CaseState::Persisted => write!(f, "persisted"),
            CaseState::Errored => write!(f, "errored"),
        }
    }
}

/// Which of the three images of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Regression,
    Reference,
    Difference,
}

impl ArtifactKind {
    fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Regression => "regression",
            ArtifactKind::Reference => "reference",
            ArtifactKind::Difference => "difference",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The image paths belonging to one fingerprint in one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub regression: PathBuf,
    pub reference: PathBuf,
    pub difference: PathBuf,
}

impl ArtifactPaths {
    pub fn derive(output_dir: &Path, fingerprint: &str) -> Self {
        let path_for =
            |kind: ArtifactKind| output_dir.join(format!("{}_{}.png", fingerprint, kind.suffix()));
        Self {
            regression: path_for(ArtifactKind::Regression),
            reference: path_for(ArtifactKind::Reference),
            difference: path_for(ArtifactKind::Difference),
        }
    }

    pub fn get(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Regression => &self.regression,
            ArtifactKind::Reference => &self.reference,
            ArtifactKind::Difference => &self.difference,
        }
    }
}

/// One fingerprinted unit of regression work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub url: String,
    pub viewport: Viewport,
    pub threshold: f64,
    pub wait_ms: u64,
    pub fingerprint: String,
    pub output_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub state: CaseState,
    pub captured: Option<bool>,
    pub reference_fresh: Option<bool>,
    pub matched: Option<bool>,
}

impl TestCase {
    /// Artifact paths, recomputed from `output_dir` and `fingerprint`
    pub fn artifacts(&self) -> ArtifactPaths {
        ArtifactPaths::derive(&self.output_dir, &self.fingerprint)
    }

    /// First 12 hex chars of the fingerprint, for logs and tables
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }

    /// Move to the next pipeline state
    pub fn advance(&mut self, next: CaseState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Enter the absorbing error state
    pub fn fail(&mut self) {
        self.state = CaseState::Errored;
    }
}

/// One persisted row of a results ledger, keyed by `(hash, path)`.
///
/// Only the key is required. Rows written by other tools may carry any
/// subset of the remaining fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub hash: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fresh: Option<bool>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
}

impl LedgerEntry {
    /// A bare row with only its key set
    pub fn new(hash: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            hash: hash.into(),
            path: path.into(),
            url: None,
            viewport: None,
            threshold: None,
            wait: None,
            timestamp: None,
            screenshot: None,
            fresh: None,
            matched: None,
        }
    }
}

impl From<&TestCase> for LedgerEntry {
    fn from(case: &TestCase) -> Self {
        Self {
            url: Some(case.url.clone()),
            viewport: Some(case.viewport),
            threshold: Some(case.threshold),
            wait: Some(case.wait_ms),
            timestamp: Some(case.created_at),
            screenshot: case.captured,
            fresh: case.reference_fresh,
            matched: case.matched,
            ..Self::new(case.fingerprint.clone(), case.output_dir.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> TestCase {
        TestCase {
            url: "http://localhost:3000/static".to_string(),
            viewport: Viewport::new(500, 500),
            threshold: 0.01,
            wait_ms: 0,
            fingerprint: "ab".repeat(64),
            output_dir: PathBuf::from("/tmp/shots"),
            created_at: Utc::now(),
            state: CaseState::Pending,
            captured: None,
            reference_fresh: None,
            matched: None,
        }
    }

    #[test]
    fn test_artifacts_share_directory_and_prefix() {
        let case = case();
        let paths = case.artifacts();
        for kind in [ArtifactKind::Regression, ArtifactKind::Reference, ArtifactKind::Difference] {
            let path = paths.get(kind);
            assert_eq!(path.parent(), Some(case.output_dir.as_path()));
            let name = path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with(&case.fingerprint));
            assert!(name.ends_with(&format!("_{}.png", kind)));
        }
        assert_eq!(paths, case.artifacts());
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut case = case();
        for next in [
            CaseState::Captured,
            CaseState::Referenced,
            CaseState::Compared,
            CaseState::Persisted,
        ] {
            case.advance(next).unwrap();
        }
        assert!(case.state.is_terminal());
    }

    #[test]
    fn test_state_machine_rejects_skips() {
        let mut case = case();
        let err = case.advance(CaseState::Compared).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(case.state, CaseState::Pending);
    }

    #[test]
    fn test_errored_is_absorbing() {
        let mut case = case();
        case.advance(CaseState::Captured).unwrap();
        case.fail();
        assert!(case.advance(CaseState::Referenced).is_err());
        assert!(!CaseState::Errored.can_transition_to(CaseState::Errored));
    }

    #[test]
    fn test_ledger_entry_uses_match_field_name() {
        let mut case = case();
        case.matched = Some(true);
        let json = serde_json::to_value(LedgerEntry::from(&case)).unwrap();
        assert_eq!(json["match"], Value::Bool(true));
        assert_eq!(json["hash"], Value::String(case.fingerprint.clone()));
    }

    #[test]
    fn test_ledger_entry_needs_only_its_key() {
        let entry: LedgerEntry =
            serde_json::from_value(serde_json::json!({ "hash": "H", "path": "/tmp/shots", "match": true }))
                .unwrap();
        assert_eq!(entry.matched, Some(true));
        assert_eq!(entry.url, None);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({ "hash": "H", "path": "/tmp/shots", "match": true }));
    }
}
