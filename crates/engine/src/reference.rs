//! Reference image lifecycle
//!
//! The first regression image captured for a fingerprint becomes its
//! reference. Later runs leave an existing reference alone until it is
//! explicitly discarded.

use std::path::Path;
use tokio::fs;
use tracing::{debug, info};
use vizreg_common::{CaseState, TestCase};

use crate::error::{RegressionError, RegressionResult};

pub(crate) async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Make sure `case` has a reference image, creating it from the capture if needed
pub async fn ensure_reference(case: &mut TestCase) -> RegressionResult<()> {
    let paths = case.artifacts();

    if !path_exists(&paths.regression).await {
        return Err(RegressionError::MissingRegressionArtifact(paths.regression));
    }

    if path_exists(&paths.reference).await {
        debug!("Reference exists: {}", paths.reference.display());
        case.reference_fresh = Some(false);
    } else {
        fs::copy(&paths.regression, &paths.reference)
            .await
            .map_err(|e| RegressionError::ReferenceWriteFailed {
                from: paths.regression.clone(),
                to: paths.reference.clone(),
                reason: e.to_string(),
            })?;
        info!("Created reference for {} at {}", case.url, case.viewport);
        case.reference_fresh = Some(true);
    }

    case.advance(CaseState::Referenced)?;
    Ok(())
}

/// Remove the reference image of `case`, returning whether one existed
pub async fn discard_reference(case: &TestCase) -> RegressionResult<bool> {
    let reference = case.artifacts().reference;
    match fs::remove_file(&reference).await {
        Ok(()) => {
            info!("Discarded reference {}", reference.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vizreg_common::{CaseInput, FingerprintBuilder, Settings};

    fn captured_case(dir: &Path) -> TestCase {
        let settings = Settings::default();
        let input = CaseInput::new("http://localhost:3000/static")
            .with_viewport(500, 500)
            .with_path(dir);
        let mut case = FingerprintBuilder::new(&settings).build(&input).unwrap();
        case.advance(CaseState::Captured).unwrap();
        case
    }

    #[tokio::test]
    async fn test_first_run_creates_reference() {
        let tmp = TempDir::new().unwrap();
        let mut case = captured_case(tmp.path());
        let paths = case.artifacts();
        fs::write(&paths.regression, b"first capture").await.unwrap();

        ensure_reference(&mut case).await.unwrap();

        assert_eq!(case.reference_fresh, Some(true));
        assert_eq!(case.state, CaseState::Referenced);
        assert_eq!(fs::read(&paths.reference).await.unwrap(), b"first capture");
    }

    #[tokio::test]
    async fn test_existing_reference_is_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut case = captured_case(tmp.path());
        let paths = case.artifacts();
        fs::write(&paths.reference, b"baseline").await.unwrap();
        fs::write(&paths.regression, b"new capture").await.unwrap();

        ensure_reference(&mut case).await.unwrap();

        assert_eq!(case.reference_fresh, Some(false));
        assert_eq!(fs::read(&paths.reference).await.unwrap(), b"baseline");
    }

    #[tokio::test]
    async fn test_missing_regression_image() {
        let tmp = TempDir::new().unwrap();
        let mut case = captured_case(tmp.path());

        let err = ensure_reference(&mut case).await.unwrap_err();

        assert!(matches!(err, RegressionError::MissingRegressionArtifact(_)));
        assert_eq!(case.reference_fresh, None);
        assert!(!path_exists(&case.artifacts().reference).await);
    }

    #[tokio::test]
    async fn test_copy_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut case = captured_case(tmp.path());
        // A directory passes the existence check but cannot be copied
        fs::create_dir(&case.artifacts().regression).await.unwrap();

        let err = ensure_reference(&mut case).await.unwrap_err();

        assert!(matches!(err, RegressionError::ReferenceWriteFailed { .. }));
        assert_eq!(case.reference_fresh, None);
    }

    #[tokio::test]
    async fn test_discard_reference() {
        let tmp = TempDir::new().unwrap();
        let case = captured_case(tmp.path());
        assert!(!discard_reference(&case).await.unwrap());

        fs::write(&case.artifacts().reference, b"baseline").await.unwrap();
        assert!(discard_reference(&case).await.unwrap());
        assert!(!path_exists(&case.artifacts().reference).await);
    }
}
