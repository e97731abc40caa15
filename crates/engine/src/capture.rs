//! Screenshot capture seam

use async_trait::async_trait;
use vizreg_common::TestCase;

use crate::error::RegressionResult;

/// Produces the regression image of a test case.
///
/// Implementations write a PNG to `case.artifacts().regression`, honouring
/// the case's viewport and wait. A failure is fatal for that case only.
#[async_trait]
pub trait Capture: Send + Sync {
    async fn capture(&self, case: &TestCase) -> RegressionResult<()>;
}
