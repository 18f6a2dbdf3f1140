use thiserror::Error;

use super::{ScanEngineError, ScanFailed};
use crate::domain::{ImageDigest, ImageReference};

/// Per-image check used by the admission evaluator. A successful check
/// yields the digest the verdict was computed for.
#[async_trait::async_trait]
pub trait ImageChecker: Send + Sync {
    async fn check_image(&self, image: &ImageReference) -> Result<ImageDigest, ImageCheckError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageCheckError {
    #[error("Unable to obtain image digest: {0}")]
    DigestUnavailable(#[source] ScanEngineError),

    #[error("Unable to obtain scan report: {0}")]
    ReportUnavailable(#[source] ScanEngineError),

    #[error(transparent)]
    ScanFailed(#[from] ScanFailed),

    #[error("Image check aborted: {0}")]
    Interrupted(#[source] ScanEngineError),
}
