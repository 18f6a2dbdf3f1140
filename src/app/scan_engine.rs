use thiserror::Error;

use crate::domain::{ImageDigest, ImageReference, IntegrityError, ScanReportCollection};

/// Remote service that indexes images, assigns digests and produces scan
/// reports. Implementations must be safe to share across requests.
#[async_trait::async_trait]
pub trait ScanEngine: Send + Sync {
    /// Asks the engine to start tracking the image. Registering an image that
    /// is already known must succeed.
    async fn register_image(&self, image: &ImageReference) -> Result<(), ScanEngineError>;

    /// Looks the reference up in the engine's image index.
    async fn resolve_digest(&self, image: &ImageReference) -> Result<ImageDigest, ScanEngineError>;

    /// Fetches the latest, detailed evaluation for the digest under `tag`.
    async fn fetch_reports(
        &self,
        digest: &ImageDigest,
        tag: &str,
    ) -> Result<ScanReportCollection, ScanEngineError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanEngineError {
    #[error("no record found in the scan engine: {0}")]
    NotFound(String),

    #[error("unable to reach the scan engine: {0}")]
    RemoteUnavailable(String),

    #[error("the scan engine rejected the request with status {0}")]
    RemoteRejected(u16),

    #[error("malformed response from the scan engine: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Integrity(#[from] IntegrityError),
}

impl ScanEngineError {
    /// Whether the digest resolution loop may try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::RemoteUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::ScanEngineError;
    use crate::domain::IntegrityError;

    #[rstest]
    #[case(ScanEngineError::NotFound("img".into()), true)]
    #[case(ScanEngineError::RemoteUnavailable("connection refused".into()), true)]
    #[case(ScanEngineError::RemoteRejected(500), false)]
    #[case(ScanEngineError::MalformedResponse("eof".into()), false)]
    #[case(ScanEngineError::Integrity(IntegrityError::DigestMismatch), false)]
    fn it_classifies_transient_errors(#[case] error: ScanEngineError, #[case] transient: bool) {
        assert_eq!(error.is_transient(), transient);
    }
}
