use std::time::Duration;

use tracing::{error, info, warn};

use super::{
    ImageCheckError, ImageChecker, PassStatusPolicy, ScanEngine, ScanEngineError, VerdictPolicy,
};
use crate::domain::{ImageDigest, ImageReference, ScanReport};

/// Bounded, fixed-delay retry used while waiting for the engine to index a
/// freshly registered image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: usize = 6;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// `attempts` counts the initial try and is never less than one.
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Bridges image references to scan reports through a [`ScanEngine`].
///
/// Holds no per-request state: every call restarts from registration, which
/// the engine treats as idempotent.
pub struct ScanReportClient {
    engine: Box<dyn ScanEngine>,
    policy: Box<dyn VerdictPolicy>,
    retry: RetryPolicy,
}

impl ScanReportClient {
    pub fn new(engine: Box<dyn ScanEngine>) -> Self {
        Self {
            engine,
            policy: Box::new(PassStatusPolicy),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn VerdictPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn register_image(&self, image: &ImageReference) -> Result<(), ScanEngineError> {
        self.engine.register_image(image).await.inspect_err(|e| {
            error!("unable to register image {image} in the scan engine: {e}");
        })?;

        info!("added image to the scan engine: {image}");
        Ok(())
    }

    /// Single digest lookup. Transient failures are left for the caller to
    /// report, since it may retry them.
    pub async fn resolve_digest(
        &self,
        image: &ImageReference,
    ) -> Result<ImageDigest, ScanEngineError> {
        let digest = self.engine.resolve_digest(image).await.inspect_err(|e| {
            if !e.is_transient() {
                error!("unable to look up the digest of {image}: {e}");
            }
        })?;

        info!("resolved {image} to digest {digest}");
        Ok(digest)
    }

    /// Registers the image and resolves its digest, retrying transient
    /// failures according to the retry policy. Returns the last error once the
    /// attempts are exhausted.
    ///
    /// The wait between attempts is a timer, so dropping the returned future
    /// cancels the loop.
    pub async fn get_digest_with_retry(
        &self,
        image: &ImageReference,
    ) -> Result<ImageDigest, ScanEngineError> {
        self.register_image(image).await?;

        if let Some(digest) = image.digest() {
            return Ok(digest);
        }

        let mut attempt = 1;
        loop {
            match self.resolve_digest(image).await {
                Ok(digest) => return Ok(digest),
                Err(err) if err.is_transient() && attempt < self.retry.attempts() => {
                    warn!(
                        "digest for {image} not available yet (attempt {attempt}/{}): {err}",
                        self.retry.attempts()
                    );
                    tokio::time::sleep(self.retry.delay()).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(
                            "giving up on the digest of {image} after {attempt} attempt(s): {err}"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Fetches the report for `digest` under `tag`. A missing report is
    /// returned as `NotFound` and never retried here.
    pub async fn get_report(
        &self,
        digest: &ImageDigest,
        tag: &str,
    ) -> Result<ScanReport, ScanEngineError> {
        let collection = match self.engine.fetch_reports(digest, tag).await {
            Ok(collection) => collection,
            Err(err) if err.is_not_found() => {
                warn!("image {digest} with tag {tag} has not been scanned");
                return Err(err);
            }
            Err(err) => {
                error!("scan report error for {digest}: {err}");
                return Err(err);
            }
        };

        collection.into_single_report(digest).map_err(|e| {
            error!("invalid scan report for {digest} with tag {tag}: {e}");
            ScanEngineError::from(e)
        })
    }

    pub async fn get_scan_report(
        &self,
        image: &ImageReference,
    ) -> Result<ScanReport, ImageCheckError> {
        let digest = self
            .get_digest_with_retry(image)
            .await
            .map_err(ImageCheckError::DigestUnavailable)?;

        self.get_report(&digest, image.as_str())
            .await
            .map_err(ImageCheckError::ReportUnavailable)
    }
}

#[async_trait::async_trait]
impl ImageChecker for ScanReportClient {
    async fn check_image(&self, image: &ImageReference) -> Result<ImageDigest, ImageCheckError> {
        let report = self.get_scan_report(image).await?;
        self.policy.evaluate(&report)?;
        Ok(report.digest().clone())
    }
}
