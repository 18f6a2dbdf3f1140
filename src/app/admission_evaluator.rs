use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{error, info};

use super::{ImageCheckError, ImageChecker, ScanEngineError};
use crate::domain::{AdmissionDecision, ImageDigest, ImageReference};

/// Result of checking one image of a pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageOutcome {
    pub image: ImageReference,
    pub result: Result<ImageDigest, ImageCheckError>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodEvaluation {
    decision: AdmissionDecision,
    outcomes: Vec<ImageOutcome>,
}

impl PodEvaluation {
    pub fn decision(&self) -> &AdmissionDecision {
        &self.decision
    }

    /// Outcomes in the same order as the images that were evaluated.
    pub fn outcomes(&self) -> &[ImageOutcome] {
        &self.outcomes
    }

    pub fn into_decision(self) -> AdmissionDecision {
        self.decision
    }
}

/// Admits a pod only when every one of its images passes. Any failure,
/// including infrastructure errors, denies.
pub struct AdmissionEvaluator {
    checker: Box<dyn ImageChecker>,
    deadline: Option<Duration>,
}

impl AdmissionEvaluator {
    pub fn new(checker: Box<dyn ImageChecker>) -> Self {
        Self {
            checker,
            deadline: None,
        }
    }

    /// Bounds the whole evaluation. Checks still running when it expires are
    /// dropped and their images denied.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub async fn evaluate_pod(&self, images: &[ImageReference]) -> PodEvaluation {
        let expires_at = self.deadline.map(|deadline| (Instant::now() + deadline, deadline));

        let results = join_all(
            images
                .iter()
                .map(|image| self.check_before(image, expires_at)),
        )
        .await;

        let outcomes = images
            .iter()
            .cloned()
            .zip(results)
            .map(|(image, result)| ImageOutcome { image, result })
            .collect::<Vec<_>>();

        let decision = match outcomes.iter().find_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|err| (&outcome.image, err))
        }) {
            Some((image, err)) => {
                error!("image {image} rejected: {err}");
                AdmissionDecision::deny(format!("image {image} rejected: {err}"))
            }
            None => {
                info!("all {} image(s) passed the scan check", outcomes.len());
                AdmissionDecision::allow()
            }
        };

        PodEvaluation { decision, outcomes }
    }

    async fn check_before(
        &self,
        image: &ImageReference,
        expires_at: Option<(Instant, Duration)>,
    ) -> Result<ImageDigest, ImageCheckError> {
        let Some((instant, deadline)) = expires_at else {
            return self.checker.check_image(image).await;
        };

        tokio::time::timeout_at(instant, self.checker.check_image(image))
            .await
            .unwrap_or_else(|_| {
                Err(ImageCheckError::Interrupted(
                    ScanEngineError::RemoteUnavailable(format!(
                        "admission deadline of {}s exceeded",
                        deadline.as_secs_f64()
                    )),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::{mock, predicate::eq};

    use super::AdmissionEvaluator;
    use crate::{
        app::{ImageCheckError, ImageChecker, ScanEngineError, ScanFailed},
        domain::{ImageDigest, ImageReference},
    };

    mock! {
        pub ImageChecker {}
        #[async_trait::async_trait]
        impl ImageChecker for ImageChecker {
            async fn check_image(
                &self,
                image: &ImageReference,
            ) -> Result<ImageDigest, ImageCheckError>;
        }
    }

    fn image(reference: &str) -> ImageReference {
        ImageReference::parse(reference).unwrap()
    }

    fn passes(checker: &mut MockImageChecker, reference: &str) {
        let digest = ImageDigest::new(format!("sha256:{reference}"));
        checker
            .expect_check_image()
            .with(eq(image(reference)))
            .returning(move |_| Ok(digest.clone()));
    }

    fn fails(checker: &mut MockImageChecker, reference: &str, status: &str) {
        let status = status.to_owned();
        checker
            .expect_check_image()
            .with(eq(image(reference)))
            .returning(move |_| {
                Err(ImageCheckError::ScanFailed(ScanFailed {
                    status: status.clone(),
                }))
            });
    }

    #[tokio::test]
    async fn it_allows_a_pod_whose_images_all_pass() {
        let mut checker = MockImageChecker::new();
        passes(&mut checker, "a:1");
        passes(&mut checker, "b:1");

        let evaluation = AdmissionEvaluator::new(Box::new(checker))
            .evaluate_pod(&[image("a:1"), image("b:1")])
            .await;

        assert!(evaluation.decision().is_allowed());
        assert_eq!(evaluation.decision().reason(), None);
        assert_eq!(evaluation.outcomes().len(), 2);
    }

    #[tokio::test]
    async fn it_denies_a_pod_with_one_failing_image() {
        let mut checker = MockImageChecker::new();
        passes(&mut checker, "a:1");
        fails(&mut checker, "b:1", "fail");
        passes(&mut checker, "c:1");

        let decision = AdmissionEvaluator::new(Box::new(checker))
            .evaluate_pod(&[image("a:1"), image("b:1"), image("c:1")])
            .await
            .into_decision();

        assert!(!decision.is_allowed());
        assert_eq!(
            decision.reason(),
            Some("image b:1 rejected: Scan result is FAILED (status: fail)")
        );
    }

    #[tokio::test]
    async fn it_reports_the_first_failure_in_declaration_order() {
        let mut checker = MockImageChecker::new();
        fails(&mut checker, "a:1", "warn");
        fails(&mut checker, "b:1", "fail");

        let decision = AdmissionEvaluator::new(Box::new(checker))
            .evaluate_pod(&[image("a:1"), image("b:1")])
            .await
            .into_decision();

        assert_eq!(
            decision.reason(),
            Some("image a:1 rejected: Scan result is FAILED (status: warn)")
        );
    }

    #[tokio::test]
    async fn it_denies_on_infrastructure_errors() {
        let mut checker = MockImageChecker::new();
        checker.expect_check_image().returning(|_| {
            Err(ImageCheckError::DigestUnavailable(
                ScanEngineError::RemoteUnavailable("connection refused".into()),
            ))
        });

        let decision = AdmissionEvaluator::new(Box::new(checker))
            .evaluate_pod(&[image("a:1")])
            .await
            .into_decision();

        assert!(!decision.is_allowed());
        assert!(
            decision
                .reason()
                .unwrap()
                .contains("Unable to obtain image digest")
        );
    }

    #[tokio::test]
    async fn it_allows_a_pod_without_images() {
        let checker = MockImageChecker::new();

        let decision = AdmissionEvaluator::new(Box::new(checker))
            .evaluate_pod(&[])
            .await
            .into_decision();

        assert!(decision.is_allowed());
    }

    struct SlowChecker;

    #[async_trait::async_trait]
    impl ImageChecker for SlowChecker {
        async fn check_image(
            &self,
            image: &ImageReference,
        ) -> Result<ImageDigest, ImageCheckError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ImageDigest::new(image.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn it_denies_when_the_deadline_expires() {
        let decision = AdmissionEvaluator::new(Box::new(SlowChecker))
            .with_deadline(Duration::from_secs(10))
            .evaluate_pod(&[image("a:1")])
            .await
            .into_decision();

        assert!(!decision.is_allowed());
        assert_eq!(
            decision.reason(),
            Some(
                "image a:1 rejected: Image check aborted: unable to reach the scan engine: admission deadline of 10s exceeded"
            )
        );
    }
}
