use json_patch::{Patch, PatchOperation, ReplaceOperation, jsonptr::PointerBuf};
use k8s_openapi::api::core::v1::{Container, Pod};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::AdmissionEvaluator;
use crate::domain::{AdmissionDecision, ImageReference, InvalidImageReference};

/// A container image together with the JSON pointer of its `image` field in
/// the pod, used to patch it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerImage {
    pub name: String,
    pub image: ImageReference,
    pub pointer: PointerBuf,
}

/// What the webhook transport hands over for one admission review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionRequest {
    uid: String,
    containers: Vec<ContainerImage>,
}

#[derive(Error, Debug)]
pub enum AdmissionRequestError {
    #[error("the pod has no spec")]
    MissingSpec,

    #[error("container at {0} has no image")]
    MissingImage(PointerBuf),

    #[error("container at {pointer} has an invalid image: {source}")]
    InvalidImage {
        pointer: PointerBuf,
        #[source]
        source: InvalidImageReference,
    },
}

impl AdmissionRequest {
    pub fn new(uid: impl Into<String>, containers: Vec<ContainerImage>) -> Self {
        Self {
            uid: uid.into(),
            containers,
        }
    }

    /// Collects the images of a pod, init containers first, each list in
    /// declaration order.
    pub fn from_pod(uid: impl Into<String>, pod: &Pod) -> Result<Self, AdmissionRequestError> {
        let spec = pod.spec.as_ref().ok_or(AdmissionRequestError::MissingSpec)?;

        let lists: [(&str, &[Container]); 2] = [
            (
                "initContainers",
                spec.init_containers.as_deref().unwrap_or_default(),
            ),
            ("containers", spec.containers.as_slice()),
        ];

        let mut containers = Vec::new();
        for (list, entries) in lists {
            for (index, container) in entries.iter().enumerate() {
                let index = index.to_string();
                let pointer = PointerBuf::from_tokens(["spec", list, index.as_str(), "image"]);

                let raw_image = container
                    .image
                    .as_deref()
                    .ok_or_else(|| AdmissionRequestError::MissingImage(pointer.clone()))?;
                let image = ImageReference::parse(raw_image).map_err(|source| {
                    AdmissionRequestError::InvalidImage {
                        pointer: pointer.clone(),
                        source,
                    }
                })?;

                containers.push(ContainerImage {
                    name: container.name.clone(),
                    image,
                    pointer,
                });
            }
        }

        Ok(Self::new(uid, containers))
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn containers(&self) -> &[ContainerImage] {
        &self.containers
    }

    pub fn images(&self) -> Vec<ImageReference> {
        self.containers.iter().map(|c| c.image.clone()).collect()
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ResponseStatus {
    pub message: String,
}

impl AdmissionResponse {
    const JSON_PATCH: &'static str = "JSONPatch";

    fn from_decision(uid: &str, decision: &AdmissionDecision) -> Self {
        Self {
            uid: uid.to_owned(),
            allowed: decision.is_allowed(),
            status: decision.reason().map(|message| ResponseStatus {
                message: message.to_owned(),
            }),
            patch: None,
            patch_type: None,
        }
    }

    fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self.patch_type = Some(Self::JSON_PATCH.to_owned());
        self
    }
}

/// Validating entry point: the plain decision.
pub async fn validate(
    evaluator: &AdmissionEvaluator,
    request: &AdmissionRequest,
) -> AdmissionResponse {
    let decision = evaluator.evaluate_pod(&request.images()).await.into_decision();
    info!(
        "validation of request {} allowed: {}",
        request.uid(),
        decision.is_allowed()
    );

    AdmissionResponse::from_decision(request.uid(), &decision)
}

/// Mutating entry point: the decision plus, for allowed pods, a patch
/// pinning every tag-addressed image to the digest it was checked at.
pub async fn mutate(
    evaluator: &AdmissionEvaluator,
    request: &AdmissionRequest,
) -> AdmissionResponse {
    let evaluation = evaluator.evaluate_pod(&request.images()).await;
    let response = AdmissionResponse::from_decision(request.uid(), evaluation.decision());

    if !evaluation.decision().is_allowed() {
        return response;
    }

    let operations = request
        .containers()
        .iter()
        .zip(evaluation.outcomes())
        .filter(|(container, _)| !container.image.is_digest_addressed())
        .filter_map(|(container, outcome)| {
            let digest = outcome.result.as_ref().ok()?;
            Some(PatchOperation::Replace(ReplaceOperation {
                path: container.pointer.clone(),
                value: Value::String(container.image.pinned_to(digest)),
            }))
        })
        .collect::<Vec<_>>();

    info!(
        "mutation of request {} pins {} image(s)",
        request.uid(),
        operations.len()
    );

    if operations.is_empty() {
        return response;
    }
    response.with_patch(Patch(operations))
}
