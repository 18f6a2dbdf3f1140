#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use image_scan_webhook::{
    app::{AdmissionEvaluator, ScanEngine, ScanEngineError, ScanReportClient},
    domain::{ImageDigest, ImageReference, ScanEvaluation, ScanReportCollection, ScanReportEntry},
};
use serde_json::json;

/// How the fake engine answers for one image reference.
#[derive(Clone, Debug, Default)]
pub struct ScriptedImage {
    pub digest: String,
    /// Number of lookups answered with 404 before the digest shows up.
    pub unindexed_lookups: usize,
    /// `None` means the scan has not finished.
    pub status: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeScanEngine {
    images: Arc<Mutex<HashMap<String, ScriptedImage>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeScanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, reference: &str, digest: &str, status: &str) -> Self {
        self.script(
            reference,
            ScriptedImage {
                digest: digest.to_owned(),
                unindexed_lookups: 0,
                status: Some(status.to_owned()),
            },
        )
    }

    pub fn script(self, reference: &str, image: ScriptedImage) -> Self {
        self.images
            .lock()
            .unwrap()
            .insert(reference.to_owned(), image);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ScanEngine for FakeScanEngine {
    async fn register_image(&self, image: &ImageReference) -> Result<(), ScanEngineError> {
        self.record(format!("register {image}"));
        Ok(())
    }

    async fn resolve_digest(&self, image: &ImageReference) -> Result<ImageDigest, ScanEngineError> {
        self.record(format!("resolve {image}"));

        let mut images = self.images.lock().unwrap();
        let Some(scripted) = images.get_mut(image.as_str()) else {
            return Err(ScanEngineError::NotFound(format!("GET /images {image}")));
        };
        if scripted.unindexed_lookups > 0 {
            scripted.unindexed_lookups -= 1;
            return Err(ScanEngineError::NotFound(format!("GET /images {image}")));
        }
        Ok(ImageDigest::new(scripted.digest.clone()))
    }

    async fn fetch_reports(
        &self,
        digest: &ImageDigest,
        tag: &str,
    ) -> Result<ScanReportCollection, ScanEngineError> {
        self.record(format!("check {digest} {tag}"));

        let images = self.images.lock().unwrap();
        let status = images
            .values()
            .find(|scripted| scripted.digest == digest.as_str())
            .and_then(|scripted| scripted.status.clone())
            .ok_or_else(|| ScanEngineError::NotFound(format!("GET /images/{digest}/check")))?;

        let mut entry = ScanReportEntry::new();
        entry.add_evaluation(
            digest.as_str(),
            tag,
            ScanEvaluation::new(status, json!({"policyId": "default"})),
        );
        Ok(ScanReportCollection::new(vec![entry]))
    }
}

pub fn evaluator_for(engine: &FakeScanEngine) -> AdmissionEvaluator {
    AdmissionEvaluator::new(Box::new(ScanReportClient::new(Box::new(engine.clone()))))
}

pub fn image(reference: &str) -> ImageReference {
    ImageReference::parse(reference).expect("valid image reference")
}
