mod admission_evaluator;
mod admission_review;
pub mod component_factory;
mod image_checker;
mod scan_engine;
mod scan_report_client;
mod verdict;

pub use admission_evaluator::{AdmissionEvaluator, ImageOutcome, PodEvaluation};
pub use admission_review::{
    AdmissionRequest, AdmissionRequestError, AdmissionResponse, ContainerImage, ResponseStatus,
    mutate, validate,
};
pub use image_checker::{ImageCheckError, ImageChecker};
pub use scan_engine::{ScanEngine, ScanEngineError};
pub use scan_report_client::{RetryPolicy, ScanReportClient};
pub use verdict::{PassStatusPolicy, ScanFailed, VerdictPolicy};
