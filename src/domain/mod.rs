pub mod admission_decision;
pub mod image_reference;
pub mod scan_report;

pub use admission_decision::AdmissionDecision;
pub use image_reference::{ImageDigest, ImageReference, InvalidImageReference};
pub use scan_report::{
    IntegrityError, ScanEvaluation, ScanReport, ScanReportCollection, ScanReportEntry,
};
