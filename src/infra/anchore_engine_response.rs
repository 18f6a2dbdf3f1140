use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    app::ScanEngineError,
    domain::{ImageDigest, ScanEvaluation, ScanReportCollection, ScanReportEntry},
};

#[derive(Deserialize, Debug)]
struct JsonImageRecord {
    #[serde(rename = "imageDigest")]
    image_digest: Option<String>,
}

/// `GET /images/{digest}/check` answers with digest -> tag -> evaluations
/// maps, one per matching record.
type JsonScanReports = Vec<HashMap<String, HashMap<String, Vec<JsonEvaluation>>>>;

#[derive(Deserialize, Debug)]
struct JsonEvaluation {
    status: String,
    #[serde(default)]
    detail: Value,
}

impl From<JsonEvaluation> for ScanEvaluation {
    fn from(value: JsonEvaluation) -> Self {
        ScanEvaluation::new(value.status, value.detail)
    }
}

/// First digest listed by the image index. An empty index means the engine
/// has not registered the image yet.
pub(super) fn parse_first_digest(
    image: &str,
    body: &[u8],
) -> Result<ImageDigest, ScanEngineError> {
    let records: Vec<JsonImageRecord> = serde_json::from_slice(body).map_err(|e| {
        ScanEngineError::MalformedResponse(format!("failed to unmarshal image list: {e}"))
    })?;

    let Some(record) = records.into_iter().next() else {
        return Err(ScanEngineError::NotFound(format!(
            "image {image} is not in the engine index yet"
        )));
    };

    match record.image_digest {
        Some(digest) if !digest.is_empty() => Ok(ImageDigest::new(digest)),
        _ => Err(ScanEngineError::MalformedResponse(format!(
            "image record for {image} has no digest"
        ))),
    }
}

pub(super) fn parse_report_collection(
    body: &[u8],
) -> Result<ScanReportCollection, ScanEngineError> {
    let reports: JsonScanReports = serde_json::from_slice(body).map_err(|e| {
        ScanEngineError::MalformedResponse(format!("failed to unmarshal scan report: {e}"))
    })?;

    let entries = reports
        .into_iter()
        .map(|by_digest| {
            let mut entry = ScanReportEntry::new();
            for (digest, by_tag) in by_digest {
                if by_tag.is_empty() {
                    entry.add_digest(digest.clone());
                }
                for (tag, evaluations) in by_tag {
                    if evaluations.is_empty() {
                        entry.add_tag(digest.clone(), tag.clone());
                    }
                    for evaluation in evaluations {
                        entry.add_evaluation(digest.clone(), tag.clone(), evaluation.into());
                    }
                }
            }
            entry
        })
        .collect();

    Ok(ScanReportCollection::new(entries))
}
