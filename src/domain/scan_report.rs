use std::collections::BTreeMap;

use itertools::Itertools;
use serde_json::Value;
use thiserror::Error;

use super::ImageDigest;

/// The latest scan evaluation for one (digest, tag) pair.
#[derive(PartialEq, Clone, Debug)]
pub struct ScanReport {
    digest: ImageDigest,
    tag: String,
    status: String,
    detail: Value,
}

impl ScanReport {
    pub fn digest(&self) -> &ImageDigest {
        &self.digest
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }
}

/// A single evaluation as listed under a tag, before it is bound to its
/// digest and tag.
#[derive(PartialEq, Clone, Debug)]
pub struct ScanEvaluation {
    status: String,
    detail: Value,
}

impl ScanEvaluation {
    pub fn new(status: impl Into<String>, detail: Value) -> Self {
        Self {
            status: status.into(),
            detail,
        }
    }
}

/// One element of a report collection: digest -> full tag -> evaluations.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct ScanReportEntry {
    by_digest: BTreeMap<String, BTreeMap<String, Vec<ScanEvaluation>>>,
}

impl ScanReportEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_evaluation(
        &mut self,
        digest: impl Into<String>,
        tag: impl Into<String>,
        evaluation: ScanEvaluation,
    ) {
        self.by_digest
            .entry(digest.into())
            .or_default()
            .entry(tag.into())
            .or_default()
            .push(evaluation);
    }

    /// Registers a digest/tag pair with no evaluations under it.
    pub fn add_tag(&mut self, digest: impl Into<String>, tag: impl Into<String>) {
        self.by_digest
            .entry(digest.into())
            .or_default()
            .entry(tag.into())
            .or_default();
    }

    pub fn add_digest(&mut self, digest: impl Into<String>) {
        self.by_digest.entry(digest.into()).or_default();
    }
}

/// Report lookup result for a single digest query.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct ScanReportCollection {
    entries: Vec<ScanReportEntry>,
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum IntegrityError {
    #[error("scan report list is empty")]
    EmptyReportList,

    #[error("unexpected scan report: multiple entries")]
    MultipleEntries,

    #[error("digest in the scan report does not match")]
    DigestMismatch,

    #[error("scan report for digest has no tag entry")]
    MissingTag,

    #[error("unexpected scan report: multiple tag entries ({0})")]
    MultipleTags(String),

    #[error("scan report has no evaluation under tag {0}")]
    MissingEvaluation(String),
}

impl ScanReportCollection {
    pub fn new(entries: Vec<ScanReportEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extracts the only report for `digest`. The collection must hold exactly
    /// one entry, keyed by `digest`, with exactly one tag under it.
    pub fn into_single_report(self, digest: &ImageDigest) -> Result<ScanReport, IntegrityError> {
        let mut entries = self.entries;
        if entries.len() > 1 {
            return Err(IntegrityError::MultipleEntries);
        }
        let mut entry = entries.pop().ok_or(IntegrityError::EmptyReportList)?;

        let mut by_tag = entry
            .by_digest
            .remove(digest.as_str())
            .ok_or(IntegrityError::DigestMismatch)?;

        if by_tag.len() > 1 {
            return Err(IntegrityError::MultipleTags(by_tag.keys().join(", ")));
        }
        let (tag, evaluations) = by_tag.pop_first().ok_or(IntegrityError::MissingTag)?;

        let evaluation = evaluations
            .into_iter()
            .next()
            .ok_or_else(|| IntegrityError::MissingEvaluation(tag.clone()))?;

        Ok(ScanReport {
            digest: digest.clone(),
            tag,
            status: evaluation.status,
            detail: evaluation.detail,
        })
    }
}
