use std::{fmt::Display, str::FromStr, sync::LazyLock};

use regex::Regex;
use thiserror::Error;

static DIGEST_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(sha256:[a-f0-9]{64})$").expect("digest suffix regex must compile")
});

/// An image as written in a pod spec, addressed either by tag
/// (`registry/repo:tag`) or by digest (`registry/repo@sha256:...`).
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ImageReference(String);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidImageReference {
    #[error("image reference must not be empty")]
    Empty,
}

impl ImageReference {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, InvalidImageReference> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidImageReference::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digest embedded in a digest-addressed reference, if any.
    pub fn digest(&self) -> Option<ImageDigest> {
        DIGEST_SUFFIX
            .captures(&self.0)
            .and_then(|captures| captures.get(1))
            .map(|digest| ImageDigest::new(digest.as_str()))
    }

    pub fn is_digest_addressed(&self) -> bool {
        self.digest().is_some()
    }

    /// Repository part of the reference, without tag or digest.
    pub fn repository(&self) -> &str {
        let without_digest = match self.0.split_once('@') {
            Some((name, _)) => name,
            None => &self.0,
        };

        let last_component_start = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
        match without_digest[last_component_start..].rfind(':') {
            Some(colon) => &without_digest[..last_component_start + colon],
            None => without_digest,
        }
    }

    pub fn pinned_to(&self, digest: &ImageDigest) -> String {
        format!("{}@{}", self.repository(), digest)
    }
}

impl FromStr for ImageReference {
    type Err = InvalidImageReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed identifier assigned by the scan engine. Opaque.
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct ImageDigest(String);

impl ImageDigest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ImageDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
