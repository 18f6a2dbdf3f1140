use std::{fmt::Display, time::Duration};

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::anchore_engine_response::{parse_first_digest, parse_report_collection};
use crate::{
    app::{ScanEngine, ScanEngineError},
    domain::{ImageDigest, ImageReference, ScanReportCollection},
};

#[derive(Clone, Deserialize)]
pub struct AnchoreAPIToken(pub String);

impl std::fmt::Debug for AnchoreAPIToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

impl Display for AnchoreAPIToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    /// Verify the engine's TLS certificate. Turn off only for engines that
    /// are reachable solely from inside the cluster.
    pub verify_tls: bool,
    pub request_timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            request_timeout: None,
        }
    }
}

/// HTTP client for the Anchore engine API. Every request carries the token as
/// the basic auth user with an empty password.
#[derive(Clone)]
pub struct AnchoreEngineClient {
    base_url: String,
    api_token: AnchoreAPIToken,
    http: reqwest::Client,
}

impl AnchoreEngineClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: AnchoreAPIToken,
        options: TransportOptions,
    ) -> Result<Self, reqwest::Error> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(!options.verify_tls);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_token,
            http: builder.build()?,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<Bytes, ScanEngineError> {
        let url = format!("{}{}", self.base_url, path);
        info!("sending request to the scan engine: {method} {url} {query:?}");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.api_token.0, Some(""))
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            ScanEngineError::RemoteUnavailable(format!("failed to complete request to {url}: {e}"))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ScanEngineError::RemoteUnavailable(format!("failed to read response from {url}: {e}"))
        })?;

        match status {
            StatusCode::OK => Ok(body),
            StatusCode::NOT_FOUND => Err(ScanEngineError::NotFound(format!(
                "{method} {path} returned {status}"
            ))),
            other => Err(ScanEngineError::RemoteRejected(other.as_u16())),
        }
    }

    /// Lookups only reject on 404. Any other error status means the engine is
    /// not serving the index right now.
    fn status_as_unavailable(err: ScanEngineError) -> ScanEngineError {
        match err {
            ScanEngineError::RemoteRejected(status) => ScanEngineError::RemoteUnavailable(
                format!("the scan engine answered with status {status}"),
            ),
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl ScanEngine for AnchoreEngineClient {
    async fn register_image(&self, image: &ImageReference) -> Result<(), ScanEngineError> {
        let result = self
            .request(
                Method::POST,
                "/images",
                &[],
                Some(json!({ "tag": image.as_str() })),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(ScanEngineError::RemoteRejected(409)) => {
                info!("image {image} was already registered");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_digest(&self, image: &ImageReference) -> Result<ImageDigest, ScanEngineError> {
        let body = self
            .request(
                Method::GET,
                "/images",
                &[("tag", image.as_str()), ("history", "true")],
                None,
            )
            .await
            .map_err(Self::status_as_unavailable)?;

        parse_first_digest(image.as_str(), &body)
    }

    async fn fetch_reports(
        &self,
        digest: &ImageDigest,
        tag: &str,
    ) -> Result<ScanReportCollection, ScanEngineError> {
        let body = self
            .request(
                Method::GET,
                &format!("/images/{digest}/check"),
                &[("tag", tag), ("history", "false"), ("detail", "true")],
                None,
            )
            .await
            .map_err(Self::status_as_unavailable)?;

        parse_report_collection(&body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AnchoreAPIToken, AnchoreEngineClient, TransportOptions};

    #[test]
    fn it_never_prints_the_token() {
        let token = AnchoreAPIToken("s3cret".to_owned());

        assert_eq!(format!("{token}"), "[redacted]");
        assert_eq!(format!("{token:?}"), "[redacted]");
    }

    #[test]
    fn it_verifies_tls_by_default() {
        assert!(TransportOptions::default().verify_tls);
        assert_eq!(TransportOptions::default().request_timeout, None);
    }

    #[test]
    fn it_strips_the_trailing_slash_from_the_base_url() {
        let client = AnchoreEngineClient::new(
            "https://anchore.internal:8228/v1/",
            AnchoreAPIToken("t".to_owned()),
            TransportOptions {
                verify_tls: false,
                request_timeout: Some(Duration::from_secs(5)),
            },
        )
        .unwrap();

        assert_eq!(client.base_url, "https://anchore.internal:8228/v1");
    }
}
