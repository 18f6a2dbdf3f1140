use std::{env::VarError, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use super::{AdmissionEvaluator, RetryPolicy};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EngineConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    /// Disables certificate verification towards the scan engine. Only meant
    /// for engines reachable exclusively inside the cluster network.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "AdmissionConfig::default_resolve_attempts")]
    pub resolve_attempts: usize,
    #[serde(default = "AdmissionConfig::default_resolve_delay_ms")]
    pub resolve_delay_ms: u64,
    pub deadline_secs: Option<u64>,
}

impl AdmissionConfig {
    fn default_resolve_attempts() -> usize {
        RetryPolicy::DEFAULT_ATTEMPTS
    }

    fn default_resolve_delay_ms() -> u64 {
        RetryPolicy::DEFAULT_DELAY.as_millis() as u64
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.resolve_attempts,
            Duration::from_millis(self.resolve_delay_ms),
        )
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            resolve_attempts: Self::default_resolve_attempts(),
            resolve_delay_ms: Self::default_resolve_delay_ms(),
            deadline_secs: None,
        }
    }
}

pub struct Components {
    pub evaluator: AdmissionEvaluator,
}

pub trait ComponentFactory {
    fn create_components(&self, config: Config) -> Result<Components, ComponentFactoryError>;
}

#[derive(Error, Debug)]
pub enum ComponentFactoryError {
    #[error("unable to retrieve the scan engine api token from env var: {0}")]
    UnableToRetrieveAPITokenFromEnvVar(#[from] VarError),

    #[error("unable to build the scan engine http client: {0}")]
    HttpClientError(String),
}
