use std::time::Duration;

use tracing::warn;

use crate::{
    app::{
        AdmissionEvaluator, ScanReportClient,
        component_factory::{ComponentFactory, ComponentFactoryError, Components, Config},
    },
    infra::{AnchoreAPIToken, AnchoreEngineClient, TransportOptions},
};

pub struct ConcreteComponentFactory;

impl ConcreteComponentFactory {
    pub const API_TOKEN_ENV_VAR: &'static str = "ANCHORE_SECURE_TOKEN";
}

impl ComponentFactory for ConcreteComponentFactory {
    fn create_components(&self, config: Config) -> Result<Components, ComponentFactoryError> {
        let token = config
            .engine
            .api_token
            .clone()
            .map(Ok)
            .unwrap_or_else(|| std::env::var(Self::API_TOKEN_ENV_VAR))
            .map(AnchoreAPIToken)?;

        let options = TransportOptions {
            verify_tls: !config.engine.insecure_skip_tls_verify,
            request_timeout: config.engine.request_timeout_secs.map(Duration::from_secs),
        };
        if !options.verify_tls {
            warn!(
                "TLS certificate verification towards the scan engine at {} is disabled",
                config.engine.api_url
            );
        }

        let engine = AnchoreEngineClient::new(config.engine.api_url, token, options)
            .map_err(|e| ComponentFactoryError::HttpClientError(e.to_string()))?;

        let client = ScanReportClient::new(Box::new(engine))
            .with_retry_policy(config.admission.retry_policy());

        let mut evaluator = AdmissionEvaluator::new(Box::new(client));
        if let Some(deadline) = config.admission.deadline() {
            evaluator = evaluator.with_deadline(deadline);
        }

        Ok(Components { evaluator })
    }
}
