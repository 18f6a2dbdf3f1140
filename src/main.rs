use std::{error::Error, path::PathBuf};

use clap::Parser;
use image_scan_webhook::{
    app::{
        AdmissionRequest,
        component_factory::{ComponentFactory, Config},
        mutate, validate,
    },
    infra::ConcreteComponentFactory,
};
use k8s_openapi::api::core::v1::Pod;
use tracing_subscriber::EnvFilter;

/// Evaluates the images of a pod against the scan engine and prints the
/// admission response.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON file with the engine and admission configuration.
    #[arg(long)]
    config: PathBuf,

    /// JSON file with the pod object under review.
    #[arg(long)]
    pod: PathBuf,

    /// Identifier echoed back in the response.
    #[arg(long, default_value = "")]
    uid: String,

    /// Answer as a mutating webhook, pinning images to their digests.
    #[arg(long)]
    mutate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config: Config = serde_json::from_str(&tokio::fs::read_to_string(&args.config).await?)?;
    let pod: Pod = serde_json::from_str(&tokio::fs::read_to_string(&args.pod).await?)?;

    let components = ConcreteComponentFactory.create_components(config)?;
    let request = AdmissionRequest::from_pod(args.uid, &pod)?;

    let response = if args.mutate {
        mutate(&components.evaluator, &request).await
    } else {
        validate(&components.evaluator, &request).await
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
