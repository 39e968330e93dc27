//! rds-log-backup - Main entry point
//!
//! Copies new RDS log files to S3. Fatal errors exit non-zero.

use std::sync::Arc;

use anyhow::Result;
use aws_config::BehaviorVersion;
use clap::Parser;
use rds_log_backup::{
    cli::Cli,
    config::Config,
    destination::S3ObjectStore,
    signing::AwsCredentialSource,
    source::{RdsLogLister, SignedLogFetcher},
    utils, SyncEngine, SyncEvent, SyncRequest,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, config.json_logs())?;

    let request = cli.request().await?;

    tracing::info!(
        "Starting rds-log-backup v{} (instance: {}, bucket: {}, region: {})",
        env!("CARGO_PKG_VERSION"),
        request.instance_name,
        request.bucket_name,
        request.region
    );

    let engine = build_engine(&config, &request).await?;
    let printer = cli.json_events.then(|| spawn_event_printer(engine.subscribe()));

    let result = engine.run(&request).await;

    // Closing the channel lets the printer drain and exit
    drop(engine);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    let summary = result?;
    if !summary.watermark_committed && summary.watermark.is_some() {
        tracing::warn!(
            "Watermark was not saved; the next run resumes from {:?}",
            summary.prior_watermark
        );
    }
    tracing::info!(
        "Run {} finished: {} copied, {} failed, {} listed",
        summary.run_prefix,
        summary.copied,
        summary.failed.len(),
        summary.observed
    );

    Ok(())
}

async fn build_engine(config: &Config, request: &SyncRequest) -> Result<SyncEngine> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(request.region.clone()))
        .load()
        .await;

    let mut rds_config = aws_sdk_rds::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.source.endpoint {
        rds_config = rds_config.endpoint_url(endpoint);
    }
    let rds_client = aws_sdk_rds::Client::from_conf(rds_config.build());

    let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.destination.force_path_style);
    if let Some(endpoint) = &config.destination.endpoint {
        s3_config = s3_config.endpoint_url(endpoint);
    }
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config.build());

    let credentials = Arc::new(AwsCredentialSource::from_sdk_config(&sdk_config)?);

    Ok(SyncEngine::new(
        Arc::new(RdsLogLister::new(rds_client)),
        Arc::new(SignedLogFetcher::new(credentials, &config.source)?),
        Arc::new(S3ObjectStore::new(s3_client, request.bucket_name.clone())),
    ))
}

/// Print each event as one JSON line on stdout.
fn spawn_event_printer(mut rx: broadcast::Receiver<SyncEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::error!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event printer lagged, {} event(s) dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
