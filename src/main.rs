#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use awsaudit::app::inventory::{AwsLambdaFacade, CollectorConfig, FunctionCollector};
use awsaudit::{log_error, log_info, log_warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

fn init_logging(config: &CollectorConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) if !filter.is_empty() => filter,
        _ => config.log_filter.clone(),
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .parse(&filter)
        .with_context(|| format!("Invalid log filter {:?}", filter))?;

    let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "awsaudit") else {
        // No home directory: log to stderr so stdout stays clean JSON
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
        return Ok(());
    };

    let log_dir = proj_dirs.data_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("awsaudit.log");

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    // Owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = file.metadata() {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = std::fs::set_permissions(&log_path, perms) {
                eprintln!("[SECURITY] Failed to set log file permissions: {}", e);
            }
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false), // No ANSI colors in file
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Bridge log crate records into tracing; must run after the subscriber is set
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to initialize log-to-tracing bridge: {}", e);
    }

    tracing::info!("Logging initialized to: {:?}", log_path);
    Ok(())
}

fn regions_from_args(config: &CollectorConfig) -> Vec<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        config.regions.clone()
    } else {
        args
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CollectorConfig::load_or_default()?;
    init_logging(&config)?;

    let regions = regions_from_args(&config);
    log_info!("Collecting Lambda functions in {} regions", regions.len());

    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let collector = FunctionCollector::with_config(
        Arc::new(AwsLambdaFacade::new(sdk_config)),
        &config,
    );

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let mut inventory = BTreeMap::new();
    let mut failed_regions = 0usize;
    for region in regions {
        match collector
            .fetch_all_with_cancellation(&region, &cancel)
            .await
        {
            Ok(collection) => {
                for diagnostic in collection.diagnostics() {
                    eprintln!("warning: {}", diagnostic);
                }
                let transient = collection
                    .diagnostics()
                    .iter()
                    .filter(|d| d.is_transient())
                    .count();
                if transient > 0 {
                    log_warn!(
                        "{} of {} diagnostics in {} were transient, a rerun may fill those fields",
                        transient,
                        collection.diagnostics().len(),
                        region
                    );
                    eprintln!(
                        "note: {}: {} transient failures, rerun to retry them",
                        region, transient
                    );
                }
                inventory.insert(region, collection);
            }
            Err(e) => {
                log_error!("Skipping region {}: {}", region, e);
                eprintln!("error: {}: {}", region, e);
                failed_regions += 1;
                if cancel.is_cancelled() {
                    break;
                }
            }
        }
    }

    if failed_regions > 0 {
        log_warn!("{} regions could not be collected", failed_regions);
    }

    println!("{}", serde_json::to_string_pretty(&inventory)?);
    Ok(())
}
