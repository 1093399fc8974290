//! Transcoding worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidiox_media::{FfmpegToolkit, ToolPaths};
use vidiox_queue::{JobQueue, JobStatusTracker, RedisStatusStore};
use vidiox_storage::{build_publisher, StorageConfig};
use vidiox_worker::{metrics, JobExecutor, Pipeline, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS to S3 and Redis)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vidiox-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!("Metrics listening on port {}", port),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let toolkit = FfmpegToolkit::new(ToolPaths::from_env(), Some(config.ffmpeg_timeout.as_secs()));
    if let Err(e) = toolkit.verify() {
        error!("Media tools unavailable: {}", e);
        std::process::exit(1);
    }

    let publisher = match StorageConfig::from_env() {
        Ok(storage) => match build_publisher(&storage).await {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to create artifact publisher: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Invalid storage configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = publisher.check().await {
        warn!("Object storage check failed, uploads may fail: {}", e);
    }

    let tracker = match RedisStatusStore::from_env() {
        Ok(store) => JobStatusTracker::new(Arc::new(store)),
        Err(e) => {
            warn!("Job tracking disabled: {}", e);
            JobStatusTracker::disabled()
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::new(
        Arc::new(toolkit),
        publisher,
        tracker,
        config.processed_dir.clone(),
    )
    .with_job_timeout(config.job_timeout);

    let executor = Arc::new(JobExecutor::new(config, queue, pipeline));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vidiox=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
