//! Clip generation worker binary.
//!
//! Runs the queue executor by default. `--event <file>` processes a single
//! queue-trigger envelope and prints the published metadata instead.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipgen_directory::DirectoryClient;
use clipgen_media::{check_ffmpeg, FfmpegProcessor, FfmpegRunner};
use clipgen_queue::{NotificationChannel, RequestQueue};
use clipgen_storage::S3Client;
use clipgen_worker::metrics::init_metrics;
use clipgen_worker::{ClipOrchestrator, Collaborators, RequestExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipgen=info".parse().unwrap())
        .add_directive("aws_config=warn".parse().unwrap())
        .add_directive("aws_smithy_runtime=warn".parse().unwrap());

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

    info!("Starting clipgen-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            error!("{}", e);
            std::process::exit(1);
        }
        info!("Serving metrics on {}", addr);
    }

    let ffmpeg = match check_ffmpeg(config.ffmpeg_path.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let storage = match S3Client::from_env().await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let directory = match DirectoryClient::from_env() {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Failed to create directory client: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match RequestQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create request queue: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = match NotificationChannel::new(&queue.config().redis_url, &config.notify_channel) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!("Failed to create notification channel: {}", e);
            std::process::exit(1);
        }
    };

    let collaborators = Collaborators {
        directory,
        store: storage.clone(),
        processor: Arc::new(FfmpegProcessor::new(FfmpegRunner::with_binary(ffmpeg))),
        retry_publisher: Arc::new(queue.clone()),
        notifier,
    };
    let orchestrator =
        ClipOrchestrator::new(config, storage.destination_bucket(), collaborators);

    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|a| a == "--event") {
        let Some(path) = args.get(pos + 1) else {
            error!("--event requires a file path");
            std::process::exit(2);
        };
        std::process::exit(run_event(&orchestrator, path).await);
    }

    let executor = Arc::new(RequestExecutor::new(queue, orchestrator));

    // Setup signal handlers
    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, finishing current request");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn run_event(orchestrator: &ClipOrchestrator, path: &str) -> i32 {
    let event = match tokio::fs::read_to_string(path).await {
        Ok(event) => event,
        Err(e) => {
            error!("Failed to read event {}: {}", path, e);
            return 2;
        }
    };

    match orchestrator.handle_event(&event).await {
        Ok(metadata) => {
            match serde_json::to_string_pretty(&metadata) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to render metadata: {}", e),
            }
            0
        }
        Err(e) if e.is_malformed_request() => {
            error!("{}", e);
            2
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}
