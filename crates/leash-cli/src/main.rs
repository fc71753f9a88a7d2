//! leash - simulate a sync session through the rate-limited dispatch queue.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use leash_core::domain::{AppPhase, HttpMethod, RequestDescriptor};
use leash_core::impls::WatchLifecycle;
use leash_core::ports::{IdGenerator, SystemClock, Transport, TransportOutcome, UlidGenerator};
use leash_core::{DispatchConfig, DispatcherBuilder};

/// Push a burst of sync requests through the dispatch queue against a simulated server
#[derive(Parser)]
#[command(name = "leash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dispatch config JSON file (can also be set via LEASH_DISPATCH_CONFIG)
    #[arg(long, env = "LEASH_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Number of requests to enqueue
    #[arg(long, default_value_t = 25)]
    requests: usize,

    /// Simulated server latency in milliseconds
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,

    /// Answer the n-th request (1-based) with 429 Too Many Requests
    #[arg(long)]
    reject: Option<usize>,

    /// Start in the background and come to the foreground after this many seconds
    #[arg(long, default_value_t = 0)]
    background_secs: u64,

    /// Override allowed_requests_per_window
    #[arg(long)]
    allowed: Option<usize>,

    /// Override evaluation_window_ms
    #[arg(long)]
    window_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// 実際には送らず、遅延だけ入れて 200 / 429 を返す transport
struct SimulatedServer {
    latency: Duration,
    reject: Option<usize>,
    received: AtomicUsize,
}

#[async_trait]
impl Transport for SimulatedServer {
    async fn send(&self, request: RequestDescriptor) -> TransportOutcome {
        let n = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        info!(n, request = %request, "server received request");
        sleep(self.latency).await;

        if self.reject == Some(n) {
            TransportOutcome::from_status(429)
        } else {
            TransportOutcome::from_status(200)
        }
    }
}

const SYNC_PATHS: [(HttpMethod, &str); 6] = [
    (HttpMethod::Get, "/app/user"),
    (HttpMethod::Get, "/app/family"),
    (HttpMethod::Get, "/app/dogs"),
    (HttpMethod::Post, "/app/dogs/reminders"),
    (HttpMethod::Post, "/app/dogs/logs"),
    (HttpMethod::Put, "/app/dogs/triggers"),
];

fn load_config(cli: &Cli) -> Result<DispatchConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            DispatchConfig::from_json_str(&json)
                .with_context(|| format!("invalid dispatch config in {}", path.display()))?
        }
        None => DispatchConfig::default(),
    };
    if let Some(allowed) = cli.allowed {
        config.allowed_requests_per_window = allowed;
    }
    if let Some(window_ms) = cli.window_ms {
        config.evaluation_window_ms = window_ms;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(&cli)?;
    info!(?config, "dispatch config loaded");

    let initial = if cli.background_secs > 0 {
        AppPhase::Background
    } else {
        AppPhase::Foreground
    };
    let lifecycle = Arc::new(WatchLifecycle::new(initial));
    let server = Arc::new(SimulatedServer {
        latency: Duration::from_millis(cli.latency_ms),
        reject: cli.reject,
        received: AtomicUsize::new(0),
    });

    let queue = DispatcherBuilder::new()
        .config(config)
        .transport(server)
        .lifecycle(lifecycle.clone())
        .spawn()
        .context("failed to start dispatch queue")?;

    // (A) 同期セッション分のリクエストを一気に投入
    let id_gen = UlidGenerator::new(SystemClock);
    for (method, path) in SYNC_PATHS.iter().cycle().take(cli.requests) {
        let request = RequestDescriptor::new(id_gen.generate_request_id(), *method, *path);
        queue.enqueue(request).await;
    }
    info!(requests = cli.requests, "sync requests enqueued");

    // (B) 背面から始めた場合は、しばらくしてから前面へ
    if cli.background_secs > 0 {
        let lifecycle = lifecycle.clone();
        let delay = Duration::from_secs(cli.background_secs);
        tokio::spawn(async move {
            sleep(delay).await;
            info!("host entering foreground");
            lifecycle.enter_foreground();
        });
    }

    // (C) 全部送り終わって返事が揃うまで待つ
    loop {
        let stats = queue.stats().await;
        if stats.queued == 0 && stats.in_flight == 0 && stats.dispatched as usize >= cli.requests {
            let json = serde_json::to_string_pretty(&stats).context("failed to encode stats")?;
            println!("{json}");
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    queue.shutdown_and_join().await;
    Ok(())
}
