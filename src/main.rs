mod cli;
mod commands;
mod context;

use anyhow::Result;
use clap::Parser;
use newsdesk_core::AppConfig;
use tracing::warn;

// mimalloc avoids glibc malloc's reluctance to release memory under the
// pipeline's high fan-out of concurrent HTTP and browser-tab workers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use crate::cli::{Cli, Commands};
use crate::context::Context;

fn main() -> Result<()> {
    // Worker/blocking thread counts are configuration, not hardcoded: unlike
    // a dark-web proxy fleet this workload has no per-network startup cost
    // to size threads around, so the defaults only need an env override for
    // unusually large deployments.
    let worker_threads: usize = std::env::var("NEWSDESK_WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n: &usize| n > 0 && n <= 128)
        .unwrap_or_else(num_cpus_or_default);
    let max_blocking_threads: usize = std::env::var("NEWSDESK_MAX_BLOCKING_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n: &usize| n > 0 && n <= 1024)
        .unwrap_or(256);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(max_blocking_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn num_cpus_or_default() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using embedded defaults");
        include_str!("../config/default.toml").to_string()
    });
    let config: AppConfig = toml::from_str(&config_str)?;

    let ctx = Context::build(config).await?;

    match cli.command {
        Commands::Crawl { category } => commands::crawl::run(&ctx, &category).await,
        Commands::Schedule => commands::schedule::run(&ctx).await,
        Commands::Recover { dry_run } => commands::recover::run(&ctx, dry_run).await,
        Commands::Category { action } => commands::category::run(&ctx, action).await,
        Commands::Status => commands::status::run(&ctx).await,
    }
}
