//! Binary entrypoint. `serve` runs the suggestion service; `query` is a
//! one-shot client used for manual smoke-testing against a running service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shellhint::cache::{PrefixCache, Sweeper};
use shellhint::client::RpcClient;
use shellhint::collaborators::StaticFallbackProvider;
use shellhint::config::{Config, ConfigWatcher};
use shellhint::dto::SuggestionRequest;
use shellhint::facade::ServiceFacade;

#[derive(Parser)]
#[command(name = "shellhint", about = "Low-latency shell command suggestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the suggestion service, listening on the configured endpoint.
    Serve,
    /// Send a single `get_suggestions` request to a running service and print the result.
    Query {
        /// Partial command text to complete.
        input: String,
        #[arg(long, default_value = ".")]
        working_dir: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Query { input, working_dir } => query(&input, &working_dir).await,
    }
}

async fn serve() -> Result<()> {
    let config = Config::load();
    info!(endpoint = %config.endpoint_name, "starting shellhint service");

    let cache = Arc::new(PrefixCache::new(config.cache_config()));
    let mut sweeper = Sweeper::spawn(cache.clone(), config.cache_config().cleanup_interval);
    let facade = Arc::new(ServiceFacade::new(
        cache.clone(),
        Arc::new(StaticFallbackProvider),
        config.max_returned,
    ));

    let cancel = CancellationToken::new();
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = ConfigWatcher::default_path(Duration::from_secs(2));
    let watcher_handle = tokio::spawn(watcher.watch(reload_tx, shutdown_rx));

    let server_cancel = cancel.clone();
    let endpoint_name = config.endpoint_name.clone();
    let server_handle = tokio::spawn(async move {
        shellhint::server::run(&endpoint_name, facade, server_cancel).await
    });

    let mut running = config;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("waiting for ctrl-c")?;
                info!("shutdown signal received");
                break;
            }
            Some(next) = reload_rx.recv() => {
                sweeper = apply_reload(&cache, sweeper, &running, next.clone()).await;
                running = next;
            }
        }
    }

    cancel.cancel();
    let _ = shutdown_tx.send(true);

    server_handle.await.context("server task panicked")??;
    let _ = watcher_handle.await;
    sweeper.shutdown().await;
    Ok(())
}

/// Applies one config reload against the running service. `cleanup_interval_secs`
/// is reconstructed in place by tearing down and respawning the sweeper against
/// the same cache. `timeout_ms`/`connect_timeout_ms` have no live component in
/// this process — `RpcClient` is only ever built by the one-shot `query`
/// subcommand, which already calls `Config::load()` fresh on every invocation —
/// so those fields simply take effect the next time a client connects rather
/// than being reconstructed here. Structural fields (`max_prefix_len`,
/// `max_buckets`, `max_entries_per_bucket`) change the cache's own indexing and
/// require a full restart; a change to one of them is logged and ignored.
async fn apply_reload(cache: &Arc<PrefixCache>, sweeper: Sweeper, running: &Config, next: Config) -> Sweeper {
    let structural_change = next.max_prefix_len != running.max_prefix_len
        || next.max_buckets != running.max_buckets
        || next.max_entries_per_bucket != running.max_entries_per_bucket;
    if structural_change {
        warn!("structural config fields changed on disk; ignoring until restart");
        return sweeper;
    }
    if next.cleanup_interval_secs != running.cleanup_interval_secs {
        info!(
            interval_secs = next.cleanup_interval_secs,
            "cleanup interval changed on disk; restarting cache sweeper"
        );
        sweeper.shutdown().await;
        return Sweeper::spawn(cache.clone(), Duration::from_secs(next.cleanup_interval_secs));
    }
    info!("non-structural config reload applied");
    sweeper
}

async fn query(input: &str, working_dir: &str) -> Result<()> {
    let config = Config::load();
    let client: Arc<RpcClient<interprocess::local_socket::tokio::Stream>> = Arc::new(RpcClient::new(
        config.endpoint_name.clone(),
        Duration::from_millis(config.connect_timeout_ms),
        Duration::from_millis(config.timeout_ms),
    ));
    let cancel = CancellationToken::new();
    let request = SuggestionRequest {
        user_input: input.to_string(),
        working_dir: working_dir.to_string(),
        max_suggestions: config.max_returned,
    };
    let response = client.call(request, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
