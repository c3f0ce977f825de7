use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use warden::config::{StoreBackend, WardenConfig};
use warden::ratelimit::{Algorithm, RateLimiter};
use warden::store::{KeyValueStore, MemoryStore, RedisStore};

/// Per-client rate limiting against a shared key-value store.
#[derive(Debug, Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rate limiting algorithm
    #[arg(short, long, global = true)]
    algorithm: Option<Algorithm>,

    /// Maximum requests per window
    #[arg(long, global = true)]
    max_requests: Option<u64>,

    /// Window length in milliseconds
    #[arg(long, global = true)]
    window_ms: Option<u64>,

    /// Redis URL
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Keep state in process memory instead of Redis
    #[arg(long, global = true)]
    memory: bool,

    /// Print decisions and logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decide one request for each identifier
    Check {
        /// Client identifiers
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Decide a request for each identifier read from stdin, one per line
    Watch,
    /// Check the store is reachable
    Ping,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<WardenConfig> {
        let mut config = match &self.config {
            Some(path) => WardenConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => WardenConfig::default(),
        };

        if let Some(algorithm) = self.algorithm {
            config.limiter.algorithm = algorithm;
        }
        if let Some(max_requests) = self.max_requests {
            config.limiter.max_requests = max_requests;
        }
        if let Some(window_ms) = self.window_ms {
            config.limiter.window_ms = window_ms;
        }
        if let Some(url) = &self.redis_url {
            config.store.url = url.clone();
        }
        if self.memory {
            config.store.backend = StoreBackend::Memory;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warden=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.load_config()?;
    info!(
        algorithm = %config.limiter.algorithm,
        max_requests = config.limiter.max_requests,
        window_ms = config.limiter.window_ms,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    let store: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Redis => Arc::new(
            RedisStore::connect_with_timeout(&config.store.url, config.store.command_timeout())
                .await
                .with_context(|| format!("connecting to {}", config.store.url))?,
        ),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    match cli.command {
        Command::Ping => {
            store.ping().await?;
            println!("PONG");
        }
        Command::Check { ref identifiers } => {
            let limiter = RateLimiter::from_config(&config.limiter, store)?;
            for identifier in identifiers {
                let allowed = limiter.allow(identifier).await;
                print_decision(identifier, allowed, cli.json)?;
            }
        }
        Command::Watch => {
            let limiter = RateLimiter::from_config(&config.limiter, store)?;
            tokio::select! {
                result = watch(&limiter, cli.json) => result?,
                _ = shutdown_signal() => {}
            }
        }
    }

    Ok(())
}

/// Decide one request per stdin line until EOF.
async fn watch(limiter: &RateLimiter, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let identifier = line.trim();
        if identifier.is_empty() {
            continue;
        }
        let allowed = limiter.allow(identifier).await;
        print_decision(identifier, allowed, json)?;
    }
    info!("Input closed");
    Ok(())
}

fn print_decision(identifier: &str, allowed: bool, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::json!({ "identifier": identifier, "allowed": allowed });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!("{}\t{}", identifier, if allowed { "allowed" } else { "denied" });
    }
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
