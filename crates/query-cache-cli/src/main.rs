//! # Query Cache CLI
//!
//! Sets, reads and invalidates cache entries in a live Redis.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use query_cache::{QueryCache, RedisBackend, RedisConfig, SetOptions};

#[derive(Parser, Debug)]
#[command(name = "qcache")]
#[command(about = "Inspect and manage a dependency-aware query cache")]
struct Args {
    /// Redis URL (overrides REDIS_URL)
    #[arg(long)]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Store a value
    Set {
        key: String,
        value: String,

        /// Dependency name to register the key under (repeatable)
        #[arg(short, long = "dep")]
        deps: Vec<String>,

        /// TTL in seconds (defaults to QUERY_CACHE_DEFAULT_TTL_SECS)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Print a value, exiting with status 1 on a miss
    Get { key: String },
    /// Evict every key registered under a dependency
    Invalidate { dependency: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let redis_url = args.redis_url.unwrap_or(config.redis_url);
    tracing::debug!(
        version = query_cache::VERSION,
        url = %redis_url,
        compression = config.cache.compression,
        dependency_ttl = %config.cache.dependency_ttl,
        "Connecting to Redis"
    );

    let backend = RedisBackend::connect(&RedisConfig { url: redis_url }).await?;
    let cache = QueryCache::new(Arc::new(backend), config.cache)?;

    match args.command {
        Action::Set {
            key,
            value,
            deps,
            ttl,
        } => {
            let mut options = SetOptions::new().dependencies(deps);
            if let Some(secs) = ttl {
                options = options.ttl(Duration::from_secs(secs));
            }
            cache.set(&key, &value, options).await?;
            tracing::info!(%key, "Stored");
        }
        Action::Get { key } => match cache.get(&key).await? {
            Some(value) => println!("{value}"),
            None => {
                tracing::info!(%key, "Miss");
                return Ok(ExitCode::FAILURE);
            }
        },
        Action::Invalidate { dependency } => {
            let evicted = cache.invalidate(&dependency).await?;
            println!("{evicted}");
            tracing::info!(%dependency, evicted, "Invalidated");
        }
    }

    Ok(ExitCode::SUCCESS)
}
