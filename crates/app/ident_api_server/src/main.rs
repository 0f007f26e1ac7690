//! Ident API server binary.
//!
//! Connects Postgres and Redis, runs migrations, and serves the REST API
//! until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ident_api::config::ApiConfig;
use ident_core::cache::RedisCache;
use ident_core::email::{BrevoConfig, BrevoMailer, LogMailer, Mailer};
use ident_core::store::PgStore;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Upper bound on waiting for background email deliveries at shutdown.
const DELIVERY_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// CLI arguments. Anything not given here comes from the environment, see
/// [`ApiConfig::from_env`].
#[derive(Parser, Debug)]
#[command(name = "ident_api_server", about = "Ident API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/ident"
    )]
    database_url: String,

    /// Redis URL for verification codes.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,ident_api=debug,ident_core=debug")
                }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    config.pg_connection_url = args.database_url;
    config.redis_url = args.redis_url;
    let timeout = config.request_timeout();

    info!(bind_addr = %config.bind_addr, "starting ident_api_server");
    info!(
        max_connections = args.max_connections,
        "configuring connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(timeout)
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    ident_core::migrate::migrate(&pool).await?;

    let cache = RedisCache::connect(&config.redis_url, timeout).await?;
    info!("redis cache connected");

    let mailer: Arc<dyn Mailer> = if config.brevo_api_key.is_empty() {
        warn!("BREVO_API_KEY not set, verification codes will only be logged");
        Arc::new(LogMailer)
    } else {
        Arc::new(BrevoMailer::new(BrevoConfig {
            api_key: config.brevo_api_key.clone(),
            sender_email: config.brevo_sender_email.clone(),
            sender_name: config.brevo_sender_name.clone(),
            timeout,
        })?)
    };

    let store = Arc::new(PgStore::new(pool));
    let state = ident_api::AppState::new(
        config.clone(),
        store.clone(),
        store,
        Arc::new(cache),
        mailer,
    );
    let deliveries = state.users.pending_deliveries().clone();
    let app = ident_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    deliveries.close();
    if !deliveries.is_empty() {
        info!(pending = deliveries.len(), "waiting for verification emails");
    }
    if tokio::time::timeout(DELIVERY_DRAIN_TIMEOUT, deliveries.wait())
        .await
        .is_err()
    {
        warn!(
            pending = deliveries.len(),
            "verification emails still pending at shutdown"
        );
    }
    info!("server stopped");
    Ok(())
}
