//! Keygate API server binary.
//!
//! Wires the Postgres session store and user directory, the redis
//! verification-code cache, and the SMTP mailer into the axum router.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use keygate_api::config::ApiConfig;
use keygate_api::services::auth::AuthService;
use keygate_api::{AppState, router};
use keygate_core::auth::jwt::{TokenSigner, TokenSigners};
use keygate_core::auth::oauth::OAuthStateStore;
use keygate_core::auth::sessions::PgSessionStore;
use keygate_core::cache::RedisCache;
use keygate_core::directory::PgUserDirectory;
use keygate_core::mail::SmtpMailer;

/// CLI arguments. Everything here can also come from the environment.
#[derive(Parser, Debug)]
#[command(name = "keygate_server", about = "Keygate auth server")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind_addr: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keygate_api=debug,keygate_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;

    info!(database_url = %config.database_url, "starting keygate_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    keygate_core::migrate::migrate(&pool).await?;

    let cache = RedisCache::connect(&config.redis_url).await?;
    let mailer = SmtpMailer::new(&config.smtp)?;

    let signers = TokenSigners::new(&config.access_token, &config.refresh_token);
    let sessions = Arc::new(PgSessionStore::new(pool.clone()));
    let auth = AuthService::new(
        sessions.clone(),
        Arc::new(PgUserDirectory::new(pool)),
        Arc::new(cache),
        Arc::new(mailer),
        signers,
    );

    let state = AppState {
        auth,
        sessions,
        access_signer: TokenSigner::new(&config.access_token),
        oauth_states: Arc::new(OAuthStateStore::new()),
        config: config.clone(),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "keygate listening");

    axum::serve(listener, app).await?;

    Ok(())
}
