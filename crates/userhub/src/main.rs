//! userhub - user account service with revocable token sessions

use anyhow::{Context, Result};
use axum::http::{HeaderName, header::AUTHORIZATION};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{BootstrapConfig, Config};
use userhub_api::{AppState, create_router};
use userhub_auth::{CredentialStore, InMemoryTokenCache, JwtManager, SessionManager};
use userhub_db::{Database, NewUser, User, UserRole};

/// userhub - user account REST service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "USERHUB_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "USERHUB_PORT")]
    port: Option<u16>,

    /// Token signing secret
    #[arg(long, env = "USERHUB_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting userhub v{}", env!("CARGO_PKG_VERSION"));

    // Install the Prometheus recorder before anything records
    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    // Create data directory
    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Initialize database
    let db = Database::new(&config.database_url()).await?;

    // Initialize sessions
    let cache = Arc::new(InMemoryTokenCache::new(config.auth.cache_capacity));
    let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_ttl_secs);
    let sessions = Arc::new(SessionManager::new(jwt, cache));

    // Create the bootstrap admin if no users exist
    bootstrap_admin(&db, &config.bootstrap).await?;

    // Create application state and router
    let state = AppState::new(db.clone(), sessions);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-items-count"),
            HeaderName::from_static("x-page-links"),
        ]);
    let app = create_router(state, metrics_handle)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    db.close().await;
    served?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

/// Create the configured admin account when the store is empty
async fn bootstrap_admin(db: &Database, bootstrap: &BootstrapConfig) -> Result<()> {
    let Some((email, password)) = bootstrap.admin_credentials() else {
        return Ok(());
    };
    if db.has_users().await? {
        return Ok(());
    }

    info!("Creating bootstrap admin user");
    let mut admin = User::new(NewUser {
        email: email.to_string(),
        first_name: bootstrap.admin_first_name.clone(),
        last_name: bootstrap.admin_last_name.clone(),
        dob: bootstrap.admin_dob()?,
        role: UserRole::Admin,
    });
    admin.set_password(password);
    db.save(&admin, false)
        .await
        .context("Failed to create bootstrap admin user")?;

    info!("Bootstrap admin user created (email: {})", email);
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
