use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dbinterface::{
    AppState, AuthManager, ConnectionPool, InterfaceService, build_router, config::Cli,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let bind_addr = cli.bind_addr().map_err(|err| anyhow!(err))?;
    let connection_config = cli
        .connection_config()
        .map_err(|err| anyhow!(err))
        .context("invalid database configuration")?;

    let accounts = cli.user_accounts().map_err(|err| anyhow!(err))?;

    let pool = ConnectionPool::new(connection_config).context("failed to open database")?;
    let service = Arc::new(
        InterfaceService::open(pool.clone())
            .await
            .context("failed to initialize interface service")?,
    );

    let auth = Arc::new(
        AuthManager::open(pool, &cli.admin_user, &cli.admin_password, cli.bcrypt_cost)
            .await
            .context("failed to create admin account")?,
    );
    for (username, password) in &accounts {
        auth.ensure_user(username, password)
            .await
            .with_context(|| format!("failed to provision user {}", username))?;
    }

    let app = build_router(AppState::new(service.clone(), auth));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        bind_addr = %bind_addr,
        database = %cli.database,
        pool = %service.pool().stats(),
        "dbinterface started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("dbinterface stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dbinterface=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
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
}
