//! Application entry point: wiring and graceful shutdown.

use anyhow::{Context, Result};
use paygate::auth::JwtKeys;
use paygate::config::Config;
use paygate::db::Database;
use paygate::gateway::state::AppState;
use paygate::gateway::build_router;
use paygate::logging::init_logging;
use paygate::middleware::metrics::{MetricsConfig, MetricsRegistry};
use paygate::middleware::ratelimit::{RateLimitConfig, RateLimiter};
use paygate::migration::{MigrationConfig, Runner};
use paygate::repository::{
    AuditRepository, BalanceRepository, TransactionRepository, UserRepository,
};
use paygate::services::{
    queue, BalanceService, TransactionQueue, TransactionService, UserService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("configuration invalid")?;
    let _log_guard = init_logging(&config);

    info!(
        environment = %config.app_env,
        port = config.port,
        "paygate starting"
    );

    let db = Database::connect(&config.dsn())
        .await
        .context("database connection failed")?;

    run_startup_migrations(&db, &config)
        .await
        .context("startup migrations failed")?;

    // Repositories, services, queue.
    let pool = db.pool().clone();
    let user_repo = UserRepository::new(pool.clone());
    let transaction_repo = TransactionRepository::new(pool.clone());
    let balance_repo = BalanceRepository::new(pool.clone());
    let audit_repo = AuditRepository::new(pool.clone());

    let jwt = Arc::new(JwtKeys::new(&config.jwt_secret));
    let users = Arc::new(UserService::new(user_repo, audit_repo, jwt.clone()));
    let balances = Arc::new(BalanceService::new(balance_repo, pool.clone()));
    let transactions = Arc::new(TransactionService::new(transaction_repo, pool.clone()));

    let transaction_queue = Arc::new(TransactionQueue::new(
        queue::DEFAULT_WORKERS,
        transactions.clone(),
        queue::DEFAULT_BUFFER,
    ));
    transaction_queue.start().await;

    let metrics = Arc::new(MetricsRegistry::new(MetricsConfig::default()));
    let memory_monitor = metrics.clone().spawn_memory_monitor();

    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    let sweeper = rate_limiter.clone().spawn_sweeper();

    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        users,
        balances,
        transactions,
        queue: transaction_queue.clone(),
        jwt,
        metrics,
        rate_limiter,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;

    info!(addr = %addr, "HTTP server listening");

    // The server drains in-flight requests after the shutdown signal, but
    // never for longer than 30 seconds.
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server_task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = drain_rx.await;
        })
        .await
    });

    shutdown_signal().await;
    let _ = drain_tx.send(());

    match tokio::time::timeout(Duration::from_secs(30), &mut server_task).await {
        Ok(joined) => {
            joined.context("server task panicked")?.context("server error")?;
            info!("HTTP server drained cleanly");
        }
        Err(_) => {
            warn!("HTTP drain timed out after 30s, aborting server task");
            server_task.abort();
        }
    }

    // Shutdown sequence continues: drain the queue, then close the pool.
    info!("HTTP server stopped, draining transaction queue");

    if tokio::time::timeout(Duration::from_secs(10), transaction_queue.stop())
        .await
        .is_err()
    {
        warn!("transaction queue drain timed out");
    }

    sweeper.abort();
    memory_monitor.abort();

    info!("closing database pool");
    db.close().await;

    info!("paygate shut down cleanly");
    Ok(())
}

/// Resolve on SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

/// Environment-aware migration policy: auto-migrate outside production,
/// report-only in production.
async fn run_startup_migrations(db: &Database, config: &Config) -> Result<()> {
    let migration_config = match config.app_env.as_str() {
        "development" => MigrationConfig {
            verbose: true,
            ..MigrationConfig::development()
        },
        "staging" => MigrationConfig {
            verbose: true,
            ..MigrationConfig::app_startup()
        },
        "production" => MigrationConfig::production(),
        _ => MigrationConfig::default(),
    };

    let runner = Runner::new(db.pool().clone(), migration_config);
    runner.initialize().await?;

    if config.is_production() {
        // Never auto-migrate production; surface pending work and continue.
        let status = runner.status().await?;
        if status.pending_count > 0 {
            warn!(
                pending_count = status.pending_count,
                current_version = status.current_version,
                "pending migrations present; run the migrate CLI manually"
            );
        } else {
            info!(
                applied_count = status.applied_count,
                current_version = status.current_version,
                "migrations up to date"
            );
        }
        return Ok(());
    }

    let results = runner.run_up(0).await?;
    if results.is_empty() {
        info!("all migrations up to date");
        return Ok(());
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    for result in &results {
        if result.success {
            info!(
                version = result.version,
                name = %result.name,
                duration_ms = result.execution_time_ms,
                "migration applied"
            );
        } else {
            error!(
                version = result.version,
                name = %result.name,
                error = result.error.as_deref().unwrap_or(""),
                "migration failed"
            );
        }
    }

    if succeeded != results.len() {
        anyhow::bail!("migrations failed: {}/{} succeeded", succeeded, results.len());
    }
    Ok(())
}
