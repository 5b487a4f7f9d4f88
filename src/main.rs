use dotenvy::dotenv;
use madrasa::router::init_router;
use madrasa::state::init_app_state;
use madrasa_config::ServerConfig;
use madrasa_db::init_db_pool;
use madrasa_observability::{init_metrics, init_tracing};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let _log_guard = init_tracing();
    let metrics = init_metrics();

    if let Err(e) = run(metrics).await {
        error!(error = %e, "Server exited with an error");
        std::process::exit(1);
    }
}

async fn run(
    metrics: Option<madrasa_observability::PrometheusHandle>,
) -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    let db = init_db_pool(&config).await?;

    sqlx::migrate!("./migrations").run(&db).await?;
    info!("Database migrations applied");

    let state = init_app_state(db, metrics);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_task = match state.media_config.sweep_interval {
        Some(period) => {
            let sweeper = state.sweeper.clone();
            let clock = state.clock.clone();
            Some(tokio::spawn(async move {
                sweeper.run(clock, period, shutdown_rx).await
            }))
        }
        None => {
            warn!("MEDIA_SWEEP_INTERVAL_SECS is 0, old media will only be reclaimed on demand");
            None
        }
    };

    let app = init_router(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;

    info!(addr = %config.addr, "Server listening");
    info!("Swagger UI available at /swagger-ui, Scalar at /scalar");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Some(task) = sweeper_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "Retention sweeper task ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(sweeper_shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
    let _ = sweeper_shutdown.send(true);
}
