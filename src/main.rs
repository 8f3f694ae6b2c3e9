use std::time::Duration;

use axum::serve;
use race_backend::routes::make_app;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let (app, state) = match make_app().await {
        Ok(res) => res,
        Err(err) => {
            eprintln!("Failed to start: {}", err);
            std::process::exit(1);
        }
    };

    let sweeper = state
        .races
        .spawn_sweeper(Duration::from_secs(state.config.sweep_interval_secs.max(1)));

    let addr = state.config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}", addr);

    if let Err(err) = serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }

    sweeper.abort();
    let report = state
        .races
        .shutdown(Duration::from_secs(state.config.shutdown_grace_secs))
        .await;
    if report.unfinished() > 0 || report.failed > 0 {
        warn!(
            unfinished = report.unfinished(),
            failed = report.failed,
            "Some race sessions were not archived before exit"
        );
    }
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
