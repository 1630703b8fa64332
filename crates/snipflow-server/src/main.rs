//! snipflow server

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use snipflow_server::{http, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snipflow=info".parse()?))
        .with_target(true)
        .init();

    let http_addr: SocketAddr = config.http_addr.parse()?;
    let shutdown = CancellationToken::new();

    let state = AppState::from_config(&config, shutdown.clone());
    let consumers = state
        .dispatch
        .spawn_consumers(&config.consumer_name, &shutdown);

    info!(
        http_addr = %http_addr,
        content_root = %config.content_root,
        engine = %config.engine_path,
        catalog = %config.catalog_url,
        consumer = %config.consumer_name,
        "Starting snipflow server"
    );

    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let router = http::create_router(state);
    let listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP server error");
    }

    // Stop consumers even when the server exited on its own
    shutdown.cancel();
    for consumer in consumers {
        match consumer.await {
            Ok(Ok(stats)) => info!(
                handled = stats.handled,
                failed = stats.failed,
                undecodable = stats.undecodable,
                read_errors = stats.read_errors,
                "Consumer stopped"
            ),
            Ok(Err(e)) => warn!(error = %e, "Consumer stopped with error"),
            Err(e) => error!(error = %e, "Consumer task panicked"),
        }
    }

    info!("snipflow server stopped");
    served?;
    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        return;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}
