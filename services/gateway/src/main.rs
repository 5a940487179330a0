use anyhow::Context;
use clap::Parser;
use order_gateway::bus::{ExecutionFeed, HttpPublisher, MemoryBus, OrderPublisher, WsFeed};
use order_gateway::{AppState, BroadcastRelay, GatewayConfig, create_admin_router, create_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = GatewayConfig::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    config.validate()?;
    info!(?config, "Starting order gateway");

    // In-process bus for whichever side has no external endpoint configured
    let bus = Arc::new(MemoryBus::new(config.publish_buffer));

    let publisher: Arc<dyn OrderPublisher> = match &config.ingest_url {
        Some(url) => Arc::new(HttpPublisher::new(url.as_str(), config.publish_timeout())?),
        None => {
            warn!("no ingest url configured; admitted orders stay on the in-process bus");
            bus.clone()
        }
    };

    let state = AppState::new(&config, publisher);

    let feed: Option<Box<dyn ExecutionFeed>> = match &config.feed_url {
        Some(url) => match WsFeed::connect(url).await {
            Ok(feed) => Some(Box::new(feed) as Box<dyn ExecutionFeed>),
            Err(e) => {
                error!(error = %e, "execution feed unavailable; serving without live executions");
                None
            }
        },
        None => Some(Box::new(bus.subscribe(config.feed_topic.clone())) as Box<dyn ExecutionFeed>),
    };
    if let Some(feed) = feed {
        BroadcastRelay::new(feed, state.hub.clone()).spawn();
    }

    // Bind and serve
    let public = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    let admin = TcpListener::bind(config.admin_listen)
        .await
        .with_context(|| format!("binding {}", config.admin_listen))?;

    info!(listen = %config.listen, admin = %config.admin_listen, "Listening");

    let public_server =
        axum::serve(public, create_router(state.clone())).with_graceful_shutdown(shutdown_signal());
    let admin_server =
        axum::serve(admin, create_admin_router(state)).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { public_server.await },
        async { admin_server.await },
    )?;

    info!("Order gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
