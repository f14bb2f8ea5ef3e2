//! Runs the whole product composite system in one process.

use std::sync::Arc;

use common::ServiceAddress;
use composite::HttpIntegration;
use messaging::{InMemoryBroker, PublishScheduler};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Resolves once `stop` flips to true.
async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

#[tokio::main]
async fn main() {
    let config = api::Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Broker, backends and their consumers
    let broker = InMemoryBroker::with_partitions(config.partition_count);
    let backends = api::create_backend_state(ServiceAddress::new(&config.host, config.backend_port));
    let consumers = api::start_consumers(&broker, &backends, config.retry_policy()).await;

    // 4. Composite over HTTP clients and the publish scheduler
    let scheduler = Arc::new(
        PublishScheduler::new(config.scheduler_config()).expect("failed to start publish scheduler"),
    );
    let client = Arc::new(HttpIntegration::new(config.backend_urls(), config.fetch_timeout));
    let state = api::create_composite_state(
        client,
        Arc::new(broker.clone()),
        scheduler,
        ServiceAddress::new(&config.host, config.port),
        &config,
    );

    // 5. Start both servers
    let (stop_tx, stop_rx) = watch::channel(false);

    let backend_addr = config.backend_addr();
    let backend_listener = tokio::net::TcpListener::bind(&backend_addr)
        .await
        .expect("failed to bind backend address");
    tracing::info!(addr = %backend_addr, "starting backend server");
    let backend_server = tokio::spawn(
        axum::serve(backend_listener, api::create_backend_app(backends))
            .with_graceful_shutdown(stopped(stop_rx.clone()))
            .into_future(),
    );

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind composite address");
    tracing::info!(%addr, "starting composite server");
    let composite_server = tokio::spawn(
        axum::serve(listener, api::create_composite_app(state, metrics_handle))
            .with_graceful_shutdown(stopped(stop_rx))
            .into_future(),
    );

    // 6. Wait for a signal, then drain servers and consumers
    shutdown_signal().await;
    let _ = stop_tx.send(true);

    for (name, server) in [("composite", composite_server), ("backend", backend_server)] {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(server = name, error = %e, "server error"),
            Err(e) => tracing::error!(server = name, error = %e, "server task failed"),
        }
    }
    for consumer in consumers {
        consumer.shutdown().await;
    }

    tracing::info!("server shut down gracefully");
}
