use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{GateError, Result};
use crate::gate::Gate;
use crate::proxy::connection::ConnectionManager;
use crate::proxy::context::ServerContext;
use crate::proxy::handler::handle_request;
use crate::security::rate_limit::spawn_sweeper;
use crate::telemetry::{init_metrics, start_observability_server};

/// Run the gate until SIGTERM or SIGINT.
///
/// Starts the observability server (when `telemetry.metrics_port` is set)
/// and the window sweeper, then serves `config.listen`.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let shutdown = CancellationToken::new();

    let metrics = match config.telemetry.metrics_port {
        Some(port) => {
            let (metrics, registry) =
                init_metrics().map_err(|e| GateError::Telemetry(e.to_string()))?;
            let upstream: Arc<str> = Arc::from(config.upstream.address.as_str());
            let token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = start_observability_server(port, registry, upstream, token).await {
                    error!(error = %e, "Observability server failed");
                }
            });
            Some(metrics)
        }
        None => None,
    };

    let ctx = Arc::new(ServerContext::new(config.clone(), Gate::from_config(&config), metrics));

    let sweeper = spawn_sweeper(
        ctx.gate.limiter().clone(),
        Duration::from_secs(config.security.rate_limit.sweep_interval_secs),
        shutdown.clone(),
        ctx.metrics.clone(),
    );

    let listener = TcpListener::bind(config.listen).await?;
    spawn_signal_listener(shutdown.clone())?;

    serve(listener, ctx, shutdown).await?;

    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }
    info!("Gate stopped");
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });
    Ok(())
}

/// Accept connections on `listener` until `shutdown` is cancelled, then let
/// open connections finish within `timeout.shutdown_secs`.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let builder = ConnBuilder::new(TokioExecutor::new());
    let connections = ConnectionManager::new(ctx.config.security.max_connections, shutdown.clone());

    let addr = listener.local_addr()?;
    info!(?addr, upstream = %ctx.config.upstream.address, "Gate listening (h1/h2)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                let guard = match connections.try_accept(peer, ctx.metrics.as_ref()) {
                    Ok(guard) => guard,
                    Err(e) => {
                        debug!(?peer, error = %e, "Dropping connection");
                        continue;
                    }
                };

                let builder = builder.clone();
                let ctx = ctx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let ctx = ctx.clone();
                        async move { Ok::<_, hyper::Error>(handle_request(req, ctx, peer).await) }
                    });

                    let conn = builder.serve_connection(TokioIo::new(stream), svc);
                    tokio::pin!(conn);
                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = shutdown.cancelled() => {
                            conn.as_mut().graceful_shutdown();
                            conn.as_mut().await
                        }
                    };
                    if let Err(e) = result {
                        debug!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    let shutdown_timeout = Duration::from_secs(ctx.config.timeout.shutdown_secs);
    info!(
        active_connections = connections.active(),
        timeout_secs = shutdown_timeout.as_secs(),
        "Waiting for active connections to finish"
    );
    let remaining = connections.drain(shutdown_timeout).await;
    if remaining > 0 {
        warn!(active_connections = remaining, "Shutdown timeout reached with connections still open");
    } else {
        info!("All connections closed");
    }
    Ok(())
}
