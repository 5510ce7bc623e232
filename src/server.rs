//! Listener lifecycle: bind, serve, and drain both servers on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::AppState;
use crate::api::{create_app_router, create_metrics_router};
use crate::config::normalize_listen_addr;
use crate::error::{GreeterError, Result};

/// Both listeners, bound and serving.
pub struct Servers {
    pub http_addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    http: JoinHandle<Result<()>>,
    metrics: JoinHandle<Result<()>>,
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr = normalize_listen_addr(addr);
    let result = TcpListener::bind(&addr).await;
    result.map_err(|source| GreeterError::Bind { addr, source })
}

/// Bind both listeners before serving either, so a bad address fails fast.
pub async fn start(state: Arc<AppState>) -> Result<Servers> {
    let app = create_app_router(state.clone());
    let metrics = create_metrics_router(state.clone());
    start_with(state, app, metrics).await
}

/// Like [`start`], serving the given routers on the two listeners.
pub async fn start_with(state: Arc<AppState>, app: Router, metrics: Router) -> Result<Servers> {
    let http_listener = bind(&state.settings.http.listen).await?;
    let metrics_listener = bind(&state.settings.metrics.listen).await?;

    let http_addr = http_listener.local_addr().map_err(GreeterError::Serve)?;
    let metrics_addr = metrics_listener.local_addr().map_err(GreeterError::Serve)?;

    tracing::info!(listen = %http_addr, "HTTP server listening");
    let http = spawn_server(http_listener, app, state.clone());

    tracing::info!(listen = %metrics_addr, "Prometheus metrics listening");
    let metrics = spawn_server(metrics_listener, metrics, state);

    Ok(Servers {
        http_addr,
        metrics_addr,
        http,
        metrics,
    })
}

fn spawn_server(
    listener: TcpListener,
    router: Router,
    state: Arc<AppState>,
) -> JoinHandle<Result<()>> {
    let shutdown = state.shutdown_signal();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(GreeterError::Serve)
    })
}

impl Servers {
    /// Serve until `signal` resolves or a server dies, then drain both
    /// servers within `grace`.
    pub async fn run_until<F>(
        mut self,
        state: Arc<AppState>,
        signal: F,
        grace: Duration,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let early_exit = tokio::select! {
            _ = signal => None,
            res = &mut self.http => Some(("http", res)),
            res = &mut self.metrics => Some(("metrics", res)),
        };

        if let Some((name, res)) = early_exit {
            state.trigger_shutdown();
            let err = match res {
                Ok(Ok(())) => GreeterError::Internal(format!("{} server exited unexpectedly", name)),
                Ok(Err(e)) => e,
                Err(e) => GreeterError::Internal(format!("{} server task failed: {}", name, e)),
            };
            tracing::error!(server = name, error = %err, "server stopped before shutdown");
            return Err(err);
        }

        tracing::info!(
            grace_period_seconds = grace.as_secs(),
            "received termination signal, shutting down"
        );
        state.trigger_shutdown();

        let drained = tokio::time::timeout(grace, async {
            let (http, metrics) = tokio::join!(&mut self.http, &mut self.metrics);
            for (name, res) in [("http", http), ("metrics", metrics)] {
                match res {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(server = name, error = %e, "server shutdown failed"),
                    Err(e) => tracing::warn!(server = name, error = %e, "server task failed"),
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                grace_period_seconds = grace.as_secs(),
                "in-flight requests did not finish within grace period"
            );
            self.http.abort();
            self.metrics.abort();
        }

        tracing::info!("shutdown complete");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
