//! Main application server.
//!
//! Provides the complete server application with signal handling
//! and graceful shutdown coordination.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::metrics::{observe_request, MODEL_LOADED};
use super::observability::{request_id, spans};
use super::rest::create_rest_router;
use crate::embeddings::EmbeddingService;
use crate::error::ServerError;
use crate::{Error, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Application server.
pub struct App {
    config: ServerConfig,
    service: EmbeddingService,
}

impl App {
    /// Create a new application around an embedding service.
    #[must_use]
    pub const fn new(config: ServerConfig, service: EmbeddingService) -> Self {
        Self { config, service }
    }

    /// Build the router with all endpoints.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_rest_router(self.service.clone())
            .layer(middleware::from_fn(track_metrics))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &axum::http::Request<_>| {
                        spans::request_span(
                            request.method().as_str(),
                            &request.uri().to_string(),
                            &request_id(request.headers()),
                        )
                    })
                    .on_response(
                        |response: &Response, latency: Duration, _span: &tracing::Span| {
                            tracing::info!(
                                status = %response.status(),
                                latency = ?latency,
                                "Request completed"
                            );
                        },
                    ),
            )
            .layer(cors)
    }

    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or already in use.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(%addr, "Server listening");
        Ok(listener)
    }

    /// Serve requests until a shutdown signal arrives.
    ///
    /// `loader` is the model load task. The server keeps answering while it
    /// runs; if it fails the server stops and the failure is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to load or the server fails.
    pub async fn serve(self, listener: TcpListener, loader: JoinHandle<Result<()>>) -> Result<()> {
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        tokio::select! {
            result = server => {
                result.map_err(|e| ServerError::Request(e.to_string()))?;
            }
            failure = watch_loader(loader) => {
                tracing::error!(error = %failure, "Model load failed, shutting down");
                return Err(failure);
            }
        }

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Resolve only if the load task fails; pend forever after a successful load.
async fn watch_loader(loader: JoinHandle<Result<()>>) -> Error {
    match loader.await {
        Ok(Ok(())) => {
            MODEL_LOADED.set(1);
            std::future::pending().await
        }
        Ok(Err(e)) => e,
        Err(e) => Error::internal(format!("model load task panicked: {e}")),
    }
}

/// Count and time every request by its matched route.
async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    observe_request(
        &endpoint,
        &method,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
