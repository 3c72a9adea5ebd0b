use crate::config::Settings;
use crate::metrics::WorkerMetrics;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

/// Sent on every response, whether or not TLS is active
pub const HSTS_HEADER_VALUE: &str = "max-age=31536000; includeSubDomains";

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Failed to resolve health address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to load TLS certificate/key: {0}")]
    Tls(#[source] io::Error),

    #[error("Failed to bind health server: {0}")]
    Bind(#[source] io::Error),

    #[error("Health server error: {0}")]
    Serve(#[source] io::Error),
}

/// Routes for the liveness and metrics endpoints
pub fn router(metrics: Arc<WorkerMetrics>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_HEADER_VALUE),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler(State(metrics): State<Arc<WorkerMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, prometheus::TEXT_FORMAT.to_string()),
                (header::CONTENT_LENGTH, body.len().to_string()),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, HealthError> {
    let failed = |source: io::Error| HealthError::Resolve {
        addr: format!("{}:{}", host, port),
        source,
    };

    tokio::net::lookup_host((host, port))
        .await
        .map_err(failed)?
        .next()
        .ok_or_else(|| failed(io::Error::new(io::ErrorKind::NotFound, "no addresses")))
}

/// Serve the health endpoints until the listener fails
///
/// Uses TLS when both a certificate and key are configured.
pub async fn serve(settings: &Settings, metrics: Arc<WorkerMetrics>) -> Result<(), HealthError> {
    let addr = resolve(&settings.health_host, settings.health_port).await?;
    let app = router(metrics);

    match settings.tls_paths() {
        Some((cert, key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .map_err(HealthError::Tls)?;

            info!("Healthcheck on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
                .map_err(HealthError::Serve)
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(HealthError::Bind)?;

            info!("Healthcheck on http://{}", addr);
            axum::serve(listener, app).await.map_err(HealthError::Serve)
        }
    }
}
