//! # hookgate: Inbound Payment Webhook Gateway
//!
//! `hookgate` receives webhooks from payment providers, proves each one was signed by the
//! provider it claims to come from, and hands the verified payload to a business handler with
//! bounded retry.
//!
//! ## Overview
//!
//! Payment providers (mobile-money operators, card processors, hub-style callback senders) notify
//! us of transactions by POSTing a JSON body together with an HMAC of that body under a secret we
//! share with them. Anyone can POST to a public URL, so nothing in the body is trusted until the
//! signature over the *exact received bytes* has been checked, in constant time. Once verified,
//! the payload is handed to a [`WebhookHandler`](webhooks::WebhookHandler), which is retried with
//! exponential backoff when it fails (the ledger being briefly unavailable, say).
//!
//! ## Request Flow
//!
//! A request to `POST /webhooks/{provider}` goes through:
//!
//! 1. **Provider lookup**: the path segment selects the shared secret and
//!    [`SignatureAlgorithm`](webhooks::SignatureAlgorithm) from [`config`].
//! 2. **Extraction** ([`webhooks::extract`]): the body is read once as raw bytes and the first
//!    recognised signature header is picked up.
//! 3. **Verification** ([`webhooks::signing`]): the HMAC is recomputed and compared in constant
//!    time.
//! 4. **Processing** ([`webhooks::retry`]): the handler runs up to `retry.max_attempts` times.
//!
//! Steps 2-4 are [`webhooks::intake::handle_webhook`]. Any failure in 1-3 produces the same
//! `400 could not process`, so the endpoint cannot be used to probe which check failed. The whole
//! intake runs under `processing_timeout`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use hookgate::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = hookgate::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     hookgate::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod timing;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

pub use timing::{PerformanceMonitor, TimingStats};
use webhooks::{WebhookHandler, create_handler};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(Arc::new(config))
///     .handler(Arc::new(LoggingHandler))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Business handler for verified webhooks
    pub handler: Arc<dyn WebhookHandler>,
    #[builder(default)]
    pub monitor: Arc<PerformanceMonitor>,
}

/// The axum-prometheus layer and its handle. The recorder is process global, so it is installed
/// once and shared by every router built afterwards.
fn prometheus_pair() -> (PrometheusMetricLayer<'static>, PrometheusHandle) {
    static PAIR: OnceLock<(PrometheusMetricLayer<'static>, PrometheusHandle)> = OnceLock::new();
    PAIR.get_or_init(PrometheusMetricLayer::pair).clone()
}

pub fn build_router(state: &AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/webhooks/{provider}", post(api::handlers::webhooks::receive_webhook))
        .route("/internal/timings", get(api::handlers::timings::get_timings))
        .with_state(state.clone());

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = prometheus_pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

pub struct Application {
    router: Router,
    config: Arc<Config>,
}

impl Application {
    /// Create a new application, with the business handler chosen from configuration
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let handler = create_handler(&config)?;
        Self::with_handler(config, Arc::from(handler))
    }

    /// Create a new application around an explicit business handler
    pub fn with_handler(config: Config, handler: Arc<dyn WebhookHandler>) -> anyhow::Result<Self> {
        debug!("Starting hookgate with configuration: {:#?}", config);
        config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

        let providers: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
        info!(providers = ?providers, "Configured webhook providers");

        let config = Arc::new(config);
        let app_state = AppState::builder().config(config.clone()).handler(handler).build();
        let router = build_router(&app_state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "hookgate listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{ScriptedHandler, create_test_config};
    use crate::webhooks::LoggingHandler;

    #[tokio::test]
    async fn test_application_integration() {
        let app = Application::new(create_test_config()).await;
        assert!(app.is_ok(), "Application::new should succeed");

        let server = app.unwrap().into_test_server();

        let health_response = server.get("/healthz").await;
        assert_eq!(health_response.status_code().as_u16(), 200);
        assert_eq!(health_response.text(), "OK");

        // Webhooks are POST only
        let response = server.get("/webhooks/momo").await;
        assert_eq!(response.status_code().as_u16(), 405);
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = create_test_config();
        config.retry.max_attempts = 0;

        assert!(Application::with_handler(config, ScriptedHandler::succeeding()).is_err());
    }

    #[tokio::test]
    async fn test_build_router_with_metrics_disabled() {
        let state = AppState::builder()
            .config(Arc::new(create_test_config()))
            .handler(Arc::new(LoggingHandler))
            .build();
        let server = axum_test::TestServer::new(build_router(&state)).expect("Failed to create test server");

        let metrics_response = server.get("/internal/metrics").await;
        assert_eq!(metrics_response.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_build_router_with_metrics_enabled() {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let state = AppState::builder().config(Arc::new(config)).handler(Arc::new(LoggingHandler)).build();
        let server = axum_test::TestServer::new(build_router(&state)).expect("Failed to create test server");

        // Generate some traffic so the counters exist
        server.post("/webhooks/unknown").await;

        let metrics_response = server.get("/internal/metrics").await;
        assert_eq!(metrics_response.status_code().as_u16(), 200);

        let metrics_content = metrics_response.text();
        assert!(metrics_content.contains("# TYPE"));
        assert!(metrics_content.contains("hookgate_webhooks_total"));
    }
}
