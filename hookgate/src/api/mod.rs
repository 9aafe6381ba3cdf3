//! HTTP surface.
//!
//! - `POST /webhooks/{provider}`: webhook intake ([`handlers::webhooks`])
//! - `GET /internal/timings`: timing snapshot ([`handlers::timings`])
//! - `GET /internal/metrics`: Prometheus metrics, when enabled
//! - `GET /healthz`: liveness

pub mod handlers;
