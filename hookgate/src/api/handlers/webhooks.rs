//! Webhook intake endpoint.
//!
//! The sender only ever learns one of three things: processed (200), rejected (400, always the
//! same body), or failed (500, or 202 when `exhausted_status: accepted`). Why a webhook was
//! rejected or failed goes to the logs and the `hookgate_webhooks_total` counter.

use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    response::Json,
};
use metrics::counter;
use serde_json::{Value, json};
use tracing::instrument;

use crate::{
    AppState,
    config::ExhaustedStatus,
    errors::{Error, Result},
    webhooks::{IntakeResult, ProcessingOutcome, handle_webhook},
};

/// Receive a webhook from `provider`.
///
/// Runs the whole intake under `processing_timeout`. Each handler attempt is timed as
/// `handler.{provider}` and the full intake as `intake.{provider}`.
#[instrument(skip_all)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    request: Request<Body>,
) -> Result<Json<Value>> {
    let config = &state.config;
    let Some(provider_config) = config.provider(&provider) else {
        record_outcome("unknown", "rejected");
        return Err(Error::rejected(format!("unknown provider '{provider}'")));
    };

    let attempts = AtomicU32::new(0);
    let attempts_ref = &attempts;
    let handler = state.handler.as_ref();
    let monitor = state.monitor.as_ref();
    let provider_name = provider.as_str();
    let handler_label = format!("handler.{provider}");
    let handler_label = handler_label.as_str();

    let intake = handle_webhook(
        request,
        provider_config.secret.expose(),
        provider_config.algorithm,
        &config.retry,
        config.body_limit_bytes,
        move |payload| {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            counter!("hookgate_handler_attempts_total", "provider" => provider_name.to_string()).increment(1);
            async move { monitor.timed(handler_label, handler.handle(provider_name, payload)).await }
        },
    );

    let intake_label = format!("intake.{provider}");
    let result = tokio::time::timeout(config.processing_timeout, monitor.timed(&intake_label, intake)).await;

    match result {
        Ok(IntakeResult::Rejected(reason)) => {
            record_outcome(&provider, "rejected");
            Err(Error::rejected(reason))
        }
        Ok(IntakeResult::Accepted(ProcessingOutcome::Success(()))) => {
            record_outcome(&provider, "processed");
            tracing::info!(provider = %provider, "Webhook processed");
            Ok(Json(json!({ "status": "processed" })))
        }
        Ok(IntakeResult::Accepted(ProcessingOutcome::Failure { last_error, attempts_made })) => {
            record_outcome(&provider, "failed");
            Err(Error::ProcessingFailed {
                last_error: format!("{last_error:#}"),
                attempts: attempts_made,
                accepted: config.exhausted_status == ExhaustedStatus::Accepted,
            })
        }
        Err(_elapsed) => {
            let attempts = attempts.load(Ordering::SeqCst);
            record_outcome(&provider, if attempts > 0 { "timed_out" } else { "rejected" });
            Err(deadline_exceeded(attempts, config.exhausted_status))
        }
    }
}

/// Map an expired deadline to a response. Before any handler attempt the webhook had not been
/// verified yet, so it gets the generic rejection.
fn deadline_exceeded(attempts: u32, exhausted_status: ExhaustedStatus) -> Error {
    if attempts == 0 {
        return Error::rejected("deadline exceeded before verification completed");
    }

    Error::ProcessingFailed {
        last_error: "deadline exceeded".to_string(),
        attempts,
        accepted: exhausted_status == ExhaustedStatus::Accepted,
    }
}

fn record_outcome(provider: &str, outcome: &'static str) {
    counter!("hookgate_webhooks_total", "provider" => provider.to_string(), "outcome" => outcome).increment(1);
}
