//! End-to-end intake: receive, authenticate, process with retry.
//!
//! ```text
//! Received ─> Extracted ─┬─> Rejected                      (no body, no signature, bad signature)
//!                        └─> Verified ─┬─> Succeeded
//!                                      └─> RetriesExhausted
//! ```
//!
//! Every rejection carries its reason for the logs, but callers must answer the sender with the
//! same response whatever the reason, otherwise the endpoint becomes a verification oracle.

use std::future::Future;

use axum::{
    body::{Body, Bytes},
    http::Request,
};

use super::{
    extract::{ExtractionError, RawWebhookRequest, extract},
    retry::{ProcessingOutcome, RetryPolicy, run_with_retry},
    signing::{self, SignatureAlgorithm, VerificationFailure, VerificationResult},
};

/// Internal reason a webhook was not accepted. Never sent back to the sender.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("no recognised signature header")]
    MissingSignature,
    #[error("signature verification failed: {0}")]
    Verification(VerificationFailure),
}

/// What the HTTP boundary gets back from [`handle_webhook`].
#[derive(Debug)]
pub enum IntakeResult<T, E> {
    Rejected(Rejection),
    Accepted(ProcessingOutcome<T, E>),
}

impl<T, E> IntakeResult<T, E> {
    pub fn accepted(&self) -> bool {
        matches!(self, IntakeResult::Accepted(_))
    }

    pub fn outcome(&self) -> Option<&ProcessingOutcome<T, E>> {
        match self {
            IntakeResult::Accepted(outcome) => Some(outcome),
            IntakeResult::Rejected(_) => None,
        }
    }
}

/// Receive a webhook, authenticate it and process it with retry.
///
/// `handler` is only called once the signature over the exact received bytes has been
/// verified, and then between 1 and `policy.max_attempts` times.
///
/// # Arguments
///
/// * `request` - The inbound HTTP request (body not yet read)
/// * `secret` - The provider's shared secret
/// * `algorithm` - How the provider signs
/// * `policy` - Retry budget for `handler`
/// * `body_limit` - Largest body accepted, in bytes
/// * `handler` - The business handler, called with the verified payload
pub async fn handle_webhook<T, E, F, Fut>(
    request: Request<Body>,
    secret: &[u8],
    algorithm: SignatureAlgorithm,
    policy: &RetryPolicy,
    body_limit: usize,
    handler: F,
) -> IntakeResult<T, E>
where
    F: FnMut(Bytes) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let raw = match extract(request, body_limit).await {
        Ok(raw) => raw,
        Err(e) => return reject(e.into()),
    };

    handle_raw(&raw, secret, algorithm, policy, handler).await
}

/// Verification and processing for an already extracted request.
pub async fn handle_raw<T, E, F, Fut>(
    raw: &RawWebhookRequest,
    secret: &[u8],
    algorithm: SignatureAlgorithm,
    policy: &RetryPolicy,
    mut handler: F,
) -> IntakeResult<T, E>
where
    F: FnMut(Bytes) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let Some(signature) = raw.signature() else {
        return reject(Rejection::MissingSignature);
    };

    if let VerificationResult::Failed(reason) = signing::verify(raw.payload(), signature, secret, algorithm) {
        return reject(Rejection::Verification(reason));
    }

    tracing::debug!(
        signature_header = ?raw.signature_header(),
        bytes = raw.payload().len(),
        "Webhook signature verified"
    );

    let payload = raw.payload().clone();
    let outcome = run_with_retry(policy, || handler(payload.clone())).await;
    IntakeResult::Accepted(outcome)
}

fn reject<T, E>(reason: Rejection) -> IntakeResult<T, E> {
    tracing::warn!(reason = %reason, "Webhook rejected");
    IntakeResult::Rejected(reason)
}
