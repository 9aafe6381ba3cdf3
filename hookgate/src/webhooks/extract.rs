//! Raw payload and signature header extraction.
//!
//! The body is read once, as bytes, and handed on untouched: signatures are computed over the
//! exact wire bytes, so nothing here parses or re-encodes it.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request},
};

/// Signature headers we recognise, in lookup order. The first one present wins.
///
/// Adding a provider means adding its header here and a matching
/// [`SignatureAlgorithm`](super::signing::SignatureAlgorithm).
pub const KNOWN_SIGNATURE_HEADERS: [&str; 4] = ["x-signature", "x-momo-signature", "x-hub-signature", "x-paystack-signature"];

/// The request body could not be read at all.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to read webhook body: {0}")]
    Body(#[source] axum::Error),
}

/// An inbound webhook as received: exact body bytes plus the first signature header present.
#[derive(Debug, Clone)]
pub struct RawWebhookRequest {
    payload: Bytes,
    signature: Option<(&'static str, String)>,
}

impl RawWebhookRequest {
    /// Build from already-read parts. Headers are tried in [`KNOWN_SIGNATURE_HEADERS`] order.
    pub fn from_parts(headers: &HeaderMap, payload: Bytes) -> Self {
        let signature = KNOWN_SIGNATURE_HEADERS
            .iter()
            .find_map(|&name| {
                let value = headers.get(name)?;
                match value.to_str() {
                    Ok(value) => Some((name, value.to_string())),
                    Err(_) => {
                        tracing::debug!(header = name, "Ignoring non-ASCII signature header");
                        None
                    }
                }
            });

        Self { payload, signature }
    }

    /// The body exactly as received
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The first signature header present, if any
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_ref().map(|(_, value)| value.as_str())
    }

    /// Name of the header [`signature`](Self::signature) came from
    pub fn signature_header(&self) -> Option<&'static str> {
        self.signature.as_ref().map(|(name, _)| *name)
    }
}

/// Read the body and locate the signature.
///
/// An empty body is a valid extraction. Only a body that cannot be read (stream error, or larger
/// than `body_limit`) is an error; it is logged here.
pub async fn extract(request: Request<Body>, body_limit: usize) -> Result<RawWebhookRequest, ExtractionError> {
    let (parts, body) = request.into_parts();

    let payload = axum::body::to_bytes(body, body_limit).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to read webhook body");
        ExtractionError::Body(e)
    })?;

    let raw = RawWebhookRequest::from_parts(&parts.headers, payload);
    tracing::trace!(
        bytes = raw.payload().len(),
        signature_header = ?raw.signature_header(),
        "Extracted webhook payload"
    );
    Ok(raw)
}
