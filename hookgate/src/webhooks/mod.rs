//! Inbound webhook intake.
//!
//! - [`signing`]: HMAC signature computation and constant-time verification
//! - [`extract`]: Raw body and signature header extraction
//! - [`retry`]: Bounded exponential-backoff retry
//! - [`intake`]: Extract, verify, then process with retry
//! - [`handler`]: Business handlers called with verified payloads

pub mod extract;
pub mod handler;
pub mod intake;
pub mod retry;
pub mod signing;

pub use extract::{KNOWN_SIGNATURE_HEADERS, RawWebhookRequest, extract};
pub use handler::{ForwardingHandler, LoggingHandler, WebhookHandler, create_handler};
pub use intake::{IntakeResult, Rejection, handle_raw, handle_webhook};
pub use retry::{ProcessingOutcome, RetryPolicy, backoff_delay, run_with_retry};
pub use signing::{
    ProviderScheme, SignatureAlgorithm, VerificationFailure, VerificationResult, compute_signature, constant_time_eq,
    verify, verify_hmac, verify_mobile_money_signature, verify_sha1_signature,
};
