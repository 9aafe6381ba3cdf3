//! HMAC signature verification for inbound provider webhooks.
//!
//! Every provider signs the raw request body with a shared secret, but they disagree on the
//! digest and on how the result is written into the header:
//!
//! | Algorithm                              | Digest      | Encoding | `sha…=` prefix |
//! |----------------------------------------|-------------|----------|----------------|
//! | [`SignatureAlgorithm::Sha1Hex`]        | HMAC-SHA1   | hex      | stripped       |
//! | [`SignatureAlgorithm::Sha256Hex`]      | HMAC-SHA256 | hex      | stripped       |
//! | [`SignatureAlgorithm::Sha256Base64`]   | HMAC-SHA256 | base64   | stripped       |
//! | [`ProviderScheme::MobileMoney`]        | HMAC-SHA256 | base64   | never          |
//! | [`ProviderScheme::LegacySha1`]         | HMAC-SHA1   | hex      | never          |
//! | [`ProviderScheme::Paystack`]           | HMAC-SHA512 | hex      | never          |
//!
//! All of them go through [`verify`]. The computed digest is encoded in the algorithm's canonical
//! form (lowercase hex, or padded standard base64) and compared against the claimed text in
//! constant time, so an upper-case hex signature is a different signature. The digest is always computed over the exact bytes
//! received: re-encoding the JSON body before hashing would break every signature.
//!
//! Failures never propagate. Callers get a `bool` from [`verify_hmac`] (or a
//! [`VerificationResult`] whose reason is for logs only), so a malformed signature looks the
//! same from the outside as a wrong one.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Algorithm-name prefixes some senders put in front of the signature (`sha256=abcd…`).
const ALGORITHM_PREFIXES: [&str; 3] = ["sha1", "sha256", "sha512"];

/// How a webhook signature is produced and encoded.
///
/// The generic variants accept an optional `sha1=` / `sha256=` prefix. Provider schemes pin the
/// exact format documented by that provider and accept nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    Sha1Hex,
    Sha256Hex,
    Sha256Base64,
    Provider(ProviderScheme),
}

/// Provider-specific signing conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderScheme {
    /// Mobile-money payment confirmations: base64 HMAC-SHA256 in `x-momo-signature`
    MobileMoney,
    /// Legacy hub-style callbacks: hex HMAC-SHA1 in `x-hub-signature`
    LegacySha1,
    /// Paystack: hex HMAC-SHA512 in `x-paystack-signature`
    Paystack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Digest {
    Sha1,
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Hex,
    Base64,
}

impl Digest {
    fn name(self) -> &'static str {
        match self {
            Digest::Sha1 => "sha1",
            Digest::Sha256 => "sha256",
            Digest::Sha512 => "sha512",
        }
    }

    fn hmac(self, secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, VerificationFailure> {
        // HMAC accepts keys of any length, so InvalidKey is unreachable in practice
        let digest = match self {
            Digest::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| VerificationFailure::InvalidKey)?;
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| VerificationFailure::InvalidKey)?;
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(secret).map_err(|_| VerificationFailure::InvalidKey)?;
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(digest)
    }
}

impl Encoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => BASE64_STANDARD.encode(bytes),
        }
    }

    fn is_valid(self, text: &str) -> bool {
        match self {
            Encoding::Hex => hex::decode(text).is_ok(),
            Encoding::Base64 => BASE64_STANDARD.decode(text).is_ok(),
        }
    }
}

impl SignatureAlgorithm {
    fn parameters(self) -> (Digest, Encoding) {
        match self {
            SignatureAlgorithm::Sha1Hex => (Digest::Sha1, Encoding::Hex),
            SignatureAlgorithm::Sha256Hex => (Digest::Sha256, Encoding::Hex),
            SignatureAlgorithm::Sha256Base64 => (Digest::Sha256, Encoding::Base64),
            SignatureAlgorithm::Provider(ProviderScheme::MobileMoney) => (Digest::Sha256, Encoding::Base64),
            SignatureAlgorithm::Provider(ProviderScheme::LegacySha1) => (Digest::Sha1, Encoding::Hex),
            SignatureAlgorithm::Provider(ProviderScheme::Paystack) => (Digest::Sha512, Encoding::Hex),
        }
    }

    /// Whether an algorithm-name prefix on the claimed signature is tolerated
    pub fn strips_prefix(self) -> bool {
        !matches!(self, SignatureAlgorithm::Provider(_))
    }
}

/// Why a signature was rejected. Only ever logged, never returned to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("signature prefix names a different algorithm")]
    AlgorithmMismatch,
    #[error("signature is not valid for the expected encoding")]
    MalformedSignature,
    #[error("signature has the wrong length for the digest")]
    LengthMismatch,
    #[error("secret could not be used as an HMAC key")]
    InvalidKey,
    #[error("signature does not match payload")]
    ComparisonFailed,
}

/// Outcome of a signature check, with the reason kept for internal logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    Verified,
    Failed(VerificationFailure),
}

/// Compute the signature a sender holding `secret` would attach to `payload`.
///
/// Returns `None` only if the secret is rejected as an HMAC key.
pub fn compute_signature(payload: &[u8], secret: &[u8], algorithm: SignatureAlgorithm) -> Option<String> {
    let (digest, encoding) = algorithm.parameters();
    let mac = digest.hmac(secret, payload).ok()?;
    Some(encoding.encode(&mac))
}

/// Check `claimed_signature` against the HMAC of `payload`.
///
/// # Arguments
///
/// * `payload` - The raw request body, exactly as received
/// * `claimed_signature` - The signature header value
/// * `secret` - The provider's shared secret
/// * `algorithm` - Digest and encoding the provider uses
pub fn verify(payload: &[u8], claimed_signature: &str, secret: &[u8], algorithm: SignatureAlgorithm) -> VerificationResult {
    match check(payload, claimed_signature, secret, algorithm) {
        Ok(()) => VerificationResult::Verified,
        Err(failure) => VerificationResult::Failed(failure),
    }
}

/// Boolean form of [`verify`]. The failure reason is logged at debug level and discarded.
pub fn verify_hmac(payload: &[u8], claimed_signature: &str, secret: &[u8], algorithm: SignatureAlgorithm) -> bool {
    match verify(payload, claimed_signature, secret, algorithm) {
        VerificationResult::Verified => true,
        VerificationResult::Failed(reason) => {
            tracing::debug!(?algorithm, %reason, "Webhook signature rejected");
            false
        }
    }
}

/// Mobile-money confirmations: base64 HMAC-SHA256, no prefix.
pub fn verify_mobile_money_signature(payload: &[u8], claimed_signature: &str, secret: &[u8]) -> bool {
    verify_hmac(
        payload,
        claimed_signature,
        secret,
        SignatureAlgorithm::Provider(ProviderScheme::MobileMoney),
    )
}

/// Legacy SHA-1 callbacks: hex HMAC-SHA1, no prefix.
pub fn verify_sha1_signature(payload: &[u8], claimed_signature: &str, secret: &[u8]) -> bool {
    verify_hmac(
        payload,
        claimed_signature,
        secret,
        SignatureAlgorithm::Provider(ProviderScheme::LegacySha1),
    )
}

fn check(payload: &[u8], claimed_signature: &str, secret: &[u8], algorithm: SignatureAlgorithm) -> Result<(), VerificationFailure> {
    let (digest, encoding) = algorithm.parameters();

    // Compute first so every path pays for the HMAC
    let expected = encoding.encode(&digest.hmac(secret, payload)?);

    let claimed = claimed_signature.trim();
    let claimed = if algorithm.strips_prefix() {
        strip_algorithm_prefix(claimed, digest)?
    } else {
        claimed
    };

    if !encoding.is_valid(claimed) {
        return Err(VerificationFailure::MalformedSignature);
    }
    if claimed.len() != expected.len() {
        return Err(VerificationFailure::LengthMismatch);
    }

    // Canonical text against canonical text: "ABCD" and "abcd" are different signatures
    if constant_time_eq(expected.as_bytes(), claimed.as_bytes()) {
        Ok(())
    } else {
        Err(VerificationFailure::ComparisonFailed)
    }
}

/// Remove a leading `sha256=` style prefix when it names `digest`. Prefixes are lowercase only.
fn strip_algorithm_prefix(claimed: &str, digest: Digest) -> Result<&str, VerificationFailure> {
    let Some((prefix, rest)) = claimed.split_once('=') else {
        return Ok(claimed);
    };

    match ALGORITHM_PREFIXES.iter().find(|name| prefix == **name) {
        Some(name) if *name == digest.name() => Ok(rest),
        Some(_) => Err(VerificationFailure::AlgorithmMismatch),
        // Base64 padding, not a prefix
        None => Ok(claimed),
    }
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Running time depends only on the lengths of the inputs, never on where they first differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
