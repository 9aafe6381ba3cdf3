//! Shared constructors and fakes for tests.

use std::sync::{
    Arc, Once,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum_test::TestServer;

use crate::config::{Config, ProviderConfig, WebhookSecret};
use crate::webhooks::{ProviderScheme, RetryPolicy, SignatureAlgorithm, WebhookHandler, compute_signature};

pub const MOMO_SECRET: &str = "momo-test-secret";
pub const GENERIC_SECRET: &str = "generic-test-secret";

/// Install the rustls crypto provider once per test binary. reqwest is built without one.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Two providers (`momo` on its own scheme, `generic` on hex SHA-256), retries without delay,
/// metrics off.
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_metrics: false,
        processing_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(3, Duration::ZERO),
        providers: vec![
            ProviderConfig {
                name: "momo".to_string(),
                algorithm: SignatureAlgorithm::Provider(ProviderScheme::MobileMoney),
                secret: WebhookSecret::new(MOMO_SECRET),
            },
            ProviderConfig {
                name: "generic".to_string(),
                algorithm: SignatureAlgorithm::Sha256Hex,
                secret: WebhookSecret::new(GENERIC_SECRET),
            },
        ],
        ..Default::default()
    }
}

/// Sign `payload` the way the configured provider `name` would
pub fn sign_for(config: &Config, name: &str, payload: &[u8]) -> String {
    let provider = config.provider(name).expect("provider not in test config");
    compute_signature(payload, provider.secret.expose(), provider.algorithm).expect("algorithm can sign")
}

pub fn create_test_app(config: Config, handler: Arc<dyn WebhookHandler>) -> TestServer {
    crate::Application::with_handler(config, handler)
        .expect("Failed to create application")
        .into_test_server()
}

/// Handler that fails a set number of times before succeeding, optionally slowly.
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    failures_before_success: u32,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedHandler {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_times(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_before_success: failures,
            ..Default::default()
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_times(u32::MAX)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookHandler for ScriptedHandler {
    async fn handle(&self, _provider: &str, _payload: Bytes) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call <= self.failures_before_success {
            anyhow::bail!("scripted failure {call}");
        }
        Ok(())
    }
}
