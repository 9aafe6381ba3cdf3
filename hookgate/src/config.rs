//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `HOOKGATE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `HOOKGATE_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `HOOKGATE_RETRY__MAX_ATTEMPTS=5` sets the `retry.max_attempts` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use hookgate::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`, `body_limit_bytes`, `processing_timeout`
//! - **Providers**: `providers[]` - name, signing algorithm and shared secret for each sender
//! - **Processing**: `retry`, `exhausted_status`, `forward`
//! - **Features**: `enable_metrics`, `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! HOOKGATE_PORT=8080
//! HOOKGATE_RETRY__BASE_DELAY=250ms
//! HOOKGATE_EXHAUSTED_STATUS=accepted
//! HOOKGATE_FORWARD__URL=http://billing.internal/webhooks
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize, Serializer};
use std::{collections::HashSet, fmt, time::Duration};
use url::Url;

use crate::errors::Error;
use crate::webhooks::{RetryPolicy, SignatureAlgorithm};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "HOOKGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, see the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Expose Prometheus metrics at `/internal/metrics`
    pub enable_metrics: bool,
    /// Export traces over OTLP (see [`telemetry`](crate::telemetry))
    pub enable_otel_export: bool,
    /// Largest webhook body accepted, in bytes
    pub body_limit_bytes: usize,
    /// Deadline for a whole intake (verification plus every handler attempt)
    #[serde(with = "humantime_serde")]
    pub processing_timeout: Duration,
    /// Retry policy for the business handler
    pub retry: RetryPolicy,
    /// What to answer when the handler exhausts its retries
    pub exhausted_status: ExhaustedStatus,
    /// Webhook senders we accept, addressed as `POST /webhooks/{name}`
    pub providers: Vec<ProviderConfig>,
    /// Downstream service verified payloads are forwarded to. Logged and dropped when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardConfig>,
}

/// Response to a sender whose webhook verified but could not be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedStatus {
    /// 500, so the provider redelivers on its own schedule
    #[default]
    ServerError,
    /// 202, for providers that give up or disable the endpoint after repeated errors
    Accepted,
}

/// One webhook sender.
///
/// ```yaml
/// - name: momo
///   algorithm:
///     provider: mobile_money
///   secret: s3cr3t
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Path segment identifying the provider
    pub name: String,
    pub algorithm: SignatureAlgorithm,
    pub secret: WebhookSecret,
}

/// A provider's shared signing secret. Never printed or serialized in clear.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret([REDACTED])")
    }
}

impl Serialize for WebhookSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

/// Downstream forwarding target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardConfig {
    pub url: Url,
    /// Per-request timeout for a single forwarding attempt
    #[serde(default = "default_forward_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_forward_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            enable_metrics: true,
            enable_otel_export: false,
            body_limit_bytes: 1024 * 1024,
            processing_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            exhausted_status: ExhaustedStatus::default(),
            providers: Vec::new(),
            forward: None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.retry.max_attempts < 1 {
            return Err(Error::Internal {
                operation: "Config validation: retry.max_attempts must be at least 1".to_string(),
            });
        }

        if self.body_limit_bytes == 0 {
            return Err(Error::Internal {
                operation: "Config validation: body_limit_bytes must be greater than 0".to_string(),
            });
        }

        if self.processing_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: processing_timeout must be greater than 0".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: provider name cannot be empty".to_string(),
                });
            }

            if !seen.insert(provider.name.as_str()) {
                return Err(Error::Internal {
                    operation: format!("Config validation: duplicate provider name '{}'", provider.name),
                });
            }

            if provider.secret.is_empty() {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: provider '{}' has no secret. \
                         Set it in the config file or via the environment.",
                        provider.name
                    ),
                });
            }
        }

        if let Some(forward) = &self.forward
            && forward.timeout.is_zero()
        {
            return Err(Error::Internal {
                operation: "Config validation: forward.timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values. HOOKGATE_CONFIG is the file path
            // read by `Args`, not a config key.
            .merge(Env::prefixed("HOOKGATE_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Look up a provider by the name used in its webhook path
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|provider| provider.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::ProviderScheme;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_providers_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
providers:
  - name: momo
    algorithm:
      provider: mobile_money
    secret: momo-secret
  - name: github
    algorithm: sha1_hex
    secret: gh-secret
  - name: generic
    algorithm: sha256_hex
    secret: generic-secret
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.providers.len(), 3);

            let momo = config.provider("momo").expect("momo configured");
            assert_eq!(momo.algorithm, SignatureAlgorithm::Provider(ProviderScheme::MobileMoney));
            assert_eq!(momo.secret.expose(), b"momo-secret");

            assert_eq!(config.provider("github").unwrap().algorithm, SignatureAlgorithm::Sha1Hex);
            assert_eq!(config.provider("generic").unwrap().algorithm, SignatureAlgorithm::Sha256Hex);
            assert!(config.provider("stripe").is_none());

            // defaults
            assert_eq!(config.retry, RetryPolicy::default());
            assert_eq!(config.exhausted_status, ExhaustedStatus::ServerError);
            assert!(config.forward.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9000
retry:
  max_attempts: 2
  base_delay: 1s
"#,
            )?;

            jail.set_env("HOOKGATE_HOST", "127.0.0.1");
            jail.set_env("HOOKGATE_PORT", "8080");
            jail.set_env("HOOKGATE_RETRY__BASE_DELAY", "250ms");
            jail.set_env("HOOKGATE_EXHAUSTED_STATUS", "accepted");
            jail.set_env("HOOKGATE_PROCESSING_TIMEOUT", "5s");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.bind_address(), "127.0.0.1:8080");
            assert_eq!(config.retry.max_attempts, 2);
            assert_eq!(config.retry.base_delay, Duration::from_millis(250));
            assert_eq!(config.exhausted_status, ExhaustedStatus::Accepted);
            assert_eq!(config.processing_timeout, Duration::from_secs(5));

            Ok(())
        });
    }

    #[test]
    fn test_config_path_env_var_is_not_a_key() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "port: 7000\n")?;
            jail.set_env("HOOKGATE_CONFIG", "custom.yaml");

            let config = Config::load(&args("custom.yaml"))?;
            assert_eq!(config.port, 7000);

            Ok(())
        });
    }

    #[test]
    fn test_forward_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
forward:
  url: http://billing.internal/webhooks
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;
            let forward = config.forward.expect("forward configured");
            assert_eq!(forward.url.as_str(), "http://billing.internal/webhooks");
            assert_eq!(forward.timeout, Duration::from_secs(10));

            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("does-not-exist.yaml"))?;
            assert_eq!(config.port, 3001);
            assert!(config.providers.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "retries: 3\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_zero_attempts_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
retry:
  max_attempts: 0
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("max_attempts"), "unexpected error: {err}");
            Ok(())
        });
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
providers:
  - name: momo
    algorithm: sha256_base64
    secret: one
  - name: momo
    algorithm: sha256_hex
    secret: two
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("duplicate provider"), "unexpected error: {err}");
            Ok(())
        });
    }

    #[test]
    fn test_empty_secret_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
providers:
  - name: momo
    algorithm: sha256_base64
    secret: ""
"#,
            )?;

            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_zero_body_limit_and_timeout_rejected() {
        let config = Config {
            body_limit_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            processing_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_secret_is_redacted() {
        let provider = ProviderConfig {
            name: "momo".to_string(),
            algorithm: SignatureAlgorithm::Provider(ProviderScheme::MobileMoney),
            secret: WebhookSecret::new("hunter2"),
        };

        let debug = format!("{provider:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));

        let json = serde_json::to_string(&provider).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
