use clap::Parser;
use hookgate::{Application, Config, config::Args, telemetry};

/// Resolve when the process is asked to stop (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Stopping webhook intake, draining in-flight deliveries");
}

/// One line per provider, for `--validate` output
fn describe_providers(config: &Config) -> Vec<String> {
    config
        .providers
        .iter()
        .map(|provider| format!("  POST /webhooks/{} ({:?})", provider.name, provider.algorithm))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The forwarding client is built without a bundled crypto provider
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration in {} is valid.", args.config);
        for line in describe_providers(&config) {
            println!("{line}");
        }
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!("{:?}", args);

    if config.providers.is_empty() {
        tracing::warn!("No webhook providers configured, every webhook will be rejected");
    }
    tracing::info!(
        bind = %config.bind_address(),
        providers = config.providers.len(),
        max_attempts = config.retry.max_attempts,
        forwarding = config.forward.is_some(),
        "Starting webhook gateway"
    );

    Application::new(config).await?.serve(shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookgate::{
        config::{ProviderConfig, WebhookSecret},
        webhooks::{ProviderScheme, SignatureAlgorithm},
    };

    #[test]
    fn test_describe_providers_lists_routes() {
        let config = Config {
            providers: vec![
                ProviderConfig {
                    name: "momo".to_string(),
                    algorithm: SignatureAlgorithm::Provider(ProviderScheme::MobileMoney),
                    secret: WebhookSecret::new("s1"),
                },
                ProviderConfig {
                    name: "generic".to_string(),
                    algorithm: SignatureAlgorithm::Sha256Hex,
                    secret: WebhookSecret::new("s2"),
                },
            ],
            ..Default::default()
        };

        let lines = describe_providers(&config);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "  POST /webhooks/momo (Provider(MobileMoney))");
        assert_eq!(lines[1], "  POST /webhooks/generic (Sha256Hex)");
        assert!(lines.iter().all(|line| !line.contains("s1") && !line.contains("s2")));
    }
}
