use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use secrecy::SecretString;
use tokio::signal;
use tokio::sync::watch;

use fitbit_client::{FitbitHttpClient, OAuthApp, RetryPolicy, TokenStore};
use fitbit_sync::cli::{Cli, Mode};
use fitbit_sync::{DateWindow, InfluxSink, SyncConfig, SyncOrchestrator, SyncSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Log filter from `FITBIT_SYNC_LOG_LEVEL`, then `RUST_LOG`, default `info`.
    let log_env = std::env::var("FITBIT_SYNC_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter =
        tracing_subscriber::EnvFilter::try_new(format!("{log_env},hyper=warn,reqwest=warn"))
            .unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn")
            });
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "fitbit_sync: log filter");

    let client_cfg =
        fitbit_client::Config::from_env().context("fitbit client configuration")?;
    let sync_cfg = SyncConfig::from_env().context("sync configuration")?;

    if let Some(addr) = sync_cfg.metrics_address {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        fitbit_client::observability::describe_metrics();
        tracing::info!(%addr, "fitbit_sync: serving metrics");
    }

    let app = OAuthApp {
        client_id: client_cfg.client_id.clone(),
        client_secret: client_cfg.client_secret.clone(),
        token_url: client_cfg.token_url(),
    };
    let http = fitbit_client::token::refresh_http_client()?;
    let mut tokens = TokenStore::load(client_cfg.token_file.clone(), app, http)?;
    if !tokens.has_credential() {
        let bootstrap = cli
            .refresh_token
            .clone()
            .map(|t| SecretString::new(t.into()))
            .or_else(|| client_cfg.bootstrap_refresh_token.clone());
        match bootstrap {
            Some(token) => tokens.bootstrap(token),
            None => anyhow::bail!(
                "no token file at {} and no refresh token given \
                 (FITBIT_REFRESH_TOKEN or --refresh-token)",
                client_cfg.token_file.display()
            ),
        }
    }

    let policy = RetryPolicy::default().with_max_attempts(client_cfg.max_attempts);
    let mut api = FitbitHttpClient::new(&client_cfg.api_uri, client_cfg.language.clone(), tokens)?
        .with_retry_policy(policy);

    let tz = fitbit_sync::resolve_timezone(&mut api, sync_cfg.timezone.as_deref()).await?;
    let sink = InfluxSink::new(
        &sync_cfg.influx_url,
        sync_cfg.influx_org.clone(),
        sync_cfg.influx_bucket.clone(),
        sync_cfg.influx_token.clone(),
    )?;
    let settings = SyncSettings {
        device: sync_cfg.device_name.clone(),
        tz,
        trailing_days: sync_cfg.trailing_days,
        buffer_cap: sync_cfg.max_buffered_points,
    };
    let mut orchestrator = SyncOrchestrator::new(api, sink, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("fitbit_sync: interrupt received");
            let _ = shutdown_tx.send(true);
        }
    });

    match cli.mode() {
        Mode::Incremental => orchestrator.run_incremental(shutdown_rx).await?,
        Mode::Backfill { start, end } => {
            let range = DateWindow::new(start, end)?;
            orchestrator.run_backfill(range, shutdown_rx).await?;
        }
    }

    tracing::info!("fitbit_sync: exiting");
    Ok(())
}
