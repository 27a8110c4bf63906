//! Mailgate - serverless-style email gateway
//!
//! Reads mail from Zoho, sends through SES, and keeps a local record of
//! everything sent or drafted.

use anyhow::{Context, Result};
use mailgate_auth::{
    backend_for, ApiKeyAuthorizer, Clock, OAuth2Config, OAuth2TokenEndpoint, SecretStore,
    SystemClock, TokenManager,
};
use mailgate_core::{MailGateway, RecordStore};
use mailgate_server::{app, AppState, GatewayConfig};
use mailgate_ses::{SesClient, SesConfig};
use mailgate_zoho::{ZohoConfig, ZohoMailClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mailgate=debug")),
        )
        .init();

    let config = GatewayConfig::from_env().context("invalid configuration")?;
    info!("Starting Mailgate on port {}", config.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (backend, secret_id) =
        backend_for(&config.secrets_name).context("invalid SECRETS_NAME")?;
    let secrets = Arc::new(SecretStore::new(backend, secret_id, clock.clone()));

    let endpoint = OAuth2TokenEndpoint::new(OAuth2Config {
        token_url: config.zoho_token_url.clone(),
        timeout: config.http_timeout,
        ..OAuth2Config::zoho()
    })
    .context("invalid ZOHO_TOKEN_URL")?;
    let tokens = Arc::new(TokenManager::new(secrets.clone(), Arc::new(endpoint), clock.clone()));

    let mailbox = ZohoMailClient::new(
        ZohoConfig {
            api_base: config.zoho_api_base.clone(),
            timeout: config.http_timeout,
        },
        tokens,
        secrets.clone(),
    )
    .context("failed to build Zoho client")?;

    let sender = SesClient::new(
        SesConfig {
            timeout: config.http_timeout,
            ..SesConfig::new(config.ses_region.clone())
        },
        secrets.clone(),
        clock.clone(),
    );

    let store = RecordStore::open(&config.database_path, &config.emails_table)
        .await
        .context("failed to open record store")?;

    let state = AppState {
        gateway: Arc::new(MailGateway::new(Arc::new(mailbox), Arc::new(sender), store, clock)),
        authorizer: Arc::new(ApiKeyAuthorizer::new(secrets)),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Mailgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
