use anyhow::Context;
use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, LogLevel, SystemClock};
use broker_server::{serve, spawn_event_logger, AppState};
use clap::Parser;
use core_auth::{OAuthConfig, OAuthFlowManager, TokenLifecycleManager, TokenStore};
use core_runtime::config::BrokerConfig;
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use provider_google_drive::DriveUploader;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "drive-token-broker",
    version,
    about = "OAuth2 token broker for a single Google Drive account"
)]
struct Cli {
    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5050)]
    port: u16,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", value_parser = parse_log_level)]
    log_level: LogLevel,

    /// Log output format (pretty, json, compact)
    #[arg(long, env = "LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::parse(s).ok_or_else(|| format!("unknown log level '{}'", s))
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse().map_err(|e: core_runtime::Error| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default()
        .with_level(cli.log_level)
        .with_env_filter();
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format);
    }
    init_logging(logging)?;

    let config = BrokerConfig::from_env().context("invalid broker configuration")?;
    info!(?config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    let events = EventBus::default();
    let _event_logger = spawn_event_logger(&events);

    let provider = OAuthFlowManager::new(OAuthConfig::from(&config), http.clone(), clock.clone());
    let store = TokenStore::new(Arc::new(TokioFileSystem::new()), config.token_path.clone());
    let manager = TokenLifecycleManager::new(store, Arc::new(provider), clock, events.clone())
        .with_scopes(config.scopes.clone())
        .with_provider_timeout(config.provider_timeout);

    let uploader = DriveUploader::new(http);
    let state = AppState::new(Arc::new(manager), Arc::new(uploader), events);

    serve(&cli.bind, cli.port, state).await
}
