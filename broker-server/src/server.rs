//! Router assembly and the listener loop.

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Request};
use axum::routing::get;
use axum::Router;
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, RecvError};
use core_runtime::logging::redact_query;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn};

use crate::routes;
use crate::state::AppState;

/// Largest request body accepted by `POST /upload`.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/login", get(routes::login))
        .route("/oauth2callback", get(routes::oauth2_callback))
        .route("/refresh", get(routes::refresh))
        .route("/token", get(routes::token))
        .route("/upload", get(routes::upload_form).post(routes::upload))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            // The callback query carries the authorization code
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %redact_query(&request.uri().to_string()),
                )
            }),
        )
        .with_state(state)
}

/// Bind `bind:port` and serve until Ctrl-C.
pub async fn serve(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local = listener.local_addr()?;

    info!(%local, "Drive token broker listening");
    info!("Sign in at http://{}/login", local);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Log every event published on `events` until the bus closes.
pub fn spawn_event_logger(events: &EventBus) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => {
                    debug!("Event bus closed");
                    break;
                }
            }
        }
    })
}

fn log_event(event: &CoreEvent) {
    let description = event.description();
    match event.severity() {
        EventSeverity::Debug => debug!(?event, "{}", description),
        EventSeverity::Info => info!(?event, "{}", description),
        EventSeverity::Warning => warn!(?event, "{}", description),
        EventSeverity::Error => error!(?event, "{}", description),
    }
}
