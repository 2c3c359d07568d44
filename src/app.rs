/*
 * Responsibility
 * - Config 読み込み → 依存生成 (DB / one-time token store / mailer / route table) → Router 組み立て
 * - Middleware の適用順: http (request-id, trace, limit, timeout) → CORS → security headers → auth pipeline
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware;
use crate::services::auth::{
    CacheOneTimeTokenStore, MagicLinkIssuer, OneTimeTokenStore, PgUserDirectory, TokenCodec,
    UserDirectory,
};
use crate::services::cache::{MemoryCache, ValkeyClient};
use crate::services::mail::build_mailer;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,membership_api=trace,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,membership_api=debug,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing; stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default behavior, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

async fn build_state(config: &Config) -> Result<AppState> {
    // Process-level services are built once here and shared through AppState.
    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("connect to DATABASE_URL")?;
    let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(db));

    let one_time_tokens: Arc<dyn OneTimeTokenStore> = match &config.valkey_url {
        Some(url) => {
            let valkey = ValkeyClient::new(url).await.context("connect to VALKEY_URL")?;
            Arc::new(CacheOneTimeTokenStore::new(Arc::new(valkey)))
        }
        None => {
            tracing::warn!("VALKEY_URL not set; one-time tokens are kept in process memory");
            Arc::new(CacheOneTimeTokenStore::new(Arc::new(MemoryCache::new())))
        }
    };

    let mailer = build_mailer(&config.mail)?;
    if config.mail.smtp.is_none() {
        tracing::warn!("SMTP_HOST not set; magic links are written to the log instead of mailed");
    }

    let magic_link = MagicLinkIssuer::new(
        mailer,
        config.public_base_url.clone(),
        config.context_path.clone(),
        &config.magic_link_sent_path,
    )?
    .trust_forwarded_headers(config.trust_forwarded_headers);

    let route_policy = api::default_policy().context("route table")?;
    tracing::debug!(entries = route_policy.len(), "route table loaded");

    Ok(AppState {
        tokens: Arc::new(TokenCodec::new(&config.token_secret, config.token_issuer.clone())),
        directory,
        route_policy: Arc::new(route_policy),
        status_exemptions: Arc::new(api::default_exemptions()),
        one_time_tokens,
        magic_link: Arc::new(magic_link),
        access_token_ttl_seconds: config.access_token_ttl_seconds,
        one_time_token_ttl: Duration::from_secs(config.one_time_token_ttl_seconds),
    })
}

/// Application routes behind the auth pipeline, mounted under `context_path`.
///
/// The fallback is registered before the pipeline so unknown paths are
/// classified (and denied) like everything else.
pub fn router(state: AppState, context_path: &str) -> Router {
    let app = api::routes().fallback(not_found);
    let app = middleware::auth::apply(app, state.clone()).with_state(state);

    if context_path.is_empty() {
        app
    } else {
        Router::new().nest(context_path, app)
    }
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let app = router(state, &config.context_path);
    let app = middleware::security_headers::apply(app);
    let app = middleware::cors::apply(app, config);
    middleware::http::apply(app)
}

async fn not_found() -> AppError {
    AppError::not_found("route")
}
