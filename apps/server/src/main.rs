use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use argan_spa_server::config::AppConfig;
use argan_spa_server::rate_limit::RateLimiter;
use argan_spa_server::scheduling::ScheduleConfig;
use argan_spa_server::state::AppState;
use argan_spa_server::{build_router, db};

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    if config.admin_email.is_none()
        || config.admin_password.is_none()
        || config.admin_secret.is_none()
    {
        tracing::warn!(
            "ADMIN_EMAIL / ADMIN_PASSWORD / ADMIN_SECRET not fully set — admin endpoints disabled"
        );
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    db::run_migrations(&pool).await?;

    // ── CORS: whitelist WEBAPP_URL when configured, otherwise allow any ──
    let cors = match config.webapp_url.as_deref() {
        Some(url) => {
            let origin = url
                .parse()
                .map_err(|e| anyhow::anyhow!("WEBAPP_URL must be a valid origin: {e}"))?;
            CorsLayer::new()
                .allow_origin(AllowOrigin::list([origin]))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(AppState {
        db: pool,
        config,
        schedule: ScheduleConfig::default(),
        started_at: Instant::now(),
    });

    // ── Background task: evict stale rate limiter buckets ──
    let limiter = RateLimiter::new();
    let cleanup_limiter = limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let app = build_router(state, limiter)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("Argan Spa server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
