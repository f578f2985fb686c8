pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod scheduling;
pub mod state;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};

use rate_limit::{throttle, RateLimiter, Tier};
use state::AppState;

/// Assemble the API router: route groups with per-group rate limits.
/// CORS and request tracing are layered on by the binary.
pub fn build_router(state: Arc<AppState>, limiter: RateLimiter) -> Router {
    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only endpoints
    let public_routes = Router::new()
        .route("/api/services", get(handlers::client::list_services))
        .route("/api/availability", get(handlers::client::availability))
        .layer(from_fn_with_state(
            (limiter.clone(), Tier::Public),
            throttle,
        ));

    // 3. Booking creation: strictest limit
    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::client::create_booking))
        .layer(from_fn_with_state(
            (limiter.clone(), Tier::Booking),
            throttle,
        ));

    // 4. Admin: session-gated endpoints
    let admin_routes = Router::new()
        .route("/api/admin/login", post(handlers::admin::login))
        .route("/api/admin/logout", post(handlers::admin::logout))
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route("/api/admin/bookings", post(handlers::admin::create_booking))
        .route(
            "/api/admin/bookings",
            patch(handlers::admin::update_booking_status),
        )
        .route(
            "/api/admin/blocked-slots",
            get(handlers::admin::list_blocked_slots),
        )
        .route(
            "/api/admin/blocked-slots",
            post(handlers::admin::create_blocked_slot),
        )
        .route(
            "/api/admin/blocked-slots/{id}",
            delete(handlers::admin::delete_blocked_slot),
        )
        .route(
            "/api/admin/services",
            get(handlers::admin::list_all_services),
        )
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route(
            "/api/admin/services/{id}",
            put(handlers::admin::update_service),
        )
        .layer(from_fn_with_state((limiter, Tier::Admin), throttle));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .with_state(state)
}
