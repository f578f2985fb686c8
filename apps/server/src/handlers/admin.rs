use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::auth;
use crate::errors::AppError;
use crate::handlers::client::{place_booking, validate_date};
use crate::models::*;
use crate::scheduling;
use crate::state::AppState;

// ── Session ──

/// POST /api/admin/login — establish the admin session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<ApiResponse<&'static str>>), AppError> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(AppError::InvalidInput("missing credentials".into()));
    }

    // Fail closed when the admin identity is not configured
    let (email, password, secret) = match (
        &state.config.admin_email,
        &state.config.admin_password,
        &state.config.admin_secret,
    ) {
        (Some(e), Some(p), Some(s)) => (e, p, s),
        _ => {
            tracing::warn!("admin login attempted but ADMIN_* env vars are not fully set");
            return Err(AppError::Unauthorized);
        }
    };

    if body.email != *email || body.password != *password {
        return Err(AppError::Unauthorized);
    }

    let signature = auth::session_signature(email, password, secret);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        auth::session_cookie(&signature)
            .parse()
            .map_err(|_| AppError::Storage("invalid session cookie".into()))?,
    );

    Ok((headers, Json(ApiResponse::success("logged in"))))
}

/// POST /api/admin/logout — clear the session cookie.
pub async fn logout() -> (HeaderMap, Json<ApiResponse<&'static str>>) {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = auth::expired_session_cookie().parse() {
        headers.insert(header::SET_COOKIE, cookie);
    }
    (headers, Json(ApiResponse::success("logged out")))
}

// ── Bookings ──

/// GET /api/admin/bookings — every booking, newest first, with client and
/// service details.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let bookings = sqlx::query_as::<_, BookingDetail>(
        "SELECT b.id, b.date, b.start_time, b.end_time, b.status, b.notes, b.created_at,
                s.name AS service_name, s.category AS category,
                c.name AS client_name, c.email AS client_email, c.phone AS client_phone
         FROM bookings b
         JOIN services s ON s.id = b.service_id
         JOIN clients c ON c.id = b.client_id
         ORDER BY b.date DESC, b.start_time DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(bookings)))
}

/// PATCH /api/admin/bookings — status transition, guarded by the booking
/// state machine. Cancellation stamps `cancelled_at`; rows are never deleted.
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBookingStatusRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let current: BookingStatus =
        sqlx::query_scalar("SELECT status FROM bookings WHERE id = ?")
            .bind(body.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("booking not found".into()))?;

    if !current.can_transition_to(body.status) {
        return Err(AppError::Conflict(format!(
            "cannot move booking from {current:?} to {:?}",
            body.status
        )));
    }

    let booking = transition_booking(&state.db, body.id, current, body.status)
        .await?
        .ok_or_else(|| AppError::Conflict("booking status changed concurrently".into()))?;

    tracing::info!(booking_id = booking.id, status = ?booking.status, "booking status updated");

    Ok(Json(ApiResponse::success(booking)))
}

/// Compare-and-swap status update: the row is only written while it still
/// holds `current`. `None` means another writer got there first; the stale
/// transition must not overwrite theirs.
pub(crate) async fn transition_booking(
    db: &sqlx::SqlitePool,
    id: i64,
    current: BookingStatus,
    next: BookingStatus,
) -> Result<Option<Booking>, AppError> {
    let sql = if next == BookingStatus::Cancelled {
        "UPDATE bookings SET status = ?, cancelled_at = datetime('now')
         WHERE id = ? AND status = ?
         RETURNING id, client_id, service_id, date, start_time, end_time, status, notes,
                   created_at, cancelled_at"
    } else {
        "UPDATE bookings SET status = ? WHERE id = ? AND status = ?
         RETURNING id, client_id, service_id, date, start_time, end_time, status, notes,
                   created_at, cancelled_at"
    };

    let booking = sqlx::query_as::<_, Booking>(sql)
        .bind(next)
        .bind(id)
        .bind(current)
        .fetch_optional(db)
        .await?;

    Ok(booking)
}

/// POST /api/admin/bookings — appointment created at the front desk. Same
/// admission path as the public endpoint but persisted as CONFIRMED.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), AppError> {
    auth::require_admin(&headers, &state.config)?;

    let booking = place_booking(&state, &body, BookingStatus::Confirmed).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}

// ── Blocked slots ──

/// GET /api/admin/blocked-slots?date= — closures, optionally for one day.
pub async fn list_blocked_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BlockedSlotsQuery>,
) -> Result<Json<ApiResponse<Vec<BlockedSlot>>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let slots = if let Some(date) = &query.date {
        let date = validate_date(date)?;
        sqlx::query_as::<_, BlockedSlot>(
            "SELECT id, date, start_time, end_time, reason FROM blocked_slots
             WHERE date = ? ORDER BY start_time ASC",
        )
        .bind(&date)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, BlockedSlot>(
            "SELECT id, date, start_time, end_time, reason FROM blocked_slots
             ORDER BY date ASC, start_time ASC",
        )
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(ApiResponse::success(slots)))
}

/// POST /api/admin/blocked-slots — block an interval for all services.
pub async fn create_blocked_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBlockedSlotRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BlockedSlot>>), AppError> {
    auth::require_admin(&headers, &state.config)?;

    let date = validate_date(&body.date)?;
    let start = scheduling::parse_time(&body.start_time)?;
    let end = scheduling::parse_time(&body.end_time)?;
    if end <= start {
        return Err(AppError::InvalidInput("end_time must be after start_time".into()));
    }

    let slot = sqlx::query_as::<_, BlockedSlot>(
        "INSERT INTO blocked_slots (date, start_time, end_time, reason) VALUES (?, ?, ?, ?)
         RETURNING id, date, start_time, end_time, reason",
    )
    .bind(&date)
    .bind(scheduling::format_time(start))
    .bind(scheduling::format_time(end))
    .bind(&body.reason)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(slot))))
}

/// DELETE /api/admin/blocked-slots/{id}
pub async fn delete_blocked_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let affected = sqlx::query("DELETE FROM blocked_slots WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("blocked slot not found".into()));
    }

    Ok(Json(ApiResponse::success("blocked slot removed")))
}

// ── Services ──

/// GET /api/admin/services — full catalog including inactive entries.
pub async fn list_all_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Service>>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let services = sqlx::query_as::<_, Service>(
        "SELECT id, name, description, category, duration_min, price, is_active
         FROM services ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(services)))
}

/// POST /api/admin/services — add a catalog entry.
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Service>>), AppError> {
    auth::require_admin(&headers, &state.config)?;

    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".into()));
    }
    if body.duration_min <= 0 {
        return Err(AppError::InvalidInput("duration_min must be positive".into()));
    }

    let service = sqlx::query_as::<_, Service>(
        "INSERT INTO services (name, description, category, duration_min, price)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id, name, description, category, duration_min, price, is_active",
    )
    .bind(body.name.trim())
    .bind(body.description.as_deref().unwrap_or(""))
    .bind(body.category)
    .bind(body.duration_min)
    .bind(body.price)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(service))))
}

/// PUT /api/admin/services/{id} — partial update; absent fields keep their
/// current value. Deactivation hides a service without touching history.
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, AppError> {
    auth::require_admin(&headers, &state.config)?;

    let existing = sqlx::query_as::<_, Service>(
        "SELECT id, name, description, category, duration_min, price, is_active
         FROM services WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("service not found".into()))?;

    if let Some(duration) = body.duration_min {
        if duration <= 0 {
            return Err(AppError::InvalidInput("duration_min must be positive".into()));
        }
    }

    let service = sqlx::query_as::<_, Service>(
        "UPDATE services
         SET name = ?, description = ?, category = ?, duration_min = ?, price = ?, is_active = ?
         WHERE id = ?
         RETURNING id, name, description, category, duration_min, price, is_active",
    )
    .bind(body.name.unwrap_or(existing.name))
    .bind(body.description.unwrap_or(existing.description))
    .bind(body.category.unwrap_or(existing.category))
    .bind(body.duration_min.unwrap_or(existing.duration_min))
    .bind(body.price.unwrap_or(existing.price))
    .bind(body.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(service)))
}
