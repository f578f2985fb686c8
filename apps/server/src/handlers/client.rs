use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Connection, SqliteConnection};
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::*;
use crate::scheduling::{self, GroupedInterval, Interval};
use crate::state::AppState;

/// Booking row shape consumed by the scheduling core:
/// (start_time, end_time, service name, category, status).
type OccupancyRow = (String, String, String, ServiceCategory, BookingStatus);

// ── Shared helpers (pub(crate) for admin.rs) ──

/// Parse a date and return its canonical `YYYY-MM-DD` spelling.
///
/// Dates are stored and compared as TEXT, so the canonical spelling is the
/// storage key: `2026-9-4` and `2026-09-04` must address the same day or
/// the per-day capacity count splits across keys.
pub(crate) fn validate_date(date: &str) -> Result<String, AppError> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::InvalidInput(format!("invalid date {date:?}, expected YYYY-MM-DD")))
}

pub(crate) async fn get_active_service(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Service, AppError> {
    sqlx::query_as::<_, Service>(
        "SELECT id, name, description, category, duration_min, price, is_active
         FROM services WHERE id = ? AND is_active = 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("service not found".into()))
}

/// Fetch one day's capacity-consuming bookings and blocked intervals.
///
/// Called both at read time (availability) and at write time inside the
/// booking transaction, so the admission check sees authoritative data.
pub(crate) async fn day_occupancy(
    conn: &mut SqliteConnection,
    date: &str,
) -> Result<(Vec<GroupedInterval>, Vec<Interval>), AppError> {
    let rows: Vec<OccupancyRow> = sqlx::query_as(
        "SELECT b.start_time, b.end_time, s.name, s.category, b.status
         FROM bookings b
         JOIN services s ON s.id = b.service_id
         WHERE b.date = ? AND b.status != 'CANCELLED'",
    )
    .bind(date)
    .fetch_all(&mut *conn)
    .await?;

    let occupied = scheduling::occupied_intervals(&rows)
        .map_err(|e| AppError::Storage(format!("bookings table: {e}")))?;

    let blocked_rows: Vec<(String, String)> =
        sqlx::query_as("SELECT start_time, end_time FROM blocked_slots WHERE date = ?")
            .bind(date)
            .fetch_all(&mut *conn)
            .await?;

    let mut blocked = Vec::with_capacity(blocked_rows.len());
    for (start, end) in &blocked_rows {
        blocked.push(Interval::new(
            scheduling::parse_time(start)
                .map_err(|e| AppError::Storage(format!("blocked_slots table: {e}")))?,
            scheduling::parse_time(end)
                .map_err(|e| AppError::Storage(format!("blocked_slots table: {e}")))?,
        ));
    }

    Ok((occupied, blocked))
}

/// Admit and persist one booking as a single atomic unit.
///
/// `BEGIN IMMEDIATE` takes SQLite's write lock before the re-read, so two
/// near-simultaneous requests for the same slot serialize: the second one
/// re-counts after the first commit and gets a Conflict instead of
/// over-booking the group. The work runs inside an sqlx [`Transaction`],
/// which rolls back on drop: a rejected admission, a failed commit, or an
/// abandoned request cannot return the connection to the pool with the
/// write lock still held.
///
/// [`Transaction`]: sqlx::Transaction
pub(crate) async fn place_booking(
    state: &AppState,
    req: &CreateBookingRequest,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::InvalidInput("name and email are required".into()));
    }
    let date = validate_date(&req.date)?;
    let start = scheduling::parse_time(&req.time)?;

    let mut conn = state.db.acquire().await?;
    let mut tx = conn.begin_with("BEGIN IMMEDIATE").await?;
    let booking = admit_and_insert(&mut *tx, state, req, &date, start, status).await?;
    tx.commit().await?;
    Ok(booking)
}

async fn admit_and_insert(
    conn: &mut SqliteConnection,
    state: &AppState,
    req: &CreateBookingRequest,
    date: &str,
    start: u32,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let service = get_active_service(conn, req.service_id).await?;

    let (occupied, blocked) = day_occupancy(conn, date).await?;
    scheduling::check_admission(&state.schedule, &service, start, &occupied, &blocked)?;

    let end = scheduling::add_minutes(start, service.duration_min as u32);

    // Reuse or create the client by email
    let email = req.email.trim().to_lowercase();
    let client_id: i64 = sqlx::query_scalar(
        "INSERT INTO clients (name, email, phone) VALUES (?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET name = excluded.name, phone = excluded.phone
         RETURNING id",
    )
    .bind(req.name.trim())
    .bind(&email)
    .bind(&req.phone)
    .fetch_one(&mut *conn)
    .await?;

    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (client_id, service_id, date, start_time, end_time, status, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, client_id, service_id, date, start_time, end_time, status, notes,
                   created_at, cancelled_at",
    )
    .bind(client_id)
    .bind(service.id)
    .bind(date)
    .bind(scheduling::format_time(start))
    .bind(scheduling::format_time(end))
    .bind(status)
    .bind(&req.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(booking)
}

// ── Endpoints ──

/// GET /api/services — active services, alphabetical.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Service>>>, AppError> {
    let services = sqlx::query_as::<_, Service>(
        "SELECT id, name, description, category, duration_min, price, is_active
         FROM services WHERE is_active = 1 ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(services)))
}

/// GET /api/availability?service_id=N&date=YYYY-MM-DD — bookable start times.
///
/// Advisory: reflects state at read time; the booking endpoint re-validates.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityResponse>>, AppError> {
    let date = validate_date(&query.date)?;

    let mut conn = state.db.acquire().await?;
    let service = get_active_service(&mut conn, query.service_id).await?;
    let (occupied, blocked) = day_occupancy(&mut conn, &date).await?;

    let slots = scheduling::generate_slots(&state.schedule, &service, &occupied, &blocked);

    Ok(Json(ApiResponse::success(AvailabilityResponse { slots })))
}

/// POST /api/bookings — public booking request; persists as PENDING.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), AppError> {
    let booking = place_booking(&state, &body, BookingStatus::Pending).await?;

    tracing::info!(
        booking_id = booking.id,
        date = %booking.date,
        start = %booking.start_time,
        "booking request created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}
