use serde::{Deserialize, Serialize};

// ── Database models ──

/// Service catalog categories. Stored as TEXT, fixed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceCategory {
    Hair,
    HammamMassage,
    Nails,
    Lashes,
    Facial,
}

/// Booking lifecycle. Bookings are never deleted; cancelled rows stay for
/// history but stop consuming capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Whether a booking in this status occupies its interval for capacity
    /// purposes. Only cancellation releases the slot; completed appointments
    /// keep their historical interval occupied.
    pub fn consumes_capacity(self) -> bool {
        self != BookingStatus::Cancelled
    }

    /// Admin-driven state machine: PENDING → CONFIRMED | CANCELLED,
    /// CONFIRMED → CANCELLED | COMPLETED; CANCELLED and COMPLETED are
    /// terminal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: ServiceCategory,
    pub duration_min: i64,
    pub price: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub client_id: i64,
    pub service_id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub cancelled_at: Option<String>,
}

/// Operator-defined closure interval; removes availability for all services
/// on that date regardless of capacity group.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockedSlot {
    pub id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
}

/// A booking joined with its client and service, as shown in the admin list.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookingDetail {
    pub id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub service_name: String,
    pub category: ServiceCategory,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub service_id: i64,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub slots: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub service_id: i64,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub id: i64,
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct BlockedSlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockedSlotRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub duration_min: i64,
    pub price: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ServiceCategory>,
    pub duration_min: Option<i64>,
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Uniform JSON envelope for every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
