use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::ApiResponse;
use crate::scheduling::{AdmissionDenied, InvalidTime};

/// Error taxonomy surfaced by every handler.
///
/// Conflicts are reported distinctly from storage failures so the frontend
/// can render "slot no longer available" instead of a generic error. Nothing
/// is retried automatically: a stale admission check must not be replayed
/// without re-validating inside a fresh transaction.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<InvalidTime> for AppError {
    fn from(e: InvalidTime) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl From<AdmissionDenied> for AppError {
    fn from(e: AdmissionDenied) -> Self {
        AppError::Conflict(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage detail goes to the log only; clients get a generic message
        let message = match &self {
            AppError::Storage(detail) => {
                tracing::error!("storage failure: {}", detail);
                "storage failure".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidInput("bad date".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("service".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("taken".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Storage("disk".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_storage_detail_stays_out_of_the_response() {
        let response =
            AppError::Storage("near \"SELCT\": syntax error in bookings".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "storage failure");
    }

    #[tokio::test]
    async fn test_input_errors_keep_their_message() {
        let response = AppError::InvalidInput("invalid date".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid date");
    }

    #[test]
    fn test_admission_denied_maps_to_conflict() {
        let err: AppError = AdmissionDenied::CapacitySaturated.into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_invalid_time_maps_to_invalid_input() {
        let err: AppError = InvalidTime("25:00".into()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
