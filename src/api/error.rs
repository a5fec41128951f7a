//! HTTP mapping for [`TipsterError`].

use crate::error::TipsterError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    upgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    month: Option<String>,
}

impl TipsterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TipsterError::InvalidVideoReference(_) | TipsterError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TipsterError::Unauthenticated => StatusCode::UNAUTHORIZED,
            TipsterError::UnknownUser(_) => StatusCode::NOT_FOUND,
            TipsterError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            TipsterError::TranscriptUnavailable(_) | TipsterError::VideoPlatform(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for TipsterError {
    fn from(rejection: JsonRejection) -> Self {
        TipsterError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for TipsterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let (upgrade, limit, month) = match &self {
            TipsterError::QuotaExceeded { limit, month } => (Some(true), Some(*limit), Some(month.clone())),
            _ => (None, None, None),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.kind(),
            upgrade,
            limit,
            month,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TipsterError::InvalidVideoReference("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(TipsterError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(TipsterError::UnknownUser("a".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            TipsterError::QuotaExceeded {
                limit: 10,
                month: "2024-01".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            TipsterError::TranscriptUnavailable("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            TipsterError::ExtractionFailed("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            TipsterError::PersistenceFailed("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
