use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ripfun::RipFunError;
use crate::services::{ExtractionError, TradeCompareError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<ExtractionError> for AppError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::EmptyInput => AppError::BadRequest(e.to_string()),
            ExtractionError::NotFound(_) | ExtractionError::Unresolved(_) | ExtractionError::NoData(_) => {
                AppError::NotFound(e.to_string())
            }
            ExtractionError::Upstream(_) => AppError::Upstream(e.to_string()),
        }
    }
}

impl From<TradeCompareError> for AppError {
    fn from(e: TradeCompareError) -> Self {
        match e {
            TradeCompareError::MissingUser | TradeCompareError::SameUser => AppError::BadRequest(e.to_string()),
            TradeCompareError::Extraction { user, source } => match AppError::from(source) {
                AppError::NotFound(msg) => AppError::NotFound(format!("{user}: {msg}")),
                AppError::Upstream(msg) => AppError::Upstream(format!("{user}: {msg}")),
                other => other,
            },
        }
    }
}

impl From<RipFunError> for AppError {
    fn from(e: RipFunError) -> Self {
        match e {
            RipFunError::NotFound(_) => AppError::NotFound(e.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}
