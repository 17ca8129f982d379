use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::{password::PasswordError, repo::StoreError};

/// Broad class of a failure; decides the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Authentication,
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("Email is already registered!")]
    EmailTaken,
    #[error("User not found!")]
    UserNotFound,
    #[error("No users found")]
    NoUsers,
    #[error("Invalid username!")]
    InvalidUsername,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Something went wrong!")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::MissingFields(_) => ErrorKind::Validation,
            AppError::EmailTaken => ErrorKind::Conflict,
            AppError::UserNotFound | AppError::NoUsers => ErrorKind::NotFound,
            AppError::InvalidUsername | AppError::Unauthorized => ErrorKind::Authentication,
            AppError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(e.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(source) = &self {
            // Detail goes to the log only.
            error!(error = ?source, "internal error");
        }
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            AppError::MissingFields("Required fields are missing!").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NoUsers.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidUsername.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_hides_source_in_message() {
        let err = AppError::from(StoreError::Unavailable(anyhow::anyhow!(
            "connection refused to 10.0.0.7:5432"
        )));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.to_string(), "Something went wrong!");
    }

    #[tokio::test]
    async fn response_body_carries_message() {
        let res = AppError::EmailTaken.into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "Email is already registered!");
    }
}
