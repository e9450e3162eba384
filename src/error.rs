//! API error type and its HTTP rendering.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use crate::users::{
    repo::StoreError,
    validation::{email_taken, ValidationErrors},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Field-level validation failure, rendered as `{"field": ["message"]}`.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Body could not be read as the expected JSON shape.
    #[error("JSON parse error - {0}")]
    MalformedBody(String),

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmailTaken(_) => {
                ApiError::Validation(ValidationErrors::single("email", email_taken()))
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                debug!(%errors, "validation failed");
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::MalformedBody(_) => {
                let body = json!({ "detail": self.to_string() });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::NotAuthenticated | ApiError::InvalidToken(_) => {
                let body = json!({ "detail": self.to_string() });
                let mut res = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
                res
            }
            ApiError::Internal(e) => {
                error!(error = %e, "request failed");
                let body = json!({ "detail": "A server error occurred." });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn email_taken_becomes_unique_field_error() {
        let err = ApiError::from(StoreError::EmailTaken("a@example.com".into()));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(res).await,
            json!({"email": ["user with this email already exists."]})
        );
    }

    #[tokio::test]
    async fn unauthenticated_carries_challenge_header() {
        let res = ApiError::InvalidToken("Invalid token.").into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Token");
        assert_eq!(body_json(res).await, json!({"detail": "Invalid token."}));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let res = ApiError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert!(!body.to_string().contains("exploded"));
    }
}
