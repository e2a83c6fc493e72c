use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use uuid::Uuid;

use crate::api::ErrorResponse;
use crate::auth::AuthError;

/// Malformed or unacceptable input. Always a 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Ingredient {0} does not exist")]
    UnknownIngredient(Uuid),

    #[error("A recipe needs at least one ingredient and ingredients must not repeat")]
    EmptyOrDuplicateIngredients,

    #[error("Ingredient amount must be between {min} and {max}", min = crate::composition::MIN_AMOUNT, max = crate::composition::MAX_AMOUNT)]
    InvalidAmount,

    #[error("You cannot subscribe to yourself")]
    SelfFollow,

    #[error("{field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid credentials")]
    InvalidCredentials,
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Your shopping cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("Database connection failed: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::EmptyCart => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Maps a unique-constraint violation to `Conflict`, passing every other
/// database error through unchanged.
pub fn conflict_on_unique(err: DieselError, message: &str) -> ApiError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::conflict(message)
        }
        other => ApiError::Database(other),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::field("body", rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::field("query", rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                ValidationError::field("path", e.body_text()).into()
            }
            other => ApiError::Internal(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            match self {
                ApiError::Pool(_) => "Database connection failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
