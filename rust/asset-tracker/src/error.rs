use crate::forms::FieldErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication failed")]
    Auth,

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn asset_not_found(id: i32) -> Self {
        ServiceError::NotFound {
            entity: "asset",
            id: id.to_string(),
        }
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(err: diesel::result::Error) -> Self {
        ServiceError::Internal(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Auth => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ServiceError::Internal(err) = &self {
            error!(error = ?err, "request failed");
        }

        let error = self.to_string();
        let fields = match self {
            ServiceError::Validation(fields) => Some(fields),
            _ => None,
        };
        (status, Json(ErrorBody { error, fields })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_and_id() {
        assert_eq!(
            ServiceError::asset_not_found(42).to_string(),
            "asset 42 not found"
        );
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let mut fields = FieldErrors::default();
        fields.push("name", "is required");
        let cases = [
            (ServiceError::Auth, StatusCode::UNAUTHORIZED),
            (ServiceError::Validation(fields), StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::asset_not_found(1), StatusCode::NOT_FOUND),
            (
                ServiceError::Internal(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
