//! Extractors whose rejections use the service's JSON error body.

use crate::{error::ServiceError, forms::FieldErrors};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path},
    http::request::Parts,
};
use tracing::debug;

/// JSON request body. Malformed or mistyped payloads become field errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct Payload<T>(pub T);

/// Numeric asset id from the route. Anything that is not an integer names no
/// asset, so it is reported as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for AssetId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i32>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(AssetId(id)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "asset id is not an integer");
                let raw = Path::<String>::from_request_parts(parts, state)
                    .await
                    .map(|Path(raw)| raw)
                    .unwrap_or_default();
                Err(ServiceError::NotFound {
                    entity: "asset",
                    id: raw,
                })
            }
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        let errors = match rejection {
            JsonRejection::JsonDataError(_) => data_error_fields(&text),
            _ => FieldErrors::single("body", text),
        };
        ServiceError::Validation(errors)
    }
}

/// Splits `"...target type: <path>: <message>"` into a field error keyed by
/// the offending path. Errors without a path land under `body`.
fn data_error_fields(text: &str) -> FieldErrors {
    let detail = text
        .split_once("target type: ")
        .map_or(text, |(_, detail)| detail);

    match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => FieldErrors::single(path, message),
        _ => FieldErrors::single("body", detail),
    }
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn data_errors_are_keyed_by_field() {
        let errors = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             total_gb: invalid type: boolean `true`, expected f64 at line 1 column 16",
        );
        assert_eq!(
            errors.get("total_gb"),
            Some(&["invalid type: boolean `true`, expected f64 at line 1 column 16".to_string()][..])
        );
    }

    #[test]
    fn errors_without_a_path_use_body() {
        let errors = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             invalid type: sequence, expected struct AssetForm at line 1 column 0",
        );
        assert!(errors.get("body").is_some());
        assert!(errors.get("invalid type").is_none());
    }
}
