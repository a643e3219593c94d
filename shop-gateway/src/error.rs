//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde_json::json;
use shop_core::CoreError;
use shop_store::StoreError;
use validator::ValidationErrors;

/// Field name → messages, in a stable order.
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Errors that can occur during request handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// An error propagated from the store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A domain rule failed while building a request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// One or more request fields are invalid.
    #[error("Invalid input.")]
    Validation(FieldErrors),

    /// The request body is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The endpoint requires a signed-in user.
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    /// The signed-in user lacks staff rights.
    #[error("You do not have permission to perform this action.")]
    Forbidden,
}

impl GatewayError {
    /// A validation error on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_owned(), vec![message.into()]);
        Self::Validation(errors)
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => match err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                // Only stored rows reach the store unparsed; a bad one is our fault.
                StoreError::Core(CoreError::UnknownVariant { .. } | CoreError::InvalidPrice { .. }) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                StoreError::Conflict(_) | StoreError::Validation(_) | StoreError::Core(_) => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                StoreError::Forbidden => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) | Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// Parameter by which a struct-level validation error names its field.
pub const FIELD_PARAM: &str = "field";

/// Key under which `validator` reports struct-level errors.
const SCHEMA_KEY: &str = "__all__";

/// Key for struct-level errors that name no field.
const NON_FIELD_KEY: &str = "non_field_errors";

impl From<ValidationErrors> for GatewayError {
    fn from(errors: ValidationErrors) -> Self {
        let mut map = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let key = if field == SCHEMA_KEY {
                    err.params
                        .get(FIELD_PARAM)
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or(NON_FIELD_KEY)
                } else {
                    field
                };
                let message = err.message.as_ref().map_or_else(|| err.code.to_string(), ToString::to_string);
                map.entry(key.to_owned()).or_default().push(message);
            }
        }
        map.sort_keys();
        Self::Validation(map)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({"detail": self.to_string(), "errors": errors}),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                json!({"detail": "Internal server error."})
            }
            _ => json!({"detail": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}
