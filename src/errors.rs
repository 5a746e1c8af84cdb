use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// User-facing message for a submission that could not be stored.
pub const SUBMISSION_RETRY_MESSAGE: &str =
    "Erro ao enviar formulário. Por favor, tente novamente ou entre em contato via WhatsApp.";

/// Application-specific error types, as seen by HTTP callers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Field-level validation failures.
    Validation(FieldErrors),
    /// The write clashes with an existing row; the message is shown to the caller.
    Conflict(String),
    /// The store could not serve the request; the message is shown to the caller.
    ServiceUnavailable(String),
    /// Internal server error. The message is logged, the body stays generic.
    InternalError(String),
    /// Missing or unknown credentials.
    Unauthorized(String),
    /// Authenticated, but the role does not allow the operation.
    Forbidden(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Validation(fields) => write!(f, "Validation failed: {}", fields),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    /// Logs errors according to their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(fields) => {
                let body = Json(json!({
                    "error": "Por favor, corrija os erros no formulário",
                    "fields": fields,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// ============ Domain taxonomy ============

/// Field name → user-facing message. Ordered so responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// Failures reported by a [`crate::store::LeadStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The server-side re-check rejected the candidate. Nothing was written.
    #[error("validation failed: {0}")]
    ValidationFailed(FieldErrors),

    /// The single insert was rejected. Nothing was written, nothing dispatched.
    #[error("persistence failed: {0}")]
    PersistenceError(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("missing record")]
    MissingPayload,

    #[error("email provider returned {status}: {body}")]
    ProviderError { status: u16, body: String },

    #[error("email provider request failed: {0}")]
    Transport(String),

    #[error("email provider circuit is open")]
    ProviderUnavailable,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("lead not found: {0}")]
    NotFound(Uuid),

    #[error("status update failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
#[error("failed to load: {0}")]
pub struct LoadError(#[from] pub StoreError);

/// Failures of staff catalog and settings writes.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("slug already in use")]
    SlugTaken,

    #[error("catalog write failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("unknown or revoked token")]
    UnknownToken,

    #[error("role {0:?} is not allowed to review leads")]
    Forbidden(Option<crate::auth::AppRole>),

    #[error("session lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::ValidationFailed(fields) => AppError::Validation(fields),
            SubmissionError::PersistenceError(e) => {
                tracing::error!("❌ Lead could not be stored: {}", e);
                AppError::ServiceUnavailable(SUBMISSION_RETRY_MESSAGE.to_string())
            }
        }
    }
}

impl From<UpdateError> for AppError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::NotFound(id) => AppError::NotFound(format!("Lead {} not found", id)),
            UpdateError::Store(e) => AppError::InternalError(format!("Status update failed: {}", e)),
        }
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        tracing::error!("{}", err);
        AppError::ServiceUnavailable("Falha ao carregar os dados".to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(fields) => AppError::Validation(fields),
            CatalogError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            CatalogError::SlugTaken => {
                AppError::Conflict("Slug já está em uso. Escolha outro.".to_string())
            }
            CatalogError::Store(e) => AppError::InternalError(format!("Catalog write: {}", e)),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingToken | SessionError::UnknownToken => {
                AppError::Unauthorized(err.to_string())
            }
            SessionError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            SessionError::Store(e) => AppError::InternalError(format!("Session lookup: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.add("cpf", "CPF é obrigatório");
        errors.add("cpf", "CPF inválido");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("cpf"), Some("CPF é obrigatório"));
    }

    #[test]
    fn test_empty_field_errors_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_validation_maps_to_unprocessable_entity() {
        let mut errors = FieldErrors::new();
        errors.add("email", "E-mail inválido");
        let response = AppError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_persistence_error_is_generic_to_the_user() {
        let err = SubmissionError::PersistenceError(StoreError::Unavailable("down".into()));
        match AppError::from(err) {
            AppError::ServiceUnavailable(msg) => assert_eq!(msg, SUBMISSION_RETRY_MESSAGE),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_taken_slug_is_a_conflict() {
        let response = AppError::from(CatalogError::SlugTaken).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
