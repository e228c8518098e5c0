use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// One or more list filters did not validate. Each entry is `(field, message)`.
    InvalidFilter(Vec<(String, String)>),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Error reading an import source (archive, CSV).
    ImportError(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InvalidFilter(errors) => {
                write!(f, "Invalid filter:")?;
                for (field, msg) in errors {
                    write!(f, " {}: {};", field, msg)?;
                }
                Ok(())
            }
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::ImportError(msg) => write!(f, "Import error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::DatabaseError(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    /// HTTP status this error maps to, looking through context wrappers.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::InternalError(_) | AppError::ImportError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::WithContext { source, .. } => source.status(),
        }
    }

    /// Message that is safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::InvalidFilter(_) => "Invalid filter".to_string(),
            AppError::ExternalApiError(_) => "External service error".to_string(),
            AppError::ImportError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::WithContext { source, .. } => source.public_message(),
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let body = match self {
            AppError::DatabaseError(ref e) => {
                tracing::error!("Database error: {:?}", e);
                json!({ "error": self.public_message() })
            }
            AppError::ExternalApiError(ref msg) => {
                tracing::error!("External API error: {}", msg);
                json!({ "error": self.public_message() })
            }
            AppError::ImportError(ref msg) | AppError::InternalError(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "error": self.public_message() })
            }
            AppError::Unauthorized(ref msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                json!({ "error": self.public_message() })
            }
            AppError::InvalidFilter(ref errors) => {
                let mut fields = Map::new();
                for (field, msg) in errors {
                    let entry = fields
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(messages) = entry {
                        messages.push(Value::String(msg.clone()));
                    }
                }
                json!({ "error": self.public_message(), "fields": fields })
            }
            AppError::NotFound(_) | AppError::BadRequest(_) => {
                json!({ "error": self.public_message() })
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.into_response();
            }
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::InternalError(format!("session: {}", err))
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::ImportError(format!("ZIP archive: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::ImportError(format!("CSV: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::ImportError(format!("I/O: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_the_inner_status() {
        let err: Result<(), AppError> = Err(AppError::NotFound("Invalid page.".to_string()));
        let err = err.context("listing states").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Invalid page.");
        assert!(err.to_string().starts_with("listing states: "));
    }

    #[test]
    fn database_errors_hide_details() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Database error");
    }

    #[test]
    fn invalid_filter_is_a_bad_request() {
        let err = AppError::InvalidFilter(vec![(
            "estado".to_string(),
            "Select a valid choice.".to_string(),
        )]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("estado: Select a valid choice."));
    }
}
