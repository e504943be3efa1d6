//! Error handling for the transfer service
//!
//! Provides consistent error responses in Czech and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::allocation::PlanningError;
use shared::transfer::{FulfillmentError, NumberingError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_cs: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_cs: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Planning rejected: {0}")]
    Planning(#[from] PlanningError),

    // Lost compare-and-swap on a document row
    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_cs: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Fulfillment rejected: {0}")]
    Fulfillment(#[from] FulfillmentError),

    #[error("Corrupt document number: {0}")]
    Numbering(#[from] NumberingError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Row was changed by someone else between read and conditional write
    pub fn stale_document(document_number: &str) -> Self {
        AppError::Conflict {
            resource: "transfer_document".to_string(),
            message: format!(
                "Transfer document {} was changed concurrently, reload and retry",
                document_number
            ),
            message_cs: format!(
                "Převodku {} mezitím změnil někdo jiný, načtěte ji znovu",
                document_number
            ),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), errors.to_string()));

        AppError::Validation {
            message_cs: format!("Neplatná hodnota pole {}", field),
            field,
            message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_cs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn fulfillment_detail(error: &FulfillmentError) -> (StatusCode, ErrorDetail) {
    let (status, code, message_cs, field) = match error {
        FulfillmentError::InvalidTransition { action, state } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_STATE_TRANSITION",
            format!("Akci \"{}\" nelze provést ve stavu {}", action, state),
            None,
        ),
        FulfillmentError::ItemNotFound(_) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Položka na převodce neexistuje".to_string(),
            None,
        ),
        FulfillmentError::AlreadyPicked { product_code } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "ALREADY_PICKED",
            format!("Produkt {} je již vychystán", product_code),
            None,
        ),
        FulfillmentError::NoteRequired { unconfirmed } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "NOTE_REQUIRED",
            format!(
                "{} položek není potvrzeno, vyplňte důvod částečného vychystání",
                unconfirmed
            ),
            Some("note"),
        ),
        FulfillmentError::NegativeQuantity(_) => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Vychystané množství nesmí být záporné".to_string(),
            Some("quantity"),
        ),
        FulfillmentError::NonPositiveQuantity(_) => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Přidávané množství musí být kladné".to_string(),
            Some("quantity"),
        ),
        FulfillmentError::QuantityOverflow { product_code } => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("Množství produktu {} je příliš velké", product_code),
            Some("quantity"),
        ),
    };

    (
        status,
        ErrorDetail {
            code: code.to_string(),
            message_en: error.to_string(),
            message_cs,
            field: field.map(String::from),
        },
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_cs: "Neplatný token".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions(permission) => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: format!("Permission denied: requires {}", permission),
                    message_cs: format!("Nemáte oprávnění {}", permission),
                    field: None,
                },
            ),
            AppError::Unauthorized { message, message_cs } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_cs: message_cs.clone(),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_cs,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_cs: message_cs.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_cs: format!("Neplatná data: {}", msg),
                    field: None,
                },
            ),
            AppError::Planning(err) => {
                let (message_cs, field) = match err {
                    PlanningError::EmptyCatalog => {
                        ("Katalog produktů je prázdný".to_string(), None)
                    }
                    PlanningError::NoAssignments => (
                        "Chybí přiřazení prodejen".to_string(),
                        Some("assignments".to_string()),
                    ),
                    PlanningError::DuplicateAssignment(store) => (
                        format!("Prodejna {} je přiřazena vícekrát", store),
                        Some("assignments".to_string()),
                    ),
                };
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail {
                        code: "VALIDATION_ERROR".to_string(),
                        message_en: err.to_string(),
                        message_cs,
                        field,
                    },
                )
            }
            AppError::Conflict {
                resource,
                message,
                message_cs,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_cs: message_cs.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_cs: format!("{} nenalezen", resource),
                    field: None,
                },
            ),
            AppError::Fulfillment(err) => fulfillment_detail(err),
            AppError::Numbering(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "Stored document numbers are corrupt".to_string(),
                    message_cs: "Uložená čísla převodek jsou poškozená".to_string(),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_cs: "Chyba databáze".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_cs: "Interní chyba serveru".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_cs: "Interní chyba serveru".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected: {:?}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
